use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum SyncError {
    #[error("invalid item id: {0}")]
    InvalidItemId(String),

    #[error("failed to read settings file at {0}")]
    SettingsRead(PathBuf),

    #[error("failed to parse settings: {0}")]
    SettingsParse(String),

    #[error("failed to read player config at {0}")]
    #[diagnostic(help("point --player-config (or files.playerConfig) at the game's config_player.xml"))]
    PlayerConfigRead(PathBuf),

    #[error("remote metadata request failed: {0}")]
    Network(String),

    #[error("remote metadata endpoint returned status {status}: {message}")]
    RemoteStatus { status: u16, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

/// Why a single item failed to synchronize. Never aborts the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("fetch timed out after {secs}s")]
    FetchTimeout { secs: u64 },

    #[error("fetch process failed (exit code {}): {stderr}", display_code(.exit_code))]
    FetchProcess {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("fetched content failed validation: {0}")]
    Validation(String),

    #[error("relocation failed, canonical directory may need manual cleanup: {0}")]
    Relocation(String),
}

impl FailureReason {
    pub fn tag(&self) -> &'static str {
        match self {
            FailureReason::FetchTimeout { .. } => "FetchTimeout",
            FailureReason::FetchProcess { .. } => "FetchProcessError",
            FailureReason::Validation(_) => "ValidationError",
            FailureReason::Relocation(_) => "RelocationError",
        }
    }

    pub fn needs_operator_attention(&self) -> bool {
        matches!(self, FailureReason::Relocation(_))
    }
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none".to_string(),
    }
}
