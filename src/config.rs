use std::fs;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::ItemId;
use crate::error::SyncError;

pub const SETTINGS_FILE_NAME: &str = "workshop-sync.json";
pub const DEFAULT_STEAM_API_ENDPOINT: &str =
    "https://api.steampowered.com/ISteamRemoteStorage/GetPublishedFileDetails/v1/";
pub const SANE_MAX_WORKERS: std::ops::RangeInclusive<usize> = 1..=10;

static XML_COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("comment pattern is valid"));
static PACKAGE_ELEMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<package\b[^>]*?\bpath\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("package element pattern is valid")
});
static PACKAGE_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"LocalMods[/\\](\d+)[/\\]filelist\.xml").expect("package path pattern is valid")
});

/// Immutable run settings, built once at startup and passed down by reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    #[serde(alias = "steamcmd")]
    pub fetcher: FetcherSettings,
    pub files: FileSettings,
    pub download: DownloadSettings,
    pub remote: RemoteSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FetcherSettings {
    pub path: PathBuf,
    #[serde(alias = "app_id")]
    pub app_id: String,
}

impl Default for FetcherSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("steamcmd"),
            app_id: "602960".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileSettings {
    #[serde(alias = "workshop_path")]
    pub workshop_path: Utf8PathBuf,
    pub manifest: String,
    #[serde(alias = "player_config")]
    pub player_config: Utf8PathBuf,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            workshop_path: Utf8PathBuf::from("LocalMods"),
            manifest: "filelist.xml".to_string(),
            player_config: Utf8PathBuf::from("config_player.xml"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DownloadSettings {
    /// Per-job deadline, in seconds.
    pub timeout: u64,
    #[serde(alias = "max_workers")]
    pub max_workers: usize,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            timeout: 300,
            max_workers: 3,
        }
    }
}

impl DownloadSettings {
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RemoteSettings {
    pub enabled: bool,
    pub endpoint: String,
    pub timeout: u64,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: DEFAULT_STEAM_API_ENDPOINT.to_string(),
            timeout: 10,
        }
    }
}

impl RemoteSettings {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl Settings {
    pub fn from_json(content: &str) -> Result<Self, SyncError> {
        serde_json::from_str(content).map_err(|err| SyncError::SettingsParse(err.to_string()))
    }

    /// Non-fatal warnings about suspicious values. Nothing is clamped here.
    pub fn advisories(&self) -> Vec<String> {
        let mut notes = Vec::new();
        if !SANE_MAX_WORKERS.contains(&self.download.max_workers) {
            notes.push(format!(
                "download.maxWorkers={} is outside the recommended range {}-{}",
                self.download.max_workers,
                SANE_MAX_WORKERS.start(),
                SANE_MAX_WORKERS.end()
            ));
        }
        if self.download.timeout == 0 {
            notes.push("download.timeout=0 will time out every fetch".to_string());
        }
        notes
    }
}

pub struct SettingsLoader;

impl SettingsLoader {
    /// An explicit path must exist. Without one, the current directory and then
    /// the user config directory are searched, falling back to defaults.
    pub fn resolve(path: Option<&str>) -> Result<Settings, SyncError> {
        let settings_path = match path {
            Some(path) => Some(PathBuf::from(path)),
            None => Self::default_locations()
                .into_iter()
                .find(|candidate| candidate.is_file()),
        };

        let Some(settings_path) = settings_path else {
            return Ok(Settings::default());
        };

        let content = fs::read_to_string(&settings_path)
            .map_err(|_| SyncError::SettingsRead(settings_path.clone()))?;
        Settings::from_json(&content)
    }

    fn default_locations() -> Vec<PathBuf> {
        let mut locations = vec![PathBuf::from(SETTINGS_FILE_NAME)];
        if let Some(dirs) = BaseDirs::new() {
            locations.push(
                dirs.config_dir()
                    .join("workshop-sync")
                    .join(SETTINGS_FILE_NAME),
            );
        }
        locations
    }
}

/// Reads the game's player config and returns the workshop ids it enables,
/// in document order. Duplicates are kept.
pub fn player_config_item_ids(path: &camino::Utf8Path) -> Result<Vec<ItemId>, SyncError> {
    let content = fs::read_to_string(path.as_std_path())
        .map_err(|_| SyncError::PlayerConfigRead(path.as_std_path().to_path_buf()))?;
    Ok(item_ids_from_player_config(&content))
}

/// Only the `path` attribute of live `<package>` elements counts; commented-out
/// packages are ignored.
pub fn item_ids_from_player_config(content: &str) -> Vec<ItemId> {
    let live = XML_COMMENT_RE.replace_all(content, "");
    PACKAGE_ELEMENT_RE
        .captures_iter(&live)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .filter_map(|path| PACKAGE_PATH_RE.captures(path.as_str().trim()))
        .filter_map(|caps| caps.get(1))
        .filter_map(|id| id.as_str().parse().ok())
        .collect()
}
