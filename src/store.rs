use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::Builder;

use crate::config::Settings;
use crate::domain::ItemId;
use crate::error::SyncError;

pub const STAGING_DIR_NAME: &str = ".workshop-sync-staging";

/// Layout of the canonical store (`<workshop>/<id>`) and the staging area.
#[derive(Debug, Clone)]
pub struct Store {
    workshop_root: Utf8PathBuf,
    manifest_name: String,
}

impl Store {
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new_with_paths(
            settings.files.workshop_path.clone(),
            &settings.files.manifest,
        )
    }

    pub fn new_with_paths(workshop_root: Utf8PathBuf, manifest_name: &str) -> Self {
        Self {
            workshop_root,
            manifest_name: manifest_name.to_string(),
        }
    }

    pub fn workshop_root(&self) -> &Utf8Path {
        &self.workshop_root
    }

    pub fn manifest_name(&self) -> &str {
        &self.manifest_name
    }

    pub fn item_dir(&self, id: &ItemId) -> Utf8PathBuf {
        self.workshop_root.join(id.as_str())
    }

    pub fn manifest_path(&self, id: &ItemId) -> Utf8PathBuf {
        self.item_dir(id).join(&self.manifest_name)
    }

    pub fn staging_root(&self) -> Utf8PathBuf {
        self.workshop_root.join(STAGING_DIR_NAME)
    }

    pub fn ensure_workshop_root(&self) -> Result<(), SyncError> {
        fs::create_dir_all(self.workshop_root.as_std_path())
            .map_err(|err| SyncError::Filesystem(err.to_string()))
    }

    /// Creates a fresh, uniquely named staging directory for one job.
    /// Removal is left to the cleanup pass.
    pub fn create_job_staging(&self, id: &ItemId) -> Result<PathBuf, SyncError> {
        let staging_root = self.staging_root();
        fs::create_dir_all(staging_root.as_std_path())
            .map_err(|err| SyncError::Filesystem(format!("create {staging_root}: {err}")))?;
        let dir = Builder::new()
            .prefix(&format!("{}-", id.as_str()))
            .tempdir_in(staging_root.as_std_path())
            .map_err(|err| SyncError::Filesystem(err.to_string()))?;
        Ok(dir.keep())
    }
}

pub fn list_entries(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        entries.push(entry?.path());
    }
    entries.sort();
    Ok(entries)
}

/// Removes a file, symlink or directory tree. A missing path is not an error.
pub fn remove_entry(path: &Path) -> io::Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };
    if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Replaces `to` with `from`, removing whatever was at `to` first.
pub fn replace_entry(from: &Path, to: &Path) -> io::Result<()> {
    remove_entry(to)?;
    fs::rename(from, to)
}

pub fn non_empty_file(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}
