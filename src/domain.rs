use std::fmt;
use std::fs;
use std::str::FromStr;

use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(String);

impl ItemId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ItemId {
    type Err = SyncError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        // Ids become directory names under the workshop root.
        let is_valid = !normalized.is_empty()
            && normalized
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
        if !is_valid {
            return Err(SyncError::InvalidItemId(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

/// Snapshot of one item's local state, plus whatever the remote told us.
#[derive(Debug, Clone)]
pub struct ContentItem {
    pub id: ItemId,
    pub local_path: Utf8PathBuf,
    pub manifest_path: Utf8PathBuf,
    pub local_present: bool,
    pub manifest_present: bool,
    pub local_manifest_mtime: Option<DateTime<Utc>>,
    pub remote_updated_at: Option<DateTime<Utc>>,
}

impl ContentItem {
    pub fn inspect(store: &Store, id: ItemId) -> Self {
        let local_path = store.item_dir(&id);
        let manifest_path = store.manifest_path(&id);
        let local_present = local_path.as_std_path().is_dir();

        let manifest_meta = fs::metadata(manifest_path.as_std_path())
            .ok()
            .filter(|meta| meta.is_file());
        let manifest_present = manifest_meta
            .as_ref()
            .map(|meta| meta.len() > 0)
            .unwrap_or(false);
        let local_manifest_mtime = manifest_meta
            .and_then(|meta| meta.modified().ok())
            .map(DateTime::<Utc>::from);

        Self {
            id,
            local_path,
            manifest_path,
            local_present,
            manifest_present,
            local_manifest_mtime,
            remote_updated_at: None,
        }
    }

    pub fn is_present(&self) -> bool {
        self.local_present && self.manifest_present
    }

    pub fn with_remote_updated_at(mut self, updated_at: Option<DateTime<Utc>>) -> Self {
        self.remote_updated_at = updated_at;
        self
    }
}

/// Removes repeated ids, keeping the first occurrence.
pub fn dedupe_ids(ids: impl IntoIterator<Item = ItemId>) -> Vec<ItemId> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter()
        .filter(|id| seen.insert(id.clone()))
        .collect()
}
