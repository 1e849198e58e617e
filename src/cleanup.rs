use std::io;

use camino::Utf8Path;

use crate::store::remove_entry;

/// Removes the whole staging area. Best effort: failures are logged and
/// returned for reporting, never escalated.
pub fn cleanup(staging_root: &Utf8Path) -> Option<io::Error> {
    match remove_entry(staging_root.as_std_path()) {
        Ok(()) => {
            tracing::debug!(path = %staging_root, "staging area removed");
            None
        }
        Err(err) => {
            tracing::warn!(path = %staging_root, error = %err, "failed to remove staging area");
            Some(err)
        }
    }
}
