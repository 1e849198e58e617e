use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::time::SystemTime;

use crate::domain::ContentItem;
use crate::error::FailureReason;
use crate::orchestrator::FetchJob;
use crate::store::{self, list_entries, non_empty_file, remove_entry};

/// Moves a validated job's output into the item's canonical directory.
///
/// Relocation is a full replace: canonical entries that the new fetch does not
/// contain are removed. A failure part-way is not rolled back; the item is
/// reported so an operator can inspect the directory.
pub fn relocate(job: &FetchJob, item: &ContentItem) -> Result<(), FailureReason> {
    let canonical = item.local_path.as_std_path();
    fs::create_dir_all(canonical).map_err(|err| {
        FailureReason::Relocation(format!("create {}: {err}", canonical.display()))
    })?;

    let incoming = list_entries(&job.output_path).map_err(|err| {
        FailureReason::Relocation(format!("read {}: {err}", job.output_path.display()))
    })?;
    let incoming_names = incoming
        .iter()
        .filter_map(|path| path.file_name().map(OsString::from))
        .collect::<HashSet<_>>();

    let existing = list_entries(canonical).map_err(|err| {
        FailureReason::Relocation(format!("read {}: {err}", canonical.display()))
    })?;
    for path in existing {
        let keep = path
            .file_name()
            .is_some_and(|name| incoming_names.contains(name));
        if !keep {
            remove_entry(&path).map_err(|err| {
                FailureReason::Relocation(format!("remove stale {}: {err}", path.display()))
            })?;
        }
    }

    for source in incoming {
        let Some(name) = source.file_name() else {
            continue;
        };
        let target = canonical.join(name);
        store::replace_entry(&source, &target).map_err(|err| {
            FailureReason::Relocation(format!(
                "move {} -> {}: {err}",
                source.display(),
                target.display()
            ))
        })?;
    }

    let manifest = item.manifest_path.as_std_path();
    if !non_empty_file(manifest) {
        return Err(FailureReason::Relocation(format!(
            "manifest {} missing or empty after move",
            manifest.display()
        )));
    }

    // The tool may keep upstream timestamps; stamp the sync time instead.
    fs::File::options()
        .write(true)
        .open(manifest)
        .and_then(|file| file.set_modified(SystemTime::now()))
        .map_err(|err| {
            FailureReason::Relocation(format!("touch {}: {err}", manifest.display()))
        })?;
    Ok(())
}
