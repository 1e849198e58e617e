use std::fs;

use crate::error::FailureReason;
use crate::orchestrator::FetchJob;

/// Structural check of a finished job's output. The tool's exit code alone is
/// not trusted.
pub fn validate(job: &FetchJob, manifest_name: &str) -> Result<(), FailureReason> {
    let output = &job.output_path;
    if !output.is_dir() {
        return Err(FailureReason::Validation(format!(
            "output directory {} does not exist",
            output.display()
        )));
    }

    let mut entries = fs::read_dir(output).map_err(|err| {
        FailureReason::Validation(format!("cannot read {}: {err}", output.display()))
    })?;
    if entries.next().is_none() {
        return Err(FailureReason::Validation(format!(
            "output directory {} is empty",
            output.display()
        )));
    }

    let manifest = output.join(manifest_name);
    let meta = fs::metadata(&manifest)
        .ok()
        .filter(|meta| meta.is_file())
        .ok_or_else(|| {
            FailureReason::Validation(format!("manifest {manifest_name} is missing"))
        })?;
    if meta.len() == 0 {
        return Err(FailureReason::Validation(format!(
            "manifest {manifest_name} is empty"
        )));
    }
    Ok(())
}
