use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use serde::Serialize;

use crate::config::DownloadSettings;
use crate::domain::ItemId;
use crate::fetcher::{Fetcher, JobOutcome};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    TimedOut,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::TimedOut
        )
    }
}

#[derive(Debug, Clone)]
pub struct FetchJob {
    pub id: ItemId,
    pub status: JobStatus,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Install root handed to the fetcher. Unique to this job.
    pub staging_path: PathBuf,
    /// Where the fetcher materializes this item under `staging_path`.
    pub output_path: PathBuf,
}

impl FetchJob {
    fn pending(id: ItemId) -> Self {
        Self {
            id,
            status: JobStatus::Pending,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            staging_path: PathBuf::new(),
            output_path: PathBuf::new(),
        }
    }

    fn finish(mut self, outcome: JobOutcome) -> Self {
        match outcome {
            JobOutcome::Exited {
                exit_code,
                stdout,
                stderr,
            } => {
                self.status = if exit_code == Some(0) {
                    JobStatus::Succeeded
                } else {
                    JobStatus::Failed
                };
                self.exit_code = exit_code;
                self.stdout = stdout;
                self.stderr = stderr;
            }
            JobOutcome::TimedOut { stdout, stderr } => {
                self.status = JobStatus::TimedOut;
                self.stdout = stdout;
                self.stderr = stderr;
            }
            JobOutcome::SpawnFailed(message) => {
                self.status = JobStatus::Failed;
                self.stderr = message;
            }
        }
        self
    }
}

/// Bounded pool of fetch workers. One job per stale id, each in its own
/// staging directory; a failing job never cancels its siblings.
pub struct Orchestrator<'a, F: Fetcher> {
    fetcher: &'a F,
    store: &'a Store,
    max_workers: usize,
    timeout: Duration,
}

impl<'a, F: Fetcher> Orchestrator<'a, F> {
    pub fn new(fetcher: &'a F, store: &'a Store, download: &DownloadSettings) -> Self {
        Self {
            fetcher,
            store,
            max_workers: download.max_workers,
            timeout: download.job_timeout(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Drains every id before returning. Result order is unspecified.
    pub fn run(&self, stale_ids: &[ItemId]) -> HashMap<ItemId, FetchJob> {
        if stale_ids.is_empty() {
            return HashMap::new();
        }
        let workers = self.max_workers.max(1).min(stale_ids.len());
        let queue = Mutex::new(stale_ids.iter().cloned().collect::<VecDeque<_>>());
        let (tx, rx) = mpsc::channel();

        tracing::info!(jobs = stale_ids.len(), workers, "starting fetch pool");
        thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let queue = &queue;
                scope.spawn(move || {
                    while let Some(id) = next_id(queue) {
                        let job = self.run_job(id);
                        if tx.send(job).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(tx);

        rx.into_iter().map(|job| (job.id.clone(), job)).collect()
    }

    fn run_job(&self, id: ItemId) -> FetchJob {
        let mut job = FetchJob::pending(id);
        let staging = match self.store.create_job_staging(&job.id) {
            Ok(path) => path,
            Err(err) => {
                tracing::warn!(item = %job.id, error = %err, "could not create staging directory");
                return job.finish(JobOutcome::SpawnFailed(err.to_string()));
            }
        };
        job.output_path = self.fetcher.output_dir(&staging, &job.id);
        job.staging_path = staging;
        job.status = JobStatus::Running;

        tracing::info!(item = %job.id, "fetching");
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.fetcher.fetch(&job.id, &job.staging_path, self.timeout)
        }))
        .unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            tracing::error!(item = %job.id, panic = %message, "fetcher panicked");
            JobOutcome::SpawnFailed(format!("fetcher panicked: {message}"))
        });
        let job = job.finish(outcome);
        tracing::debug!(item = %job.id, status = ?job.status, exit_code = ?job.exit_code, "fetch finished");
        job
    }
}

fn next_id(queue: &Mutex<VecDeque<ItemId>>) -> Option<ItemId> {
    // A poisoned queue still holds valid ids.
    let mut guard = queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.pop_front()
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use camino::Utf8PathBuf;

    use super::*;

    struct CountingFetcher {
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Fetcher for CountingFetcher {
        fn fetch(&self, id: &ItemId, _destination: &Path, _timeout: Duration) -> JobOutcome {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            self.running.fetch_sub(1, Ordering::SeqCst);
            match id.as_str() {
                "bad" => JobOutcome::Exited {
                    exit_code: Some(5),
                    stdout: String::new(),
                    stderr: "boom".to_string(),
                },
                "slow" => JobOutcome::TimedOut {
                    stdout: String::new(),
                    stderr: String::new(),
                },
                _ => JobOutcome::Exited {
                    exit_code: Some(0),
                    stdout: String::new(),
                    stderr: String::new(),
                },
            }
        }

        fn output_dir(&self, destination: &Path, id: &ItemId) -> PathBuf {
            destination.join(id.as_str())
        }
    }

    fn id(value: &str) -> ItemId {
        value.parse().unwrap()
    }

    fn ids(values: &[&str]) -> Vec<ItemId> {
        values.iter().map(|value| id(value)).collect()
    }

    #[test]
    fn pool_respects_worker_cap_and_drains_all_jobs() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let store = Store::new_with_paths(root, "filelist.xml");
        let fetcher = CountingFetcher {
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        };
        let download = DownloadSettings {
            timeout: 1,
            max_workers: 2,
        };

        let jobs = Orchestrator::new(&fetcher, &store, &download)
            .run(&ids(&["a", "bad", "slow", "d", "e"]));

        assert_eq!(jobs.len(), 5);
        assert!(fetcher.peak.load(Ordering::SeqCst) <= 2);
        assert!(jobs.values().all(|job| job.status.is_terminal()));
        assert_eq!(jobs[&id("bad")].status, JobStatus::Failed);
        assert_eq!(jobs[&id("bad")].stderr, "boom");
        assert_eq!(jobs[&id("slow")].status, JobStatus::TimedOut);
        assert_eq!(jobs[&id("a")].status, JobStatus::Succeeded);
    }

    #[test]
    fn zero_workers_still_makes_progress() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let store = Store::new_with_paths(root, "filelist.xml");
        let fetcher = CountingFetcher {
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        };
        let download = DownloadSettings {
            timeout: 1,
            max_workers: 0,
        };

        let jobs = Orchestrator::new(&fetcher, &store, &download).run(&ids(&["a", "b"]));
        assert_eq!(jobs.len(), 2);
    }

    struct PanickingFetcher;

    impl Fetcher for PanickingFetcher {
        fn fetch(&self, id: &ItemId, _destination: &Path, _timeout: Duration) -> JobOutcome {
            if id.as_str() == "boom" {
                panic!("tool wrapper blew up");
            }
            JobOutcome::Exited {
                exit_code: Some(0),
                stdout: String::new(),
                stderr: String::new(),
            }
        }

        fn output_dir(&self, destination: &Path, id: &ItemId) -> PathBuf {
            destination.join(id.as_str())
        }
    }

    #[test]
    fn panicking_fetch_fails_only_its_own_job() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let store = Store::new_with_paths(root, "filelist.xml");
        let download = DownloadSettings {
            timeout: 1,
            max_workers: 2,
        };

        let jobs =
            Orchestrator::new(&PanickingFetcher, &store, &download).run(&ids(&["boom", "a", "b"]));

        assert_eq!(jobs.len(), 3);
        assert_eq!(jobs[&id("boom")].status, JobStatus::Failed);
        assert!(jobs[&id("boom")].stderr.contains("tool wrapper blew up"));
        assert_eq!(jobs[&id("a")].status, JobStatus::Succeeded);
        assert_eq!(jobs[&id("b")].status, JobStatus::Succeeded);
    }
}
