use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::FetcherSettings;
use crate::domain::ItemId;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
// Descendants outside the tool's process group may keep the pipes open.
const OUTPUT_GRACE: Duration = Duration::from_secs(5);

/// What happened to one invocation of the acquisition tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Exited {
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    TimedOut {
        stdout: String,
        stderr: String,
    },
    SpawnFailed(String),
}

/// Materializes one item under `destination`.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, id: &ItemId, destination: &Path, timeout: Duration) -> JobOutcome;

    /// Where the item's files end up under `destination` after a fetch.
    fn output_dir(&self, destination: &Path, id: &ItemId) -> PathBuf;
}

#[derive(Debug, Clone)]
pub struct SteamCmdFetcher {
    program: PathBuf,
    app_id: String,
}

impl SteamCmdFetcher {
    pub fn new(settings: &FetcherSettings) -> Self {
        Self {
            program: settings.path.clone(),
            app_id: settings.app_id.clone(),
        }
    }

    pub fn args(&self, id: &ItemId, install_dir: &Path) -> Vec<String> {
        vec![
            "+force_install_dir".to_string(),
            install_dir.to_string_lossy().to_string(),
            "+login".to_string(),
            "anonymous".to_string(),
            "+workshop_download_item".to_string(),
            self.app_id.clone(),
            id.as_str().to_string(),
            "validate".to_string(),
            "+quit".to_string(),
        ]
    }
}

impl Fetcher for SteamCmdFetcher {
    fn fetch(&self, id: &ItemId, destination: &Path, timeout: Duration) -> JobOutcome {
        // steamcmd resolves relative install dirs against its own location.
        let install_dir =
            std::path::absolute(destination).unwrap_or_else(|_| destination.to_path_buf());
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args(id, &install_dir));
        tracing::debug!(item = %id, program = %self.program.display(), "spawning fetcher");
        run_with_timeout(cmd, timeout)
    }

    fn output_dir(&self, destination: &Path, id: &ItemId) -> PathBuf {
        workshop_content_dir(destination, &self.app_id, id)
    }
}

pub fn workshop_content_dir(install_dir: &Path, app_id: &str, id: &ItemId) -> PathBuf {
    install_dir
        .join("steamapps")
        .join("workshop")
        .join("content")
        .join(app_id)
        .join(id.as_str())
}

/// Runs `cmd` to completion or until `timeout`, whichever comes first.
/// On unix the tool runs in its own process group; on timeout the whole
/// group is killed and the child reaped before returning, and stragglers
/// left behind by a tool that exited on its own are killed as well.
pub fn run_with_timeout(mut cmd: Command, timeout: Duration) -> JobOutcome {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => return JobOutcome::SpawnFailed(err.to_string()),
    };

    let stdout = child.stdout.take().map(spawn_reader);
    let stderr = child.stderr.take().map(spawn_reader);

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => {}
            Err(err) => {
                kill_process_group(&mut child);
                let _ = child.wait();
                return JobOutcome::SpawnFailed(err.to_string());
            }
        }
        if Instant::now() >= deadline {
            kill_process_group(&mut child);
            let _ = child.wait();
            break None;
        }
        thread::sleep(POLL_INTERVAL);
    };

    if status.is_some() {
        // The group outlives its leader while any member is alive.
        kill_process_group(&mut child);
    }

    let stdout = collect_output(stdout);
    let stderr = collect_output(stderr);
    match status {
        Some(status) => JobOutcome::Exited {
            exit_code: status.code(),
            stdout,
            stderr,
        },
        None => JobOutcome::TimedOut { stdout, stderr },
    }
}

#[cfg(unix)]
fn kill_process_group(child: &mut Child) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Ok(pgid) = i32::try_from(child.id()) else {
        let _ = child.kill();
        return;
    };
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
        Err(err) => {
            tracing::warn!(pgid, error = %err, "could not signal fetcher process group");
            let _ = child.kill();
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut Child) {
    let _ = child.kill();
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        let _ = tx.send(String::from_utf8_lossy(&buf).trim().to_string());
    });
    rx
}

fn collect_output(rx: Option<Receiver<String>>) -> String {
    rx.and_then(|rx| rx.recv_timeout(OUTPUT_GRACE).ok())
        .unwrap_or_default()
}
