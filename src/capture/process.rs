// Ownership of the running ffmpeg child
//
// The `Child` is moved into a reaper task which is the only place that waits
// on it. Everyone else observes the exit status through a watch cell, so the
// supervisor can check liveness without touching the handle.

use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, warn, Instrument, Span};

use super::command::CaptureCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Running,
    Exited(ExitStatus),
    /// Waiting on the child failed; treat as gone
    Lost,
}

/// Read-only view of a capture process' liveness
#[derive(Debug, Clone)]
pub struct ProcessWatcher {
    rx: watch::Receiver<ProcessStatus>,
}

impl ProcessWatcher {
    pub fn status(&self) -> ProcessStatus {
        *self.rx.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.status() == ProcessStatus::Running
    }
}

/// Handle to a launched capture process
///
/// Dropping the handle kills the process if it is still running.
pub struct CaptureProcess {
    pid: Option<u32>,
    stdin: Option<ChildStdin>,
    watcher: ProcessWatcher,
    kill_tx: Option<oneshot::Sender<()>>,
}

impl CaptureProcess {
    /// Launch `command`, sending its diagnostic stream to `log_path`
    pub fn spawn(command: &CaptureCommand, log_path: &Path, span: &Span) -> Result<Self> {
        let log = File::create(log_path)
            .with_context(|| format!("Failed to create capture log {}", log_path.display()))?;

        let mut child = Command::new(command.program())
            .args(command.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::from(log))
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to launch {}", command.program().display()))?;

        let pid = child.id();
        let stdin = child.stdin.take();
        let (status_tx, status_rx) = watch::channel(ProcessStatus::Running);
        let (kill_tx, kill_rx) = oneshot::channel();

        debug!("Capture process started (pid {:?})", pid);
        tokio::spawn(reap(child, status_tx, kill_rx).instrument(span.clone()));

        Ok(Self {
            pid,
            stdin,
            watcher: ProcessWatcher { rx: status_rx },
            kill_tx: Some(kill_tx),
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn status(&self) -> ProcessStatus {
        self.watcher.status()
    }

    pub fn watcher(&self) -> ProcessWatcher {
        self.watcher.clone()
    }

    /// Ask ffmpeg to finish the file and exit
    ///
    /// Windows: `q` on stdin (ffmpeg's interactive quit). Unix: SIGTERM.
    pub async fn request_quit(&mut self) -> Result<()> {
        if !self.watcher.is_running() {
            return Ok(());
        }

        #[cfg(windows)]
        {
            use tokio::io::AsyncWriteExt;

            if let Some(mut stdin) = self.stdin.take() {
                stdin.write_all(b"q").await.context("Failed to send quit to ffmpeg")?;
                stdin.flush().await.ok();
            } else {
                self.kill();
            }
        }

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            match self.pid {
                Some(pid) => {
                    kill(Pid::from_raw(pid as i32), Signal::SIGTERM)
                        .context("Failed to send SIGTERM to ffmpeg")?;
                }
                None => self.kill(),
            }
            self.stdin.take();
        }

        #[cfg(not(any(unix, windows)))]
        self.kill();

        Ok(())
    }

    /// Force kill (idempotent)
    pub fn kill(&mut self) {
        if let Some(tx) = self.kill_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Wait until the process has exited, at most `timeout`
    pub async fn wait_for_exit(&self, timeout: Duration) -> bool {
        let mut rx = self.watcher.rx.clone();
        let exited = tokio::time::timeout(timeout, async move {
            rx.wait_for(|status| *status != ProcessStatus::Running)
                .await
                .is_ok()
        })
        .await;
        exited.unwrap_or(false)
    }
}

async fn reap(
    mut child: Child,
    status_tx: watch::Sender<ProcessStatus>,
    kill_rx: oneshot::Receiver<()>,
) {
    let result = tokio::select! {
        result = child.wait() => result,
        // Fires on an explicit kill and when the handle is dropped
        _ = kill_rx => {
            if let Err(e) = child.start_kill() {
                warn!("Failed to kill capture process: {}", e);
            }
            child.wait().await
        }
    };

    let status = match result {
        Ok(status) => {
            debug!("Capture process exited with {}", status);
            ProcessStatus::Exited(status)
        }
        Err(e) => {
            error!("Failed to wait on capture process: {}", e);
            ProcessStatus::Lost
        }
    };
    let _ = status_tx.send(status);
}
