//! Shell process spawning and teardown.
//!
//! Owns the spawned OS shell and its three byte streams. The process is
//! spawned with a blanked `PS1` so prompt echoes never pollute captured
//! output, `kill_on_drop(true)` so a dropped handle always reaps the
//! process, its own process group (Unix) so interrupts reach the whole
//! job, and a watchdog task that hard-kills the group once the session
//! timeout elapses — the process-level safety net behind the per-command
//! deadline.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{AppError, Result};

/// Grace interval used during graceful shutdown steps.
pub(crate) const STOP_GRACE: Duration = Duration::from_millis(100);

/// Live shell process with exclusively owned stdio streams.
#[derive(Debug)]
pub struct ProcessHandle {
    pub(crate) child: Child,
    pub(crate) stdin: ChildStdin,
    pub(crate) stdout: ChildStdout,
    pub(crate) stderr: ChildStderr,
    watchdog: CancellationToken,
}

impl ProcessHandle {
    /// Spawn the shell with piped stdio and arm the lifetime watchdog.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the OS spawn fails, or
    /// `AppError::StreamUnavailable` if any of the three pipes cannot be
    /// captured.
    pub fn spawn(shell_command: &str, hard_timeout: Duration) -> Result<Self> {
        let mut cmd = Command::new(shell_command);
        cmd.env("PS1", "")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group so interrupt signals reach shell children too.
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd
            .spawn()
            .map_err(|err| AppError::Io(format!("failed to spawn shell: {err}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or(AppError::StreamUnavailable("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(AppError::StreamUnavailable("stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or(AppError::StreamUnavailable("stderr"))?;

        let watchdog = CancellationToken::new();
        spawn_watchdog(child.id(), hard_timeout, watchdog.clone());

        Ok(Self {
            child,
            stdin,
            stdout,
            stderr,
            watchdog,
        })
    }

    /// Exit code of the shell, or `None` while it is still running.
    ///
    /// A shell terminated by a signal reports `-1`.
    #[must_use]
    pub fn exit_code(&mut self) -> Option<i32> {
        match self.child.try_wait() {
            Ok(Some(status)) => Some(status.code().unwrap_or(-1)),
            Ok(None) => None,
            Err(err) => {
                warn!(%err, "failed to poll shell exit status");
                None
            }
        }
    }

    /// Ask the shell to exit by writing `exit` to its input stream, then
    /// close the stream after a short grace interval.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the write fails; the caller is expected
    /// to fall back to a forced kill.
    pub async fn graceful_exit(&mut self) -> Result<()> {
        self.stdin.write_all(b"exit\n").await?;
        self.stdin.flush().await?;
        tokio::time::sleep(STOP_GRACE).await;
        self.stdin.shutdown().await.ok();
        Ok(())
    }

    /// Best-effort interrupt of the shell's process group (Unix only).
    ///
    /// Used when a command deadline expires: the hung foreground job gets
    /// a chance to die instead of being orphaned unconditionally.
    pub fn interrupt(&self) {
        #[cfg(unix)]
        signal_group(self.child.id(), nix::sys::signal::Signal::SIGINT);
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        // Disarm the watchdog; kill_on_drop reaps the process itself.
        self.watchdog.cancel();
    }
}

fn spawn_watchdog(pid: Option<u32>, hard_timeout: Duration, token: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            () = token.cancelled() => {}
            () = tokio::time::sleep(hard_timeout) => {
                warn!(?pid, "shell exceeded its hard lifetime limit, killing process group");
                #[cfg(unix)]
                signal_group(pid, nix::sys::signal::Signal::SIGKILL);
            }
        }
    });
}

#[cfg(unix)]
fn signal_group(pid: Option<u32>, signal: nix::sys::signal::Signal) {
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    let Some(pid) = pid else { return };
    let Ok(raw) = i32::try_from(pid) else { return };
    if let Err(err) = killpg(Pid::from_raw(raw), signal) {
        tracing::debug!(%err, pid = raw, ?signal, "process group signal failed");
    }
}
