//! Persistent shell session.
//!
//! One [`ShellSession`] owns one long-lived shell process and executes
//! commands against it strictly one at a time, preserving working
//! directory, environment variables, and background jobs between calls.
//! Each command is framed by [`framer`] and raced against the configured
//! deadline; a deadline expiry poisons the session until it is replaced.

pub mod framer;
pub mod process;

use std::time::Duration;

use tracing::{debug, info, warn};

pub use framer::CommandOutput;
pub use process::ProcessHandle;

use crate::{AppError, Result};

/// Tunable parameters of a shell session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    /// Executable used to spawn the shell.
    pub shell_command: String,
    /// Grace period after an output chunk before it is finalized.
    pub output_settle: Duration,
    /// Maximum time a single command may run.
    pub timeout: Duration,
    /// End-of-output marker echoed after every command. Must never be
    /// emitted by ordinary command output; collisions are not escaped.
    pub sentinel: String,
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            shell_command: "/bin/bash".into(),
            output_settle: Duration::from_millis(200),
            timeout: Duration::from_millis(120_000),
            sentinel: "<<exit>>".into(),
        }
    }
}

/// A single persistent shell process and its execution state.
#[derive(Debug, Default)]
pub struct ShellSession {
    params: SessionParams,
    process: Option<ProcessHandle>,
    started: bool,
    active: bool,
    timed_out: bool,
}

impl ShellSession {
    /// Create a session with the given parameters. The shell is not
    /// spawned until [`ShellSession::start`].
    #[must_use]
    pub fn new(params: SessionParams) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    /// Session parameters.
    #[must_use]
    pub fn params(&self) -> &SessionParams {
        &self.params
    }

    /// Whether the session's deadline has expired since the last start.
    #[must_use]
    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    /// Whether a start succeeded and no stop has happened since.
    #[must_use]
    pub fn started(&self) -> bool {
        self.started
    }

    /// Whether the session cannot serve commands: never started, handle
    /// absent, or the shell process has terminated.
    #[must_use]
    pub fn is_dead(&mut self) -> bool {
        if !self.started {
            return true;
        }
        match self.process.as_mut() {
            Some(handle) => handle.exit_code().is_some(),
            None => true,
        }
    }

    /// Spawn the shell process.
    ///
    /// # Errors
    ///
    /// Returns `AppError::AlreadyStarted` when the session is live and
    /// `force` is false; with `force`, the old process is stopped first.
    /// Spawn failures surface as `AppError::Io` or
    /// `AppError::StreamUnavailable`.
    pub async fn start(&mut self, force: bool) -> Result<()> {
        if self.started {
            if !force {
                return Err(AppError::AlreadyStarted);
            }
            self.stop().await?;
        }

        let handle = ProcessHandle::spawn(&self.params.shell_command, self.params.timeout)?;
        info!(shell = %self.params.shell_command, "shell session started");
        self.process = Some(handle);
        self.started = true;
        self.active = false;
        self.timed_out = false;
        Ok(())
    }

    /// Stop the session, attempting a graceful shell exit first.
    ///
    /// Writes `exit` to the shell, waits a short grace interval, closes
    /// the streams, and falls back to a forced kill when the graceful
    /// path fails. Stopping an already-exited process is a no-op apart
    /// from clearing state.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotStarted` when called before a successful
    /// start.
    pub async fn stop(&mut self) -> Result<()> {
        if !self.started {
            return Err(AppError::NotStarted);
        }

        if let Some(mut handle) = self.process.take() {
            if handle.exit_code().is_none() {
                if let Err(err) = handle.graceful_exit().await {
                    // Best-effort: log and terminate forcibly.
                    warn!(%err, "graceful shell exit failed, killing process");
                    if let Err(err) = handle.child.start_kill() {
                        warn!(%err, "failed to kill shell process");
                    }
                }
                tokio::time::sleep(process::STOP_GRACE).await;
            }
            // Dropping the handle closes the remaining streams and, via
            // kill_on_drop, reaps the process if it is somehow alive.
            drop(handle);
        }

        debug!("shell session stopped");
        self.started = false;
        self.active = false;
        Ok(())
    }

    /// Execute one command and capture its output.
    ///
    /// # Errors
    ///
    /// Fails fast with `AppError::NotStarted`, `AppError::SessionBusy`,
    /// `AppError::ProcessExited`, or `AppError::SessionTimedOut` when the
    /// session cannot accept a command; `AppError::SessionTimedOut` is
    /// also returned (and made sticky) when the command outruns the
    /// configured deadline.
    pub async fn run(&mut self, command: &str) -> Result<CommandOutput> {
        if !self.started {
            return Err(AppError::NotStarted);
        }
        if self.active {
            return Err(AppError::SessionBusy);
        }

        let timeout = self.params.timeout;
        match self.process.as_mut() {
            None => return Err(AppError::NotStarted),
            Some(handle) => {
                if let Some(code) = handle.exit_code() {
                    return Err(AppError::ProcessExited(code));
                }
            }
        }
        if self.timed_out {
            return Err(AppError::SessionTimedOut(timeout.as_secs()));
        }

        self.active = true;
        let raced = match self.process.as_mut() {
            Some(handle) => {
                let framed = framer::execute(
                    handle,
                    command,
                    &self.params.sentinel,
                    self.params.output_settle,
                );
                tokio::time::timeout(timeout, framed).await
            }
            None => {
                self.active = false;
                return Err(AppError::NotStarted);
            }
        };
        let result = match raced {
            Ok(result) => result,
            Err(_elapsed) => {
                self.timed_out = true;
                warn!(secs = timeout.as_secs(), "command deadline expired");
                // Give the hung foreground job a chance to die rather
                // than orphaning it unconditionally.
                if let Some(handle) = self.process.as_ref() {
                    handle.interrupt();
                }
                Err(AppError::SessionTimedOut(timeout.as_secs()))
            }
        };
        self.active = false;
        result
    }
}
