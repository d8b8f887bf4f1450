//! Session lifecycle control and request dispatch.
//!
//! Owns a registry of shell sessions keyed by a caller-supplied
//! identifier, so multiple callers each get their own persistent shell
//! without sharing a process. For each request the controller applies
//! the command gate, ensures a live session exists (creating or
//! replacing one as needed), serializes command execution, and assembles
//! the ordered text blocks returned to the RPC layer.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::GlobalConfig;
use crate::gate::CommandGate;
use crate::session::{CommandOutput, SessionParams, ShellSession};
use crate::{AppError, Result};

/// Registry key used when the caller does not supply a session id.
pub const DEFAULT_SESSION_ID: &str = "default";

/// One caller request against the shell tool.
#[derive(Debug, Clone, Default)]
pub struct ShellRequest {
    /// Command line to execute, if any.
    pub command: Option<String>,
    /// Restart the session, discarding any in-session state. A command
    /// in the same request is ignored.
    pub restart: bool,
    /// Stop the session; a command in the same request executes first.
    pub stop: bool,
    /// Registry key selecting the caller's session.
    pub session_id: Option<String>,
}

/// Ordered text blocks returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellResponse {
    /// Response content in presentation order.
    pub blocks: Vec<String>,
}

impl ShellResponse {
    fn single(text: impl Into<String>) -> Self {
        Self {
            blocks: vec![text.into()],
        }
    }
}

/// Controller owning the session registry and command policy.
pub struct SessionController {
    params: SessionParams,
    gate: CommandGate,
    sessions: Mutex<HashMap<String, Arc<Mutex<ShellSession>>>>,
}

impl SessionController {
    /// Build a controller from global configuration.
    #[must_use]
    pub fn new(config: &GlobalConfig) -> Self {
        Self {
            params: config.session_params(),
            gate: CommandGate::new(&config.banned_commands),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// The command gate in effect.
    #[must_use]
    pub fn gate(&self) -> &CommandGate {
        &self.gate
    }

    /// Dispatch one request.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NoCommandProvided` for an empty request,
    /// `AppError::SessionBusy` when a command is already in flight on the
    /// selected session, and any session error raised while starting or
    /// stopping. Command execution failures are folded into the response
    /// blocks rather than propagated.
    pub async fn handle(&self, request: ShellRequest) -> Result<ShellResponse> {
        let key = request
            .session_id
            .clone()
            .unwrap_or_else(|| DEFAULT_SESSION_ID.to_owned());

        // A blank command line is the same as no command at all.
        let mut request = request;
        if request
            .command
            .as_deref()
            .is_some_and(|c| c.trim().is_empty())
        {
            request.command = None;
        }

        if request.restart {
            return self.restart(&key).await;
        }

        if request.command.is_none() && !request.stop {
            return Err(AppError::NoCommandProvided);
        }

        // Policy gate runs before any session is touched, so a banned
        // command has no side effects at all.
        if let Some(ref command) = request.command {
            if self.gate.check(command).is_err() {
                return Ok(self.refusal(command));
            }
        }

        let existing = { self.sessions.lock().await.get(&key).cloned() };
        let session = match existing {
            Some(session) => session,
            None => {
                if request.command.is_none() {
                    // Bare stop with nothing to stop is informational.
                    return Ok(ShellResponse::single("no session to stop"));
                }
                self.fresh_session(&key).await?
            }
        };

        let mut guard = session.try_lock().map_err(|_| AppError::SessionBusy)?;
        if guard.is_dead() {
            if request.command.is_none() {
                drop(guard);
                self.remove(&key).await;
                return Ok(ShellResponse::single("no session to stop"));
            }
            guard.start(true).await?;
        }

        if let Some(ref command) = request.command {
            let output = match guard.run(command).await {
                Ok(output) => output,
                // Execution failures are reported as error text, matching
                // the response contract; the session state (sticky
                // timeout, dead process) already records what happened.
                Err(err) => CommandOutput {
                    output: None,
                    error_output: Some(err.to_string()),
                },
            };
            if request.stop {
                if let Err(err) = guard.stop().await {
                    warn!(%err, session = %key, "failed to stop session after command");
                }
                drop(guard);
                self.remove(&key).await;
            }
            return Ok(Self::command_response(&output));
        }

        // Bare stop on a live session.
        if let Err(err) = guard.stop().await {
            warn!(%err, session = %key, "failed to stop session");
        }
        drop(guard);
        self.remove(&key).await;
        Ok(ShellResponse::single("session has been stopped"))
    }

    /// Unconditionally replace the session under `key` with a fresh one.
    ///
    /// Stop failures on the old session are ignored; an old session with
    /// a command still in flight is simply dropped from the registry and
    /// reaped once that command finishes.
    async fn restart(&self, key: &str) -> Result<ShellResponse> {
        let old = { self.sessions.lock().await.remove(key) };
        if let Some(old) = old {
            match old.try_lock() {
                Ok(mut guard) => {
                    if let Err(err) = guard.stop().await {
                        debug!(%err, session = %key, "ignoring stop failure during restart");
                    }
                }
                Err(_) => {
                    debug!(session = %key, "session busy during restart, dropping it");
                }
            }
        }

        self.fresh_session(key).await?;
        info!(session = %key, "session restarted");
        Ok(ShellResponse::single("tool has been restarted"))
    }

    /// Create, start, and register a new session under `key`.
    ///
    /// The registry lock is held across the spawn so two concurrent
    /// requests cannot race a session into existence twice.
    async fn fresh_session(&self, key: &str) -> Result<Arc<Mutex<ShellSession>>> {
        let mut map = self.sessions.lock().await;
        let mut session = ShellSession::new(self.params.clone());
        session.start(true).await?;
        let session = Arc::new(Mutex::new(session));
        map.insert(key.to_owned(), Arc::clone(&session));
        Ok(session)
    }

    async fn remove(&self, key: &str) {
        self.sessions.lock().await.remove(key);
    }

    fn refusal(&self, command: &str) -> ShellResponse {
        ShellResponse {
            blocks: vec![
                format!("unable to execute command {command} because it contains a banned command."),
                format!("banned commands: {}", self.gate.banned_commands().join(", ")),
            ],
        }
    }

    fn command_response(output: &CommandOutput) -> ShellResponse {
        let primary = output
            .output
            .as_deref()
            .or(output.error_output.as_deref())
            .unwrap_or_default()
            .trim()
            .to_owned();
        let mut blocks = vec![primary];
        if let Some(ref error_output) = output.error_output {
            blocks.push(format!("error: {error_output}"));
        }
        ShellResponse { blocks }
    }
}
