//! Global configuration parsing and validation.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::session::SessionParams;
use crate::{AppError, Result};

fn default_shell_command() -> String {
    "/bin/bash".into()
}

fn default_timeout_ms() -> u64 {
    120_000
}

fn default_output_settle_ms() -> u64 {
    200
}

fn default_sentinel() -> String {
    "<<exit>>".into()
}

fn default_http_port() -> u16 {
    3000
}

/// Global configuration parsed from `config.toml`.
///
/// Every field has a default, so the config file itself is optional.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Executable used to spawn the persistent shell.
    #[serde(default = "default_shell_command")]
    pub shell_command: String,
    /// Maximum time a single command may run, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Grace period after an output chunk arrives before it is finalized,
    /// in milliseconds.
    #[serde(default = "default_output_settle_ms")]
    pub output_settle_ms: u64,
    /// End-of-output marker echoed after every command.
    #[serde(default = "default_sentinel")]
    pub sentinel: String,
    /// Additional banned commands; extends the built-in list, never
    /// replaces it.
    #[serde(default)]
    pub banned_commands: Vec<String>,
    /// HTTP port for the SSE transport.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            shell_command: default_shell_command(),
            timeout_ms: default_timeout_ms(),
            output_settle_ms: default_output_settle_ms(),
            sentinel: default_sentinel(),
            banned_commands: Vec::new(),
            http_port: default_http_port(),
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Session parameters derived from this configuration.
    #[must_use]
    pub fn session_params(&self) -> SessionParams {
        SessionParams {
            shell_command: self.shell_command.clone(),
            output_settle: Duration::from_millis(self.output_settle_ms),
            timeout: Duration::from_millis(self.timeout_ms),
            sentinel: self.sentinel.clone(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.shell_command.is_empty() {
            return Err(AppError::Config("shell_command must not be empty".into()));
        }

        if self.timeout_ms == 0 {
            return Err(AppError::Config("timeout_ms must be greater than zero".into()));
        }

        if self.output_settle_ms >= self.timeout_ms {
            return Err(AppError::Config(
                "output_settle_ms must be shorter than timeout_ms".into(),
            ));
        }

        if self.sentinel.is_empty() {
            return Err(AppError::Config("sentinel must not be empty".into()));
        }

        // The sentinel is submitted inside single quotes; a quote in the
        // marker would break the framing of every command.
        if self.sentinel.contains('\'') || self.sentinel.chars().any(char::is_whitespace) {
            return Err(AppError::Config(
                "sentinel must not contain quotes or whitespace".into(),
            ));
        }

        Ok(())
    }
}
