//! Command policy gate.
//!
//! A stateless filter applied to every submitted command line before it
//! reaches the shell process. The command is split on whitespace and each
//! token is compared for an exact match against the banned set — `curl`
//! is rejected, `curly` is not. Rejected commands are never written to
//! the shell, so no partial execution can occur.

use crate::{AppError, Result};

/// Commands banned by default, chiefly network fetchers and browsers
/// that would let an injected prompt exfiltrate data or pull payloads.
pub const DEFAULT_BANNED_COMMANDS: &[&str] = &[
    "alias",
    "curl",
    "curlie",
    "wget",
    "axel",
    "aria2c",
    "nc",
    "telnet",
    "lynx",
    "w3m",
    "links",
    "httpie",
    "xh",
    "http-prompt",
    "chrome",
    "firefox",
    "safari",
];

/// Policy filter holding the effective banned-command set.
#[derive(Debug, Clone)]
pub struct CommandGate {
    banned: Vec<String>,
}

impl Default for CommandGate {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl CommandGate {
    /// Build a gate from the built-in set plus caller-supplied additions.
    ///
    /// Additions extend the defaults, never replace them; duplicates are
    /// dropped.
    #[must_use]
    pub fn new(extra: &[String]) -> Self {
        let mut banned: Vec<String> = DEFAULT_BANNED_COMMANDS
            .iter()
            .map(ToString::to_string)
            .collect();
        for cmd in extra {
            if !banned.iter().any(|b| b == cmd) {
                banned.push(cmd.clone());
            }
        }
        Self { banned }
    }

    /// Return the first whitespace token of `command` that is banned.
    #[must_use]
    pub fn find_banned<'a>(&self, command: &'a str) -> Option<&'a str> {
        command
            .split_whitespace()
            .find(|part| self.banned.iter().any(|banned| banned == part))
    }

    /// Validate a command line against the banned set.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BannedCommand` carrying the full command line
    /// when any token is banned.
    pub fn check(&self, command: &str) -> Result<()> {
        if self.find_banned(command).is_some() {
            return Err(AppError::BannedCommand(command.to_owned()));
        }
        Ok(())
    }

    /// The effective banned-command set, defaults first.
    #[must_use]
    pub fn banned_commands(&self) -> &[String] {
        &self.banned
    }
}
