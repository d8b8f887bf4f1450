//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// MCP protocol or tool dispatch failure.
    Mcp(String),
    /// File-system, pipe, or process I/O failure.
    Io(String),
    /// Operation attempted before the session was started.
    NotStarted,
    /// `start()` called without force while the session is live.
    AlreadyStarted,
    /// A command is already in flight on this session.
    SessionBusy,
    /// The underlying shell process has terminated; carries the exit code.
    ProcessExited(i32),
    /// A command exceeded the configured deadline; carries the timeout
    /// in seconds. Sticky until the session is restarted.
    SessionTimedOut(u64),
    /// One of the three process streams is unexpectedly absent.
    StreamUnavailable(&'static str),
    /// The command line contains a banned token; carries the command line.
    BannedCommand(String),
    /// Request carried neither a command nor a stop/restart directive.
    NoCommandProvided,
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Mcp(msg) => write!(f, "mcp: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
            Self::NotStarted => write!(f, "session has not started"),
            Self::AlreadyStarted => write!(f, "session has already started"),
            Self::SessionBusy => write!(f, "session is already active"),
            Self::ProcessExited(code) => {
                write!(
                    f,
                    "shell has exited with returncode {code}; tool must be restarted"
                )
            }
            Self::SessionTimedOut(secs) => {
                write!(
                    f,
                    "timed out: shell has not returned in {secs} seconds and must be restarted"
                )
            }
            Self::StreamUnavailable(stream) => write!(f, "{stream} is not available"),
            Self::BannedCommand(command) => {
                write!(f, "command contains a banned command: {command}")
            }
            Self::NoCommandProvided => write!(f, "no command provided"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
