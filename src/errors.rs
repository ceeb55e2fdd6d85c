//! Error types shared across the client.

use std::fmt::{Display, Formatter};

/// Shared client result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Client error enumeration covering every streaming and HITL failure mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Connection refused, reset, or timed out before or during a stream.
    Transport(String),
    /// The server answered with an HTTP status of 400 or above.
    Protocol {
        /// HTTP status code returned by the server.
        status: u16,
        /// Response body, or the canonical reason when the body is empty.
        detail: String,
    },
    /// A frame or line could not be decoded.
    Decode(String),
    /// The remote agent reported an `error` event.
    Application(String),
    /// A HITL response was rejected locally before reaching the network.
    HitlViolation(String),
    /// The stream was superseded or explicitly cancelled.
    Cancelled,
    /// Persistent-connection reconnection attempts were exhausted.
    ReconnectFailed {
        /// Number of attempts made before giving up.
        attempts: u32,
    },
    /// Requested entity does not exist.
    NotFound(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl AppError {
    /// Whether the reconnection policy may act on this error.
    ///
    /// Only transport-level failures qualify. Protocol, application, and
    /// HITL errors are terminal for the affected operation.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Transport(msg) => write!(f, "transport: {msg}"),
            Self::Protocol { status, detail } => write!(f, "protocol: HTTP {status}: {detail}"),
            Self::Decode(msg) => write!(f, "decode: {msg}"),
            Self::Application(msg) => write!(f, "application: {msg}"),
            Self::HitlViolation(msg) => write!(f, "hitl violation: {msg}"),
            Self::Cancelled => write!(f, "cancelled: stream was cancelled"),
            Self::ReconnectFailed { attempts } => {
                write!(f, "reconnect failed: gave up after {attempts} attempts")
            }
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::Protocol {
                status: status.as_u16(),
                detail: err.to_string(),
            },
            None => Self::Transport(err.to_string()),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
