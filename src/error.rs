//! Error types for the program relay.
//!
//! Every failure that can happen while talking to a device is a
//! [`RelayError`]. The gateway never lets one escape to the HTTP layer: it
//! renders the `Display` text into the `status` field of the payload.

use thiserror::Error;

/// Errors produced while loading configuration or fetching a program.
#[derive(Error, Debug)]
pub enum RelayError {
    /// The device could not be reached (refused, unreachable, DNS failure).
    #[error("connection to {target} failed: {source}")]
    Connect {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// A connect or read deadline elapsed before the device answered.
    #[error("{stage} timed out after {secs}s")]
    Timeout { stage: &'static str, secs: f64 },

    /// Socket I/O failed after the connection was established.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The device answered, but not with something we accept.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The (port, address) pair cannot name a device.
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    Config(String),
}

impl RelayError {
    /// Stable lowercase label used as a structured log field.
    pub fn category(&self) -> &'static str {
        match self {
            RelayError::Connect { .. } => "connect",
            RelayError::Timeout { .. } => "timeout",
            RelayError::Io(_) => "io",
            RelayError::Protocol(_) => "protocol",
            RelayError::InvalidTarget(_) => "invalid_target",
            RelayError::Config(_) => "config",
        }
    }

    /// Whether retrying the same request later could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RelayError::Connect { .. } | RelayError::Timeout { .. } | RelayError::Io(_)
        )
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RelayError>;
