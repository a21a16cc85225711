/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Teleport operation result
pub type TeleportResult<T> = Result<T, TeleportError>;

/// Socket setup stage that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupStage {
    Socket,
    Bind,
    Listen,
    LocalAddr,
    Spawn,
}

impl std::fmt::Display for SetupStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SetupStage::Socket => "socket",
            SetupStage::Bind => "bind",
            SetupStage::Listen => "listen",
            SetupStage::LocalAddr => "getsockname",
            SetupStage::Spawn => "spawn",
        };
        f.write_str(name)
    }
}

/// Unified teleport error type with miette diagnostics
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Diagnostic)]
#[serde(rename_all = "snake_case", tag = "error", content = "details")]
pub enum TeleportError {
    /// Socket setup failed; the endpoint stays non-functional
    #[error("Endpoint setup failed at {stage}: {reason}")]
    #[diagnostic(
        code(teleport::setup),
        help("The endpoint will not carry tokens. Check local socket limits and the bind address.")
    )]
    Setup { stage: SetupStage, reason: String },

    /// Remote host is not a dotted IPv4 address
    #[error("Invalid remote host '{0}'")]
    #[diagnostic(
        code(teleport::invalid_host),
        help("Sender endpoints only accept dotted IPv4 addresses such as 127.0.0.1.")
    )]
    InvalidHost(String),

    /// Connection to the receiver could not be established
    #[error("Could not connect to {addr}: {reason}")]
    #[diagnostic(
        code(teleport::connect_failed),
        help("Senders do not retry. Verify the receiver is running and its port was passed along.")
    )]
    ConnectFailed { addr: String, reason: String },

    /// Receiver lost its client
    #[error("Client disconnected: {0}")]
    #[diagnostic(code(teleport::disconnected))]
    Disconnected(String),

    /// Sender failed to push a token onto the socket
    #[error("Write failed: {0}")]
    #[diagnostic(
        code(teleport::write_failed),
        help("The sender stops permanently after a write failure.")
    )]
    WriteFailed(String),

    /// Token sizes must be positive
    #[error("Invalid token size: {0}")]
    #[diagnostic(code(teleport::invalid_token_size), help("Token sizes must be at least one byte."))]
    InvalidTokenSize(usize),

    /// The rendezvous buffer was closed while waiting on it
    #[error("Token monitor closed")]
    #[diagnostic(code(teleport::monitor_closed))]
    MonitorClosed,
}

impl TeleportError {
    /// Map an I/O error raised during socket setup
    pub fn setup(stage: SetupStage, err: io::Error) -> Self {
        TeleportError::Setup {
            stage,
            reason: err.to_string(),
        }
    }

    /// Whether the error leaves the endpoint permanently unusable
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TeleportError::Disconnected(_))
    }
}
