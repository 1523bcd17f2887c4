//! Error handling for printbridge
//!
//! Provides the driver error taxonomy shared by all layers:
//! - Startup errors (device unavailable, handshake rejected)
//! - Command errors (allow-list violations)
//! - Reply errors (malformed or missing responses)
//! - Liveness errors (read deadline expired)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Protocol driver error type
///
/// Represents every failure mode of the printer protocol driver, from
/// opening the serial device through parsing individual replies.
#[derive(Error, Debug)]
pub enum DriverError {
    /// The serial device could not be opened. Fatal to startup; the
    /// driver never retries the initial connection.
    #[error("Printer unavailable on {port}: {reason}")]
    DeviceUnavailable {
        /// The device path that failed to open.
        port: String,
        /// The reason reported by the serial layer.
        reason: String,
    },

    /// The startup handshake reply did not match the acknowledgment
    /// token. Fatal to startup.
    #[error("Printer rejected startup handshake, replied {reply:?}")]
    StartupRejected {
        /// The reply line that was received instead of the token.
        reply: String,
    },

    /// A command outside the allow-list was passed to the generic
    /// command path. This is a programmer error, not a runtime fault.
    #[error("Command {code:?} is not in the allow-list")]
    InvalidCommand {
        /// The rejected command code.
        code: String,
    },

    /// A reply did not have the shape the parser expected.
    #[error("Malformed reply, expected {expected}: {reply:?}")]
    MalformedReply {
        /// What the parser was looking for (a label or marker).
        expected: String,
        /// The reply text that failed to parse.
        reply: String,
    },

    /// A query was issued while the driver was not in the `Ready`
    /// state. No bytes are written to the transport in this case.
    #[error("Printer driver is not ready")]
    NotReady,

    /// A transport read exceeded its deadline.
    #[error("Printer did not respond within {timeout_ms}ms")]
    DeviceUnresponsive {
        /// The deadline that expired, in milliseconds.
        timeout_ms: u64,
    },

    /// Transport-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DriverError {
    /// Check if this error is fatal to startup (no retry, surface upward)
    pub fn is_startup_failure(&self) -> bool {
        matches!(
            self,
            DriverError::DeviceUnavailable { .. } | DriverError::StartupRejected { .. }
        )
    }

    /// Check if this is a read-deadline expiry
    pub fn is_timeout(&self) -> bool {
        matches!(self, DriverError::DeviceUnresponsive { .. })
    }
}

/// Result type using DriverError
pub type Result<T> = std::result::Result<T, DriverError>;
