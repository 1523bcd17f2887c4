//! Transport abstraction for the printer link
//!
//! The driver owns exactly one transport for the life of a connection.
//! The trait is deliberately small: the protocol is line-oriented and
//! strictly half-duplex, so three operations suffice.

pub mod serial;

use printbridge_core::Result;
use std::time::Duration;

/// Serial connection parameters, provided by configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    /// Device path (e.g. "/dev/ttyUSB0", "COM3")
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 115_200,
        }
    }
}

/// An opened, exclusively-owned, full-duplex byte stream to the printer
pub trait Transport: Send {
    /// Write all bytes to the device
    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;

    /// Block until a newline-terminated line arrives or `timeout`
    /// expires. Returns the line without its terminator. Expiry is a
    /// `DeviceUnresponsive` error.
    fn read_line(&mut self, timeout: Duration) -> Result<String>;

    /// Discard any bytes queued but not yet read. Issued before each
    /// command so stale data from a previous exchange cannot corrupt
    /// the next reply.
    fn clear_input(&mut self) -> Result<()>;
}
