//! Marlin protocol driver
//!
//! Owns the transport for the life of a connection and turns the
//! line-oriented request/reply protocol into typed queries. The
//! protocol is strictly synchronous: one command in flight, replies
//! framed by the `ok` acknowledgment token, possibly preceded by
//! informational lines belonging to the same reply.

use crate::marlin::commands;
use crate::marlin::response_parser::{self, SdPrintState};
use crate::transport::{serial::SerialTransport, ConnectionParams, Transport};
use printbridge_core::{
    CancelToken, ConnectionState, DriverError, Identity, Position, Result, Temperatures,
};
use std::fmt;
use std::time::{Duration, Instant};

/// Fail-safe policy for ambiguous M27 replies: an unrecognizable print
/// status counts as an active job. A false "still printing" only delays
/// shutdown; a false "idle" could cut power mid-print.
pub const UNKNOWN_TREATED_AS_ACTIVE: bool = true;

/// Granularity at which cancellable waits re-check their token
const CANCEL_TICK: Duration = Duration::from_millis(20);

/// Timing and deadline settings for the driver
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Deadline for each transport line read
    pub read_timeout: Duration,
    /// Firmware settle time after the boot banner. The board's serial
    /// stack resets on connect and drops writes issued too early.
    pub settle_delay: Duration,
    /// Time for the farewell message to display before power-off
    pub drain_delay: Duration,
    /// Cadence of the shutdown liveness poll
    pub poll_interval: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(10),
            settle_delay: Duration::from_secs(2),
            drain_delay: Duration::from_secs(5),
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// The accumulated reply text of one command, up to and including the
/// acknowledgment line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    text: String,
}

impl Reply {
    /// The reply text, lines joined with `\n`
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Protocol driver for Marlin-family firmware
///
/// Exclusive owner of the transport. The state machine is `Closed →
/// Opening → Ready` on startup and `Ready → ShuttingDown → Closed` on
/// shutdown; queries are rejected with `NotReady` outside `Ready`.
pub struct MarlinDriver {
    transport: Option<Box<dyn Transport>>,
    state: ConnectionState,
    /// Identity is immutable per connection; fetched at most once
    identity: Option<Identity>,
    config: DriverConfig,
}

impl MarlinDriver {
    pub fn new(config: DriverConfig) -> Self {
        Self {
            transport: None,
            state: ConnectionState::Closed,
            identity: None,
            config,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the startup handshake has been accepted
    pub fn is_ready(&self) -> bool {
        self.state == ConnectionState::Ready
    }

    /// Open the serial port and run the startup handshake
    ///
    /// A failed open is `DeviceUnavailable` and is never retried; a
    /// handshake mismatch is `StartupRejected`. Either way the driver
    /// ends `Closed` with the transport released.
    pub fn connect(&mut self, params: &ConnectionParams) -> Result<()> {
        let transport = SerialTransport::open(params)?;
        self.connect_with_transport(Box::new(transport))
    }

    /// Run the startup handshake over an already-opened transport
    ///
    /// Test seam: lets a scripted transport stand in for the serial
    /// port.
    pub fn connect_with_transport(&mut self, transport: Box<dyn Transport>) -> Result<()> {
        self.state = ConnectionState::Opening;
        self.identity = None;
        self.transport = Some(transport);

        match self.handshake() {
            Ok(()) => {
                self.state = ConnectionState::Ready;
                tracing::info!("Printer ready");
                Ok(())
            }
            Err(e) => {
                self.transport = None;
                self.state = ConnectionState::Closed;
                Err(e)
            }
        }
    }

    fn handshake(&mut self) -> Result<()> {
        let timeout = self.config.read_timeout;
        let settle = self.config.settle_delay;
        let transport = self.transport.as_mut().ok_or(DriverError::NotReady)?;

        // The board prints its boot banner once after reset, ending
        // with the acknowledgment token. Discard all of it.
        loop {
            let line = transport.read_line(timeout)?;
            tracing::debug!(line = %line, "boot banner");
            if line.trim() == commands::ACK_TOKEN {
                break;
            }
        }

        std::thread::sleep(settle);
        transport.clear_input()?;

        let hello = commands::display_message("printbridge online");
        transport.write_all(format!("{}\n", hello).as_bytes())?;
        let reply = transport.read_line(timeout)?;
        if reply.trim() != commands::ACK_TOKEN {
            return Err(DriverError::StartupRejected { reply });
        }
        Ok(())
    }

    /// Execute one allow-listed command and return its framed reply
    ///
    /// Clears the inbound buffer first so stale bytes from a previous
    /// exchange cannot corrupt this reply, then reads lines until one
    /// carries the acknowledgment token.
    pub fn send_command(&mut self, code: &str) -> Result<Reply> {
        if !commands::is_allowed(code) {
            return Err(DriverError::InvalidCommand {
                code: code.to_string(),
            });
        }
        if self.state != ConnectionState::Ready {
            return Err(DriverError::NotReady);
        }
        self.exchange(code.trim())
    }

    fn exchange(&mut self, code: &str) -> Result<Reply> {
        let timeout = self.config.read_timeout;
        let transport = self.transport.as_mut().ok_or(DriverError::NotReady)?;

        transport.clear_input()?;
        transport.write_all(format!("{}\n", code).as_bytes())?;

        let mut text = String::new();
        loop {
            let line = transport.read_line(timeout)?;
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(&line);
            if commands::is_ack_line(&line) {
                return Ok(Reply { text });
            }
        }
    }

    /// Write an administrative command and wait for one reply line,
    /// ignoring its content
    fn send_administrative(&mut self, code: &str) -> Result<()> {
        let timeout = self.config.read_timeout;
        let transport = self.transport.as_mut().ok_or(DriverError::NotReady)?;
        transport.clear_input()?;
        transport.write_all(format!("{}\n", code).as_bytes())?;
        transport.read_line(timeout)?;
        Ok(())
    }

    /// Query the current tool head position (M114)
    pub fn position(&mut self) -> Result<Position> {
        let reply = self.send_command(commands::REPORT_POSITION)?;
        response_parser::parse_position(reply.as_str())
    }

    /// Query hotend and bed temperatures (M105)
    pub fn temperatures(&mut self) -> Result<Temperatures> {
        let reply = self.send_command(commands::REPORT_TEMPERATURES)?;
        response_parser::parse_temperatures(reply.as_str())
    }

    /// Query the firmware identity (M115), cached per connection
    pub fn identity(&mut self) -> Result<Identity> {
        if let Some(identity) = &self.identity {
            return Ok(identity.clone());
        }
        let reply = self.send_command(commands::FIRMWARE_INFO)?;
        let identity = response_parser::parse_identity(reply.as_str())?;
        self.identity = Some(identity.clone());
        Ok(identity)
    }

    /// Whether a storage-card print job is in progress (M27)
    ///
    /// Derived fresh on every call. Also answerable while shutting
    /// down, since the shutdown sequence gates on it. An
    /// unrecognizable reply resolves to the fail-safe
    /// [`UNKNOWN_TREATED_AS_ACTIVE`].
    pub fn is_active(&mut self) -> Result<bool> {
        if !matches!(
            self.state,
            ConnectionState::Ready | ConnectionState::ShuttingDown
        ) {
            return Err(DriverError::NotReady);
        }
        let reply = self.exchange(commands::SD_PRINT_STATUS)?;
        Ok(match response_parser::parse_sd_state(reply.as_str()) {
            SdPrintState::Idle => false,
            SdPrintState::Printing => true,
            SdPrintState::Unknown => {
                tracing::warn!(
                    reply = reply.as_str(),
                    "Unexpected print status reply, treating as active"
                );
                UNKNOWN_TREATED_AS_ACTIVE
            }
        })
    }

    /// Gracefully shut the printer down and release the transport
    ///
    /// No-op when no connection is open. Waits for the printer to go
    /// idle, shows a farewell message, powers the board off, then
    /// drops the transport (which resets the board, an accepted side
    /// effect of closing the port).
    ///
    /// The idle wait is unbounded while a print job runs; cancelling
    /// the token abandons it and releases the port without further
    /// protocol traffic. A transport failure during the wait does the
    /// same, since a device that stopped answering cannot be protected
    /// by holding the port open.
    pub fn shutdown(&mut self, cancel: &CancelToken) -> Result<()> {
        if self.transport.is_none() {
            return Ok(());
        }
        self.state = ConnectionState::ShuttingDown;
        tracing::info!("Waiting for the printer to go idle");

        loop {
            if cancel.is_cancelled() {
                tracing::warn!("Shutdown cancelled, releasing the port immediately");
                self.release();
                return Ok(());
            }
            match self.is_active() {
                Ok(false) => break,
                Ok(true) => {
                    sleep_cancellable(self.config.poll_interval, cancel);
                }
                Err(e) => {
                    tracing::warn!("Liveness check failed during shutdown ({}), releasing", e);
                    self.release();
                    return Ok(());
                }
            }
        }

        // Best-effort from here on: the point of no return is dropping
        // the port, and that works regardless of these replies.
        let farewell = commands::display_message("Shutting down");
        if let Err(e) = self.send_administrative(&farewell) {
            tracing::warn!("Farewell message failed: {}", e);
        }

        if sleep_cancellable(self.config.drain_delay, cancel) {
            if let Err(e) = self.send_administrative(commands::POWER_OFF) {
                tracing::warn!("Power-off command failed: {}", e);
            }
        } else {
            tracing::warn!("Shutdown cancelled during message drain, skipping power-off");
        }

        self.release();
        Ok(())
    }

    fn release(&mut self) {
        self.transport = None;
        self.identity = None;
        self.state = ConnectionState::Closed;
        tracing::info!("Serial port released");
    }
}

/// Sleep in short ticks so cancellation can interrupt the wait.
/// Returns false if the token was cancelled before the duration ended.
fn sleep_cancellable(duration: Duration, cancel: &CancelToken) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return true;
        }
        std::thread::sleep(remaining.min(CANCEL_TICK));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_firmware_timings() {
        let config = DriverConfig::default();
        assert_eq!(config.settle_delay, Duration::from_secs(2));
        assert_eq!(config.drain_delay, Duration::from_secs(5));
        assert_eq!(config.poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn new_driver_starts_closed() {
        let driver = MarlinDriver::new(DriverConfig::default());
        assert_eq!(driver.state(), ConnectionState::Closed);
        assert!(!driver.is_ready());
    }

    #[test]
    fn cancelled_sleep_returns_early() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let started = Instant::now();
        assert!(!sleep_cancellable(Duration::from_secs(5), &cancel));
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
