//! Serial port transport implementation
//!
//! Provides the low-level serial connection to the printer board via
//! USB or RS-232. The port is opened with a short internal timeout and
//! lines are accumulated against the caller's deadline, so every read
//! has an explicit upper bound.

use crate::transport::{ConnectionParams, Transport};
use printbridge_core::{DriverError, Result};
use std::io::{Read, Write};
use std::time::{Duration, Instant};

/// Internal poll granularity for the blocking byte reads
const POLL_TIMEOUT: Duration = Duration::from_millis(50);

/// Real serial transport backed by the `serialport` crate
pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
    /// Bytes read past the last returned line terminator
    pending: Vec<u8>,
}

impl SerialTransport {
    /// Open a serial port with the given parameters
    ///
    /// Failure is `DeviceUnavailable` and is fatal to driver startup;
    /// the initial connection is never retried.
    pub fn open(params: &ConnectionParams) -> Result<Self> {
        let builder = serialport::new(&params.port, params.baud_rate)
            .timeout(POLL_TIMEOUT)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None);

        match builder.open() {
            Ok(port) => Ok(Self {
                port,
                pending: Vec::new(),
            }),
            Err(e) => {
                tracing::warn!("Failed to open serial port {}: {}", params.port, e);
                Err(DriverError::DeviceUnavailable {
                    port: params.port.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Take one complete line out of the pending buffer, if present
    fn take_pending_line(&mut self) -> Option<String> {
        let pos = self.pending.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.pending.drain(..=pos).collect();
        Some(
            String::from_utf8_lossy(&line)
                .trim_end_matches(['\r', '\n'])
                .to_string(),
        )
    }
}

impl Transport for SerialTransport {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> Result<String> {
        let deadline = Instant::now() + timeout;
        let mut buf = [0u8; 256];

        loop {
            if let Some(line) = self.take_pending_line() {
                return Ok(line);
            }

            if Instant::now() >= deadline {
                return Err(DriverError::DeviceUnresponsive {
                    timeout_ms: timeout.as_millis() as u64,
                });
            }

            match self.port.read(&mut buf) {
                Ok(0) => {}
                Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                // Internal poll tick elapsed without data
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn clear_input(&mut self) -> Result<()> {
        self.pending.clear();
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(|e| DriverError::Io(std::io::Error::other(e)))
    }
}
