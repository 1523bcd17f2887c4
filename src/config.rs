//! Bridge configuration
//!
//! One JSON file with a section per subsystem. Every field has a
//! default, so a partial file (or none at all) yields a working
//! configuration for a local broker and the usual USB serial port.

use anyhow::Context;
use printbridge_communication::{ConnectionParams, DriverConfig};
use printbridge_telemetry::TelemetryConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Serial link and driver timing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrinterConfig {
    /// Serial device path
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Per-line reply read deadline in milliseconds
    pub read_timeout_ms: u64,
    /// Firmware settle time after the boot banner, milliseconds
    pub settle_delay_ms: u64,
    /// Farewell message display time before power-off, milliseconds
    pub drain_delay_ms: u64,
    /// Shutdown liveness poll cadence, milliseconds
    pub shutdown_poll_ms: u64,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 115_200,
            read_timeout_ms: 10_000,
            settle_delay_ms: 2_000,
            drain_delay_ms: 5_000,
            shutdown_poll_ms: 1_000,
        }
    }
}

impl PrinterConfig {
    pub fn connection_params(&self) -> ConnectionParams {
        ConnectionParams {
            port: self.port.clone(),
            baud_rate: self.baud_rate,
        }
    }

    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            drain_delay: Duration::from_millis(self.drain_delay_ms),
            poll_interval: Duration::from_millis(self.shutdown_poll_ms),
        }
    }
}

/// Top-level bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Serial link and driver settings
    pub printer: PrinterConfig,
    /// MQTT broker and topic settings
    pub mqtt: TelemetryConfig,
    /// Telemetry publish cadence in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            printer: PrinterConfig::default(),
            mqtt: TelemetryConfig::default(),
            poll_interval_ms: 500,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a JSON file
    ///
    /// A missing file yields the defaults; an unreadable or invalid
    /// file is an error (a half-applied configuration is worse than
    /// none).
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let config = BridgeConfig::load(Path::new("/nonexistent/printbridge.json")).unwrap();
        assert_eq!(config.printer.baud_rate, 115_200);
        assert_eq!(config.poll_interval_ms, 500);
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"printer": {{"port": "/dev/ttyACM0"}}, "poll_interval_ms": 1000}}"#
        )
        .unwrap();

        let config = BridgeConfig::load(file.path()).unwrap();
        assert_eq!(config.printer.port, "/dev/ttyACM0");
        assert_eq!(config.printer.baud_rate, 115_200);
        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.mqtt.port, 1883);
    }

    #[test]
    fn invalid_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "baud_rate = fast").unwrap();
        assert!(BridgeConfig::load(file.path()).is_err());
    }

    #[test]
    fn driver_timings_convert_to_durations() {
        let printer = PrinterConfig::default();
        let driver = printer.driver_config();
        assert_eq!(driver.settle_delay, Duration::from_secs(2));
        assert_eq!(driver.drain_delay, Duration::from_secs(5));
        assert_eq!(driver.poll_interval, Duration::from_secs(1));
    }
}
