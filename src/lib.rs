//! # printbridge
//!
//! A serial-to-MQTT telemetry bridge for Marlin 3D printers (Anet A8
//! Plus and similar boards).
//!
//! ## Architecture
//!
//! printbridge is organized as a workspace with multiple crates:
//!
//! 1. **printbridge-core** - Error taxonomy, data model, cancellation
//! 2. **printbridge-communication** - Serial transport, Marlin protocol
//!    driver, status assembler
//! 3. **printbridge-telemetry** - MQTT snapshot publisher
//! 4. **printbridge** - Supervisor binary tying the above together
//!
//! ## Features
//!
//! - **Typed protocol driver**: position, temperatures, firmware
//!   identity, and SD print activity over plain G-code request/reply
//! - **Safe lifecycle**: explicit startup handshake, graceful shutdown
//!   that waits for a running print job, two-stage SIGINT handling
//! - **Fire-and-forget telemetry**: JSON snapshots on a fixed cadence;
//!   a bad cycle is skipped, never fatal

pub mod config;

pub use config::{BridgeConfig, PrinterConfig};
pub use printbridge_communication::{MarlinDriver, SharedDriver, StatusAssembler};
pub use printbridge_core::{CancelToken, DriverError, StatusSnapshot};
pub use printbridge_telemetry::{TelemetryConfig, TelemetryPublisher};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Console output with pretty formatting
/// - RUST_LOG environment variable support
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_line_number(true)
        .pretty();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    Ok(())
}
