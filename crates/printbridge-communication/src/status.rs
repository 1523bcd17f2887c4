//! Status snapshot assembly
//!
//! Composes the driver's typed queries into the single record the
//! telemetry publisher ships. The driver sits behind one lock because
//! the protocol is half-duplex: exactly one caller at a time may hold
//! the command surface.

use crate::marlin::MarlinDriver;
use parking_lot::Mutex;
use printbridge_core::{DriverError, Result, StatusSnapshot};
use std::sync::Arc;

/// The single-owner lock serializing all access to the driver
pub type SharedDriver = Arc<Mutex<MarlinDriver>>;

/// Assembles position and temperatures into one snapshot
#[derive(Clone)]
pub struct StatusAssembler {
    driver: SharedDriver,
}

impl StatusAssembler {
    pub fn new(driver: SharedDriver) -> Self {
        Self { driver }
    }

    /// Assemble one fully-populated snapshot
    ///
    /// Fails with `NotReady` while the driver is not connected; callers
    /// are expected to log and skip the cycle. A `MalformedReply` from
    /// either sub-query propagates as-is; there is no partially-filled
    /// snapshot.
    pub fn snapshot(&self) -> Result<StatusSnapshot> {
        let mut driver = self.driver.lock();
        if !driver.is_ready() {
            return Err(DriverError::NotReady);
        }
        let position = driver.position()?;
        let temperatures = driver.temperatures()?;
        Ok(StatusSnapshot {
            position,
            temperatures,
        })
    }
}
