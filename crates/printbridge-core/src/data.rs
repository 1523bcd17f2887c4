//! Data model for printer telemetry
//!
//! Plain data structs parsed from the printer's fixed-format replies,
//! plus the connection state machine and the snapshot record handed to
//! the telemetry publisher.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection lifecycle states
///
/// `Closed` is both the initial and the terminal state. The driver
/// reaches `Ready` only after the boot banner and the identification
/// handshake have both been accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No transport held (initial and terminal)
    #[default]
    Closed,
    /// Transport open, handshake in progress
    Opening,
    /// Handshake accepted, queries allowed
    Ready,
    /// Graceful shutdown sequence running
    ShuttingDown,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Opening => write!(f, "opening"),
            Self::Ready => write!(f, "ready"),
            Self::ShuttingDown => write!(f, "shutting down"),
        }
    }
}

/// Tool head position parsed from a positional report
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// X axis position
    pub x: f64,
    /// Y axis position
    pub y: f64,
    /// Z axis position
    pub z: f64,
    /// Extruder position
    pub e: f64,
}

/// Hotend and bed temperatures parsed from a temperature report
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Temperatures {
    /// Measured hotend temperature
    pub hotend_actual: f64,
    /// Hotend setpoint
    pub hotend_target: f64,
    /// Measured bed temperature
    pub bed_actual: f64,
    /// Bed setpoint
    pub bed_target: f64,
}

/// Firmware identity parsed from the firmware-info report
///
/// Immutable for the life of a connection; the driver fetches it at
/// most once per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Firmware name (e.g. "Marlin 1.1.0")
    pub firmware_name: String,
    /// Protocol version
    pub protocol_version: String,
    /// Machine type (e.g. "Anet A8 Plus")
    pub machine_type: String,
    /// Unique device identifier as reported by the firmware
    pub uuid: String,
}

/// One fully-populated status record delivered to the telemetry sink
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Tool head position
    pub position: Position,
    /// Hotend and bed temperatures
    pub temperatures: Temperatures,
}
