//! Marlin protocol implementation
//!
//! Implements the request/reply protocol spoken by Marlin-family
//! firmware (Anet A8 Plus and similar boards): newline-terminated
//! commands, multi-line replies framed by the `ok` acknowledgment
//! token, and fixed-format telemetry report lines.

pub mod commands;
pub mod driver;
pub mod response_parser;

pub use driver::{DriverConfig, MarlinDriver, Reply, UNKNOWN_TREATED_AS_ACTIVE};
