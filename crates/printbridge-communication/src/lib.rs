//! # printbridge Communication
//!
//! Serial transport and Marlin protocol driver for printbridge.
//! Turns the printer's line-oriented G-code request/reply protocol into
//! typed queries (position, temperatures, identity, activity) with
//! explicit startup and shutdown handshakes.

pub mod marlin;
pub mod status;
pub mod transport;

pub use marlin::{
    commands, response_parser::SdPrintState, DriverConfig, MarlinDriver, Reply,
};
pub use status::{SharedDriver, StatusAssembler};
pub use transport::{serial::SerialTransport, ConnectionParams, Transport};
