//! # printbridge Core
//!
//! Core types, errors, and cancellation primitives for printbridge.
//! Provides the data model shared between the protocol driver, the
//! status assembler, and the telemetry publisher.

pub mod cancel;
pub mod data;
pub mod error;

pub use cancel::CancelToken;
pub use data::{ConnectionState, Identity, Position, StatusSnapshot, Temperatures};
pub use error::{DriverError, Result};
