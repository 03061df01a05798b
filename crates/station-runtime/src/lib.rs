//! # GoNature Station Runtime
//!
//! Wiring for the station binary.
//!
//! ## Startup Sequence
//!
//! 1. Initialize logging from the environment
//! 2. Load configuration (file, then `GN_*` overrides), validate
//! 3. Connect the shared transport
//! 4. Run one command through the capacity or session service
//! 5. Disconnect, cancelling anything still in flight

#![warn(clippy::all)]
#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod config;
pub mod demo;
pub mod station;
pub mod telemetry;

pub use config::{ConfigError, StationConfig, StationIdentity};
pub use station::Station;
pub use telemetry::{init_logging, LogConfig, LogInitError};
