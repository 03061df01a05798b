//! # GoNature Test Suite
//!
//! Unified test crate for properties that span crates.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── fixtures.rs     # seeded stores, servers and connected stations
//!     ├── correlation.rs  # transport: replies reach their own caller
//!     ├── capacity.rs     # guards: bounds and FIFO ranks under contention
//!     └── end_to_end.rs   # station flows over TCP
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p gn-tests
//!
//! # By area
//! cargo test -p gn-tests integration::correlation::
//! cargo test -p gn-tests integration::capacity::
//!
//! # Benchmarks
//! cargo bench -p gn-tests
//! ```

#![allow(dead_code)]

pub mod integration;
