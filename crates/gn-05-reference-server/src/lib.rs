//! # Reference Server
//!
//! An in-memory reservation store that honors every part of the query
//! protocol, including guard tags. Stands in for the production database
//! server in tests and local demos.
//!
//! ## Architecture
//!
//! ```text
//! TCP ──→ Connection (reader) ──spawn per request──→ QueryEngine
//!              │                                       │  AdvisoryLocks (try)
//!              │                                       │  CriticalSections (wait)
//!              │                                       └→ TableStore (RwLock)
//!              └──← writer task ←── replies + notifications
//! ```
//!
//! Replies are written in completion order, so a client sharing one
//! connection among many callers sees them out of order.

#![warn(clippy::all)]
#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod engine;
pub mod errors;
pub mod local;
pub mod server;
pub mod store;

pub use engine::QueryEngine;
pub use errors::StoreError;
pub use local::InProcessExecutor;
pub use server::{ReferenceServer, ServerHandle};
pub use store::{Execution, Record, TableStore};
