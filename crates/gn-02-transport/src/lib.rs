//! # Station Transport
//!
//! One shared connection per station, many concurrent callers. Each caller
//! gets a blocking-style `execute` that returns its own reply, correlated by
//! id, regardless of the order the server answers in.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                           Transport                            │
//! │                                                                │
//! │  execute ──→ PendingRequestRegistry ──→ MessageSink ──→ server │
//! │     ↑              (DashMap)                                   │
//! │     └──── oneshot ←── reader loop ←── MessageSource ←── server │
//! │                           │                                    │
//! │                           └──→ broadcast (notifications)       │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! | Property | Mechanism |
//! |----------|-----------|
//! | No cross-delivery | reply routed only by correlation id |
//! | Bounded wait | `tokio::time::timeout` on every call |
//! | No leaked entries | drop guard + periodic sweeper |
//! | Fail fast on loss | reader drains the registry on EOF / IO error |
//! | Clean teardown | `disconnect` drains with `Cancelled` |

#![warn(clippy::all)]
#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod config;
pub mod errors;
pub mod io;
pub mod ports;
pub mod registry;
pub mod transport;

pub use config::{is_valid_host, ConfigError, EndpointConfig, TransportConfig};
pub use errors::{ConnectError, TransportError};
pub use io::{FramedSink, FramedSource, MessageSink, MessageSource};
pub use ports::QueryExecutor;
pub use registry::{PendingRequestRegistry, TransportStats};
pub use transport::Transport;
