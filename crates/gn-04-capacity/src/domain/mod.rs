//! Domain model: parks, booking requests and their lifecycle.

pub mod booking;
pub mod park;

pub use booking::{BookingAttempt, BookingState};
pub use park::{columns, Availability, BookingRequest, ParkSettings, PARK_TABLE};
