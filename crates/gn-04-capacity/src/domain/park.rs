//! Park settings, booking requests and the store layout they live in.

use crate::errors::CapacityError;
use chrono::{DateTime, Duration, Utc};
use gn_01_query_protocol::{CompareOp, Condition, Predicate, Value};
use serde::Serialize;

/// Settings table, one row per park.
pub const PARK_TABLE: &str = "park";

/// Column names shared with the store.
pub mod columns {
    pub const PARK_ID: &str = "parkId";
    pub const PARK_NAME: &str = "parkName";
    pub const MAXIMUM_VISITORS: &str = "maximumVisitors";
    pub const MAXIMUM_ORDERS: &str = "maximumOrders";
    /// Hours either side of a visit that count as overlapping
    pub const TIME_LIMIT: &str = "timeLimit";
    pub const CURRENT_CAPACITY: &str = "currentCapacity";

    pub const BOOKING_ID: &str = "bookingId";
    pub const VISIT_TIME: &str = "visitTime";
    pub const NUMBER_OF_VISITORS: &str = "numberOfVisitors";
    pub const ENTRY_TIME: &str = "entryTime";
    pub const EXIT_TIME: &str = "exitTime";
    pub const PRIORITY: &str = "priority";
}

/// One row of the `park` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParkSettings {
    /// Also the critical-resource index of the park's capacity slot.
    pub park_id: u32,
    pub name: String,
    /// Physical occupancy cap.
    pub maximum_visitors: i64,
    /// Booked-visitor cap per overlapping window.
    pub maximum_orders: i64,
    /// Half-width of the overlap window, in hours.
    pub time_limit_hours: i64,
    pub current_capacity: i64,
}

impl ParkSettings {
    /// Column order of [`ParkSettings::from_row`].
    pub const COLUMNS: [&'static str; 6] = [
        columns::PARK_ID,
        columns::PARK_NAME,
        columns::MAXIMUM_VISITORS,
        columns::MAXIMUM_ORDERS,
        columns::TIME_LIMIT,
        columns::CURRENT_CAPACITY,
    ];

    pub fn from_row(row: &[Value]) -> Result<Self, CapacityError> {
        let int = |i: usize| {
            row.get(i).and_then(Value::as_i64).ok_or_else(|| {
                CapacityError::Malformed(format!("park column {} missing or not numeric", Self::COLUMNS[i]))
            })
        };
        let park_id = u32::try_from(int(0)?)
            .map_err(|_| CapacityError::Malformed("park id out of range".into()))?;
        let name = row
            .get(1)
            .and_then(Value::as_str)
            .ok_or_else(|| CapacityError::Malformed("park name missing".into()))?
            .to_string();
        Ok(Self {
            park_id,
            name,
            maximum_visitors: int(2)?,
            maximum_orders: int(3)?,
            time_limit_hours: int(4)?,
            current_capacity: int(5)?,
        })
    }

    /// Active bookings: `<park>_active`.
    pub fn active_table(&self) -> String {
        format!("{}_active", self.table_prefix())
    }

    /// Waiting list: `<park>_waiting`.
    pub fn waiting_table(&self) -> String {
        format!("{}_waiting", self.table_prefix())
    }

    fn table_prefix(&self) -> String {
        self.name.to_lowercase().replace(' ', "_")
    }

    /// Bookings whose visit time lies in `[t - timeLimit, t + timeLimit]`.
    pub fn overlap_window(&self, visit_time: DateTime<Utc>) -> Predicate {
        let half = Duration::hours(self.time_limit_hours);
        Predicate::new(Condition::new(
            columns::VISIT_TIME,
            CompareOp::Ge,
            (visit_time - half).timestamp(),
        ))
        .and(Condition::new(
            columns::VISIT_TIME,
            CompareOp::Le,
            (visit_time + half).timestamp(),
        ))
    }
}

/// A group asking to visit a park.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingRequest {
    pub booking_id: String,
    pub visit_time: DateTime<Utc>,
    pub visitors: i64,
}

impl BookingRequest {
    pub fn new(booking_id: impl Into<String>, visit_time: DateTime<Utc>, visitors: i64) -> Self {
        Self {
            booking_id: booking_id.into(),
            visit_time,
            visitors,
        }
    }
}

/// Result of the read-only availability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Availability {
    /// Visitors already booked in the overlap window.
    pub overlap: i64,
    /// `maximumOrders - overlap - requested`.
    pub margin: i64,
}

impl Availability {
    pub fn is_available(&self) -> bool {
        self.margin >= 0
    }
}
