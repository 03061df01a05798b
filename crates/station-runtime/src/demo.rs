//! Seeded in-memory store for `station-runtime serve`.

use gn_01_query_protocol::Value;
use gn_04_capacity::{columns, ParkSettings, UserRole, LOGGED_IN_COLUMN, PARK_TABLE};
use gn_05_reference_server::{QueryEngine, StoreError, TableStore};
use std::sync::Arc;

pub const DEMO_PARK: &str = "Acadia";

fn demo_park() -> ParkSettings {
    ParkSettings {
        park_id: 1,
        name: DEMO_PARK.to_string(),
        maximum_visitors: 100,
        maximum_orders: 80,
        time_limit_hours: 4,
        current_capacity: 0,
    }
}

/// One park, its booking tables, and an empty table per user role.
pub fn seed_demo(store: &TableStore) -> Result<(), StoreError> {
    let park = demo_park();
    for table in [
        PARK_TABLE.to_string(),
        park.active_table(),
        park.waiting_table(),
    ] {
        store.create_table(table);
    }
    store.seed(
        PARK_TABLE,
        [
            (columns::PARK_ID, Value::from(park.park_id)),
            (columns::PARK_NAME, Value::from(park.name.as_str())),
            (columns::MAXIMUM_VISITORS, Value::from(park.maximum_visitors)),
            (columns::MAXIMUM_ORDERS, Value::from(park.maximum_orders)),
            (columns::TIME_LIMIT, Value::from(park.time_limit_hours)),
            (columns::CURRENT_CAPACITY, Value::from(park.current_capacity)),
        ],
    )?;

    for role in [
        UserRole::Visitor,
        UserRole::GroupGuide,
        UserRole::Employee,
        UserRole::ParkManager,
        UserRole::DepartmentManager,
    ] {
        store.create_table(role.resource_table());
    }
    store.seed(
        UserRole::Employee.resource_table(),
        [
            (UserRole::Employee.id_column(), Value::from("e-1")),
            (LOGGED_IN_COLUMN, Value::from(false)),
        ],
    )
}

/// Engine over a freshly seeded store.
pub fn demo_engine() -> Result<Arc<QueryEngine>, StoreError> {
    let store = Arc::new(TableStore::new());
    seed_demo(&store)?;
    Ok(Arc::new(QueryEngine::new(store)))
}
