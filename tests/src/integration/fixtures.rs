//! Shared setup: a seeded store, a TCP reference server, connected stations.

use chrono::{DateTime, TimeZone, Utc};
use gn_01_query_protocol::Value;
use gn_02_transport::{EndpointConfig, QueryExecutor, Transport, TransportConfig};
use gn_03_concurrency_guard::RetryPolicy;
use gn_04_capacity::{columns, CapacityService, ParkSettings, PARK_TABLE};
use gn_05_reference_server::{QueryEngine, ReferenceServer, ServerHandle, TableStore};
use std::sync::Arc;
use std::time::Duration;

pub const ACTIVE: &str = "acadia_active";
pub const WAITING: &str = "acadia_waiting";

pub fn acadia() -> ParkSettings {
    ParkSettings {
        park_id: 1,
        name: "Acadia".into(),
        maximum_visitors: 100,
        maximum_orders: 80,
        time_limit_hours: 4,
        current_capacity: 0,
    }
}

pub fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 7, 1, 12, 0, 0).unwrap()
}

pub fn seeded_store() -> Arc<TableStore> {
    let park = acadia();
    let store = Arc::new(TableStore::new());
    for table in [PARK_TABLE, ACTIVE, WAITING] {
        store.create_table(table);
    }
    store
        .seed(
            PARK_TABLE,
            [
                (columns::PARK_ID, Value::from(park.park_id)),
                (columns::PARK_NAME, Value::from(park.name.as_str())),
                (columns::MAXIMUM_VISITORS, Value::from(park.maximum_visitors)),
                (columns::MAXIMUM_ORDERS, Value::from(park.maximum_orders)),
                (columns::TIME_LIMIT, Value::from(park.time_limit_hours)),
                (columns::CURRENT_CAPACITY, Value::from(0)),
            ],
        )
        .unwrap();
    store
}

pub fn book(store: &TableStore, booking_id: &str, at: DateTime<Utc>, visitors: i64) {
    store
        .seed(
            ACTIVE,
            [
                (columns::BOOKING_ID, Value::from(booking_id)),
                (columns::VISIT_TIME, Value::from(at.timestamp())),
                (columns::NUMBER_OF_VISITORS, Value::from(visitors)),
                (columns::ENTRY_TIME, Value::Null),
                (columns::EXIT_TIME, Value::Null),
            ],
        )
        .unwrap();
}

pub fn wait(store: &TableStore, booking_id: &str, at: DateTime<Utc>, priority: i64) {
    store
        .seed(
            WAITING,
            [
                (columns::BOOKING_ID, Value::from(booking_id)),
                (columns::VISIT_TIME, Value::from(at.timestamp())),
                (columns::NUMBER_OF_VISITORS, Value::from(5)),
                (columns::PRIORITY, Value::from(priority)),
            ],
        )
        .unwrap();
}

pub async fn start_server(store: Arc<TableStore>) -> ServerHandle {
    ReferenceServer::bind("127.0.0.1:0", Arc::new(QueryEngine::new(store)))
        .await
        .unwrap()
        .spawn()
        .unwrap()
}

pub async fn connect(server: &ServerHandle) -> Transport {
    let endpoint = EndpointConfig::new("127.0.0.1", server.local_addr().port());
    let config = TransportConfig {
        request_timeout: Duration::from_secs(5),
        ..TransportConfig::default()
    };
    Transport::connect(&endpoint, config).await.unwrap()
}

/// Capacity service over its own connection, retrying eagerly.
pub async fn station(server: &ServerHandle) -> (Transport, CapacityService) {
    let transport = connect(server).await;
    let executor: Arc<dyn QueryExecutor> = Arc::new(transport.clone());
    let retry = RetryPolicy {
        max_attempts: 100,
        base_delay_ms: 1,
        max_delay_ms: 10,
    };
    (transport, CapacityService::new(executor, retry))
}
