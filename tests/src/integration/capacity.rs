//! # Guard Properties Under Contention
//!
//! Several stations, each on its own TCP connection, race on the same park.
//! The store's guards must keep the capacity bound, FIFO ranks and the
//! occupancy counter exact.

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use gn_01_query_protocol::Value;
    use gn_04_capacity::{columns, Admission, BookingRequest, CapacityService, GateOutcome};
    use std::sync::Arc;

    async fn stations(
        server: &gn_05_reference_server::ServerHandle,
        n: usize,
    ) -> Vec<Arc<CapacityService>> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            let (_transport, service) = station(server).await;
            out.push(Arc::new(service));
        }
        out
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_admissions_never_exceed_bound() {
        let store = seeded_store();
        let server = start_server(store.clone()).await;
        let park = acadia();

        let mut handles = Vec::new();
        for (s, service) in stations(&server, 4).await.into_iter().enumerate() {
            for i in 0..10 {
                let service = service.clone();
                let park = park.clone();
                handles.push(tokio::spawn(async move {
                    let request = BookingRequest::new(format!("s{s}-b{i}"), noon(), 5);
                    service.admit(&park, &request).await.unwrap()
                }));
            }
        }
        let mut confirmed = 0;
        for handle in handles {
            if handle.await.unwrap() == Admission::Confirmed {
                confirmed += 1;
            }
        }

        assert_eq!(confirmed, 16);
        let booked: i64 = store
            .rows(ACTIVE)
            .unwrap()
            .iter()
            .filter_map(|r| r.get(columns::NUMBER_OF_VISITORS).and_then(Value::as_i64))
            .sum();
        assert_eq!(booked, 80);
        server.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_waitlist_priorities_are_a_permutation() {
        let store = seeded_store();
        let server = start_server(store.clone()).await;
        let park = acadia();

        let mut handles = Vec::new();
        for (s, service) in stations(&server, 3).await.into_iter().enumerate() {
            for i in 0..10 {
                let service = service.clone();
                let park = park.clone();
                handles.push(tokio::spawn(async move {
                    let request = BookingRequest::new(format!("s{s}-w{i}"), noon(), 5);
                    service.join_waitlist(&park, &request).await.unwrap()
                }));
            }
        }
        let mut priorities = Vec::new();
        for handle in handles {
            priorities.push(handle.await.unwrap());
        }
        priorities.sort_unstable();
        assert_eq!(priorities, (1..=30).collect::<Vec<i64>>());

        let mut stored: Vec<i64> = store
            .rows(WAITING)
            .unwrap()
            .iter()
            .filter_map(|r| r.get(columns::PRIORITY).and_then(Value::as_i64))
            .collect();
        stored.sort_unstable();
        assert_eq!(stored, priorities);
        server.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_occupancy_counter_is_exact() {
        let store = seeded_store();
        for i in 0..20 {
            book(&store, &format!("b-{i}"), noon(), 4);
        }
        let server = start_server(store.clone()).await;
        let park = acadia();
        let services = stations(&server, 4).await;

        let run = |exit: bool| {
            let handles: Vec<_> = (0..20)
                .map(|i| {
                    let service = services[i % services.len()].clone();
                    let park = park.clone();
                    tokio::spawn(async move {
                        let booking = format!("b-{i}");
                        if exit {
                            service.record_exit(&park, &booking).await.unwrap()
                        } else {
                            service.record_entry(&park, &booking).await.unwrap()
                        }
                    })
                })
                .collect();
            handles
        };

        for handle in run(false) {
            assert!(matches!(handle.await.unwrap(), GateOutcome::Processed { .. }));
        }
        assert_eq!(services[0].current_occupancy(&park).await.unwrap(), 80);

        for handle in run(true) {
            assert!(matches!(handle.await.unwrap(), GateOutcome::Processed { .. }));
        }
        assert_eq!(services[0].current_occupancy(&park).await.unwrap(), 0);
        server.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_each_booking_enters_once() {
        let store = seeded_store();
        for i in 0..5 {
            book(&store, &format!("b-{i}"), noon(), 7);
        }
        let server = start_server(store.clone()).await;
        let park = acadia();
        let services = stations(&server, 2).await;

        let mut handles = Vec::new();
        for i in 0..5 {
            for service in &services {
                let service = service.clone();
                let park = park.clone();
                handles.push(tokio::spawn(async move {
                    service.record_entry(&park, &format!("b-{i}")).await.unwrap()
                }));
            }
        }
        let mut processed = 0;
        for handle in handles {
            match handle.await.unwrap() {
                GateOutcome::Processed { .. } => processed += 1,
                GateOutcome::AlreadyBeingProcessed | GateOutcome::AlreadyProcessed => {}
                GateOutcome::NotFound => panic!("seeded booking not found"),
                GateOutcome::ParkFull { .. } => panic!("park cannot be full at 35 of 100"),
            }
        }

        assert_eq!(processed, 5);
        assert_eq!(services[0].current_occupancy(&park).await.unwrap(), 35);
        server.shutdown().await;
    }
}
