//! # Station Flows Over TCP
//!
//! A real `Transport` against the reference server, driving the capacity
//! and session services the way a park station does.

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use chrono::Duration as ChronoDuration;
    use gn_01_query_protocol::{MessageKind, QueryMessage, Value};
    use gn_02_transport::{QueryExecutor, TransportError};
    use gn_04_capacity::{
        columns, BookingRequest, BookingState, CancelOutcome, GateOutcome, SessionService,
        UserRole, LOGGED_IN_COLUMN,
    };
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_select_returns_the_callers_message() {
        let store = seeded_store();
        book(&store, "b-1", noon(), 12);
        let server = start_server(store).await;
        let transport = connect(&server).await;

        let request = QueryMessage::select(ACTIVE)
            .column(columns::NUMBER_OF_VISITORS)
            .unwrap()
            .build()
            .unwrap();
        let reply = transport.execute(request).await.unwrap();

        assert!(reply.correlation_id().is_some());
        assert_eq!(reply.table(), Some(ACTIVE));
        assert_eq!(reply.result_rows(), &[vec![Value::Int(12)]]);
        assert!(reply.success());

        transport.disconnect().await;
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_full_window_goes_to_back_of_waitlist() {
        let store = seeded_store();
        book(&store, "b-1", noon(), 75);
        wait(&store, "w-1", noon(), 1);
        wait(&store, "w-2", noon() + ChronoDuration::hours(1), 2);
        // Outside the window; does not count.
        wait(&store, "w-x", noon() + ChronoDuration::hours(9), 1);
        let server = start_server(store.clone()).await;
        let (transport, service) = station(&server).await;

        let park = service.park_settings("Acadia").await.unwrap();
        let before = service.waitlist_count(&park, noon()).await.unwrap();
        assert_eq!(before, 2);

        let attempt = service
            .request_booking(&park, BookingRequest::new("b-2", noon(), 10))
            .await
            .unwrap();
        assert_eq!(
            attempt.state(),
            &BookingState::Waitlisted {
                priority: before + 1
            }
        );
        assert_eq!(store.rows(ACTIVE).unwrap().len(), 1);

        transport.disconnect().await;
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_visit_lifecycle() {
        let store = seeded_store();
        let server = start_server(store.clone()).await;
        let (transport, service) = station(&server).await;
        let park = service.park_settings("Acadia").await.unwrap();

        let attempt = service
            .request_booking(&park, BookingRequest::new("b-1", noon(), 20))
            .await
            .unwrap();
        assert_eq!(attempt.state(), &BookingState::Confirmed);

        assert_eq!(
            service.record_entry(&park, "b-1").await.unwrap(),
            GateOutcome::Processed { occupancy: 20 }
        );
        // Entered bookings can no longer be cancelled.
        assert_eq!(
            service.cancel_booking(&park, "b-1").await.unwrap(),
            CancelOutcome::NotFound
        );
        assert_eq!(
            service.record_exit(&park, "b-1").await.unwrap(),
            GateOutcome::Processed { occupancy: 0 }
        );

        let row = &store.rows(ACTIVE).unwrap()[0];
        assert!(row.get(columns::ENTRY_TIME).and_then(Value::as_i64).is_some());
        assert!(row.get(columns::EXIT_TIME).and_then(Value::as_i64).is_some());

        transport.disconnect().await;
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_logout() {
        let store = seeded_store();
        store.create_table(UserRole::GroupGuide.resource_table());
        store
            .seed(
                UserRole::GroupGuide.resource_table(),
                [
                    (UserRole::GroupGuide.id_column(), Value::from("g-1")),
                    (LOGGED_IN_COLUMN, Value::from(true)),
                ],
            )
            .unwrap();
        let server = start_server(store.clone()).await;
        let transport = connect(&server).await;
        let executor: Arc<dyn QueryExecutor> = Arc::new(transport.clone());
        let sessions = SessionService::new(executor);

        assert!(sessions.logout(UserRole::GroupGuide, "g-1").await.unwrap());
        let rows = store.rows(UserRole::GroupGuide.resource_table()).unwrap();
        assert_eq!(rows[0].get(LOGGED_IN_COLUMN), Some(&Value::Bool(false)));

        transport.disconnect().await;
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_notifications_reach_every_station() {
        let server = start_server(seeded_store()).await;
        let first = connect(&server).await;
        let second = connect(&server).await;
        let mut first_rx = first.notifications();
        let mut second_rx = second.notifications();
        first.ping().await.unwrap();
        second.ping().await.unwrap();
        while server.sessions() < 2 {
            tokio::task::yield_now().await;
        }

        assert_eq!(server.notify("Acadia closes at 16:00"), 2);
        for rx in [&mut first_rx, &mut second_rx] {
            let notice = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(notice.kind(), MessageKind::Notification);
            assert_eq!(notice.notice(), Some("Acadia closes at 16:00"));
        }

        first.disconnect().await;
        second.disconnect().await;
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_disconnect_ends_the_session() {
        let server = start_server(seeded_store()).await;
        let transport = connect(&server).await;
        transport.ping().await.unwrap();
        assert_eq!(server.sessions(), 1);

        transport.disconnect().await;
        tokio::time::timeout(Duration::from_secs(2), async {
            while server.sessions() != 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let err = transport
            .execute(QueryMessage::select(ACTIVE).build().unwrap())
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::NotConnected);
        server.shutdown().await;
    }
}
