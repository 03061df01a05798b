//! # Correlation Properties
//!
//! Many callers share one transport. The mock server answers in a shuffled
//! order; every caller must still receive the reply to its own request.

#[cfg(test)]
mod tests {
    use gn_01_query_protocol::{QueryMessage, QueryResult, Value};
    use gn_02_transport::io::channel::{self, ServerEnd};
    use gn_02_transport::{Transport, TransportConfig, TransportError};
    use rand::seq::SliceRandom;
    use std::sync::Arc;
    use std::time::Duration;

    // =========================================================================
    // FIXTURES
    // =========================================================================

    fn setup() -> (Transport, ServerEnd) {
        let (sink, source, server) = channel::pair(1024);
        let transport = Transport::from_parts(
            Arc::new(sink),
            Box::new(source),
            TransportConfig::default(),
        );
        (transport, server)
    }

    fn lookup(booking_id: &str) -> QueryMessage {
        QueryMessage::select("acadia_active")
            .column("numberOfVisitors")
            .unwrap()
            .where_eq("bookingId", booking_id)
            .unwrap()
            .build()
            .unwrap()
    }

    /// Echo the first where value back as the single result cell.
    fn echo(req: QueryMessage) -> QueryMessage {
        let key = req.filter().conditions()[0].value.clone();
        req.into_reply(QueryResult::rows(vec![vec![key]]))
    }

    async fn collect(server: &mut ServerEnd, n: usize) -> Vec<QueryMessage> {
        let mut requests = Vec::with_capacity(n);
        while requests.len() < n {
            requests.push(server.requests.recv().await.unwrap());
        }
        requests
    }

    // =========================================================================
    // PROPERTIES
    // =========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_shuffled_replies_reach_their_callers() {
        const CALLERS: usize = 200;
        let (transport, mut server) = setup();

        let callers: Vec<_> = (0..CALLERS)
            .map(|i| {
                let t = transport.clone();
                tokio::spawn(async move {
                    let key = format!("b-{i}");
                    let reply = t.execute(lookup(&key)).await.unwrap();
                    (key, reply)
                })
            })
            .collect();

        let mut requests = collect(&mut server, CALLERS).await;
        requests.shuffle(&mut rand::thread_rng());
        for req in requests {
            server.responses.send(echo(req)).await.unwrap();
        }

        for caller in callers {
            let (key, reply) = caller.await.unwrap();
            assert_eq!(reply.scalar(), Some(&Value::from(key.as_str())));
            assert_eq!(reply.filter().conditions()[0].value, Value::from(key.as_str()));
        }
        assert_eq!(transport.in_flight(), 0);
        let stats = transport.stats();
        assert_eq!(stats.completed, CALLERS as u64);
        assert_eq!(stats.unknown, 0);
    }

    #[tokio::test]
    async fn test_registry_tracks_blocked_callers() {
        let (transport, mut server) = setup();

        let callers: Vec<_> = (0..16)
            .map(|i| {
                let t = transport.clone();
                tokio::spawn(async move { t.execute(lookup(&format!("b-{i}"))).await })
            })
            .collect();
        let requests = collect(&mut server, 16).await;
        assert_eq!(transport.in_flight(), 16);

        for (answered, req) in requests.into_iter().enumerate() {
            server.responses.send(echo(req)).await.unwrap();
            while transport.in_flight() != 16 - answered - 1 {
                tokio::task::yield_now().await;
            }
        }
        for caller in callers {
            assert!(caller.await.unwrap().is_ok());
        }
    }

    #[tokio::test]
    async fn test_late_reply_is_dropped() {
        let (transport, mut server) = setup();

        let err = transport
            .execute_with_timeout(lookup("b-1"), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::TimedOut(_)));
        assert_eq!(transport.in_flight(), 0);

        let req = server.requests.recv().await.unwrap();
        server.responses.send(echo(req)).await.unwrap();
        while transport.stats().unknown == 0 {
            tokio::task::yield_now().await;
        }

        // The connection is still usable.
        let caller = {
            let t = transport.clone();
            tokio::spawn(async move { t.execute(lookup("b-2")).await })
        };
        let req = server.requests.recv().await.unwrap();
        server.responses.send(echo(req)).await.unwrap();
        let reply = caller.await.unwrap().unwrap();
        assert_eq!(reply.scalar(), Some(&Value::from("b-2")));
    }

    #[tokio::test]
    async fn test_disconnect_cancels_every_waiter() {
        let (transport, mut server) = setup();

        let callers: Vec<_> = (0..8)
            .map(|i| {
                let t = transport.clone();
                tokio::spawn(async move { t.execute(lookup(&format!("b-{i}"))).await })
            })
            .collect();
        collect(&mut server, 8).await;

        transport.disconnect().await;
        for caller in callers {
            assert_eq!(caller.await.unwrap().unwrap_err(), TransportError::Cancelled);
        }
        assert_eq!(transport.stats().cancelled, 8);
        assert_eq!(
            transport.execute(lookup("b-9")).await.unwrap_err(),
            TransportError::NotConnected
        );
    }

    #[tokio::test]
    async fn test_connection_loss_fails_waiters() {
        let (transport, mut server) = setup();

        let caller = {
            let t = transport.clone();
            tokio::spawn(async move { t.execute(lookup("b-1")).await })
        };
        collect(&mut server, 1).await;
        drop(server);

        assert_eq!(
            caller.await.unwrap().unwrap_err(),
            TransportError::ConnectionLost
        );
        assert_eq!(transport.in_flight(), 0);
    }
}
