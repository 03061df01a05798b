//! Transport: a blocking `execute` over one shared, message-oriented connection.
//!
//! ```text
//!  caller A ─┐                                   ┌─→ oneshot A
//!  caller B ─┼─ execute ─→ registry.insert ─→ sink   │
//!  caller C ─┘                                   ├─→ oneshot B
//!                     source ─→ reader loop ─────┤
//!                                 (demux by id)  └─→ oneshot C
//! ```
//!
//! Each caller waits on its own completion channel, bounded by a timeout.
//! The reader loop is the only consumer of the inbound stream and never
//! awaits application logic.

use crate::config::{EndpointConfig, TransportConfig};
use crate::errors::{ConnectError, TransportError};
use crate::io::{FramedSink, FramedSource, MessageSink, MessageSource};
use crate::ports::QueryExecutor;
use crate::registry::{PendingRequestRegistry, TransportStats};
use async_trait::async_trait;
use gn_01_query_protocol::{
    ControlKind, CorrelationId, MessageKind, ProtocolMisuseError, QueryMessage,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

struct Inner {
    registry: PendingRequestRegistry,
    sink: Arc<dyn MessageSink>,
    config: TransportConfig,
    closed: AtomicBool,
    notifications: broadcast::Sender<QueryMessage>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Inner {
    fn dispatch(&self, msg: QueryMessage) {
        if msg.kind() == MessageKind::Notification {
            let receivers = self.notifications.send(msg).unwrap_or(0);
            debug!(receivers = receivers, "Delivered server notification");
            return;
        }
        self.registry.remove_and_complete(msg);
    }

    /// Close and fail everything still in flight. Idempotent.
    fn mark_lost(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let failed = self.registry.drain_with(|| TransportError::ConnectionLost);
        warn!(failed = failed, "Connection lost, failed pending requests");
    }
}

/// Removes the caller's entry if its `execute` future is dropped mid-wait.
struct InFlight<'a> {
    registry: &'a PendingRequestRegistry,
    id: CorrelationId,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.registry.abandon(&self.id);
    }
}

/// Client connection shared by all callers of one station.
///
/// Cheap to clone; clones share the connection.
#[derive(Clone)]
pub struct Transport {
    inner: Arc<Inner>,
}

impl Transport {
    /// Validate the endpoint and open a TCP connection.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn connect(
        endpoint: &EndpointConfig,
        config: TransportConfig,
    ) -> Result<Self, ConnectError> {
        endpoint.validate()?;
        let addr = endpoint.address();
        let stream = match tokio::time::timeout(
            config.connect_timeout,
            TcpStream::connect((endpoint.host.as_str(), endpoint.port)),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(ConnectError::Refused {
                    addr,
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(ConnectError::TimedOut {
                    addr,
                    timeout: config.connect_timeout,
                })
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Could not disable Nagle");
        }
        info!(addr = %addr, "Connected to reservation server");
        let (read_half, write_half) = stream.into_split();
        let sink = FramedSink::new(write_half, config.max_frame_len);
        let source = FramedSource::new(read_half, config.max_frame_len);
        Ok(Self::from_parts(Arc::new(sink), Box::new(source), config))
    }

    /// Run over any duplex byte stream.
    pub fn from_stream<S>(stream: S, config: TransportConfig) -> Self
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let sink = FramedSink::new(write_half, config.max_frame_len);
        let source = FramedSource::new(read_half, config.max_frame_len);
        Self::from_parts(Arc::new(sink), Box::new(source), config)
    }

    /// Assemble from an explicit sink and source; spawns the reader and sweeper.
    pub fn from_parts(
        sink: Arc<dyn MessageSink>,
        source: Box<dyn MessageSource>,
        config: TransportConfig,
    ) -> Self {
        let (notifications, _) = broadcast::channel(config.notification_buffer.max(1));
        let sweep_interval = config.sweep_interval;
        let inner = Arc::new(Inner {
            registry: PendingRequestRegistry::new(),
            sink,
            config,
            closed: AtomicBool::new(false),
            notifications,
            tasks: Mutex::new(Vec::new()),
        });

        let reader = tokio::spawn(reader_loop(inner.clone(), source));
        let sweeper = tokio::spawn(sweeper_loop(Arc::downgrade(&inner), sweep_interval));
        inner.tasks.lock().extend([reader, sweeper]);

        Self { inner }
    }

    /// Execute with the configured request timeout.
    pub async fn execute(&self, msg: QueryMessage) -> Result<QueryMessage, TransportError> {
        self.execute_with_timeout(msg, self.inner.config.request_timeout)
            .await
    }

    /// Send `msg` and wait for the reply with the same correlation id.
    ///
    /// The caller's own message is returned with the result merged in.
    pub async fn execute_with_timeout(
        &self,
        mut msg: QueryMessage,
        timeout: Duration,
    ) -> Result<QueryMessage, TransportError> {
        if !msg.kind().expects_response() {
            return Err(ProtocolMisuseError::NotExecutable(msg.kind().to_string()).into());
        }
        if let Some(previous) = msg.correlation_id() {
            return Err(ProtocolMisuseError::AlreadySent(previous.to_string()).into());
        }
        if self.is_closed() {
            return Err(TransportError::NotConnected);
        }

        let id = CorrelationId::new();
        msg.stamp(id);
        let rx = self.inner.registry.insert(id, msg.kind(), timeout)?;
        let _in_flight = InFlight {
            registry: &self.inner.registry,
            id,
        };

        // The reader may have drained the registry between the check above
        // and our insert; close that window.
        if self.is_closed() {
            self.inner
                .registry
                .remove_on_error(id, TransportError::ConnectionLost);
            return Err(TransportError::ConnectionLost);
        }

        if let Err(e) = self.inner.sink.send(&msg).await {
            self.inner.registry.remove_on_error(id, e.clone());
            error!(correlation_id = %id, error = %e, "Failed to send request");
            return Err(e);
        }
        debug!(
            correlation_id = %id,
            kind = %msg.kind(),
            table = msg.table().unwrap_or("-"),
            "Sent request"
        );

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(Ok(response))) => {
                msg.merge_response(response)?;
                Ok(msg)
            }
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(_)) => Err(TransportError::ConnectionLost),
            Err(_) => {
                self.inner.registry.expire(&id);
                warn!(correlation_id = %id, timeout_ms = timeout.as_millis(), "Request timed out");
                Err(TransportError::TimedOut(timeout))
            }
        }
    }

    /// Round-trip health check.
    pub async fn ping(&self) -> Result<Duration, TransportError> {
        let started = Instant::now();
        self.execute(QueryMessage::control(ControlKind::Ping)).await?;
        Ok(started.elapsed())
    }

    /// Send DISCONNECT, cancel everything in flight, and close. Idempotent.
    pub async fn disconnect(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let grace = self.inner.config.disconnect_grace;
        let mut goodbye = QueryMessage::control(ControlKind::Disconnect);
        goodbye.stamp(CorrelationId::new());

        match tokio::time::timeout(grace, self.inner.sink.send(&goodbye)).await {
            Ok(Ok(())) => debug!("Flushed DISCONNECT"),
            Ok(Err(e)) => warn!(error = %e, "Could not send DISCONNECT"),
            Err(_) => warn!(grace_ms = grace.as_millis(), "DISCONNECT not flushed within grace period"),
        }

        let cancelled = self.inner.registry.drain_with(|| TransportError::Cancelled);

        if let Ok(Err(e)) = tokio::time::timeout(grace, self.inner.sink.close()).await {
            debug!(error = %e, "Error closing outbound stream");
        }
        for task in self.inner.tasks.lock().drain(..) {
            task.abort();
        }
        info!(cancelled = cancelled, "Disconnected");
    }

    /// Subscribe to server-pushed notifications.
    pub fn notifications(&self) -> broadcast::Receiver<QueryMessage> {
        self.inner.notifications.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Callers currently blocked in `execute`.
    pub fn in_flight(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn stats(&self) -> TransportStats {
        self.inner.registry.stats()
    }

    pub fn config(&self) -> &TransportConfig {
        &self.inner.config
    }
}

#[async_trait]
impl QueryExecutor for Transport {
    async fn execute(&self, msg: QueryMessage) -> Result<QueryMessage, TransportError> {
        Transport::execute(self, msg).await
    }
}

async fn reader_loop(inner: Arc<Inner>, mut source: Box<dyn MessageSource>) {
    loop {
        match source.receive().await {
            Ok(Some(msg)) => inner.dispatch(msg),
            Ok(None) => {
                info!("Server closed the connection");
                break;
            }
            Err(e) if !e.is_fatal() => {
                warn!(error = %e, "Skipping undecodable frame");
            }
            Err(e) => {
                error!(error = %e, "Inbound stream failed");
                break;
            }
        }
    }
    inner.mark_lost();
}

async fn sweeper_loop(inner: std::sync::Weak<Inner>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let removed = inner.registry.remove_expired();
        if removed > 0 {
            debug!(removed = removed, "Swept expired pending requests");
        }
    }
}
