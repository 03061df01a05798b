//! TCP front end for the query engine.
//!
//! One task per connection reads frames; every request is handled on its own
//! task, so replies go back in completion order, not arrival order. A
//! per-connection writer task owns the socket's write half.

use crate::engine::QueryEngine;
use gn_01_query_protocol::{
    read_frame, write_frame, ControlKind, MessageKind, QueryMessage, DEFAULT_MAX_FRAME_LEN,
};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const REPLY_BUFFER: usize = 256;
const NOTIFICATION_BUFFER: usize = 64;

pub struct ReferenceServer {
    listener: TcpListener,
    engine: Arc<QueryEngine>,
    max_frame_len: usize,
}

/// Running server. Dropping the handle does not stop it; call [`ServerHandle::shutdown`].
pub struct ServerHandle {
    local_addr: SocketAddr,
    notifier: broadcast::Sender<QueryMessage>,
    shutdown: watch::Sender<bool>,
    sessions: Arc<AtomicUsize>,
    accept: JoinHandle<()>,
}

impl ReferenceServer {
    pub async fn bind(addr: &str, engine: Arc<QueryEngine>) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            engine,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        })
    }

    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Start accepting connections in the background.
    pub fn spawn(self) -> io::Result<ServerHandle> {
        let local_addr = self.listener.local_addr()?;
        let (notifier, _) = broadcast::channel(NOTIFICATION_BUFFER);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let sessions = Arc::new(AtomicUsize::new(0));

        let accept = tokio::spawn(accept_loop(
            self.listener,
            self.engine,
            self.max_frame_len,
            notifier.clone(),
            shutdown_rx,
            sessions.clone(),
        ));
        info!(addr = %local_addr, "Reference server listening");

        Ok(ServerHandle {
            local_addr,
            notifier,
            shutdown,
            sessions,
            accept,
        })
    }
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Push a notification to every connected session. Returns how many got it.
    pub fn notify(&self, notice: impl Into<String>) -> usize {
        self.notifier
            .send(QueryMessage::notification(notice))
            .unwrap_or(0)
    }

    /// Connections currently open.
    pub fn sessions(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }

    /// Stop accepting and close every connection.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.accept.await {
            error!(error = %e, "Accept loop ended abnormally");
        }
        info!("Reference server stopped");
    }
}

async fn accept_loop(
    listener: TcpListener,
    engine: Arc<QueryEngine>,
    max_frame_len: usize,
    notifier: broadcast::Sender<QueryMessage>,
    mut shutdown: watch::Receiver<bool>,
    sessions: Arc<AtomicUsize>,
) {
    loop {
        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            _ = shutdown.changed() => break,
        };
        match accepted {
            Ok((stream, peer)) => {
                let connection = Connection {
                    session: Uuid::new_v4().to_string(),
                    engine: engine.clone(),
                    max_frame_len,
                    sessions: sessions.clone(),
                };
                tokio::spawn(connection.serve(
                    stream,
                    peer,
                    notifier.subscribe(),
                    shutdown.clone(),
                ));
            }
            Err(e) => warn!(error = %e, "Accept failed"),
        }
    }
}

struct Connection {
    session: String,
    engine: Arc<QueryEngine>,
    max_frame_len: usize,
    sessions: Arc<AtomicUsize>,
}

impl Connection {
    async fn serve(
        self,
        stream: TcpStream,
        peer: SocketAddr,
        notifications: broadcast::Receiver<QueryMessage>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        self.sessions.fetch_add(1, Ordering::SeqCst);
        info!(session = %self.session, peer = %peer, "Station connected");
        let _ = stream.set_nodelay(true);
        let (read_half, write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let (reply_tx, reply_rx) = mpsc::channel(REPLY_BUFFER);

        let writer = tokio::spawn(write_loop(write_half, reply_rx, self.max_frame_len));
        let forwarder = tokio::spawn(forward_notifications(notifications, reply_tx.clone()));

        loop {
            let frame = tokio::select! {
                frame = read_frame(&mut reader, self.max_frame_len) => frame,
                _ = shutdown.changed() => break,
            };
            match frame {
                Ok(Some(msg)) if msg.kind() == MessageKind::ClientServer(ControlKind::Disconnect) => {
                    debug!(session = %self.session, "DISCONNECT received");
                    break;
                }
                Ok(Some(msg)) => {
                    let engine = self.engine.clone();
                    let session = self.session.clone();
                    let reply_tx = reply_tx.clone();
                    tokio::spawn(async move {
                        if let Some(reply) = engine.handle(msg, &session).await {
                            let _ = reply_tx.send(reply).await;
                        }
                    });
                }
                Ok(None) => break,
                Err(e) if !e.is_fatal() => {
                    warn!(session = %self.session, error = %e, "Dropping undecodable frame");
                }
                Err(e) => {
                    warn!(session = %self.session, error = %e, "Connection read failed");
                    break;
                }
            }
        }

        // In-flight handlers still hold reply senders; the writer drains them
        // and stops once the last one is dropped.
        forwarder.abort();
        drop(reply_tx);
        let _ = writer.await;
        self.sessions.fetch_sub(1, Ordering::SeqCst);
        info!(session = %self.session, "Station disconnected");
    }
}

async fn write_loop<W>(mut writer: W, mut replies: mpsc::Receiver<QueryMessage>, max_frame_len: usize)
where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(msg) = replies.recv().await {
        if let Err(e) = write_frame(&mut writer, &msg, max_frame_len).await {
            warn!(error = %e, "Write failed, closing connection");
            break;
        }
    }
    let _ = writer.shutdown().await;
}

async fn forward_notifications(
    mut notifications: broadcast::Receiver<QueryMessage>,
    replies: mpsc::Sender<QueryMessage>,
) {
    loop {
        match notifications.recv().await {
            Ok(notice) => {
                if replies.send(notice).await.is_err() {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped = skipped, "Session lagging behind notifications");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
