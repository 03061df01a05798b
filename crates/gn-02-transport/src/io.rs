//! Message IO seam: framed byte streams for production, channels for tests.

use crate::errors::TransportError;
use async_trait::async_trait;
use gn_01_query_protocol::{codec, CodecError, QueryMessage};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Mutex};

/// Outbound half. Shared by every caller on the connection.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Send one message. Frames from concurrent callers never interleave.
    async fn send(&self, msg: &QueryMessage) -> Result<(), TransportError>;

    /// Flush and shut down the outbound half.
    async fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Inbound half. Owned by the single reader loop.
#[async_trait]
pub trait MessageSource: Send {
    /// Next message, or `None` once the peer closed the stream.
    async fn receive(&mut self) -> Result<Option<QueryMessage>, CodecError>;
}

/// Length-prefixed frames over any async writer.
pub struct FramedSink<W> {
    writer: Mutex<W>,
    max_frame_len: usize,
}

impl<W> FramedSink<W> {
    pub fn new(writer: W, max_frame_len: usize) -> Self {
        Self {
            writer: Mutex::new(writer),
            max_frame_len,
        }
    }
}

#[async_trait]
impl<W> MessageSink for FramedSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&self, msg: &QueryMessage) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        codec::write_frame(&mut *writer, msg, self.max_frame_len)
            .await
            .map_err(TransportError::from)
    }

    async fn close(&self) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        writer
            .shutdown()
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }
}

/// Length-prefixed frames from any async reader.
pub struct FramedSource<R> {
    reader: BufReader<R>,
    max_frame_len: usize,
}

impl<R: AsyncRead + Unpin> FramedSource<R> {
    pub fn new(reader: R, max_frame_len: usize) -> Self {
        Self {
            reader: BufReader::new(reader),
            max_frame_len,
        }
    }
}

#[async_trait]
impl<R> MessageSource for FramedSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn receive(&mut self) -> Result<Option<QueryMessage>, CodecError> {
        codec::read_frame(&mut self.reader, self.max_frame_len).await
    }
}

/// In-memory channel transport for testing.
pub mod channel {
    use super::*;

    /// Clones each message onto the channel.
    pub struct ChannelSink(pub mpsc::Sender<QueryMessage>);

    pub struct ChannelSource(pub mpsc::Receiver<QueryMessage>);

    #[async_trait]
    impl MessageSink for ChannelSink {
        async fn send(&self, msg: &QueryMessage) -> Result<(), TransportError> {
            self.0
                .send(msg.clone())
                .await
                .map_err(|_| TransportError::ConnectionLost)
        }
    }

    #[async_trait]
    impl MessageSource for ChannelSource {
        async fn receive(&mut self) -> Result<Option<QueryMessage>, CodecError> {
            Ok(self.0.recv().await)
        }
    }

    /// The far side of an in-memory connection, played by a test server.
    pub struct ServerEnd {
        /// Requests sent by the client
        pub requests: mpsc::Receiver<QueryMessage>,
        /// Replies and notifications for the client; drop to simulate connection loss
        pub responses: mpsc::Sender<QueryMessage>,
    }

    /// Create a connected client/server pair.
    pub fn pair(buffer: usize) -> (ChannelSink, ChannelSource, ServerEnd) {
        let (req_tx, req_rx) = mpsc::channel(buffer);
        let (resp_tx, resp_rx) = mpsc::channel(buffer);
        (
            ChannelSink(req_tx),
            ChannelSource(resp_rx),
            ServerEnd {
                requests: req_rx,
                responses: resp_tx,
            },
        )
    }
}
