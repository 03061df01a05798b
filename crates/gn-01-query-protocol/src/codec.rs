//! Length-prefixed frame codec.
//!
//! ```text
//! ┌──────────────────┬────────────────────────────────┐
//! │ len: u32 (BE)    │ body: JSON QueryMessage (len)  │
//! └──────────────────┴────────────────────────────────┘
//! ```

use crate::errors::CodecError;
use crate::message::QueryMessage;
use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

/// Size of the length prefix in bytes.
pub const FRAME_HEADER_LEN: usize = 4;

/// Default upper bound for one frame body.
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Encode a message into a complete frame (prefix + body).
pub fn encode_frame(msg: &QueryMessage, max_frame_len: usize) -> Result<BytesMut, CodecError> {
    let body = serde_json::to_vec(msg)?;
    if body.len() > max_frame_len || body.len() > u32::MAX as usize {
        return Err(CodecError::FrameTooLarge {
            len: body.len(),
            max: max_frame_len,
        });
    }
    let mut frame = BytesMut::with_capacity(FRAME_HEADER_LEN + body.len());
    frame.put_u32(body.len() as u32);
    frame.put_slice(&body);
    Ok(frame)
}

/// Decode a frame body (without prefix).
pub fn decode_body(body: &[u8]) -> Result<QueryMessage, CodecError> {
    serde_json::from_slice(body).map_err(|e| {
        if e.is_data() {
            CodecError::Malformed(e.to_string())
        } else {
            CodecError::Json(e)
        }
    })
}

/// Write one framed message and flush.
pub async fn write_frame<W>(
    writer: &mut W,
    msg: &QueryMessage,
    max_frame_len: usize,
) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(msg, max_frame_len)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    trace!(bytes = frame.len(), kind = %msg.kind(), "Wrote frame");
    Ok(())
}

/// Read one framed message.
///
/// Returns `Ok(None)` on a clean end of stream at a frame boundary.
pub async fn read_frame<R>(
    reader: &mut R,
    max_frame_len: usize,
) -> Result<Option<QueryMessage>, CodecError>
where
    R: AsyncRead + Unpin,
{
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if len > max_frame_len {
        return Err(CodecError::FrameTooLarge {
            len,
            max: max_frame_len,
        });
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    trace!(bytes = len, "Read frame");
    decode_body(&body).map(Some)
}
