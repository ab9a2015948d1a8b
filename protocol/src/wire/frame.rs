//! Length-prefixed framing for [`ProtocolMessage`]s.
//!
//! ```text
//! magic (u32 BE) || length (u32 BE) || bincode(ProtocolMessage)
//! ```
//!
//! The length is checked against [`MAX_FRAME_BYTES`] before anything is
//! allocated.

use bytes::{BufMut, BytesMut};
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::ProtocolMessage;
use crate::config::{MAX_FRAME_BYTES, PROTOCOL_MAGIC, WIRE_PROTOCOL_VERSION};

#[derive(Debug, Error)]
pub enum WireError {
    #[error("bad frame magic 0x{0:08X}")]
    BadMagic(u32),

    #[error("frame of {size} bytes exceeds limit of {max}")]
    FrameTooLarge { size: usize, max: usize },

    #[error("connection closed mid-frame")]
    Truncated,

    #[error("unsupported wire version {0}")]
    UnsupportedVersion(u16),

    #[error("message encoding failed: {0}")]
    Encoding(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Encodes and writes one message, then flushes.
pub async fn write_frame<W>(writer: &mut W, message: &ProtocolMessage) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    let payload = bincode::serialize(message).map_err(|e| WireError::Encoding(e.to_string()))?;
    if payload.len() > MAX_FRAME_BYTES {
        return Err(WireError::FrameTooLarge {
            size: payload.len(),
            max: MAX_FRAME_BYTES,
        });
    }

    let mut buf = BytesMut::with_capacity(8 + payload.len());
    buf.put_u32(PROTOCOL_MAGIC);
    buf.put_u32(payload.len() as u32);
    buf.put_slice(&payload);

    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one message.
///
/// `Ok(None)` means the peer closed the connection cleanly between frames.
/// A close anywhere inside a frame is [`WireError::Truncated`].
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<ProtocolMessage>, WireError>
where
    R: AsyncRead + Unpin,
{
    let magic = match reader.read_u32().await {
        Ok(magic) => magic,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if magic != PROTOCOL_MAGIC {
        return Err(WireError::BadMagic(magic));
    }

    let len = reader.read_u32().await.map_err(eof_as_truncated)? as usize;
    if len > MAX_FRAME_BYTES {
        return Err(WireError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_BYTES,
        });
    }

    let mut payload = vec![0u8; len];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(eof_as_truncated)?;

    let message: ProtocolMessage =
        bincode::deserialize(&payload).map_err(|e| WireError::Encoding(e.to_string()))?;
    if message.version != WIRE_PROTOCOL_VERSION {
        return Err(WireError::UnsupportedVersion(message.version));
    }
    Ok(Some(message))
}

fn eof_as_truncated(e: io::Error) -> WireError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        WireError::Truncated
    } else {
        WireError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{NetworkType, StampKeypair};
    use crate::wire::{CorrelationId, MessageBody, ResponseCode};
    use std::io::Cursor;

    fn message() -> ProtocolMessage {
        ProtocolMessage::sign(
            MessageBody::BroadcastTransactionResponse {
                response_code: ResponseCode::Successful,
            },
            CorrelationId::new(),
            &StampKeypair::generate(),
            NetworkType::Devnet,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_write_read_roundtrip() {
        let msg = message();
        let mut buffer = Vec::new();
        write_frame(&mut buffer, &msg).await.unwrap();
        assert_eq!(&buffer[..4], &PROTOCOL_MAGIC.to_be_bytes());

        let mut cursor = Cursor::new(buffer);
        let read = read_frame(&mut cursor).await.unwrap();
        assert_eq!(read, Some(msg));
        assert!(read_frame(&mut cursor).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clean_eof_is_none() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        assert!(read_frame(&mut cursor).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bad_magic() {
        let mut cursor = Cursor::new(vec![0xDE, 0xAD, 0xBE, 0xEF, 0, 0, 0, 0]);
        assert!(matches!(
            read_frame(&mut cursor).await,
            Err(WireError::BadMagic(0xDEADBEEF))
        ));
    }

    #[tokio::test]
    async fn test_oversized_length_rejected_before_read() {
        let mut frame = PROTOCOL_MAGIC.to_be_bytes().to_vec();
        frame.extend_from_slice(&((MAX_FRAME_BYTES + 1) as u32).to_be_bytes());
        let mut cursor = Cursor::new(frame);
        assert!(matches!(
            read_frame(&mut cursor).await,
            Err(WireError::FrameTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_truncated_frame() {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, &message()).await.unwrap();
        buffer.truncate(buffer.len() - 3);
        let mut cursor = Cursor::new(buffer);
        assert!(matches!(
            read_frame(&mut cursor).await,
            Err(WireError::Truncated)
        ));
    }
}
