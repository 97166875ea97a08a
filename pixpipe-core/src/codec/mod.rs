//! Message framing for byte-stream transports.
//!
//! TCP has no message boundaries, so each message is sent as a
//! 4-byte little-endian length followed by the payload:
//!
//! ```text
//! length:  u32  (4)
//! payload: [u8] (length)
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::PipeError;
use crate::session::SessionConfig;

/// Size of the length prefix.
pub const LENGTH_PREFIX: usize = 4;

/// Message limit when no session is known (64 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// Length-prefixed message codec.
#[derive(Debug, Clone, Copy)]
pub struct StreamCodec {
    max_frame_size: usize,
}

impl StreamCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Limit messages to the largest payload `session` can produce.
    pub fn for_session(session: &SessionConfig) -> Self {
        Self::new(session.max_payload_len())
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for StreamCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl Decoder for StreamCodec {
    type Item = Bytes;
    type Error = PipeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LENGTH_PREFIX {
            return Ok(None);
        }

        let mut prefix = [0u8; LENGTH_PREFIX];
        prefix.copy_from_slice(&src[..LENGTH_PREFIX]);
        let len = u32::from_le_bytes(prefix) as usize;

        if len > self.max_frame_size {
            return Err(PipeError::FrameTooLarge {
                size: len,
                max: self.max_frame_size,
            });
        }

        let total = LENGTH_PREFIX + len;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX);
        Ok(Some(src.split_to(len).freeze()))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(message) => Ok(Some(message)),
            None if src.is_empty() => Ok(None),
            // Peer hung up mid-message; the partial payload is dropped.
            None => Err(PipeError::ChannelClosed),
        }
    }
}

impl Encoder<Bytes> for StreamCodec {
    type Error = PipeError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > self.max_frame_size || item.len() > u32::MAX as usize {
            return Err(PipeError::FrameTooLarge {
                size: item.len(),
                max: self.max_frame_size,
            });
        }
        dst.reserve(LENGTH_PREFIX + item.len());
        dst.put_u32_le(item.len() as u32);
        dst.extend_from_slice(&item);
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────
