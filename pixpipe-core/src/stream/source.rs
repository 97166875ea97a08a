//! Producer-side frame encoding.
//!
//! [`FrameEncoder`] mirrors the viewer's controller: it keeps its own
//! copy of the reference frame so every delta it emits is computed
//! against exactly what the viewer will hold when applying it.

use bytes::Bytes;

use crate::error::Result;
use crate::session::SessionConfig;
use crate::stream::store::FrameStore;
use crate::stream::{block, delta};

pub struct FrameEncoder {
    session: SessionConfig,
    reference: FrameStore,
    scratch: Vec<u8>,
    frames: u64,
}

impl FrameEncoder {
    pub fn new(session: SessionConfig) -> Result<Self> {
        session.validate()?;
        Ok(Self {
            session,
            reference: FrameStore::new(session.width, session.height),
            scratch: Vec::with_capacity(session.decoded_len()),
            frames: 0,
        })
    }

    /// Produce the wire payload for `frame` (`W * H * 3` RGB bytes) and
    /// advance the reference.
    pub fn encode(&mut self, frame: &[u8]) -> Result<Bytes> {
        let decoded: &[u8] = if self.session.delta_enabled {
            delta::encode(self.reference.as_slice(), frame, &mut self.scratch)?;
            self.scratch.as_slice()
        } else {
            self.reference.replace_from(frame)?;
            frame
        };

        let payload = if self.session.compression_enabled {
            Bytes::from(block::compress(decoded))
        } else {
            Bytes::copy_from_slice(decoded)
        };

        if self.session.delta_enabled {
            self.reference.replace_from(frame)?;
        }
        self.frames += 1;
        Ok(payload)
    }

    /// Start over from a zeroed reference, as a new viewer session does.
    pub fn reset(&mut self) {
        self.reference.reset();
        self.frames = 0;
    }

    pub fn session(&self) -> &SessionConfig {
        &self.session
    }

    pub fn frames_encoded(&self) -> u64 {
        self.frames
    }

    pub fn reference(&self) -> &FrameStore {
        &self.reference
    }
}
