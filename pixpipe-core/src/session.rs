//! Per-session parameters negotiated out of band.
//!
//! Dimensions and mode flags are fixed for the lifetime of a session.
//! Every buffer length used by the pipeline is derived from here, so
//! the decoder can size its output exactly before a byte arrives.

use serde::{Deserialize, Serialize};

use crate::error::{PipeError, Result};
use crate::flags::EncodingMode;
use crate::stream::block;

/// Bytes per pixel on the wire (interleaved RGB, no alpha).
pub const BYTES_PER_PIXEL: usize = 3;

/// Session configuration shared by both ends of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frames are deltas against the previous frame.
    pub delta_enabled: bool,
    /// Payloads are LZ4 block compressed.
    pub compression_enabled: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1200,
            delta_enabled: true,
            compression_enabled: true,
        }
    }
}

impl SessionConfig {
    /// A delta + LZ4 session of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn with_delta(mut self, enabled: bool) -> Self {
        self.delta_enabled = enabled;
        self
    }

    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compression_enabled = enabled;
        self
    }

    /// Check that the derived buffer lengths are non-zero and fit in
    /// `usize`. All length accessors assume this has passed.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PipeError::InvalidConfig(format!(
                "dimensions must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }

        let pixel_len = (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|n| n.checked_mul(BYTES_PER_PIXEL))
            .ok_or_else(|| {
                PipeError::InvalidConfig(format!(
                    "{}x{} frame overflows the address space",
                    self.width, self.height
                ))
            })?;

        // Worst-case LZ4 expansion must also be representable.
        pixel_len
            .checked_add(pixel_len.div_ceil(8))
            .and_then(|n| n.checked_add(n / 255 + 16))
            .ok_or_else(|| {
                PipeError::InvalidConfig(format!(
                    "{}x{} payload overflows the address space",
                    self.width, self.height
                ))
            })?;

        Ok(())
    }

    pub fn mode(&self) -> EncodingMode {
        EncodingMode::from_flags(self.delta_enabled, self.compression_enabled)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// `W * H * 3`: length of one RGB frame.
    pub fn pixel_len(&self) -> usize {
        self.width as usize * self.height as usize * BYTES_PER_PIXEL
    }

    /// `ceil(W * H * 3 / 8)`: length of the sign bitmap.
    pub fn sign_len(&self) -> usize {
        self.pixel_len().div_ceil(8)
    }

    /// Exact length the block decompressor must produce.
    ///
    /// The sign bitmap is only present in delta mode.
    pub fn decoded_len(&self) -> usize {
        if self.delta_enabled {
            self.pixel_len() + self.sign_len()
        } else {
            self.pixel_len()
        }
    }

    /// Upper bound on the size of one inbound message.
    ///
    /// This only caps memory. It is the same in every mode and stays
    /// above `decoded_len`, so a payload of the wrong length still
    /// reaches the decoder and fails there with `SizeMismatch`.
    pub fn max_payload_len(&self) -> usize {
        block::max_compressed_size(self.decoded_len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lengths_for_small_frame() {
        let cfg = SessionConfig::new(2, 1);
        assert_eq!(cfg.pixel_len(), 6);
        assert_eq!(cfg.sign_len(), 1);
        assert_eq!(cfg.decoded_len(), 7);
    }

    #[test]
    fn sign_len_rounds_up() {
        // 3 * 3 = 9 colour bytes → 2 bitmap bytes.
        let cfg = SessionConfig::new(3, 1);
        assert_eq!(cfg.pixel_len(), 9);
        assert_eq!(cfg.sign_len(), 2);
    }

    #[test]
    fn delta_disabled_drops_bitmap() {
        let cfg = SessionConfig::new(1920, 1200).with_delta(false);
        assert_eq!(cfg.decoded_len(), 1920 * 1200 * 3);
    }

    #[test]
    fn default_resolution_lengths() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.pixel_len(), 6_912_000);
        assert_eq!(cfg.sign_len(), 864_000);
        assert_eq!(cfg.decoded_len(), 7_776_000);
    }

    #[test]
    fn max_payload_covers_uncompressed() {
        let cfg = SessionConfig::new(64, 64);
        assert!(cfg.max_payload_len() > cfg.decoded_len());
        let raw = cfg.with_compression(false);
        assert!(raw.max_payload_len() > raw.decoded_len());
        assert_eq!(raw.max_payload_len(), cfg.max_payload_len());
    }

    #[test]
    fn zero_dimensions_rejected() {
        assert!(matches!(
            SessionConfig::new(0, 10).validate(),
            Err(PipeError::InvalidConfig(_))
        ));
        assert!(SessionConfig::new(10, 0).validate().is_err());
        assert!(SessionConfig::new(10, 10).validate().is_ok());
    }

    #[test]
    fn mode_follows_flags() {
        let cfg = SessionConfig::new(4, 4).with_delta(false);
        assert!(!cfg.mode().delta());
        assert!(cfg.mode().compression());
    }
}
