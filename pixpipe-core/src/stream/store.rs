//! The retained reference frame.
//!
//! One RGB buffer per session, mutated in place by every decode cycle.

use crate::error::{PipeError, Result};
use crate::session::BYTES_PER_PIXEL;

/// Owns the session's reference frame.
///
/// Zero-filled on creation and on [`reset`](Self::reset), so the first
/// delta of a session is applied against a well-defined image.
#[derive(Debug, Clone)]
pub struct FrameStore {
    width: u32,
    height: u32,
    buffer: Vec<u8>,
}

impl FrameStore {
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize * BYTES_PER_PIXEL;
        Self {
            width,
            height,
            buffer: vec![0u8; len],
        }
    }

    /// Zero the buffer for a new session.
    pub fn reset(&mut self) {
        self.buffer.fill(0);
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Frame length in bytes (`W * H * 3`).
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    /// Overwrite the whole frame.
    pub fn replace_from(&mut self, frame: &[u8]) -> Result<()> {
        if frame.len() != self.buffer.len() {
            return Err(PipeError::SizeMismatch {
                expected: self.buffer.len(),
                actual: frame.len(),
            });
        }
        self.buffer.copy_from_slice(frame);
        Ok(())
    }

    /// RGB triple at `(x, y)`, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        let px = &self.buffer[offset..offset + BYTES_PER_PIXEL];
        Some([px[0], px[1], px[2]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_zeroed() {
        let store = FrameStore::new(4, 3);
        assert_eq!(store.len(), 36);
        assert!(store.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn reset_zeroes_in_place() {
        let mut store = FrameStore::new(2, 2);
        store.as_mut_slice().fill(0xAB);
        store.reset();
        assert!(store.as_slice().iter().all(|&b| b == 0));
        assert_eq!(store.len(), 12);
    }

    #[test]
    fn pixel_lookup_is_row_major() {
        let mut store = FrameStore::new(2, 2);
        let frame: Vec<u8> = (0..12).collect();
        store.replace_from(&frame).unwrap();
        assert_eq!(store.pixel(0, 0), Some([0, 1, 2]));
        assert_eq!(store.pixel(1, 0), Some([3, 4, 5]));
        assert_eq!(store.pixel(0, 1), Some([6, 7, 8]));
        assert_eq!(store.pixel(2, 0), None);
    }

    #[test]
    fn replace_checks_length() {
        let mut store = FrameStore::new(1, 1);
        assert!(matches!(
            store.replace_from(&[1, 2]),
            Err(PipeError::SizeMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }
}
