//! Sign-bitmap delta reconstruction.
//!
//! A delta payload is `pixel_delta || sign_bits`. Each colour byte of
//! the frame has one delta byte and one sign bit (LSB-first within
//! each bitmap byte, same order as the frame bytes). A set bit means
//! the delta is subtracted from the reference, a clear bit means it
//! is added. Arithmetic wraps modulo 256.

use crate::error::{PipeError, Result};

/// Length of the sign bitmap covering `pixel_len` colour bytes.
pub fn sign_len(pixel_len: usize) -> usize {
    pixel_len.div_ceil(8)
}

/// Apply `decoded` to `reference` in place.
///
/// `decoded` must be exactly `reference.len() + sign_len(reference.len())`
/// bytes long. On error `reference` is left untouched.
pub fn reconstruct(reference: &mut [u8], decoded: &[u8]) -> Result<()> {
    let pixel_len = reference.len();
    let expected = pixel_len + sign_len(pixel_len);
    if decoded.len() != expected {
        return Err(PipeError::SizeMismatch {
            expected,
            actual: decoded.len(),
        });
    }

    let (pixel_delta, sign_bits) = decoded.split_at(pixel_len);

    // One bitmap byte covers eight consecutive colour bytes.
    for ((target, delta), &bits) in reference
        .chunks_mut(8)
        .zip(pixel_delta.chunks(8))
        .zip(sign_bits)
    {
        for (bit, (value, &d)) in target.iter_mut().zip(delta).enumerate() {
            if (bits >> bit) & 1 == 1 {
                *value = value.wrapping_sub(d);
            } else {
                *value = value.wrapping_add(d);
            }
        }
    }

    Ok(())
}

/// Replace `reference` wholesale with a raw frame (delta disabled).
pub fn replace(reference: &mut [u8], frame: &[u8]) -> Result<()> {
    if frame.len() != reference.len() {
        return Err(PipeError::SizeMismatch {
            expected: reference.len(),
            actual: frame.len(),
        });
    }
    reference.copy_from_slice(frame);
    Ok(())
}

// ── Encoding ─────────────────────────────────────────────────────

/// Encode `target` against `reference` using a caller-chosen bitmap.
///
/// Writes `pixel_delta || signs` into `out` (cleared first).
pub fn encode_with_signs(
    reference: &[u8],
    target: &[u8],
    signs: &[u8],
    out: &mut Vec<u8>,
) -> Result<()> {
    check_frame_lengths(reference, target)?;
    let bitmap_len = sign_len(reference.len());
    if signs.len() != bitmap_len {
        return Err(PipeError::SizeMismatch {
            expected: bitmap_len,
            actual: signs.len(),
        });
    }

    out.clear();
    out.reserve(reference.len() + bitmap_len);
    for (i, (&r, &t)) in reference.iter().zip(target).enumerate() {
        let subtract = (signs[i / 8] >> (i % 8)) & 1 == 1;
        out.push(if subtract {
            r.wrapping_sub(t)
        } else {
            t.wrapping_sub(r)
        });
    }
    out.extend_from_slice(signs);
    Ok(())
}

/// Encode `target` against `reference`, picking for every byte the
/// sign that gives the smaller delta magnitude.
///
/// Small magnitudes keep unchanged and slowly varying regions
/// dominated by zero bytes, which is what the block compressor feeds
/// on.
pub fn encode(reference: &[u8], target: &[u8], out: &mut Vec<u8>) -> Result<()> {
    check_frame_lengths(reference, target)?;
    let pixel_len = reference.len();

    out.clear();
    out.resize(pixel_len + sign_len(pixel_len), 0);
    let (deltas, signs) = out.split_at_mut(pixel_len);

    for (i, (&r, &t)) in reference.iter().zip(target).enumerate() {
        let up = t.wrapping_sub(r);
        if up <= 128 {
            deltas[i] = up;
        } else {
            deltas[i] = r.wrapping_sub(t);
            signs[i / 8] |= 1 << (i % 8);
        }
    }
    Ok(())
}

fn check_frame_lengths(reference: &[u8], target: &[u8]) -> Result<()> {
    if reference.len() != target.len() {
        return Err(PipeError::SizeMismatch {
            expected: reference.len(),
            actual: target.len(),
        });
    }
    Ok(())
}

// ── Tests ────────────────────────────────────────────────────────
