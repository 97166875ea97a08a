//! LZ4 block codec with an exact-size output contract.
//!
//! An LZ4 block is a sequence of:
//! - Token byte: (literal_length: 4 bits, match_length - 4: 4 bits)
//! - Optional additional literal length bytes (if literal_length == 15)
//! - Literal bytes
//! - Match offset (2 bytes, little-endian)
//! - Optional additional match length bytes (if match_length nibble == 15)
//!
//! The last sequence has no match and ends the input.
//!
//! The decoder writes into a buffer sized up front from the session
//! dimensions and fails unless the stream fills it exactly. Error
//! positions are byte offsets into the compressed input.

use crate::error::{PipeError, Result};

/// Minimum match length for LZ4 (matches must be at least 4 bytes).
pub const MIN_MATCH: usize = 4;

/// Largest back-reference distance the 2-byte offset field can hold.
const MAX_OFFSET: usize = 65535;

/// The last 5 bytes of a block are always literals.
const LAST_LITERALS: usize = 5;

/// No match may start within the last 12 bytes of a block.
const MF_LIMIT: usize = 12;

/// Inputs shorter than this are emitted as a single literal run.
const MIN_INPUT_SIZE: usize = MF_LIMIT + 1;

/// Hash table size (2^16 entries).
const HASH_TABLE_SIZE: usize = 1 << 16;

/// Marks an empty hash slot.
const EMPTY_SLOT: usize = usize::MAX;

// ── Decoding ─────────────────────────────────────────────────────

/// Decompress `compressed` into a fresh buffer of exactly
/// `output_capacity` bytes.
pub fn decode(compressed: &[u8], output_capacity: usize) -> Result<Vec<u8>> {
    let mut output = vec![0u8; output_capacity];
    decompress_into(compressed, &mut output)?;
    Ok(output)
}

/// Pass-through for sessions with compression disabled: the payload
/// is already the decoded buffer.
pub fn passthrough(payload: &[u8], output_capacity: usize) -> Result<&[u8]> {
    if payload.len() != output_capacity {
        return Err(PipeError::SizeMismatch {
            expected: output_capacity,
            actual: payload.len(),
        });
    }
    Ok(payload)
}

/// Replay the token stream in `input` into `output`.
///
/// Succeeds only if the stream produces exactly `output.len()` bytes.
/// A stream that would write past the end is rejected before the
/// offending copy.
pub fn decompress_into(input: &[u8], output: &mut [u8]) -> Result<()> {
    let capacity = output.len();
    let mut ip: usize = 0;
    let mut op: usize = 0;

    while ip < input.len() {
        let token = input[ip];
        ip += 1;

        // Literals.
        let mut literal_len = (token >> 4) as usize;
        if literal_len == 15 {
            literal_len += read_length(input, &mut ip)?;
        }

        let literal_end = ip.saturating_add(literal_len);
        if literal_end > input.len() {
            return Err(PipeError::TruncatedInput { position: ip });
        }
        let out_end = op.saturating_add(literal_len);
        if out_end > capacity {
            return Err(PipeError::SizeMismatch {
                expected: capacity,
                actual: out_end,
            });
        }
        output[op..out_end].copy_from_slice(&input[ip..literal_end]);
        ip = literal_end;
        op = out_end;

        // Last sequence: literals only.
        if ip == input.len() {
            break;
        }

        // Match.
        if ip + 2 > input.len() {
            return Err(PipeError::TruncatedInput { position: ip });
        }
        let offset_pos = ip;
        let offset = u16::from_le_bytes([input[ip], input[ip + 1]]) as usize;
        ip += 2;

        if offset == 0 {
            return Err(PipeError::MalformedStream {
                position: offset_pos,
                reason: "zero back-reference offset",
            });
        }
        if offset > op {
            return Err(PipeError::MalformedStream {
                position: offset_pos,
                reason: "back-reference before start of output",
            });
        }

        let mut match_len = (token & 0x0F) as usize;
        if match_len == 15 {
            match_len += read_length(input, &mut ip)?;
        }
        match_len += MIN_MATCH;

        let out_end = op.saturating_add(match_len);
        if out_end > capacity {
            return Err(PipeError::SizeMismatch {
                expected: capacity,
                actual: out_end,
            });
        }

        let match_start = op - offset;
        if offset >= match_len {
            output.copy_within(match_start..match_start + match_len, op);
        } else {
            // Overlapping copy repeats the last `offset` bytes.
            for i in 0..match_len {
                output[op + i] = output[match_start + i];
            }
        }
        op = out_end;
    }

    if op != capacity {
        return Err(PipeError::SizeMismatch {
            expected: capacity,
            actual: op,
        });
    }
    Ok(())
}

/// Read a 255-continued length extension.
fn read_length(input: &[u8], ip: &mut usize) -> Result<usize> {
    let mut total = 0usize;
    loop {
        let Some(&byte) = input.get(*ip) else {
            return Err(PipeError::TruncatedInput { position: *ip });
        };
        *ip += 1;
        total = total.saturating_add(byte as usize);
        if byte != 255 {
            return Ok(total);
        }
    }
}

// ── Encoding ─────────────────────────────────────────────────────

/// Worst-case compressed size for `input_len` bytes.
pub fn max_compressed_size(input_len: usize) -> usize {
    input_len + input_len / 255 + 16
}

/// Compress `input` into a single LZ4 block.
///
/// Greedy single-probe matcher. Output respects the block end rules
/// (trailing literals, no late match starts), so any conformant LZ4
/// block decoder accepts it.
pub fn compress(input: &[u8]) -> Vec<u8> {
    let len = input.len();
    let mut output = Vec::with_capacity(max_compressed_size(len));
    let mut anchor = 0;

    if len >= MIN_INPUT_SIZE {
        let mut table = vec![EMPTY_SLOT; HASH_TABLE_SIZE];
        let match_limit = len - LAST_LITERALS;
        let mf_limit = len - MF_LIMIT;
        let mut pos = 0;

        while pos < mf_limit {
            let sequence = read_u32_le(input, pos);
            let h = hash(sequence);
            let candidate = table[h];
            table[h] = pos;

            if candidate != EMPTY_SLOT
                && pos - candidate <= MAX_OFFSET
                && read_u32_le(input, candidate) == sequence
            {
                let match_len = MIN_MATCH
                    + count_match(input, candidate + MIN_MATCH, pos + MIN_MATCH, match_limit);
                write_sequence(&mut output, &input[anchor..pos], pos - candidate, match_len);
                pos += match_len;
                anchor = pos;
            } else {
                pos += 1;
            }
        }
    }

    write_last_literals(&mut output, &input[anchor..]);
    output
}

#[inline(always)]
fn hash(sequence: u32) -> usize {
    (sequence.wrapping_mul(2654435761) >> 16) as usize & (HASH_TABLE_SIZE - 1)
}

#[inline(always)]
fn read_u32_le(data: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
}

/// Count matching bytes forward from two positions, stopping at `limit`.
#[inline]
fn count_match(data: &[u8], mut a: usize, mut b: usize, limit: usize) -> usize {
    let start = b;
    while b < limit && data[a] == data[b] {
        a += 1;
        b += 1;
    }
    b - start
}

fn write_length_extension(output: &mut Vec<u8>, mut remaining: usize) {
    while remaining >= 255 {
        output.push(255);
        remaining -= 255;
    }
    output.push(remaining as u8);
}

fn write_sequence(output: &mut Vec<u8>, literals: &[u8], offset: usize, match_len: usize) {
    let ml = match_len - MIN_MATCH;
    let token = ((literals.len().min(15) << 4) | ml.min(15)) as u8;
    output.push(token);
    if literals.len() >= 15 {
        write_length_extension(output, literals.len() - 15);
    }
    output.extend_from_slice(literals);
    output.extend_from_slice(&(offset as u16).to_le_bytes());
    if ml >= 15 {
        write_length_extension(output, ml - 15);
    }
}

fn write_last_literals(output: &mut Vec<u8>, literals: &[u8]) {
    output.push((literals.len().min(15) << 4) as u8);
    if literals.len() >= 15 {
        write_length_extension(output, literals.len() - 15);
    }
    output.extend_from_slice(literals);
}

// ── Tests ────────────────────────────────────────────────────────
