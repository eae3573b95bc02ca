//! Data frame construction, validation and extraction.
//!
//! A data frame wraps one block of caller data for the byte channel:
//! - Header: start marker, total frame length, sequence number
//! - Payload: the block itself
//! - Trailer: additive checksum, end marker
//!
//! # Frame Format
//!
//! ```text
//! +------------------+
//! | start (1 byte)   |  0xCE (206)
//! +------------------+
//! | length (1)       |  total frame size L = 5 + payload length
//! +------------------+
//! | seq (1)          |  sequence number, 0..16
//! +------------------+
//! | payload          |  L - 5 bytes
//! | (variable)       |
//! +------------------+
//! | checksum (1)     |  sum(payload) + checksum == 0 (mod 256)
//! +------------------+
//! | end (1 byte)     |  0xCC (204)
//! +------------------+
//! ```
//!
//! # Checksum Coverage
//!
//! Only the payload is protected. Header corruption is caught by the marker
//! and length checks instead, which is why validation runs all of them.
//!
//! All functions here are pure; nothing in this module touches a channel.

use crate::error::{Error, FrameError, Result};

/// Start of frame marker
pub const START_MARKER: u8 = 206;

/// End of frame marker
pub const END_MARKER: u8 = 204;

/// Reserved escape byte for stuffing markers inside payloads (not used on the data path)
pub const STUFF_BYTE: u8 = 220;

/// Offset of the length byte
pub const LENGTH_POS: usize = 1;

/// Offset of the sequence number
pub const SEQ_POS: usize = 2;

/// Bytes before the payload
pub const HEADER_SIZE: usize = 3;

/// Bytes after the payload
pub const TRAILER_SIZE: usize = 2;

/// Smallest well-formed frame (empty payload)
pub const MIN_FRAME_SIZE: usize = HEADER_SIZE + TRAILER_SIZE;

/// Largest block that still fits the one-byte length field
pub const MAX_BLOCK: usize = u8::MAX as usize - MIN_FRAME_SIZE;

/// Largest frame on the wire
pub const MAX_FRAME_SIZE: usize = MIN_FRAME_SIZE + MAX_BLOCK;

/// Sequence numbers wrap at this value
pub const SEQ_MODULUS: u8 = 16;

/// A block recovered from a validated frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBlock {
    /// Sequence number from the frame header
    pub seq: u8,

    /// Payload bytes, possibly truncated by the caller's limit
    pub payload: Vec<u8>,
}

/// Advance a sequence number, wrapping at [`SEQ_MODULUS`].
pub fn next_seq(seq: u8) -> u8 {
    (seq % SEQ_MODULUS + 1) % SEQ_MODULUS
}

/// Additive complement of the payload bytes.
///
/// Adding the result to the byte sum of `payload` gives 0 mod 256.
pub fn checksum(payload: &[u8]) -> u8 {
    payload_sum(payload).wrapping_neg()
}

fn payload_sum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Serialize a block into a data frame.
///
/// # Errors
/// `Error::BlockTooLarge` if the payload exceeds [`MAX_BLOCK`].
pub fn build_frame(payload: &[u8], seq: u8) -> Result<Vec<u8>> {
    if payload.len() > MAX_BLOCK {
        return Err(Error::BlockTooLarge {
            size: payload.len(),
            max: MAX_BLOCK,
        });
    }

    let frame_len = MIN_FRAME_SIZE + payload.len();
    let mut frame = Vec::with_capacity(frame_len);

    // Header
    frame.push(START_MARKER);
    frame.push(frame_len as u8);
    frame.push(seq);

    frame.extend_from_slice(payload);

    // Trailer
    frame.push(checksum(payload));
    frame.push(END_MARKER);

    Ok(frame)
}

/// Check a received frame, returning the first failed check.
///
/// Checks run in a fixed order: minimum size, start marker, end marker,
/// length byte against the bytes actually received, then the checksum.
pub fn check_frame(frame: &[u8]) -> std::result::Result<(), FrameError> {
    if frame.len() < MIN_FRAME_SIZE {
        return Err(FrameError::TooShort {
            required: MIN_FRAME_SIZE,
            actual: frame.len(),
        });
    }

    if frame[0] != START_MARKER {
        return Err(FrameError::BadStartMarker { found: frame[0] });
    }

    let last = frame[frame.len() - 1];
    if last != END_MARKER {
        return Err(FrameError::BadEndMarker { found: last });
    }

    let declared = frame[LENGTH_POS] as usize;
    if declared != frame.len() {
        return Err(FrameError::LengthMismatch {
            declared,
            actual: frame.len(),
        });
    }

    // Payload plus checksum byte
    let residue = payload_sum(&frame[HEADER_SIZE..frame.len() - 1]);
    if residue != 0 {
        return Err(FrameError::ChecksumMismatch { residue });
    }

    Ok(())
}

/// Boolean form of [`check_frame`] that logs why a frame was rejected.
pub fn validate_frame(frame: &[u8]) -> bool {
    match check_frame(frame) {
        Ok(()) => true,
        Err(reason) => {
            tracing::warn!(frame_len = frame.len(), "frame bad - {reason}");
            false
        }
    }
}

/// Pull the sequence number and payload out of a validated frame.
///
/// The payload is silently truncated to `max_len` bytes. Calling this on a
/// frame that failed [`check_frame`] gives meaningless (but memory-safe) output.
pub fn extract_frame(frame: &[u8], max_len: usize) -> DataBlock {
    let seq = frame.get(SEQ_POS).copied().unwrap_or(0);

    let data_len = frame
        .len()
        .saturating_sub(MIN_FRAME_SIZE)
        .min(max_len);
    let payload = frame
        .get(HEADER_SIZE..HEADER_SIZE + data_len)
        .map(<[u8]>::to_vec)
        .unwrap_or_default();

    DataBlock { seq, payload }
}

/// Render frame bytes for diagnostics, ten per line as numbers then characters.
///
/// Frames longer than 50 bytes show only their first and last ten bytes.
pub fn frame_dump(frame: &[u8]) -> String {
    fn line(bytes: &[u8]) -> String {
        let numbers: String = bytes.iter().map(|b| format!("{b:3} ")).collect();
        let chars: String = bytes
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
            .collect();
        format!("{numbers}:  {chars}")
    }

    if frame.len() <= 50 {
        frame.chunks(10).map(line).collect::<Vec<_>>().join("\n")
    } else {
        format!(
            "{}\n - - -\n{}",
            line(&frame[..10]),
            line(&frame[frame.len() - 10..])
        )
    }
}
