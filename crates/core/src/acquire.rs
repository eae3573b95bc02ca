//! Frame acquisition from a raw byte stream.
//!
//! The receiver sees whatever the line delivers: noise, leftovers of earlier
//! frames, synthetic bytes from empty polls. [`read_frame`] turns that into one
//! candidate frame:
//!
//! 1. Discard bytes until a start marker arrives
//! 2. Read the length byte
//! 3. Read until the declared number of bytes has been collected
//!
//! Every step stops when the [`Deadline`] expires. The candidate is not
//! validated here; that is the codec's job.

use crate::channel::Transport;
use crate::error::{Error, Result};
use crate::framing::{LENGTH_POS, MAX_FRAME_SIZE, START_MARKER};
use crate::timer::Deadline;

/// Collect one candidate frame before `deadline`.
///
/// # Returns
/// The candidate's bytes, starting with the start marker. A declared length
/// below two yields just the marker and length byte.
///
/// # Errors
/// - `Error::Timeout` if the deadline expires first
/// - `Error::Receive` if the transport fails
pub fn read_frame<T: Transport + ?Sized>(transport: &mut T, deadline: &Deadline) -> Result<Vec<u8>> {
    let mut byte = [0u8; 1];
    let mut skipped = 0usize;

    // Hunt for the start marker
    loop {
        if deadline.is_expired() {
            return Err(timeout(0, deadline));
        }
        if read_some(transport, &mut byte)? == 1 {
            if byte[0] == START_MARKER {
                break;
            }
            skipped += 1;
        }
    }
    tracing::trace!(skipped, "start marker found");

    // Length byte
    let mut frame = Vec::with_capacity(MAX_FRAME_SIZE);
    frame.push(START_MARKER);
    loop {
        if deadline.is_expired() {
            return Err(timeout(frame.len(), deadline));
        }
        if read_some(transport, &mut byte)? == 1 {
            frame.push(byte[0]);
            break;
        }
    }

    let declared = frame[LENGTH_POS] as usize;
    frame.resize(declared.max(frame.len()), 0);

    // Body: whatever the line has, up to the declared size
    let mut collected = LENGTH_POS + 1;
    while collected < declared {
        if deadline.is_expired() {
            return Err(timeout(collected, deadline));
        }
        collected += read_some(transport, &mut frame[collected..])?;
    }

    tracing::trace!(len = frame.len(), "candidate frame collected");
    Ok(frame)
}

fn read_some<T: Transport + ?Sized>(transport: &mut T, buf: &mut [u8]) -> Result<usize> {
    transport.read(buf).map_err(Error::Receive)
}

fn timeout(received: usize, deadline: &Deadline) -> Error {
    let waited_ms = deadline.elapsed().as_millis() as u64;
    tracing::warn!(received, waited_ms, "timeout while acquiring frame");
    Error::Timeout {
        received,
        waited_ms,
    }
}
