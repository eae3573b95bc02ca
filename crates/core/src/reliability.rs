//! Acknowledgment frames and the retransmission state machine.
//!
//! The data path in [`crate::session`] only detects errors. This module holds
//! the pieces a retransmitting tier would sit on, kept apart from the frame
//! codec and the channel:
//! - The 5-byte acknowledgment frame format
//! - Classification of protocol marker bytes (for byte stuffing)
//! - [`RetryMachine`], a per-frame state machine for stop-and-wait ARQ
//!
//! # Acknowledgment Format
//!
//! ```text
//! +-------+--------+-----+------+-----+
//! | start | length | seq | type | end |
//! | 206   | 5      |     |      | 204 |
//! +-------+--------+-----+------+-----+
//! ```
//!
//! `type` is [`AckKind::Positive`] (1) or [`AckKind::Negative`] (26).
//!
//! # Retry State Machine
//!
//! ```text
//!  Idle ──sent──▶ AwaitingAck ──positive ack──▶ Acked
//!                   │    ▲
//!   nak / timeout   │    │ resent
//!                   ▼    │
//!                  Retrying ──(attempts exhausted)──▶ Failed
//! ```
//!
//! The machine never performs I/O. Its owner sends frames, waits, and feeds
//! the outcome back in.

use crate::error::FrameError;
use crate::framing::{END_MARKER, LENGTH_POS, SEQ_POS, START_MARKER, STUFF_BYTE};
use std::time::Duration;

/// Bytes in an acknowledgment frame.
pub const ACK_SIZE: usize = 5;

/// Offset of the acknowledgment type byte.
const ACK_TYPE_POS: usize = 3;

/// Transmissions allowed per frame before giving up.
pub const MAX_TRIES: u32 = 6;

/// How long a sender waits for an acknowledgment.
pub const TX_WAIT: Duration = Duration::from_secs(5);

/// Acknowledgment type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AckKind {
    /// Frame received intact
    Positive = 1,

    /// Frame received damaged
    Negative = 26,
}

impl AckKind {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(AckKind::Positive),
            26 => Some(AckKind::Negative),
            _ => None,
        }
    }
}

/// A decoded acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub kind: AckKind,
    pub seq: u8,
}

/// True for bytes that would need escaping inside a payload.
pub fn is_special(byte: u8) -> bool {
    matches!(byte, START_MARKER | END_MARKER | STUFF_BYTE)
}

/// Serialize an acknowledgment frame.
pub fn build_ack_frame(ack: Ack) -> [u8; ACK_SIZE] {
    [START_MARKER, ACK_SIZE as u8, ack.seq, ack.kind as u8, END_MARKER]
}

/// Parse an acknowledgment frame.
pub fn parse_ack_frame(frame: &[u8]) -> Result<Ack, FrameError> {
    if frame.len() < ACK_SIZE {
        return Err(FrameError::TooShort {
            required: ACK_SIZE,
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
    if frame.len() != ACK_SIZE || frame[LENGTH_POS] as usize != ACK_SIZE {
        return Err(FrameError::LengthMismatch {
            declared: frame[LENGTH_POS] as usize,
            actual: frame.len(),
        });
    }

    let kind = AckKind::from_byte(frame[ACK_TYPE_POS]).ok_or(FrameError::UnknownAckType {
        found: frame[ACK_TYPE_POS],
    })?;

    Ok(Ack {
        kind,
        seq: frame[SEQ_POS],
    })
}

/// State of one outstanding frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArqState {
    /// Nothing outstanding
    #[default]
    Idle,

    /// Frame `seq` sent `attempt` times, waiting for its acknowledgment
    AwaitingAck { seq: u8, attempt: u32 },

    /// Frame `seq` must be sent again as attempt number `attempt`
    Retrying { seq: u8, attempt: u32 },

    /// Frame `seq` was acknowledged
    Acked { seq: u8 },

    /// Frame `seq` used up every attempt
    Failed { seq: u8 },
}

/// Event that does not apply to the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{event} not valid in state {state:?}")]
pub struct InvalidTransition {
    pub state: ArqState,
    pub event: &'static str,
}

/// Stop-and-wait retransmission bookkeeping for a single frame at a time.
#[derive(Debug)]
pub struct RetryMachine {
    state: ArqState,
    max_tries: u32,
}

impl RetryMachine {
    /// Machine allowing `max_tries` transmissions per frame (at least one).
    pub fn new(max_tries: u32) -> Self {
        Self {
            state: ArqState::Idle,
            max_tries: max_tries.max(1),
        }
    }

    pub fn state(&self) -> ArqState {
        self.state
    }

    /// Sequence number due for retransmission, if any.
    pub fn pending_retransmit(&self) -> Option<u8> {
        match self.state {
            ArqState::Retrying { seq, .. } => Some(seq),
            _ => None,
        }
    }

    /// A frame went out: either a new frame or the pending retransmission.
    pub fn on_sent(&mut self, seq: u8) -> Result<ArqState, InvalidTransition> {
        self.state = match self.state {
            ArqState::Idle | ArqState::Acked { .. } | ArqState::Failed { .. } => {
                ArqState::AwaitingAck { seq, attempt: 1 }
            }
            ArqState::Retrying { seq: pending, attempt } if pending == seq => {
                ArqState::AwaitingAck { seq, attempt }
            }
            state => return Err(InvalidTransition { state, event: "send" }),
        };
        Ok(self.state)
    }

    /// An acknowledgment arrived. Stale acknowledgments are ignored.
    pub fn on_ack(&mut self, ack: Ack) -> Result<ArqState, InvalidTransition> {
        let ArqState::AwaitingAck { seq, attempt } = self.state else {
            return Err(InvalidTransition {
                state: self.state,
                event: "ack",
            });
        };

        if ack.seq != seq {
            tracing::debug!(expected = seq, got = ack.seq, "stale acknowledgment ignored");
            return Ok(self.state);
        }

        self.state = match ack.kind {
            AckKind::Positive => ArqState::Acked { seq },
            AckKind::Negative => self.retry_or_fail(seq, attempt),
        };
        Ok(self.state)
    }

    /// No acknowledgment arrived in time.
    pub fn on_timeout(&mut self) -> Result<ArqState, InvalidTransition> {
        let ArqState::AwaitingAck { seq, attempt } = self.state else {
            return Err(InvalidTransition {
                state: self.state,
                event: "timeout",
            });
        };
        self.state = self.retry_or_fail(seq, attempt);
        Ok(self.state)
    }

    pub fn reset(&mut self) {
        self.state = ArqState::Idle;
    }

    fn retry_or_fail(&self, seq: u8, attempt: u32) -> ArqState {
        if attempt < self.max_tries {
            ArqState::Retrying {
                seq,
                attempt: attempt + 1,
            }
        } else {
            tracing::warn!(seq, attempts = attempt, "giving up on frame");
            ArqState::Failed { seq }
        }
    }
}

impl Default for RetryMachine {
    fn default() -> Self {
        Self::new(MAX_TRIES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positive(seq: u8) -> Ack {
        Ack {
            kind: AckKind::Positive,
            seq,
        }
    }

    fn negative(seq: u8) -> Ack {
        Ack {
            kind: AckKind::Negative,
            seq,
        }
    }

    #[test]
    fn test_ack_frame_layout() {
        assert_eq!(build_ack_frame(positive(3)), [206, 5, 3, 1, 204]);
        assert_eq!(build_ack_frame(negative(15)), [206, 5, 15, 26, 204]);
    }

    #[test]
    fn test_ack_frame_parse() {
        let frame = build_ack_frame(negative(9));
        assert_eq!(parse_ack_frame(&frame), Ok(negative(9)));
    }

    #[test]
    fn test_ack_frame_rejects_damage() {
        let mut frame = build_ack_frame(positive(1));
        frame[ACK_TYPE_POS] = 2;
        assert_eq!(
            parse_ack_frame(&frame),
            Err(FrameError::UnknownAckType { found: 2 })
        );

        let mut frame = build_ack_frame(positive(1));
        frame[0] = 0;
        assert!(matches!(
            parse_ack_frame(&frame),
            Err(FrameError::BadStartMarker { .. })
        ));

        assert!(matches!(
            parse_ack_frame(&frame[..3]),
            Err(FrameError::TooShort { .. })
        ));
    }

    #[test]
    fn test_special_bytes() {
        assert!(is_special(206));
        assert!(is_special(204));
        assert!(is_special(220));
        assert!(!is_special(0));
        assert!(!is_special(205));
    }

    #[test]
    fn test_acked_first_time() {
        let mut arq = RetryMachine::default();
        arq.on_sent(0).unwrap();
        assert_eq!(arq.on_ack(positive(0)), Ok(ArqState::Acked { seq: 0 }));
        assert_eq!(arq.pending_retransmit(), None);
    }

    #[test]
    fn test_nak_then_ack() {
        let mut arq = RetryMachine::default();
        arq.on_sent(4).unwrap();

        assert_eq!(
            arq.on_ack(negative(4)),
            Ok(ArqState::Retrying { seq: 4, attempt: 2 })
        );
        assert_eq!(arq.pending_retransmit(), Some(4));

        assert_eq!(arq.on_sent(4), Ok(ArqState::AwaitingAck { seq: 4, attempt: 2 }));
        assert_eq!(arq.on_ack(positive(4)), Ok(ArqState::Acked { seq: 4 }));
    }

    #[test]
    fn test_gives_up_after_max_tries() {
        let mut arq = RetryMachine::new(3);
        arq.on_sent(1).unwrap();

        arq.on_timeout().unwrap();
        arq.on_sent(1).unwrap();
        arq.on_timeout().unwrap();
        arq.on_sent(1).unwrap();
        assert_eq!(arq.state(), ArqState::AwaitingAck { seq: 1, attempt: 3 });

        assert_eq!(arq.on_timeout(), Ok(ArqState::Failed { seq: 1 }));

        // A new frame can start after failure
        assert_eq!(arq.on_sent(2), Ok(ArqState::AwaitingAck { seq: 2, attempt: 1 }));
    }

    #[test]
    fn test_stale_ack_ignored() {
        let mut arq = RetryMachine::default();
        arq.on_sent(7).unwrap();
        assert_eq!(
            arq.on_ack(positive(6)),
            Ok(ArqState::AwaitingAck { seq: 7, attempt: 1 })
        );
    }

    #[test]
    fn test_invalid_transitions() {
        let mut arq = RetryMachine::default();
        assert!(arq.on_timeout().is_err());
        assert!(arq.on_ack(positive(0)).is_err());

        arq.on_sent(0).unwrap();
        let err = arq.on_sent(1).unwrap_err();
        assert_eq!(err.state, ArqState::AwaitingAck { seq: 0, attempt: 1 });

        arq.reset();
        assert_eq!(arq.state(), ArqState::Idle);
    }
}
