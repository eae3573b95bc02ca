//! Link counters and reporting.
//!
//! A session keeps one [`LinkMetrics`] value:
//! - Frames sent
//! - Good and bad frames received
//! - Receive timeouts
//! - Sequence-number irregularities seen on good frames
//!
//! Counters are reset by `connect` and reported by `disconnect`. They are
//! diagnostic only and never influence what the link layer does.
//!
//! # Thread Safety
//!
//! Plain struct, updated in place by the owning session.

use crate::framing::SEQ_MODULUS;
use std::time::{Duration, Instant};

/// Counters for one connection.
#[derive(Debug, Clone)]
pub struct LinkMetrics {
    /// When the counters were last reset
    pub start_time: Instant,

    // === Transmit ===
    /// Data frames handed to the transport in full
    pub frames_sent: u64,

    /// Payload bytes carried by those frames
    pub bytes_sent: u64,

    // === Receive ===
    /// Frames that passed validation
    pub good_frames: u64,

    /// Frames that failed validation
    pub bad_frames: u64,

    /// Receive calls that ran out of time
    pub timeouts: u64,

    /// Payload bytes delivered from good frames
    pub bytes_received: u64,

    // === Sequence ===
    /// Good frames whose sequence number skipped ahead
    pub sequence_gaps: u64,

    /// Good frames repeating the previous sequence number
    pub sequence_repeats: u64,
}

impl LinkMetrics {
    /// Fresh counters with start time set to now.
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            frames_sent: 0,
            bytes_sent: 0,
            good_frames: 0,
            bad_frames: 0,
            timeouts: 0,
            bytes_received: 0,
            sequence_gaps: 0,
            sequence_repeats: 0,
        }
    }

    /// Reset all counters and restart the clock.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Time since the last reset.
    pub fn duration(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Receive attempts that produced a frame, good or bad.
    pub fn frames_received(&self) -> u64 {
        self.good_frames + self.bad_frames
    }

    /// Fraction of received frames that failed validation.
    pub fn bad_frame_rate(&self) -> f64 {
        let received = self.frames_received();
        if received == 0 {
            0.0
        } else {
            self.bad_frames as f64 / received as f64
        }
    }

    /// Fraction of receive attempts that timed out.
    pub fn timeout_rate(&self) -> f64 {
        let attempts = self.frames_received() + self.timeouts;
        if attempts == 0 {
            0.0
        } else {
            self.timeouts as f64 / attempts as f64
        }
    }

    /// The two-line report printed on disconnect.
    pub fn summary(&self) -> String {
        format!(
            "Sent {} data frames\nReceived {} good and {} bad frames, had {} timeouts",
            self.frames_sent, self.good_frames, self.bad_frames, self.timeouts
        )
    }

    /// Export metrics as a simple text format (for parsing/testing).
    pub fn export_text(&self) -> String {
        format!(
            "duration_ms={}\n\
             frames_sent={}\n\
             bytes_sent={}\n\
             good_frames={}\n\
             bad_frames={}\n\
             timeouts={}\n\
             bytes_received={}\n\
             bad_frame_rate={:.4}\n\
             sequence_gaps={}\n\
             sequence_repeats={}\n",
            self.duration().as_millis(),
            self.frames_sent,
            self.bytes_sent,
            self.good_frames,
            self.bad_frames,
            self.timeouts,
            self.bytes_received,
            self.bad_frame_rate(),
            self.sequence_gaps,
            self.sequence_repeats,
        )
    }
}

impl Default for LinkMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// How a received sequence number relates to the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqEvent {
    /// First frame, or exactly the successor of the previous one
    InOrder,

    /// Same number as the previous frame
    Repeat,

    /// Skipped ahead by `missed` numbers (mod 16)
    Gap { missed: u8 },
}

/// Tracks sequence numbers of good frames to spot losses and repeats.
#[derive(Debug, Default)]
pub struct SequenceTracker {
    last: Option<u8>,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self { last: None }
    }

    /// Record a sequence number and classify it.
    pub fn track(&mut self, seq: u8) -> SeqEvent {
        let seq = seq % SEQ_MODULUS;
        let event = match self.last {
            None => SeqEvent::InOrder,
            Some(last) if last == seq => SeqEvent::Repeat,
            Some(last) => {
                let step = (seq + SEQ_MODULUS - last) % SEQ_MODULUS;
                if step == 1 {
                    SeqEvent::InOrder
                } else {
                    SeqEvent::Gap { missed: step - 1 }
                }
            }
        };
        self.last = Some(seq);
        event
    }

    /// Forget the previous number (new connection).
    pub fn reset(&mut self) {
        self.last = None;
    }
}
