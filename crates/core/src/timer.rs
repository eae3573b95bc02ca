//! Receive deadlines.
//!
//! Frame acquisition is bounded by a [`Deadline`] sampled from the monotonic
//! clock when the receive call starts. The deadline is a plain value handed to
//! the blocking loop; expiry is the only way such a loop ends early.

use std::time::{Duration, Instant};

/// A point on the monotonic clock after which a blocking operation gives up.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    expires_at: Instant,
}

impl Deadline {
    /// Deadline `limit` from now.
    pub fn after(limit: Duration) -> Self {
        let started = Instant::now();
        Self {
            started,
            expires_at: started + limit,
        }
    }

    /// True once the limit has been reached or exceeded.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Time left before expiry (zero once expired).
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    /// Time since the deadline was set.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
