//! linksim-core: a detect-only link layer over a simulated serial line
//!
//! This library frames blocks of bytes for an unreliable byte channel, detects
//! damage on the receiving side and hands back what survived:
//! - Builds frames with start/end markers, a length byte, a 4-bit sequence
//!   number and an additive checksum
//! - Hunts for frames in a noisy byte stream under a receive deadline
//! - Simulates the serial line: start-up noise, bit errors, blocking polls
//!
//! # Architecture
//!
//! The system is designed around clear module boundaries:
//! - `framing`: Frame format, validation and extraction (pure functions)
//! - `timer`: Receive deadlines
//! - `channel`: `Transport` trait and the simulated line
//! - `acquire`: Deadline-bounded frame acquisition from a byte stream
//! - `session`: Connect/disconnect/send/receive, sequence numbers, counters
//! - `metrics`: Link counters and sequence diagnostics
//! - `reliability`: Acknowledgment format and retry state machine (not used
//!   by the data path)
//!
//! # Design Principles
//!
//! - **No panics**: All errors are structured and recoverable
//! - **No globals**: Sessions and channels are values owned by the caller
//! - **Deterministic**: Seeded randomness makes runs reproducible
//! - **Detect, don't repair**: Damaged frames are reported, never retransmitted

pub mod acquire;
pub mod channel;
pub mod error;
pub mod framing;
pub mod metrics;
pub mod reliability;
pub mod session;
pub mod timer;

// Re-export commonly used types
pub use channel::{LineConfig, Parity, SimulatedChannel, Transport};
pub use error::{ChannelError, Error, FrameError, Result};
pub use metrics::LinkMetrics;
pub use session::{LinkConfig, LinkSession, LinkState, Received};
