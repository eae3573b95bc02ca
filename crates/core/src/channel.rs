//! Byte channel abstraction and a simulated noisy serial line.
//!
//! The link layer talks to its physical layer through [`Transport`]. A real
//! serial port would implement it; this crate ships [`SimulatedChannel`], a
//! loopback buffer that behaves like a bad line in a deterministic way.
//!
//! # Simulated Effects
//!
//! - **Line noise**: every fresh transmission is preceded by 4-19 random
//!   bytes, so the receiver has to hunt for the start marker
//! - **Bit errors**: each stored byte has one bit flipped with probability
//!   `8 × error_probability` (the configured value is a per-bit rate)
//! - **Receive timeout**: polling an empty line blocks for the configured
//!   timeout and yields one random byte, like a UART returning garbage
//! - **Finite buffer**: writes beyond capacity are cut short
//!
//! # Buffer Model
//!
//! A flat array with a write cursor and a read cursor. Both reset to zero
//! once the reader catches up. It is not a ring: a second write before the
//! reader drains the buffer appends after the first.
//!
//! # Determinism
//!
//! All randomness comes from a ChaCha8 RNG seeded at `open`. Given the same
//! seed and the same calls, the bytes delivered are bit-identical.

use crate::error::ChannelError;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::time::Duration;

/// Default buffer capacity in bytes.
pub const DEFAULT_CAPACITY: usize = 2000;

/// Default simulated per-bit error probability.
pub const DEFAULT_ERROR_PROBABILITY: f64 = 3.0e-4;

/// Fewest noise bytes injected ahead of a fresh transmission.
pub const NOISE_MIN: usize = 4;

/// Number of distinct noise lengths (4 through 19).
pub const NOISE_SPAN: usize = 16;

/// Noise byte values stay below this, so noise never looks like a marker.
pub const NOISE_CEILING: u8 = 200;

/// Stand-in for a "wait forever" receive timeout of zero.
pub const UNBOUNDED_POLL: Duration = Duration::from_secs(10);

/// Physical layer used by the link layer.
///
/// Implementations report failures through [`ChannelError`]; a short count
/// from [`Transport::write`] is not an error at this level.
pub trait Transport {
    /// Open and configure the line.
    fn open(&mut self, config: &LineConfig) -> Result<(), ChannelError>;

    /// Close the line.
    fn close(&mut self) -> Result<(), ChannelError>;

    /// Queue bytes for transmission, returning how many were accepted.
    fn write(&mut self, bytes: &[u8]) -> Result<usize, ChannelError>;

    /// Read up to `buf.len()` received bytes, blocking up to the line's
    /// receive timeout when nothing is waiting.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ChannelError>;
}

/// Serial parity setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

/// Line parameters passed to [`Transport::open`].
///
/// Port, bit rate, data bits and parity only matter to real hardware; the
/// simulation carries them and ignores them.
#[derive(Debug, Clone, Copy)]
pub struct LineConfig {
    /// Port number, e.g. 1 for COM1
    pub port: u32,

    /// Bit rate in bits per second
    pub bit_rate: u32,

    /// Data bits per character (7 or 8)
    pub data_bits: u8,

    /// Parity mode
    pub parity: Parity,

    /// Receive timeout constant in milliseconds
    pub rx_timeout_const_ms: u64,

    /// Receive timeout interval in milliseconds
    pub rx_timeout_interval_ms: u64,

    /// Per-bit error probability [0.0, 1.0]
    pub error_probability: f64,

    /// Random seed (None = pick one at open)
    pub seed: Option<u64>,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            port: 1,
            bit_rate: 4800,
            data_bits: 8,
            parity: Parity::None,
            rx_timeout_const_ms: 1000,
            rx_timeout_interval_ms: 50,
            error_probability: DEFAULT_ERROR_PROBABILITY,
            seed: None,
        }
    }
}

impl LineConfig {
    /// Error-free line with a fixed seed.
    pub fn noiseless(seed: u64) -> Self {
        Self {
            error_probability: 0.0,
            seed: Some(seed),
            ..Self::default()
        }
    }

    /// Same line with a different error probability.
    pub fn with_error_probability(mut self, probability: f64) -> Self {
        self.error_probability = probability;
        self
    }

    /// Same line with different receive timeout components.
    pub fn with_rx_timeout(mut self, const_ms: u64, interval_ms: u64) -> Self {
        self.rx_timeout_const_ms = const_ms;
        self.rx_timeout_interval_ms = interval_ms;
        self
    }

    /// Combined blocking duration for a poll of an empty line.
    pub fn rx_timeout(&self) -> Duration {
        match self
            .rx_timeout_const_ms
            .saturating_add(self.rx_timeout_interval_ms)
        {
            0 => UNBOUNDED_POLL,
            ms => Duration::from_millis(ms),
        }
    }
}

/// Number of noise bytes for a random roll.
pub fn noise_len(roll: u8) -> usize {
    NOISE_MIN + roll as usize % NOISE_SPAN
}

/// Loopback serial line with noise, bit errors and blocking empty reads.
///
/// # Thread Safety
/// Not thread-safe; each session owns its own channel.
pub struct SimulatedChannel {
    buffer: Vec<u8>,
    write_pos: usize,
    read_pos: usize,
    error_probability: f64,
    rx_timeout: Duration,
    rng: ChaCha8Rng,
    open: bool,

    // Statistics
    stats: ChannelStats,
}

impl SimulatedChannel {
    /// Closed channel with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Closed channel holding at most `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: vec![0; capacity],
            write_pos: 0,
            read_pos: 0,
            error_probability: 0.0,
            rx_timeout: UNBOUNDED_POLL,
            rng: ChaCha8Rng::seed_from_u64(0),
            open: false,
            stats: ChannelStats::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Bytes written but not yet read.
    pub fn available(&self) -> usize {
        self.write_pos - self.read_pos
    }

    /// Write cursor (bytes stored since the last reset).
    pub fn write_pos(&self) -> usize {
        self.write_pos
    }

    /// Read cursor (bytes consumed since the last reset).
    pub fn read_pos(&self) -> usize {
        self.read_pos
    }

    pub fn error_probability(&self) -> f64 {
        self.error_probability
    }

    pub fn rx_timeout(&self) -> Duration {
        self.rx_timeout
    }

    pub fn stats(&self) -> ChannelStats {
        self.stats
    }

    fn reset_cursors(&mut self) {
        self.write_pos = 0;
        self.read_pos = 0;
    }

    fn ensure_open(&self) -> Result<(), ChannelError> {
        if self.open {
            Ok(())
        } else {
            Err(ChannelError::NotOpen)
        }
    }

    /// Fill the front of an empty buffer with random line noise.
    fn inject_noise(&mut self) {
        let count = noise_len(self.rng.gen()).min(self.capacity());
        for slot in &mut self.buffer[..count] {
            *slot = self.rng.gen_range(0..NOISE_CEILING);
        }
        self.write_pos = count;
        self.stats.noise_bytes += count as u64;
        tracing::trace!(count, "line noise injected");
    }

    /// Apply the bit-error model to one byte.
    fn corrupt(&mut self, byte: u8) -> u8 {
        if self.error_probability <= 0.0 {
            return byte;
        }

        // Per-bit rate scaled to a per-byte rate for 8-bit characters
        let byte_rate = (8.0 * self.error_probability).min(1.0);
        let roll: f64 = self.rng.gen();
        if roll >= byte_rate {
            return byte;
        }

        let bit = self.rng.gen_range(0..8);
        self.stats.bytes_corrupted += 1;
        tracing::debug!(bit, original = byte, "simulated bit error");
        byte ^ (1 << bit)
    }
}

impl Default for SimulatedChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for SimulatedChannel {
    /// Reset the line and apply `config`. Always succeeds in simulation.
    fn open(&mut self, config: &LineConfig) -> Result<(), ChannelError> {
        self.reset_cursors();
        self.stats = ChannelStats::default();
        self.rx_timeout = config.rx_timeout();

        let seed = config.seed.unwrap_or_else(rand::random);
        self.rng = ChaCha8Rng::seed_from_u64(seed);

        if (0.0..=1.0).contains(&config.error_probability) {
            self.error_probability = config.error_probability;
        } else {
            tracing::warn!(
                requested = config.error_probability,
                kept = self.error_probability,
                "error probability outside [0, 1], ignored"
            );
        }

        self.open = true;
        tracing::debug!(
            port = config.port,
            bit_rate = config.bit_rate,
            seed,
            error_probability = self.error_probability,
            rx_timeout_ms = self.rx_timeout.as_millis() as u64,
            "simulated line opened"
        );
        Ok(())
    }

    fn close(&mut self) -> Result<(), ChannelError> {
        self.reset_cursors();
        self.open = false;
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, ChannelError> {
        self.ensure_open()?;

        // Fresh transmission: the line is noisy until it settles
        if self.write_pos == 0 && self.read_pos == 0 {
            self.inject_noise();
        }

        let room = self.capacity() - self.write_pos;
        let count = bytes.len().min(room);
        if count < bytes.len() {
            self.stats.short_writes += 1;
            tracing::warn!(
                requested = bytes.len(),
                accepted = count,
                "simulated line buffer full"
            );
        }

        for (i, &byte) in bytes[..count].iter().enumerate() {
            let stored = self.corrupt(byte);
            self.buffer[self.write_pos + i] = stored;
        }

        self.write_pos += count;
        self.stats.bytes_written += count as u64;
        Ok(count)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ChannelError> {
        self.ensure_open()?;
        if buf.is_empty() {
            return Ok(0);
        }

        let available = self.available();
        if available == 0 {
            // Nothing arrived, but the poll still costs the full timeout
            buf[0] = self.rng.gen();
            self.stats.empty_polls += 1;
            std::thread::sleep(self.rx_timeout);
            return Ok(1);
        }

        let count = buf.len().min(available);
        buf[..count].copy_from_slice(&self.buffer[self.read_pos..self.read_pos + count]);
        self.read_pos += count;
        self.stats.bytes_read += count as u64;

        if self.read_pos == self.write_pos {
            self.reset_cursors();
        }

        Ok(count)
    }
}

/// Statistics about simulated line behavior since the last open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Caller bytes stored in the buffer
    pub bytes_written: u64,

    /// Noise bytes injected ahead of fresh transmissions
    pub noise_bytes: u64,

    /// Stored bytes that had a bit flipped
    pub bytes_corrupted: u64,

    /// Buffered bytes handed to readers
    pub bytes_read: u64,

    /// Reads that found the line empty
    pub empty_polls: u64,

    /// Writes cut short by the buffer capacity
    pub short_writes: u64,
}

impl ChannelStats {
    /// Observed fraction of written bytes that were corrupted.
    pub fn corruption_rate(&self) -> f64 {
        if self.bytes_written == 0 {
            0.0
        } else {
            self.bytes_corrupted as f64 / self.bytes_written as f64
        }
    }
}
