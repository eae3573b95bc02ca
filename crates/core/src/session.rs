//! Link session: connect, disconnect, send and receive blocks.
//!
//! A [`LinkSession`] owns its transport, the transmit sequence number and the
//! link counters. Sessions are independent values; nothing is shared between
//! two of them.
//!
//! # State Machine
//!
//! ```text
//!              connect() ok
//! Disconnected ────────────▶ Connected
//!      ▲                         │
//!      └──────── disconnect() ◀──┘
//! ```
//!
//! A failed `connect` leaves the session disconnected. `disconnect` always
//! ends disconnected, even if the transport reports an error. Sends and
//! receives while disconnected fail without touching the transport.
//!
//! # Error Detection Only
//!
//! Damaged frames are counted and replaced by a sentinel block; nothing is
//! acknowledged or retransmitted. Callers decide whether to ask again.

use crate::acquire::read_frame;
use crate::channel::{LineConfig, Transport};
use crate::error::{Error, Result};
use crate::framing::{self, MAX_BLOCK};
use crate::metrics::{LinkMetrics, SeqEvent, SequenceTracker};
use crate::reliability::AckKind;
use crate::timer::Deadline;
use std::time::Duration;

/// Receiver waiting time for one frame.
pub const RX_WAIT: Duration = Duration::from_secs(20);

/// Bytes reported for a frame that failed validation.
pub const BAD_FRAME_LEN: usize = 10;

/// Fill byte for the bad-frame sentinel block (`#`).
pub const SENTINEL_BYTE: u8 = b'#';

/// Session parameters.
#[derive(Debug, Clone, Copy)]
pub struct LinkConfig {
    /// Line parameters passed to the transport on connect
    pub line: LineConfig,

    /// How long a receive call may take overall
    pub rx_wait: Duration,

    /// Largest block accepted by send (at most the frame format's limit)
    pub max_block: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            line: LineConfig::default(),
            rx_wait: RX_WAIT,
            max_block: MAX_BLOCK,
        }
    }
}

impl LinkConfig {
    /// Defaults around the given line parameters.
    pub fn with_line(line: LineConfig) -> Self {
        Self {
            line,
            ..Self::default()
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Disconnected,
    Connected,
}

/// Outcome of a receive call that produced a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Received {
    /// A valid frame: `len` payload bytes copied, carrying sequence number `seq`
    Block { len: usize, seq: u8 },

    /// A damaged frame: the buffer holds `len` sentinel bytes
    BadFrame { len: usize },
}

impl Received {
    /// Number of bytes placed in the caller's buffer.
    pub fn len(&self) -> usize {
        match *self {
            Received::Block { len, .. } | Received::BadFrame { len } => len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_bad_frame(&self) -> bool {
        matches!(self, Received::BadFrame { .. })
    }
}

/// Detect-only link layer over a [`Transport`].
pub struct LinkSession<T: Transport> {
    transport: T,
    config: LinkConfig,
    state: LinkState,
    seq_tx: u8,
    metrics: LinkMetrics,
    rx_sequence: SequenceTracker,
}

impl<T: Transport> LinkSession<T> {
    /// Disconnected session over `transport`.
    ///
    /// `max_block` is clamped to what the frame format can carry.
    pub fn new(transport: T, mut config: LinkConfig) -> Self {
        config.max_block = config.max_block.min(MAX_BLOCK);
        Self {
            transport,
            config,
            state: LinkState::Disconnected,
            seq_tx: 0,
            metrics: LinkMetrics::new(),
            rx_sequence: SequenceTracker::new(),
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    /// Sequence number the next sent frame will carry.
    pub fn next_seq(&self) -> u8 {
        self.seq_tx
    }

    pub fn metrics(&self) -> &LinkMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Open the transport and start a fresh connection.
    ///
    /// # Errors
    /// `Error::Open` with the transport's failure; the session stays disconnected.
    pub fn connect(&mut self, debug: bool) -> Result<()> {
        if let Err(err) = self.transport.open(&self.config.line) {
            self.state = LinkState::Disconnected;
            tracing::error!(code = err.code(), "failed to connect: {err}");
            return Err(Error::Open(err));
        }

        self.state = LinkState::Connected;
        self.seq_tx = 0;
        self.metrics.reset();
        self.rx_sequence.reset();
        if debug {
            tracing::info!("connected");
        }
        Ok(())
    }

    /// Close the transport and report the counters for the connection.
    ///
    /// # Errors
    /// `Error::Close` with the transport's failure; the session is
    /// disconnected regardless.
    pub fn disconnect(&mut self, debug: bool) -> Result<LinkMetrics> {
        let closed = self.transport.close();
        self.state = LinkState::Disconnected;

        if let Err(err) = closed {
            tracing::error!(code = err.code(), "failed to disconnect: {err}");
            return Err(Error::Close(err));
        }

        if debug {
            tracing::info!(
                frames_sent = self.metrics.frames_sent,
                good_frames = self.metrics.good_frames,
                bad_frames = self.metrics.bad_frames,
                timeouts = self.metrics.timeouts,
                "disconnected"
            );
        }
        Ok(self.metrics.clone())
    }

    /// Send one block in a data frame.
    ///
    /// # Errors
    /// - `Error::NotConnected` before `connect`
    /// - `Error::BlockTooLarge` if `data` exceeds the maximum block size
    /// - `Error::ShortWrite` / `Error::Send` if the transport does not take the whole frame
    pub fn send_block(&mut self, data: &[u8], debug: bool) -> Result<()> {
        if !self.is_connected() {
            tracing::warn!("attempt to send while not connected");
            return Err(Error::NotConnected);
        }

        if data.len() > self.config.max_block {
            tracing::warn!(
                size = data.len(),
                max = self.config.max_block,
                "block too large to send"
            );
            return Err(Error::BlockTooLarge {
                size: data.len(),
                max: self.config.max_block,
            });
        }

        let seq = self.seq_tx;
        let frame = framing::build_frame(data, seq)?;

        let written = self.transport.write(&frame).map_err(|err| {
            tracing::warn!(seq, "block failed to send: {err}");
            Error::Send(err)
        })?;
        if written != frame.len() {
            tracing::warn!(seq, written, expected = frame.len(), "block failed to send");
            return Err(Error::ShortWrite {
                seq,
                written,
                expected: frame.len(),
            });
        }

        if debug {
            tracing::info!(frame_len = frame.len(), seq, "sent frame");
        }

        self.metrics.frames_sent += 1;
        self.metrics.bytes_sent += data.len() as u64;
        self.seq_tx = framing::next_seq(seq);
        Ok(())
    }

    /// Wait for one frame and extract its block into `buf`.
    ///
    /// The payload is truncated to `buf.len()`. A frame that fails validation
    /// is not an error: the first [`BAD_FRAME_LEN`] bytes of `buf` are set to
    /// [`SENTINEL_BYTE`] and [`Received::BadFrame`] is returned.
    ///
    /// # Errors
    /// - `Error::NotConnected` before `connect`
    /// - `Error::Timeout` if no complete frame arrives within `rx_wait`
    /// - `Error::Receive` if the transport fails
    pub fn receive_block(&mut self, buf: &mut [u8], debug: bool) -> Result<Received> {
        if !self.is_connected() {
            tracing::warn!("attempt to receive while not connected");
            return Err(Error::NotConnected);
        }

        let deadline = Deadline::after(self.config.rx_wait);
        let frame = match read_frame(&mut self.transport, &deadline) {
            Ok(frame) => frame,
            Err(err @ Error::Timeout { .. }) => {
                self.metrics.timeouts += 1;
                tracing::warn!("timeout trying to receive frame");
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        if debug {
            tracing::info!(frame_len = frame.len(), "got frame");
        }

        if !framing::validate_frame(&frame) {
            self.metrics.bad_frames += 1;
            tracing::warn!("bad frame received\n{}", framing::frame_dump(&frame));

            let len = BAD_FRAME_LEN.min(buf.len());
            buf[..len].fill(SENTINEL_BYTE);
            return Ok(Received::BadFrame { len });
        }

        self.metrics.good_frames += 1;
        let block = framing::extract_frame(&frame, buf.len());
        let len = block.payload.len();
        buf[..len].copy_from_slice(&block.payload);
        self.metrics.bytes_received += len as u64;

        match self.rx_sequence.track(block.seq) {
            SeqEvent::InOrder => {}
            SeqEvent::Repeat => {
                self.metrics.sequence_repeats += 1;
                tracing::debug!(seq = block.seq, "repeated sequence number");
            }
            SeqEvent::Gap { missed } => {
                self.metrics.sequence_gaps += 1;
                tracing::debug!(seq = block.seq, missed, "sequence gap");
            }
        }

        if debug {
            tracing::info!(seq = block.seq, len, "received block");
        }
        Ok(Received::Block {
            len,
            seq: block.seq,
        })
    }

    /// Send an acknowledgment. Detect-only links never acknowledge, so this
    /// does nothing.
    pub fn send_ack(&mut self, kind: AckKind, seq: u8, debug: bool) -> Result<()> {
        if debug {
            tracing::debug!(?kind, seq, "acknowledgment not sent (detect-only link)");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::SimulatedChannel;
    use crate::error::ChannelError;
    use crate::framing::build_frame;

    fn fast_config(seed: u64) -> LinkConfig {
        LinkConfig {
            line: LineConfig::noiseless(seed).with_rx_timeout(2, 1),
            rx_wait: Duration::from_millis(200),
            max_block: MAX_BLOCK,
        }
    }

    fn connected(seed: u64) -> LinkSession<SimulatedChannel> {
        let mut session = LinkSession::new(SimulatedChannel::new(), fast_config(seed));
        session.connect(false).unwrap();
        session
    }

    /// Transport whose open always fails with a given code.
    struct Unplugged {
        code: i32,
        writes: usize,
    }

    impl Transport for Unplugged {
        fn open(&mut self, config: &LineConfig) -> std::result::Result<(), ChannelError> {
            Err(ChannelError::OpenFailed {
                port: config.port,
                code: self.code,
            })
        }

        fn close(&mut self) -> std::result::Result<(), ChannelError> {
            Err(ChannelError::CloseFailed { code: self.code })
        }

        fn write(&mut self, bytes: &[u8]) -> std::result::Result<usize, ChannelError> {
            self.writes += 1;
            Ok(bytes.len())
        }

        fn read(&mut self, _buf: &mut [u8]) -> std::result::Result<usize, ChannelError> {
            Ok(0)
        }
    }

    #[test]
    fn test_starts_disconnected() {
        let session = LinkSession::new(SimulatedChannel::new(), fast_config(1));
        assert_eq!(session.state(), LinkState::Disconnected);
        assert_eq!(session.next_seq(), 0);
    }

    #[test]
    fn test_send_before_connect() {
        let mut session = LinkSession::new(SimulatedChannel::new(), fast_config(1));
        let err = session.send_block(b"data", false).unwrap_err();

        assert!(matches!(err, Error::NotConnected));
        assert_eq!(err.status_code(), -10);
        assert_eq!(session.transport().write_pos(), 0);
        assert_eq!(session.transport().stats().bytes_written, 0);
    }

    #[test]
    fn test_receive_before_connect() {
        let mut session = LinkSession::new(SimulatedChannel::new(), fast_config(1));
        let mut buf = [0u8; 16];
        let err = session.receive_block(&mut buf, false).unwrap_err();

        assert!(matches!(err, Error::NotConnected));
        assert_eq!(session.transport().stats().empty_polls, 0);
        assert_eq!(buf, [0u8; 16]);
    }

    #[test]
    fn test_oversized_block_rejected() {
        let mut session = connected(2);
        let err = session.send_block(&[0u8; MAX_BLOCK + 1], false).unwrap_err();

        assert_eq!(err.status_code(), -11);
        assert_eq!(session.transport().write_pos(), 0);
        assert_eq!(session.metrics().frames_sent, 0);
        assert_eq!(session.next_seq(), 0);
    }

    #[test]
    fn test_configured_block_limit() {
        let mut config = fast_config(2);
        config.max_block = 8;
        let mut session = LinkSession::new(SimulatedChannel::new(), config);
        session.connect(false).unwrap();

        assert!(session.send_block(&[1u8; 8], false).is_ok());
        assert!(matches!(
            session.send_block(&[1u8; 9], false),
            Err(Error::BlockTooLarge { size: 9, max: 8 })
        ));
    }

    #[test]
    fn test_connect_failure_reports_negated_code() {
        let mut session = LinkSession::new(Unplugged { code: 3, writes: 0 }, fast_config(1));
        let err = session.connect(false).unwrap_err();

        assert_eq!(err.status_code(), -3);
        assert_eq!(session.state(), LinkState::Disconnected);

        assert!(matches!(session.send_block(b"x", false), Err(Error::NotConnected)));
        assert_eq!(session.transport().writes, 0);
    }

    #[test]
    fn test_disconnect_always_ends_disconnected() {
        let mut session = LinkSession::new(Unplugged { code: 4, writes: 0 }, fast_config(1));
        let err = session.disconnect(false).unwrap_err();
        assert_eq!(err.status_code(), -4);
        assert_eq!(session.state(), LinkState::Disconnected);
    }

    #[test]
    fn test_round_trip_50_bytes() {
        let mut session = connected(3);
        let payload: Vec<u8> = (0..50u8).collect();

        session.send_block(&payload, true).unwrap();

        let mut buf = [0u8; 52];
        let received = session.receive_block(&mut buf, true).unwrap();
        assert_eq!(received, Received::Block { len: 50, seq: 0 });
        assert_eq!(&buf[..50], &payload[..]);

        let metrics = session.disconnect(true).unwrap();
        assert_eq!(metrics.frames_sent, 1);
        assert_eq!(metrics.good_frames, 1);
        assert_eq!(metrics.bad_frames, 0);
    }

    #[test]
    fn test_receive_truncates_to_buffer() {
        let mut session = connected(4);
        session.send_block(b"0123456789", false).unwrap();

        let mut buf = [0u8; 4];
        let received = session.receive_block(&mut buf, false).unwrap();
        assert_eq!(received.len(), 4);
        assert_eq!(&buf, b"0123");
    }

    #[test]
    fn test_sequence_wraps_after_16_sends() {
        let mut session = connected(5);
        let mut buf = [0u8; 16];

        for expected in 0..16u8 {
            assert_eq!(session.next_seq(), expected);
            session.send_block(b"tick", false).unwrap();
            let received = session.receive_block(&mut buf, false).unwrap();
            assert_eq!(received, Received::Block { len: 4, seq: expected });
        }

        assert_eq!(session.next_seq(), 0);
        assert_eq!(session.metrics().frames_sent, 16);
        assert_eq!(session.metrics().sequence_gaps, 0);
    }

    #[test]
    fn test_connect_resets_sequence_and_counters() {
        let mut session = connected(6);
        session.send_block(b"a", false).unwrap();
        session.send_block(b"b", false).unwrap();
        assert_eq!(session.next_seq(), 2);

        session.disconnect(false).unwrap();
        session.connect(false).unwrap();
        assert_eq!(session.next_seq(), 0);
        assert_eq!(session.metrics().frames_sent, 0);
    }

    #[test]
    fn test_bad_frame_returns_sentinel() {
        let mut session = connected(7);

        // Damaged checksum written straight onto the line
        let mut frame = build_frame(b"damaged block", 0).unwrap();
        let checksum_pos = frame.len() - 2;
        frame[checksum_pos] ^= 0x10;
        session.transport_mut().write(&frame).unwrap();

        let mut buf = [0u8; 20];
        let received = session.receive_block(&mut buf, false).unwrap();

        assert_eq!(received, Received::BadFrame { len: 10 });
        assert!(received.is_bad_frame());
        assert_eq!(&buf[..10], &[b'#'; 10]);
        assert_eq!(&buf[10..], &[0u8; 10]);
        assert_eq!(session.metrics().bad_frames, 1);
        assert_eq!(session.metrics().good_frames, 0);
    }

    #[test]
    fn test_timeout_counts() {
        let mut config = fast_config(8);
        config.rx_wait = Duration::ZERO;
        let mut session = LinkSession::new(SimulatedChannel::new(), config);
        session.connect(false).unwrap();

        let mut buf = [0u8; 8];
        let err = session.receive_block(&mut buf, false).unwrap_err();
        assert_eq!(err.status_code(), -5);
        assert_eq!(session.metrics().timeouts, 1);
    }

    #[test]
    fn test_send_ack_is_a_no_op() {
        let mut session = connected(9);
        session.send_ack(AckKind::Positive, 3, true).unwrap();
        assert_eq!(session.transport().write_pos(), 0);
    }

    #[test]
    fn test_short_write_is_a_send_failure() {
        let mut session = LinkSession::new(SimulatedChannel::with_capacity(30), fast_config(10));
        session.connect(false).unwrap();

        let err = session.send_block(&[7u8; 40], false).unwrap_err();
        assert!(matches!(err, Error::ShortWrite { seq: 0, expected: 45, .. }));
        assert_eq!(err.status_code(), -12);
        assert_eq!(session.next_seq(), 0);
        assert_eq!(session.metrics().frames_sent, 0);
    }
}
