//! Error types for the link layer.
//!
//! Every operation returns a structured error instead of panicking. The
//! link-layer contract also exposes legacy integer status codes, so the
//! top-level [`Error`] knows how to map itself onto them.

use thiserror::Error;

/// Status code: operation attempted while disconnected.
pub const STATUS_NOT_CONNECTED: i32 = -10;
/// Status code: block larger than the maximum block size.
pub const STATUS_BLOCK_TOO_LARGE: i32 = -11;
/// Status code: the transport did not accept the whole frame.
pub const STATUS_SEND_FAILED: i32 = -12;
/// Status code: the transport failed while receiving.
pub const STATUS_RECEIVE_FAILED: i32 = -9;
/// Status code: no complete frame arrived before the deadline.
pub const STATUS_TIMEOUT: i32 = -5;

/// Top-level error type for all link-layer operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Send or receive attempted while the session is disconnected
    #[error("link is not connected")]
    NotConnected,

    /// Block exceeds the maximum block size
    #[error("cannot send block of {size} bytes, max {max}")]
    BlockTooLarge { size: usize, max: usize },

    /// Transport accepted fewer bytes than the frame holds
    #[error("block {seq}: transport accepted {written} of {expected} frame bytes")]
    ShortWrite {
        seq: u8,
        written: usize,
        expected: usize,
    },

    /// No complete frame before the receive deadline
    #[error("timeout after {waited_ms}ms with {received} frame bytes received")]
    Timeout { received: usize, waited_ms: u64 },

    /// Transport could not be opened
    #[error("failed to open transport: {0}")]
    Open(#[source] ChannelError),

    /// Transport could not be closed
    #[error("failed to close transport: {0}")]
    Close(#[source] ChannelError),

    /// Transport failed while writing a frame
    #[error("transport failed while sending: {0}")]
    Send(#[source] ChannelError),

    /// Transport failed while acquiring a frame
    #[error("transport failed while receiving: {0}")]
    Receive(#[source] ChannelError),

    /// File I/O error (test bench only)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid line, session or test bench settings
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Legacy negative status code for this error.
    ///
    /// Open and close failures report the transport's own code negated.
    pub fn status_code(&self) -> i32 {
        match self {
            Error::NotConnected => STATUS_NOT_CONNECTED,
            Error::BlockTooLarge { .. } => STATUS_BLOCK_TOO_LARGE,
            Error::ShortWrite { .. } | Error::Send(_) => STATUS_SEND_FAILED,
            Error::Timeout { .. } => STATUS_TIMEOUT,
            Error::Receive(_) => STATUS_RECEIVE_FAILED,
            Error::Open(err) | Error::Close(err) => -err.code(),
            Error::Io(_) | Error::Config(_) => -1,
        }
    }
}

/// Reasons a received frame is rejected, in the order they are checked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame too short: need at least {required} bytes, got {actual}")]
    TooShort { required: usize, actual: usize },

    #[error("bad start marker: got {found}")]
    BadStartMarker { found: u8 },

    #[error("bad end marker: got {found}")]
    BadEndMarker { found: u8 },

    #[error("byte count mismatch: header says {declared}, got {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("checksum failed: residue {residue}")]
    ChecksumMismatch { residue: u8 },

    #[error("unknown acknowledgment type {found}")]
    UnknownAckType { found: u8 },
}

/// Transport (physical layer) failures.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Port could not be opened or configured
    #[error("port {port} could not be opened (code {code})")]
    OpenFailed { port: u32, code: i32 },

    /// Port could not be closed
    #[error("port could not be closed (code {code})")]
    CloseFailed { code: i32 },

    /// Read or write attempted on a closed port
    #[error("port is not open")]
    NotOpen,
}

impl ChannelError {
    /// Positive failure code reported by the transport.
    pub fn code(&self) -> i32 {
        match self {
            ChannelError::OpenFailed { code, .. } | ChannelError::CloseFailed { code } => *code,
            ChannelError::NotOpen => 1,
        }
    }
}

/// Type alias for Result with our Error type
pub type Result<T> = std::result::Result<T, Error>;
