//! Block-by-block file transfer over a connected link session.
//!
//! Each block is sent and then immediately received back from the same line.
//! Whatever the receive side hands over is written out, sentinel bytes from
//! damaged frames included, so the output file shows where the line hurt.
//! A failed send ends the transfer; a failed receive is counted and skipped.

use linksim_core::{framing::MAX_BLOCK, LinkSession, Received, Transport};
use std::io::{self, Read, Write};

/// Outcome of a transfer run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferReport {
    /// Bytes taken from the input
    pub bytes_read: u64,

    /// Bytes written to the output
    pub bytes_written: u64,

    /// Blocks handed to the link
    pub blocks_sent: u64,

    /// Receives that produced a bad-frame indication
    pub bad_blocks: u64,

    /// Receives that failed outright (timeouts and line errors)
    pub receive_errors: u64,

    /// False when a send failure cut the transfer short
    pub completed: bool,
}

impl TransferReport {
    pub fn print(&self) {
        println!("=== Transfer ===");
        println!("Read {} bytes from input", self.bytes_read);
        println!("Wrote {} bytes to output", self.bytes_written);
        println!(
            "{} blocks sent, {} bad, {} receive errors",
            self.blocks_sent, self.bad_blocks, self.receive_errors
        );
        if !self.completed {
            println!("Transfer stopped early after a send failure");
        }
    }
}

/// Run the transfer loop until the input is exhausted or a send fails.
///
/// `block_size` is clamped to 1..=MAX_BLOCK. I/O errors on the input or
/// output abort the run; link errors never do.
pub fn transfer<T, R, W>(
    session: &mut LinkSession<T>,
    mut input: R,
    mut output: W,
    block_size: usize,
    debug: bool,
) -> io::Result<TransferReport>
where
    T: Transport,
    R: Read,
    W: Write,
{
    let block_size = block_size.clamp(1, MAX_BLOCK);
    let mut block = vec![0u8; block_size];
    let mut rx_buf = vec![0u8; block_size + 2];
    let mut report = TransferReport::default();

    loop {
        let n = read_block(&mut input, &mut block)?;
        if n == 0 {
            report.completed = true;
            break;
        }
        report.bytes_read += n as u64;

        if let Err(e) = session.send_block(&block[..n], debug) {
            tracing::error!(code = e.status_code(), "send failed: {e}");
            break;
        }
        report.blocks_sent += 1;

        match session.receive_block(&mut rx_buf, debug) {
            Ok(received) => {
                if let Received::BadFrame { .. } = received {
                    report.bad_blocks += 1;
                }
                if received.is_empty() {
                    tracing::warn!("zero bytes received");
                }
                output.write_all(&rx_buf[..received.len()])?;
                report.bytes_written += received.len() as u64;
            }
            Err(e) => {
                tracing::warn!(code = e.status_code(), "receive failed: {e}");
                report.receive_errors += 1;
            }
        }
    }

    output.flush()?;
    Ok(report)
}

/// Fill `block` from `input`, short only at end of input.
fn read_block<R: Read>(input: &mut R, block: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < block.len() {
        match input.read(&mut block[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use linksim_core::{ChannelError, LineConfig, LinkConfig, SimulatedChannel};
    use std::time::Duration;

    fn clean_session(seed: u64) -> LinkSession<SimulatedChannel> {
        let line = LineConfig::noiseless(seed).with_rx_timeout(2, 0);
        let config = LinkConfig {
            rx_wait: Duration::from_millis(500),
            ..LinkConfig::with_line(line)
        };
        let mut session = LinkSession::new(SimulatedChannel::new(), config);
        session.connect(false).unwrap();
        session
    }

    /// Reader that hands out at most 3 bytes per call.
    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.0.len().min(buf.len()).min(3);
            buf[..n].copy_from_slice(&self.0[..n]);
            self.0 = &self.0[n..];
            Ok(n)
        }
    }

    /// Line whose writes always fail.
    struct DeadLine;

    impl Transport for DeadLine {
        fn open(&mut self, _config: &LineConfig) -> Result<(), ChannelError> {
            Ok(())
        }

        fn close(&mut self) -> Result<(), ChannelError> {
            Ok(())
        }

        fn write(&mut self, _data: &[u8]) -> Result<usize, ChannelError> {
            Err(ChannelError::NotOpen)
        }

        fn read(&mut self, _buf: &mut [u8]) -> Result<usize, ChannelError> {
            Err(ChannelError::NotOpen)
        }
    }

    #[test]
    fn test_clean_transfer_is_identical() {
        let input: Vec<u8> = (0..1000u32).map(|i| (i % 256) as u8).collect();
        let mut session = clean_session(1);
        let mut output = Vec::new();

        let report = transfer(&mut session, &input[..], &mut output, 50, false).unwrap();

        assert_eq!(output, input);
        assert!(report.completed);
        assert_eq!(report.blocks_sent, 20);
        assert_eq!(report.bytes_read, 1000);
        assert_eq!(report.bytes_written, 1000);
        assert_eq!(report.bad_blocks, 0);
        assert_eq!(report.receive_errors, 0);
    }

    #[test]
    fn test_short_reads_still_fill_blocks() {
        let input = b"a block-oriented reader must not send tiny frames".to_vec();
        let mut session = clean_session(2);
        let mut output = Vec::new();

        let report = transfer(&mut session, Trickle(&input), &mut output, 16, false).unwrap();

        assert_eq!(output, input);
        assert_eq!(report.blocks_sent, input.len().div_ceil(16) as u64);
    }

    #[test]
    fn test_empty_input() {
        let mut session = clean_session(3);
        let mut output = Vec::new();

        let report = transfer(&mut session, io::empty(), &mut output, 50, false).unwrap();

        assert!(report.completed);
        assert_eq!(report.blocks_sent, 0);
        assert!(output.is_empty());
    }

    #[test]
    fn test_send_failure_stops_transfer() {
        let mut session = LinkSession::new(DeadLine, LinkConfig::default());
        session.connect(false).unwrap();
        let mut output = Vec::new();

        let report = transfer(&mut session, &[1u8; 200][..], &mut output, 50, false).unwrap();

        assert!(!report.completed);
        assert_eq!(report.blocks_sent, 0);
        assert_eq!(report.bytes_read, 50);
        assert!(output.is_empty());
    }

    #[test]
    fn test_oversized_block_size_is_clamped() {
        let input = vec![9u8; 600];
        let mut session = clean_session(4);
        let mut output = Vec::new();

        let report = transfer(&mut session, &input[..], &mut output, 1000, false).unwrap();

        assert_eq!(output, input);
        assert_eq!(report.blocks_sent, 3);
    }
}
