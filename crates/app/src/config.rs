//! Configuration for the linksim test bench.
//!
//! Handles parsing command-line arguments and resolving defaults (the seed is
//! time-based unless given, and always printed so runs are reproducible).
//!
//! # Philosophy
//!
//! The tool should work with ZERO arguments: it generates a sample input,
//! pushes it through the simulated line with the stock error rate and writes
//! what arrived to `output.txt`.

use crate::logging::{LogFormat, LogLevel};
use clap::Parser;
use linksim_core::{
    channel::DEFAULT_ERROR_PROBABILITY, framing::MAX_BLOCK, session::RX_WAIT, Error, LineConfig,
    LinkConfig, Result,
};
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(
    name = "linksim",
    version,
    about = "Send a file block by block through a simulated noisy serial link"
)]
pub struct Args {
    /// Input file (default: generate sample)
    #[arg(long = "in", value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Output file
    #[arg(long = "out", value_name = "PATH", default_value = "output.txt")]
    pub output: PathBuf,

    /// Data block size in bytes
    #[arg(long, default_value_t = 50)]
    pub block_size: usize,

    /// Size of the generated sample when no input file is given
    #[arg(long, default_value_t = 4096)]
    pub sample_bytes: usize,

    /// Random seed for determinism
    #[arg(long)]
    pub seed: Option<u64>,

    /// Per-bit error probability on the simulated line, 0.0-1.0
    #[arg(long, value_name = "RATE")]
    pub error_prob: Option<f64>,

    /// Disable simulated bit errors (same as --error-prob 0)
    #[arg(long, conflicts_with = "error_prob")]
    pub no_errors: bool,

    /// Receive timeout constant in ms
    #[arg(long, default_value_t = 1000)]
    pub timeout_const: u64,

    /// Receive timeout interval in ms
    #[arg(long, default_value_t = 50)]
    pub timeout_interval: u64,

    /// Overall wait for one frame in ms
    #[arg(long, value_name = "MS")]
    pub rx_wait: Option<u64>,

    /// Trace link-layer progress
    #[arg(long)]
    pub debug: bool,

    /// Print resolved configuration
    #[arg(long)]
    pub print_config: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Log verbosity
    #[arg(long, value_enum, default_value_t = LogLevel::Warn)]
    pub log_level: LogLevel,
}

/// Complete configuration for a transfer run.
#[derive(Debug, Clone)]
pub struct Config {
    // === Files ===
    /// Input file path (None = generate sample)
    pub input_file: Option<PathBuf>,

    /// Output file path
    pub output_file: PathBuf,

    /// Generated sample size in bytes
    pub sample_bytes: usize,

    // === Link ===
    /// Block size in bytes
    pub block_size: usize,

    /// Seed for the line and the sample generator
    pub seed: u64,

    /// Session and line parameters
    pub link: LinkConfig,

    // === Behavior ===
    /// Link-layer progress tracing
    pub debug: bool,

    /// Whether to print detailed config
    pub print_config: bool,

    pub log_format: LogFormat,
    pub log_level: LogLevel,
}

impl Config {
    /// Resolve parsed arguments into a configuration.
    pub fn from_args(args: Args) -> Result<Self> {
        if args.block_size == 0 || args.block_size > MAX_BLOCK {
            return Err(Error::Config(format!(
                "block size must be between 1 and {MAX_BLOCK}, got {}",
                args.block_size
            )));
        }

        let error_probability = if args.no_errors {
            0.0
        } else {
            args.error_prob.unwrap_or(DEFAULT_ERROR_PROBABILITY)
        };
        if !(0.0..=1.0).contains(&error_probability) {
            return Err(Error::Config(format!(
                "error probability must be within [0, 1], got {error_probability}"
            )));
        }

        // Determine seed (explicit or time-based)
        let seed = args.seed.unwrap_or_else(|| {
            use std::time::{SystemTime, UNIX_EPOCH};
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|t| t.as_millis() as u64)
                .unwrap_or_default()
        });

        let line = LineConfig {
            rx_timeout_const_ms: args.timeout_const,
            rx_timeout_interval_ms: args.timeout_interval,
            error_probability,
            seed: Some(seed),
            ..LineConfig::default()
        };

        let link = LinkConfig {
            line,
            rx_wait: args.rx_wait.map(Duration::from_millis).unwrap_or(RX_WAIT),
            max_block: args.block_size,
        };

        Ok(Config {
            input_file: args.input,
            output_file: args.output,
            sample_bytes: args.sample_bytes,
            block_size: args.block_size,
            seed,
            link,
            debug: args.debug,
            print_config: args.print_config,
            log_format: args.log_format,
            log_level: args.log_level,
        })
    }

    /// Print the configuration in human-readable form.
    pub fn print(&self) {
        let line = &self.link.line;
        println!("=== Configuration ===");
        match &self.input_file {
            Some(path) => println!("Input file:  {}", path.display()),
            None => println!("Input file:  (generate {} byte sample)", self.sample_bytes),
        }
        println!("Output file: {}", self.output_file.display());
        println!("Block size:  {} bytes", self.block_size);
        println!();
        println!("=== Simulated Line ===");
        println!("Seed: {}", self.seed);
        println!(
            "Port {}, {} bit/s, {} data bits, parity {:?}",
            line.port, line.bit_rate, line.data_bits, line.parity
        );
        println!(
            "Poll timeout: {} ms ({} + {})",
            line.rx_timeout().as_millis(),
            line.rx_timeout_const_ms,
            line.rx_timeout_interval_ms
        );
        println!("Error probability: {:e} per bit", line.error_probability);
        println!("Frame wait: {} ms", self.link.rx_wait.as_millis());
        println!();
    }
}
