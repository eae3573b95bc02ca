//! linksim: push a file through the detect-only link layer over a simulated
//! noisy serial line and write whatever arrives to an output file.

mod config;
mod input_gen;
mod logging;
mod transfer;

use clap::Parser;
use config::{Args, Config};
use linksim_core::{LinkSession, SimulatedChannel};
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read};
use std::process::ExitCode;

fn main() -> ExitCode {
    let config = match Config::from_args(Args::parse()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(2);
        }
    };

    logging::init_logging(config.log_format, config.log_level, config.debug);

    if config.print_config {
        config.print();
    }

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config) -> linksim_core::Result<()> {
    let input: Box<dyn Read> = match &config.input_file {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => {
            tracing::info!(
                seed = config.seed,
                bytes = config.sample_bytes,
                "generating sample input"
            );
            Box::new(Cursor::new(input_gen::generate_sample_data(
                config.seed,
                config.sample_bytes,
            )))
        }
    };
    let output = BufWriter::new(File::create(&config.output_file)?);

    let mut session = LinkSession::new(SimulatedChannel::new(), config.link);
    session.connect(config.debug)?;

    let report = transfer::transfer(&mut session, input, output, config.block_size, config.debug);
    let metrics = session.disconnect(config.debug)?;
    let report = report?;

    report.print();
    println!();
    println!("{}", metrics.summary());
    if config.debug {
        println!();
        print!("{}", metrics.export_text());
        let line = session.transport().stats();
        println!(
            "line: {} bytes written ({} noise), {} corrupted, {} read, {} empty polls",
            line.bytes_written, line.noise_bytes, line.bytes_corrupted, line.bytes_read, line.empty_polls
        );
    }

    Ok(())
}
