//! Diagnostic output setup.
//!
//! The link layer reports through `tracing`; this installs a stderr
//! subscriber so those events are visible next to the bench's own report on
//! stdout.

use clap::ValueEnum;
use tracing::level_filters::LevelFilter;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Effective level: `--debug` traces link progress, which is logged at info.
pub fn effective_level(level: LogLevel, debug: bool) -> LevelFilter {
    let filter = level.as_filter();
    if debug {
        filter.max(LevelFilter::INFO)
    } else {
        filter
    }
}

pub fn init_logging(format: LogFormat, level: LogLevel, debug: bool) {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(effective_level(level, debug))
        .with_ansi(false)
        .with_target(false);

    // A second init (tests) keeps the first subscriber
    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}
