//! # Structured Logging
//!
//! Sets up the `tracing` subscriber: pretty or JSON lines, filtered by
//! `RUST_LOG` when present. Everything goes to stderr so stdout only
//! carries command output.

use clap::ValueEnum;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable output for interactive use.
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Installs the global subscriber. Call once, early in `main()`.
///
/// `default_level` applies when `RUST_LOG` is unset, e.g. `"warn"` or
/// `"fhevault_protocol=debug"`.
pub fn init_logging(default_level: &str, format: LogFormat) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_thread_ids(false),
                )
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_target(true),
                )
                .init();
        }
    }

    tracing::debug!(?format, "logging initialized");
}
