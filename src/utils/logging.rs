//! Structured logging setup.
//!
//! The library only emits `tracing` events; binaries and tests that want to see
//! them call [`init_logging`] once at startup.

use crate::config::LoggingConfig;
use crate::error::{EnvelopeError, Result};
use std::fs::OpenOptions;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Install a global `tracing` subscriber for `config`.
///
/// `RUST_LOG` takes precedence over the configured level. Console and file
/// output are independent layers, so both can be enabled at once.
///
/// # Errors
/// `ConfigError` if `config` fails validation, the log file cannot be opened,
/// or a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let errors = config.validate();
    if !errors.is_empty() {
        return Err(EnvelopeError::ConfigError(format!(
            "Invalid logging configuration: {}",
            errors.join("; ")
        )));
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str().to_ascii_lowercase()));

    let console = config.log_to_console.then(|| {
        if config.json_format {
            fmt::layer().json().with_target(true).boxed()
        } else {
            fmt::layer().with_target(true).boxed()
        }
    });

    let file = match config.log_file_path.as_deref() {
        Some(path) if config.log_to_file => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| EnvelopeError::ConfigError(format!("Failed to open log file: {e}")))?;
            let writer = Arc::new(file);
            Some(if config.json_format {
                fmt::layer().json().with_writer(writer).boxed()
            } else {
                fmt::layer().with_ansi(false).with_writer(writer).boxed()
            })
        }
        _ => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| EnvelopeError::ConfigError(format!("Failed to install logger: {e}")))?;

    tracing::info!(
        app = %config.app_name,
        console = config.log_to_console,
        file = config.log_to_file,
        "Logging initialized"
    );
    Ok(())
}
