//! Tracing setup and small helpers for log fields.
//!
//! - `RUST_LOG` overrides the configured level
//! - JSON or pretty output
//! - optional rolling log file

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::TelemetrySettings;

/// Transaction ids and block hashes are cut to this many characters in log fields.
pub const LOG_HASH_LEN: usize = 16;

/// Install the global subscriber.
///
/// When logging to a file the returned guard must be held for the life of the
/// process, otherwise buffered lines are lost on exit.
pub fn init_tracing(
    settings: &TelemetrySettings,
) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    let json = settings.log_format == "json";

    let Some(log_file) = settings.log_file.as_deref() else {
        let registry = tracing_subscriber::registry().with(env_filter);
        if json {
            registry
                .with(fmt::layer().json().with_current_span(true).with_span_list(true))
                .try_init()?;
        } else {
            registry
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_file(true)
                        .with_line_number(true),
                )
                .try_init()?;
        }
        return Ok(None);
    };

    let path = Path::new(log_file);
    let directory = path
        .parent()
        .ok_or("invalid log file path: no parent directory")?;
    let file_name = path
        .file_name()
        .ok_or("invalid log file path: no file name")?;
    let prefix = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or("invalid log file path: no file name")?;

    let appender = match settings.rotation.as_str() {
        "hourly" => rolling::hourly(directory, prefix),
        "never" => rolling::never(directory, file_name),
        _ => rolling::daily(directory, prefix),
    };
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(writer),
            )
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_file(true)
                    .with_line_number(true)
                    .with_writer(writer),
            )
            .try_init()?;
    }

    Ok(Some(guard))
}

/// "0a1b2c3d4e5f67890a1b" → "0a1b2c3d4e5f6789..."
pub fn truncate_hex(hex: &str, len: usize) -> String {
    match hex.get(..len) {
        Some(prefix) if hex.len() > len => format!("{}...", prefix),
        _ => hex.to_string(),
    }
}

pub fn truncate_txid(txid: &str) -> String {
    truncate_hex(txid, LOG_HASH_LEN)
}

/// Scan progress is reported on every `interval`-th height and on the last height of a pass.
pub fn is_progress_block(height: u64, end: u64, interval: u64) -> bool {
    height == end || (interval > 0 && height % interval == 0)
}
