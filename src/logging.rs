//! # Structured Logging Module
//!
//! Environment-aware structured logging for the standby processor and the
//! indexer. Console output is always on; a JSON file layer is added when
//! `WAYPOINT_LOG_DIR` is set, so long-running soak tests keep a queryable
//! trail of discard and reconciliation decisions.

use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging once per process.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);

        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true)
            .with_ansi(true)
            .with_filter(EnvFilter::new(log_level.clone()));

        let registry = tracing_subscriber::registry().with(console_layer);

        if let Ok(dir) = std::env::var("WAYPOINT_LOG_DIR") {
            let log_dir = PathBuf::from(dir);
            if !log_dir.exists() {
                let _ = fs::create_dir_all(&log_dir);
            }
            let filename = format!("{}.{}.log", environment, process::id());
            let file_appender = tracing_appender::rolling::never(&log_dir, filename);
            let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

            let file_layer = fmt::layer()
                .with_writer(file_writer)
                .with_target(true)
                .with_ansi(false)
                .json()
                .with_filter(EnvFilter::new(log_level));

            if registry.with(file_layer).try_init().is_ok() {
                // Keep the flush guard alive for the process lifetime.
                std::mem::forget(guard);
            }
        } else if registry.try_init().is_err() {
            tracing::debug!("global tracing subscriber already initialized");
        }

        tracing::info!(
            environment = %environment,
            pid = process::id(),
            "structured logging initialized"
        );
    });
}

/// Get current environment from environment variables.
fn get_environment() -> String {
    std::env::var("WAYPOINT_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment.
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_mapping() {
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("development"), "debug");
        assert_eq!(get_log_level("test"), "debug");
    }
}
