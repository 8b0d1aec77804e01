//! Structured Logging & Tracing
//!
//! Provides structured logging via the `tracing` crate with:
//! - Level-based filtering (TRACE/DEBUG/INFO/WARN/ERROR)
//! - Per-module filters rendered into an `EnvFilter`
//! - Per-operation spans tagged with the character, timed on drop
//! - Idempotent initialization (first call wins, `RUST_LOG` overrides)

use serde::{Deserialize, Serialize};
use std::sync::Once;
use std::time::{Duration, Instant};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Log level for the progression core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration for tracing initialization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    pub default_level: LogLevel,
    pub module_filters: Vec<(String, LogLevel)>,
    pub show_targets: bool,
    pub show_thread_ids: bool,
    pub show_file_line: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_level: LogLevel::Info,
            module_filters: vec![
                ("learnquest_core::persistence".to_string(), LogLevel::Warn),
                ("learnquest_core::skills".to_string(), LogLevel::Info),
                ("learnquest_core::difficulty".to_string(), LogLevel::Info),
                ("learnquest_core::engine".to_string(), LogLevel::Info),
            ],
            show_targets: true,
            show_thread_ids: false,
            show_file_line: false,
        }
    }
}

impl TracingConfig {
    pub fn to_env_filter_string(&self) -> String {
        let mut parts = vec![self.default_level.as_str().to_string()];
        for (module, level) in &self.module_filters {
            parts.push(format!("{}={}", module, level.as_str()));
        }
        parts.join(",")
    }
}

static TRACING_INIT: Once = Once::new();

/// Initialize tracing with default settings (idempotent)
pub fn init_tracing_default() {
    init_tracing(&TracingConfig::default());
}

/// Initialize tracing with custom config. Only the first call takes effect.
pub fn init_tracing(config: &TracingConfig) {
    let filter_str = config.to_env_filter_string();
    let config = config.clone();
    TRACING_INIT.call_once(move || {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(config.show_targets)
            .with_thread_ids(config.show_thread_ids)
            .with_file(config.show_file_line)
            .with_line_number(config.show_file_line)
            .compact();

        // A host application may already own the global subscriber
        let _ = subscriber.try_init();
    });
}

/// Guard around one engine operation. Enters an `operation` span tagged
/// with the operation and character, and logs the elapsed time when dropped.
pub struct TimingSpan {
    operation: &'static str,
    started: Instant,
    _span: tracing::span::EnteredSpan,
}

impl TimingSpan {
    pub fn new(operation: &'static str, character: &str) -> Self {
        let span = tracing::info_span!("operation", op = operation, character = character);
        Self {
            operation,
            started: Instant::now(),
            _span: span.entered(),
        }
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for TimingSpan {
    fn drop(&mut self) {
        debug!(
            op = self.operation,
            elapsed_us = self.started.elapsed().as_micros() as u64,
            "operation finished"
        );
    }
}
