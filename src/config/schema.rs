//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! instrumentation and its demo server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Listener configuration for the demo server.
    pub listener: ListenerConfig,

    /// Log output settings.
    pub logging: LoggingConfig,

    /// Which request data ends up on events.
    pub instrument: InstrumentConfig,

    /// Where events are submitted.
    pub sink: SinkConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    pub level: String,

    /// Pretty for development, JSON for machine parsing.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Instrumentation field configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct InstrumentConfig {
    /// Added to every event as `handler.name`.
    pub handler_name: Option<String>,

    /// Request headers copied onto events as `request.header.<name>`.
    pub capture_headers: Vec<String>,

    /// Record the raw query string as `request.query`.
    pub include_query: bool,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            handler_name: None,
            capture_headers: default_capture_headers(),
            include_query: true,
        }
    }
}

fn default_capture_headers() -> Vec<String> {
    vec![
        "user-agent".to_string(),
        "x-forwarded-for".to_string(),
        "x-forwarded-proto".to_string(),
    ]
}

/// Event sink selection.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// Structured `tracing` events.
    #[default]
    Tracing,
    /// One JSON object per line on stdout.
    JsonLines,
    /// Bounded channel drained by a background task.
    Channel,
    /// Drop everything.
    Discard,
}

/// Event sink configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SinkConfig {
    pub kind: SinkKind,

    /// Buffer size for the channel sink.
    pub channel_capacity: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::Tracing,
            channel_capacity: 1024,
        }
    }
}
