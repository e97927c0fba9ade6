//! Operational counters for the instrumentation itself.
//!
//! # Responsibilities
//! - Name the counters the crate reports
//! - Record through the `metrics` facade
//!
//! # Metrics
//! - `http_telemetry_events_dropped_total` (counter): telemetry events a sink
//!   could not hand off, by `reason` (`full`, `closed`)
//!
//! # Design Decisions
//! - Only the facade; installing an exporter is up to the host application
//! - Without an installed recorder every call is a no-op

/// Telemetry events dropped by a sink.
pub const EVENTS_DROPPED_TOTAL: &str = "http_telemetry_events_dropped_total";

/// Count one event a sink dropped.
pub fn record_event_dropped(reason: &'static str) {
    metrics::counter!(EVENTS_DROPPED_TOTAL, "reason" => reason).increment(1);
}
