//! Event pipeline boundary.
//!
//! # Responsibilities
//! - Define the `EventSink` trait the instrumentation submits to
//! - Provide sinks for structured logs, JSON lines, async channels and tests
//! - Build the configured sink at startup
//!
//! # Design Decisions
//! - Submission is fire-and-forget: nothing is returned to the request path
//! - Sinks are shared across concurrent requests, so they are `Send + Sync`
//! - Delivery, batching and retry belong to whatever sits behind the sink

use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::config::{SinkConfig, SinkKind};
use crate::event::{fields, TelemetryEvent};
use crate::observability::metrics;

/// Receiver of telemetry events.
pub trait EventSink: Send + Sync + fmt::Debug {
    /// Hand one event to the pipeline. Must not block for long or panic.
    fn submit(&self, event: TelemetryEvent);
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn submit(&self, event: TelemetryEvent) {
        (**self).submit(event)
    }
}

impl<T: EventSink + ?Sized> EventSink for Box<T> {
    fn submit(&self, event: TelemetryEvent) {
        (**self).submit(event)
    }
}

/// Emits every event as a structured `tracing` event on the
/// `http_telemetry::event` target.
#[derive(Debug, Clone, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn submit(&self, event: TelemetryEvent) {
        let status = event
            .get(fields::RESPONSE_STATUS_CODE)
            .and_then(|v| v.as_i64())
            .unwrap_or_default();
        let size = event
            .get(fields::RESPONSE_SIZE)
            .and_then(|v| v.as_i64())
            .unwrap_or_default();
        let duration_ms = event
            .get(fields::DURATION_MS)
            .and_then(|v| v.as_f64())
            .unwrap_or_default();
        let method = event
            .get(fields::REQUEST_METHOD)
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        let path = event
            .get(fields::REQUEST_PATH)
            .and_then(|v| v.as_str())
            .unwrap_or("-");

        tracing::info!(
            target: "http_telemetry::event",
            method = %method,
            path = %path,
            status_code = status,
            size = size,
            duration_ms = duration_ms,
            event = %event.to_json(),
            "request completed"
        );
    }
}

/// Writes each event as one JSON line.
pub struct JsonLinesSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonLinesSink {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    fn write_line(&self, event: &TelemetryEvent) -> io::Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        serde_json::to_writer(&mut *writer, event)?;
        writer.write_all(b"\n")?;
        writer.flush()
    }
}

impl fmt::Debug for JsonLinesSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonLinesSink").finish_non_exhaustive()
    }
}

impl EventSink for JsonLinesSink {
    fn submit(&self, event: TelemetryEvent) {
        if let Err(e) = self.write_line(&event) {
            tracing::warn!(error = %e, "Failed to write telemetry event");
        }
    }
}

/// Hands events to an async consumer over a bounded channel.
///
/// A full or closed channel drops the event; the request path never waits.
/// Drops are counted locally and as `http_telemetry_events_dropped_total`.
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::Sender<TelemetryEvent>,
    dropped: AtomicU64,
}

impl ChannelSink {
    /// Create a sink and the receiving end of its channel.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<TelemetryEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx,
                dropped: AtomicU64::new(0),
            },
            rx,
        )
    }

    /// Number of events dropped so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn record_drop(&self, reason: &'static str) -> u64 {
        metrics::record_event_dropped(reason);
        self.dropped.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl EventSink for ChannelSink {
    fn submit(&self, event: TelemetryEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                let dropped = self.record_drop("full");
                tracing::warn!(dropped, "Event channel full, dropping telemetry event");
            }
            Err(TrySendError::Closed(_)) => {
                let dropped = self.record_drop("closed");
                tracing::warn!(dropped, "Event channel closed, dropping telemetry event");
            }
        }
    }
}

/// Keeps every submitted event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events submitted so far, in submission order.
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove and return all captured events.
    pub fn take(&self) -> Vec<TelemetryEvent> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<TelemetryEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventSink for MemorySink {
    fn submit(&self, event: TelemetryEvent) {
        self.lock().push(event);
    }
}

/// Drops every event.
#[derive(Debug, Clone, Default)]
pub struct DiscardSink;

impl EventSink for DiscardSink {
    fn submit(&self, _event: TelemetryEvent) {}
}

/// Build the sink described by the configuration.
///
/// The channel kind spawns a drain task on the current Tokio runtime that
/// forwards events to a [`TracingSink`]; without a runtime it falls back to
/// a plain `TracingSink`.
pub fn build_sink(config: &SinkConfig) -> Arc<dyn EventSink> {
    match config.kind {
        SinkKind::Tracing => Arc::new(TracingSink),
        SinkKind::JsonLines => Arc::new(JsonLinesSink::stdout()),
        SinkKind::Discard => Arc::new(DiscardSink),
        SinkKind::Channel => match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let (sink, mut rx) = ChannelSink::new(config.channel_capacity);
                handle.spawn(async move {
                    let downstream = TracingSink;
                    while let Some(event) = rx.recv().await {
                        downstream.submit(event);
                    }
                    tracing::debug!("Event channel drained");
                });
                Arc::new(sink)
            }
            Err(_) => {
                tracing::warn!("No Tokio runtime for channel sink, using tracing sink");
                Arc::new(TracingSink)
            }
        },
    }
}
