//! Event field extraction.
//!
//! # Responsibilities
//! - Copy request data onto an event under the stable field names
//! - Record response outcome (status, size, duration)
//!
//! # Design Decisions
//! - Absent request data is simply omitted, never an error
//! - Duration is fractional milliseconds so sub-millisecond calls stay visible

use std::any::Any;
use std::time::Duration;

use axum::http::{HeaderName, StatusCode};

use crate::config::InstrumentConfig;
use crate::event::fields;
use crate::event::TelemetryEvent;
use crate::http::request::RequestContext;

/// Which request data ends up on events.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentOptions {
    /// Added to every event as `handler.name`.
    pub handler_name: Option<String>,
    /// Headers recorded as `request.header.<name>` when present.
    pub capture_headers: Vec<HeaderName>,
    /// Record the query string as `request.query`.
    pub include_query: bool,
}

impl Default for InstrumentOptions {
    fn default() -> Self {
        Self {
            handler_name: None,
            capture_headers: vec![
                axum::http::header::USER_AGENT,
                HeaderName::from_static("x-forwarded-for"),
                HeaderName::from_static("x-forwarded-proto"),
            ],
            include_query: true,
        }
    }
}

impl From<&InstrumentConfig> for InstrumentOptions {
    fn from(config: &InstrumentConfig) -> Self {
        let capture_headers = config
            .capture_headers
            .iter()
            .filter_map(|name| match HeaderName::from_bytes(name.as_bytes()) {
                Ok(h) => Some(h),
                Err(_) => {
                    tracing::warn!(header = %name, "Ignoring invalid capture header");
                    None
                }
            })
            .collect();

        Self {
            handler_name: config.handler_name.clone(),
            capture_headers,
            include_query: config.include_query,
        }
    }
}

/// Add the request-side fields.
pub fn add_request_fields(
    event: &mut TelemetryEvent,
    req: &RequestContext,
    options: &InstrumentOptions,
) {
    event.add_field(fields::META_TYPE, fields::META_TYPE_HTTP_REQUEST);
    if let Some(name) = &options.handler_name {
        event.add_field(fields::HANDLER_NAME, name.as_str());
    }

    event.add_field(fields::REQUEST_METHOD, req.method().as_str());
    event.add_field(fields::REQUEST_PATH, req.path());
    event.add_field(fields::REQUEST_URL, req.uri().to_string());
    event.add_field(fields::REQUEST_HTTP_VERSION, format!("{:?}", req.version()));

    if options.include_query {
        if let Some(query) = req.query() {
            event.add_field(fields::REQUEST_QUERY, query);
        }
    }
    if let Some(host) = req.host() {
        event.add_field(fields::REQUEST_HOST, host);
    }
    if let Some(len) = req.content_length() {
        event.add_field(fields::REQUEST_CONTENT_LENGTH, len);
    }
    if let Some(addr) = req.remote_addr() {
        event.add_field(fields::REQUEST_REMOTE_ADDR, addr.to_string());
    }
    if let Some(id) = req.request_id() {
        event.add_field(fields::REQUEST_ID, id);
    }

    for name in &options.capture_headers {
        if let Some(value) = req.header(name.as_str()) {
            event.add_field(fields::header_field(name.as_str()), value);
        }
    }
}

/// Add the response outcome.
pub fn add_response_fields(
    event: &mut TelemetryEvent,
    status: StatusCode,
    size: u64,
    elapsed: Duration,
) {
    event.add_field(fields::RESPONSE_STATUS_CODE, status.as_u16());
    event.add_field(fields::RESPONSE_SIZE, size);
    event.add_field(fields::DURATION_MS, elapsed.as_secs_f64() * 1000.0);
}

/// Mark the event as describing a handler that panicked.
pub fn add_panic_fields(event: &mut TelemetryEvent, payload: &(dyn Any + Send)) {
    event.add_field(fields::HANDLER_PANICKED, true);
    event.add_field(fields::HANDLER_PANIC_MESSAGE, panic_message(payload));
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
