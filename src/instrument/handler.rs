//! Handler instrumentation.
//!
//! # Responsibilities
//! - Bracket each handler call with one event
//! - Substitute a `ResponseRecorder` for the real writer
//! - Submit the event once the handler has fully returned
//!
//! # Design Decisions
//! - Functions and dispatchers share one path: both are `Handler`s, and
//!   `wrap_handler_fn` only lifts the function first
//! - A writer that is already recording means an outer layer emits the
//!   event, so nested instrumentation passes straight through
//! - A panicking handler still produces a best-effort event, then the panic
//!   resumes. Unless the writer already committed output to the client, the
//!   event reports the bare `500` the transport answers with instead

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use axum::http::StatusCode;

use crate::event::{fields as field_names, EventSink, TelemetryEvent};
use crate::http::handler::{handler_fn, Handler, HandlerFn};
use crate::http::recorder::ResponseRecorder;
use crate::http::request::RequestContext;
use crate::http::writer::ResponseWriter;
use crate::instrument::fields::{
    add_panic_fields, add_request_fields, add_response_fields, InstrumentOptions,
};
use crate::instrument::layer::InstrumentLayer;

/// A handler that emits one telemetry event per request it serves.
pub struct InstrumentedHandler<H> {
    inner: H,
    sink: Arc<dyn EventSink>,
    options: Arc<InstrumentOptions>,
}

impl<H: Handler> InstrumentedHandler<H> {
    pub fn new(inner: H, sink: Arc<dyn EventSink>, options: Arc<InstrumentOptions>) -> Self {
        Self {
            inner,
            sink,
            options,
        }
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }

    pub fn options(&self) -> &InstrumentOptions {
        &self.options
    }
}

impl<H> std::fmt::Debug for InstrumentedHandler<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrumentedHandler")
            .field("inner", &std::any::type_name::<H>())
            .field("sink", &self.sink)
            .field("options", &self.options)
            .finish()
    }
}

impl<H: Handler> Handler for InstrumentedHandler<H> {
    fn serve(&self, w: &mut dyn ResponseWriter, req: &RequestContext) {
        if w.is_recording() {
            tracing::trace!(path = %req.path(), "Response already instrumented");
            self.inner.serve(w, req);
            return;
        }

        let timestamp = SystemTime::now();
        let start = Instant::now();
        let mut recorder = ResponseRecorder::new(w);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.inner.serve(&mut recorder, req);
        }));
        let elapsed = start.elapsed();

        let mut event = TelemetryEvent::new(timestamp);
        add_request_fields(&mut event, req, &self.options);
        if let Some(pattern) = self.inner.pattern_for(req) {
            event.add_field(field_names::HANDLER_PATTERN, pattern);
        }

        // An uncommitted response is discarded on panic; the client gets a bare 500.
        let (status, size) = match &outcome {
            Err(_) if !recorder.committed() => (StatusCode::INTERNAL_SERVER_ERROR, 0),
            _ => (recorder.status_code(), recorder.bytes_written()),
        };
        add_response_fields(&mut event, status, size, elapsed);
        if let Err(payload) = &outcome {
            add_panic_fields(&mut event, &**payload);
        }

        self.sink.submit(event);

        if let Err(payload) = outcome {
            panic::resume_unwind(payload);
        }
    }

    fn pattern_for(&self, req: &RequestContext) -> Option<String> {
        self.inner.pattern_for(req)
    }
}

/// Instrument a handler or a whole dispatcher.
pub fn wrap_handler<H: Handler>(handler: H, sink: Arc<dyn EventSink>) -> InstrumentedHandler<H> {
    Instrumentation::new(sink).wrap(handler)
}

/// Instrument a single handler function.
pub fn wrap_handler_fn<F>(f: F, sink: Arc<dyn EventSink>) -> InstrumentedHandler<HandlerFn<F>>
where
    F: Fn(&mut dyn ResponseWriter, &RequestContext) + Send + Sync,
{
    wrap_handler(handler_fn(f), sink)
}

/// Shared sink and options used to instrument handlers and services.
#[derive(Debug, Clone)]
pub struct Instrumentation {
    sink: Arc<dyn EventSink>,
    options: Arc<InstrumentOptions>,
}

impl Instrumentation {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            sink,
            options: Arc::new(InstrumentOptions::default()),
        }
    }

    pub fn with_options(mut self, options: InstrumentOptions) -> Self {
        self.options = Arc::new(options);
        self
    }

    pub fn with_handler_name(mut self, name: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.options).handler_name = Some(name.into());
        self
    }

    pub fn sink(&self) -> &Arc<dyn EventSink> {
        &self.sink
    }

    pub fn options(&self) -> &InstrumentOptions {
        &self.options
    }

    pub fn wrap<H: Handler>(&self, handler: H) -> InstrumentedHandler<H> {
        InstrumentedHandler::new(handler, self.sink.clone(), self.options.clone())
    }

    pub fn wrap_fn<F>(&self, f: F) -> InstrumentedHandler<HandlerFn<F>>
    where
        F: Fn(&mut dyn ResponseWriter, &RequestContext) + Send + Sync,
    {
        self.wrap(handler_fn(f))
    }

    /// A tower layer emitting events with the same sink and options.
    pub fn layer(&self) -> InstrumentLayer {
        InstrumentLayer::with_options(self.sink.clone(), self.options.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::MemorySink;
    use crate::http::writer::BufferedResponse;
    use axum::http::{Method, Uri};

    fn serve(h: &impl Handler, path: &'static str) -> BufferedResponse {
        let req = RequestContext::new(Method::GET, Uri::from_static(path));
        let mut w = BufferedResponse::new();
        h.serve(&mut w, &req);
        w
    }

    #[test]
    fn test_noop_handler_reports_200() {
        let sink = Arc::new(MemorySink::new());
        let h = wrap_handler_fn(|_, _| {}, sink.clone());
        let w = serve(&h, "/hello");

        assert_eq!(w.status(), StatusCode::OK);
        let evs = sink.events();
        assert_eq!(evs.len(), 1);
        assert_eq!(
            evs[0].get(field_names::RESPONSE_STATUS_CODE).unwrap().as_i64(),
            Some(200)
        );
        assert_eq!(evs[0].get(field_names::RESPONSE_SIZE).unwrap().as_i64(), Some(0));
        assert!(evs[0].contains(field_names::DURATION_MS));
    }

    #[test]
    fn test_handler_name_from_builder() {
        let sink = Arc::new(MemorySink::new());
        let h = Instrumentation::new(sink.clone())
            .with_handler_name("greeter")
            .wrap_fn(|w, _| {
                let _ = w.write(b"hi");
            });
        serve(&h, "/");

        let evs = sink.events();
        let ev = &evs[0];
        assert_eq!(ev.get(field_names::HANDLER_NAME).unwrap().as_str(), Some("greeter"));
        assert_eq!(ev.get(field_names::RESPONSE_SIZE).unwrap().as_i64(), Some(2));
    }

    /// Writer that sends the status line and body bytes immediately.
    #[derive(Default)]
    struct Streaming {
        headers: axum::http::HeaderMap,
        status: Option<StatusCode>,
        sent: usize,
    }

    impl ResponseWriter for Streaming {
        fn headers_mut(&mut self) -> &mut axum::http::HeaderMap {
            &mut self.headers
        }

        fn write_header(&mut self, status: StatusCode) {
            self.status.get_or_insert(status);
        }

        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.write_header(StatusCode::OK);
            self.sent += buf.len();
            Ok(buf.len())
        }

        fn committed(&self) -> bool {
            self.status.is_some()
        }
    }

    #[test]
    fn test_panic_after_commit_keeps_sent_status() {
        let sink = Arc::new(MemorySink::new());
        let h = wrap_handler_fn(
            |w, _| {
                w.write_header(StatusCode::ACCEPTED);
                let _ = w.write(b"partial");
                panic!("mid-stream");
            },
            sink.clone(),
        );
        let req = RequestContext::new(Method::GET, Uri::from_static("/stream"));
        let mut w = Streaming::default();
        let result = panic::catch_unwind(AssertUnwindSafe(|| h.serve(&mut w, &req)));
        assert!(result.is_err());

        let evs = sink.events();
        assert_eq!(evs.len(), 1);
        assert_eq!(
            evs[0].get(field_names::RESPONSE_STATUS_CODE).unwrap().as_i64(),
            Some(202)
        );
        assert_eq!(evs[0].get(field_names::RESPONSE_SIZE).unwrap().as_i64(), Some(7));
        assert_eq!(
            evs[0].get(field_names::HANDLER_PANICKED).unwrap().as_bool(),
            Some(true)
        );
    }

    #[test]
    fn test_recording_writer_passes_through() {
        let sink = Arc::new(MemorySink::new());
        let h = wrap_handler_fn(
            |w, _| w.write_header(StatusCode::ACCEPTED),
            sink.clone(),
        );
        let req = RequestContext::new(Method::GET, Uri::from_static("/"));
        let mut w = BufferedResponse::observed();
        h.serve(&mut w, &req);

        assert_eq!(w.status(), StatusCode::ACCEPTED);
        assert!(sink.is_empty());
    }
}
