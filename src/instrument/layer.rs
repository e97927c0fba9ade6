//! Tower middleware emitting one event per request.
//!
//! # Responsibilities
//! - Wrap any `Service<Request<_>>` returning `Response<_>` (axum routers,
//!   `HandlerService`, plain `service_fn`s)
//! - Capture the status of the returned response
//! - Count response body bytes as they stream out
//! - Submit the event once the body is finished
//!
//! # Design Decisions
//! - The event leaves when the body ends, errors, or is dropped, whichever
//!   comes first; a one-shot `Option` guarantees a single submission
//! - Requests are tagged with [`Instrumented`] so nested layers (or
//!   `HandlerService` + `InstrumentedHandler`) do not emit twice
//! - An inner error or panic still emits an event with status 500

use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::time::{Instant, SystemTime};

use axum::http::{Request, Response, StatusCode};
use bytes::Buf;
use futures_util::FutureExt;
use http_body::{Body, Frame, SizeHint};
use pin_project_lite::pin_project;
use tower::{Layer, Service};

use crate::event::{fields, EventSink, TelemetryEvent};
use crate::http::request::RequestContext;
use crate::instrument::fields::{
    add_panic_fields, add_request_fields, add_response_fields, InstrumentOptions,
};

/// Request extension marking a request whose response is already instrumented.
#[derive(Debug, Clone, Copy, Default)]
pub struct Instrumented;

// ---------------------------------------------------------------------------
// InstrumentLayer
// ---------------------------------------------------------------------------

/// Tower layer that emits one telemetry event per request.
#[derive(Debug, Clone)]
pub struct InstrumentLayer {
    sink: Arc<dyn EventSink>,
    options: Arc<InstrumentOptions>,
}

impl InstrumentLayer {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self::with_options(sink, Arc::new(InstrumentOptions::default()))
    }

    pub fn with_options(sink: Arc<dyn EventSink>, options: Arc<InstrumentOptions>) -> Self {
        Self { sink, options }
    }
}

impl<S> Layer<S> for InstrumentLayer {
    type Service = InstrumentService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        InstrumentService {
            inner,
            sink: self.sink.clone(),
            options: self.options.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// InstrumentService
// ---------------------------------------------------------------------------

/// Service wrapper produced by [`InstrumentLayer`].
#[derive(Debug, Clone)]
pub struct InstrumentService<S> {
    inner: S,
    sink: Arc<dyn EventSink>,
    options: Arc<InstrumentOptions>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for InstrumentService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: fmt::Display + Send + 'static,
    ResBody: Body + Send + 'static,
    ResBody::Error: fmt::Display,
{
    type Response = Response<RecordingBody<ResBody>>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        if req.extensions().get::<Instrumented>().is_some() {
            let fut = self.inner.call(req);
            return Box::pin(async move { Ok(fut.await?.map(RecordingBody::passthrough)) });
        }
        req.extensions_mut().insert(Instrumented);

        let timestamp = SystemTime::now();
        let start = Instant::now();
        let mut event = TelemetryEvent::new(timestamp);
        add_request_fields(&mut event, &RequestContext::from_http(&req), &self.options);

        let sink = self.sink.clone();
        let fut = self.inner.call(req);

        Box::pin(async move {
            match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(Ok(response)) => {
                    let completion = Completion {
                        event,
                        sink,
                        start,
                        status: response.status(),
                    };
                    Ok(response.map(|body| RecordingBody::new(body, completion)))
                }
                Ok(Err(err)) => {
                    add_response_fields(
                        &mut event,
                        StatusCode::INTERNAL_SERVER_ERROR,
                        0,
                        start.elapsed(),
                    );
                    event.add_field(fields::HANDLER_ERROR, err.to_string());
                    sink.submit(event);
                    Err(err)
                }
                Err(payload) => {
                    add_response_fields(
                        &mut event,
                        StatusCode::INTERNAL_SERVER_ERROR,
                        0,
                        start.elapsed(),
                    );
                    add_panic_fields(&mut event, &*payload);
                    sink.submit(event);
                    panic::resume_unwind(payload)
                }
            }
        })
    }
}

// ---------------------------------------------------------------------------
// RecordingBody
// ---------------------------------------------------------------------------

/// Pending event, submitted when the response body is done.
#[derive(Debug)]
struct Completion {
    event: TelemetryEvent,
    sink: Arc<dyn EventSink>,
    start: Instant,
    status: StatusCode,
}

impl Completion {
    fn submit(mut self, bytes: u64, completed: bool, error: Option<String>) {
        add_response_fields(&mut self.event, self.status, bytes, self.start.elapsed());
        self.event.add_field(fields::RESPONSE_COMPLETED, completed);
        if let Some(error) = error {
            self.event.add_field(fields::RESPONSE_ERROR, error);
        }
        self.sink.submit(self.event);
    }
}

/// Byte count plus the one-shot completion.
#[derive(Debug, Default)]
struct Tally {
    bytes: u64,
    completion: Option<Completion>,
}

impl Tally {
    fn finish(&mut self, completed: bool, error: Option<String>) {
        if let Some(completion) = self.completion.take() {
            completion.submit(self.bytes, completed, error);
        }
    }
}

impl Drop for Tally {
    fn drop(&mut self) {
        // Body dropped before its end: client went away or HEAD response.
        self.finish(false, None);
    }
}

pin_project! {
    /// Response body that counts data bytes and submits the request's event
    /// when the stream ends.
    #[derive(Debug)]
    pub struct RecordingBody<B> {
        #[pin]
        inner: B,
        tally: Tally,
    }
}

impl<B: Body> RecordingBody<B> {
    fn new(inner: B, completion: Completion) -> Self {
        let mut tally = Tally {
            bytes: 0,
            completion: Some(completion),
        };
        if inner.is_end_stream() {
            tally.finish(true, None);
        }
        Self { inner, tally }
    }

    /// A body whose request is instrumented further out.
    fn passthrough(inner: B) -> Self {
        Self {
            inner,
            tally: Tally::default(),
        }
    }

    /// Data bytes yielded so far.
    pub fn bytes_seen(&self) -> u64 {
        self.tally.bytes
    }
}

impl<B> Body for RecordingBody<B>
where
    B: Body,
    B::Error: fmt::Display,
{
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let mut this = self.project();
        let polled = ready!(this.inner.as_mut().poll_frame(cx));

        match &polled {
            Some(Ok(frame)) => {
                if let Some(data) = frame.data_ref() {
                    this.tally.bytes += data.remaining() as u64;
                }
                if this.inner.is_end_stream() {
                    this.tally.finish(true, None);
                }
            }
            Some(Err(e)) => this.tally.finish(false, Some(e.to_string())),
            None => this.tally.finish(true, None),
        }

        Poll::Ready(polled)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
