//! HTTP request instrumentation.
//!
//! Wraps request handlers so that every request/response cycle produces
//! exactly one structured [`TelemetryEvent`], handed to an [`EventSink`],
//! without changing what the client receives.
//!
//! Two entry points share one implementation:
//! - [`wrap_handler_fn`] instruments a single handler function
//! - [`wrap_handler`] instruments anything implementing [`Handler`],
//!   including a whole [`ServeMux`]
//!
//! For axum/tower stacks, [`InstrumentLayer`] does the same per request.

pub mod config;
pub mod event;
pub mod http;
pub mod instrument;
pub mod observability;

pub use config::TelemetryConfig;
pub use event::{EventSink, FieldValue, MemorySink, TelemetryEvent};
pub use http::{
    handler_fn, BufferedResponse, Handler, HandlerService, RequestContext, ResponseRecorder,
    ResponseWriter, ServeMux,
};
pub use instrument::{
    wrap_handler, wrap_handler_fn, InstrumentLayer, InstrumentOptions, InstrumentedHandler,
    Instrumentation,
};
