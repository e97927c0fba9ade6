//! Request instrumentation subsystem.
//!
//! # Data Flow
//! ```text
//! Synchronous path:
//!     request → InstrumentedHandler
//!         → ResponseRecorder wraps the real writer
//!         → inner Handler (function or ServeMux) writes the response
//!         → fields.rs builds the event → EventSink::submit
//!
//! Tower path:
//!     request → InstrumentService (marks request Instrumented)
//!         → inner Service returns Response
//!         → RecordingBody counts bytes while the body streams
//!         → body ends / errors / drops → EventSink::submit
//! ```
//!
//! # Design Decisions
//! - Exactly one event per request on both paths
//! - Instrumentation never changes what the client receives
//! - The outermost instrumentation owns the event; inner ones pass through

pub mod fields;
pub mod handler;
pub mod layer;

pub use fields::InstrumentOptions;
pub use handler::{wrap_handler, wrap_handler_fn, InstrumentedHandler, Instrumentation};
pub use layer::{InstrumentLayer, InstrumentService, Instrumented, RecordingBody};
