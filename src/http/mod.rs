//! HTTP handling primitives.
//!
//! # Data Flow
//! ```text
//! axum / tower transport
//!     → bridge.rs (HandlerService: Request → RequestContext + BufferedResponse)
//!     → handler.rs (Handler trait: functions, dispatchers, wrapped handlers)
//!     → mux.rs (ServeMux picks a route by path pattern)
//!     → writer.rs (ResponseWriter: status, headers, body bytes)
//!     → recorder.rs (ResponseRecorder observes the writes)
//!     → BufferedResponse → axum Response → client
//! ```

pub mod bridge;
pub mod handler;
pub mod mux;
pub mod recorder;
pub mod request;
pub mod writer;

pub use bridge::HandlerService;
pub use handler::{handler_fn, Handler, HandlerFn};
pub use mux::{RouteError, ServeMux};
pub use recorder::ResponseRecorder;
pub use request::{RequestContext, UuidRequestId, X_REQUEST_ID};
pub use writer::{BufferedResponse, ResponseWriter};
