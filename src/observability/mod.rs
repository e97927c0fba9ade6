//! Observability of the instrumentation itself.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters through the `metrics` facade)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → whatever recorder the host installs
//! ```
//!
//! Telemetry events about served requests are a separate stream, see
//! [`crate::event`].

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LoggingError};
