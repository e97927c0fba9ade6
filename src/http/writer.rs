//! Response-writing capability.
//!
//! # Responsibilities
//! - Define the `ResponseWriter` interface handlers write responses through
//! - Provide `BufferedResponse`, the in-memory writer the transport bridge uses
//!
//! # Design Decisions
//! - The first `write_header` finalizes the status; later calls are ignored
//! - Writing body bytes before any `write_header` implies `200 OK`
//! - Headers may be changed until the status is finalized
//! - `BufferedResponse` sends nothing until `into_response`, so it is never
//!   committed while the handler runs

use std::io;

use axum::body::Body;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use bytes::{Bytes, BytesMut};

/// Interface through which a handler sets status/headers and streams bytes.
pub trait ResponseWriter {
    /// Response headers. Changes after the status is finalized have no effect.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Finalize the status line. Only the first call takes effect.
    fn write_header(&mut self, status: StatusCode);

    /// Append body bytes, finalizing `200 OK` first if no status was written.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Whether an instrumentation layer is already observing this response.
    fn is_recording(&self) -> bool {
        false
    }

    /// Whether any part of the response (status line included) has already
    /// reached the client. Buffering writers never commit before returning.
    fn committed(&self) -> bool {
        false
    }
}

/// A response assembled in memory.
#[derive(Debug, Default)]
pub struct BufferedResponse {
    status: Option<StatusCode>,
    headers: HeaderMap,
    /// Headers as they were when the status was finalized.
    sent_headers: Option<HeaderMap>,
    body: BytesMut,
    observed: bool,
}

impl BufferedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// A writer whose response an outer layer already instruments.
    pub fn observed() -> Self {
        Self {
            observed: true,
            ..Self::default()
        }
    }

    /// Finalized status, `200 OK` if the handler never wrote one.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    pub fn header_written(&self) -> bool {
        self.status.is_some()
    }

    /// Headers the client receives.
    pub fn headers(&self) -> &HeaderMap {
        self.sent_headers.as_ref().unwrap_or(&self.headers)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Convert into an axum response.
    pub fn into_response(self) -> Response {
        let status = self.status();
        let body: Bytes = self.body.freeze();
        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        *response.headers_mut() = self.sent_headers.unwrap_or(self.headers);
        response
    }
}

impl ResponseWriter for BufferedResponse {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, status: StatusCode) {
        match self.status {
            Some(current) => {
                tracing::debug!(
                    current = %current,
                    ignored = %status,
                    "Superfluous write_header call"
                );
            }
            None => {
                self.status = Some(status);
                self.sent_headers = Some(self.headers.clone());
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.status.is_none() {
            self.write_header(StatusCode::OK);
        }
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn is_recording(&self) -> bool {
        self.observed
    }
}
