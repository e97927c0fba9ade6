//! Response recording decorator.
//!
//! # Responsibilities
//! - Forward every write to the wrapped writer unchanged
//! - Capture the status code the client receives (first write wins)
//! - Count the body bytes the wrapped writer accepted
//!
//! # Design Decisions
//! - `Unset → Set` status transition guarded by a one-shot flag
//! - Repeated `write_header` calls are still forwarded so the wrapped
//!   writer applies its own rules
//! - Write errors are returned as-is; failed writes add nothing to the count

use std::io;

use axum::http::{HeaderMap, StatusCode};

use crate::http::writer::ResponseWriter;

/// Passive observer of a response-writing sequence.
#[derive(Debug)]
pub struct ResponseRecorder<'a, W: ResponseWriter + ?Sized> {
    inner: &'a mut W,
    status: StatusCode,
    header_written: bool,
    bytes_written: u64,
}

impl<'a, W: ResponseWriter + ?Sized> ResponseRecorder<'a, W> {
    pub fn new(inner: &'a mut W) -> Self {
        Self {
            inner,
            status: StatusCode::OK,
            header_written: false,
            bytes_written: 0,
        }
    }

    /// The first status finalized on this response, `200 OK` if none was.
    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    /// Body bytes accepted by the wrapped writer.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Whether a status was finalized, explicitly or by a write.
    pub fn header_written(&self) -> bool {
        self.header_written
    }
}

impl<W: ResponseWriter + ?Sized> ResponseWriter for ResponseRecorder<'_, W> {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn write_header(&mut self, status: StatusCode) {
        if !self.header_written {
            self.status = status;
            self.header_written = true;
        }
        self.inner.write_header(status);
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.header_written {
            self.write_header(StatusCode::OK);
        }
        let n = self.inner.write(buf)?;
        self.bytes_written += n as u64;
        Ok(n)
    }

    fn is_recording(&self) -> bool {
        true
    }

    fn committed(&self) -> bool {
        self.inner.committed()
    }
}
