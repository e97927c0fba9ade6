//! The request-handling capability.
//!
//! Anything that can answer a request through a [`ResponseWriter`] is a
//! [`Handler`]: a single function lifted with [`handler_fn`], a whole
//! [`ServeMux`](crate::http::mux::ServeMux), or an already instrumented handler.

use std::fmt;
use std::sync::Arc;

use crate::http::request::RequestContext;
use crate::http::writer::ResponseWriter;

/// A unit of logic that consumes a request and produces a response.
///
/// Errors are expressed only through the status written to the response.
pub trait Handler: Send + Sync {
    /// Answer one request. Returns once the response is fully written.
    fn serve(&self, w: &mut dyn ResponseWriter, req: &RequestContext);

    /// Route pattern this handler would dispatch `req` to, for dispatchers.
    fn pattern_for(&self, _req: &RequestContext) -> Option<String> {
        None
    }
}

/// Adapter lifting a plain function or closure into a [`Handler`].
#[derive(Clone)]
pub struct HandlerFn<F> {
    f: F,
}

impl<F> HandlerFn<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> fmt::Debug for HandlerFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerFn")
            .field("f", &std::any::type_name::<F>())
            .finish()
    }
}

impl<F> Handler for HandlerFn<F>
where
    F: Fn(&mut dyn ResponseWriter, &RequestContext) + Send + Sync,
{
    fn serve(&self, w: &mut dyn ResponseWriter, req: &RequestContext) {
        (self.f)(w, req)
    }
}

/// Lift `f` into a [`Handler`].
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: Fn(&mut dyn ResponseWriter, &RequestContext) + Send + Sync,
{
    HandlerFn::new(f)
}

impl<H: Handler + ?Sized> Handler for &H {
    fn serve(&self, w: &mut dyn ResponseWriter, req: &RequestContext) {
        (**self).serve(w, req)
    }

    fn pattern_for(&self, req: &RequestContext) -> Option<String> {
        (**self).pattern_for(req)
    }
}

impl<H: Handler + ?Sized> Handler for Box<H> {
    fn serve(&self, w: &mut dyn ResponseWriter, req: &RequestContext) {
        (**self).serve(w, req)
    }

    fn pattern_for(&self, req: &RequestContext) -> Option<String> {
        (**self).pattern_for(req)
    }
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn serve(&self, w: &mut dyn ResponseWriter, req: &RequestContext) {
        (**self).serve(w, req)
    }

    fn pattern_for(&self, req: &RequestContext) -> Option<String> {
        (**self).pattern_for(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::writer::BufferedResponse;
    use axum::http::{Method, StatusCode, Uri};

    #[test]
    fn test_handler_fn_serves() {
        let h = handler_fn(|w, req| {
            w.write_header(StatusCode::ACCEPTED);
            let _ = w.write(req.path().as_bytes());
        });
        let req = RequestContext::new(Method::GET, Uri::from_static("/queued"));
        let mut w = BufferedResponse::new();
        h.serve(&mut w, &req);

        assert_eq!(w.status(), StatusCode::ACCEPTED);
        assert_eq!(w.body(), b"/queued");
        assert_eq!(h.pattern_for(&req), None);
    }

    #[test]
    fn test_boxed_and_shared_handlers() {
        let boxed: Box<dyn Handler> = Box::new(handler_fn(|w, _| {
            w.write_header(StatusCode::NO_CONTENT);
        }));
        let shared = Arc::new(boxed);
        let req = RequestContext::new(Method::GET, Uri::from_static("/"));
        let mut w = BufferedResponse::new();
        shared.serve(&mut w, &req);
        assert_eq!(w.status(), StatusCode::NO_CONTENT);
    }
}
