//! Bridge from axum/tower to synchronous handlers.
//!
//! # Responsibilities
//! - Expose any [`Handler`] as a `tower::Service` axum can route to
//! - Run the handler on the blocking pool against a `BufferedResponse`
//! - Turn handler panics into an empty `500 Internal Server Error`, discarding
//!   whatever the handler buffered
//!
//! # Design Decisions
//! - One writer per request, never shared
//! - A request already marked by `InstrumentLayer` gets an observed writer,
//!   so inner `InstrumentedHandler`s do not emit a second event

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use tower::Service;

use crate::http::handler::Handler;
use crate::http::request::RequestContext;
use crate::http::writer::BufferedResponse;
use crate::instrument::layer::Instrumented;

/// `tower::Service` running a [`Handler`] per request.
pub struct HandlerService<H> {
    handler: Arc<H>,
}

impl<H> HandlerService<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }

    pub fn from_arc(handler: Arc<H>) -> Self {
        Self { handler }
    }
}

impl<H> Clone for HandlerService<H> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
        }
    }
}

impl<H> std::fmt::Debug for HandlerService<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerService")
            .field("handler", &std::any::type_name::<H>())
            .finish()
    }
}

impl<H, B> Service<Request<B>> for HandlerService<H>
where
    H: Handler + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let ctx = RequestContext::from_http(&req);
        let observed = req.extensions().get::<Instrumented>().is_some();
        let handler = self.handler.clone();

        Box::pin(async move {
            let served = tokio::task::spawn_blocking(move || {
                let mut w = if observed {
                    BufferedResponse::observed()
                } else {
                    BufferedResponse::new()
                };
                handler.serve(&mut w, &ctx);
                w
            })
            .await;

            match served {
                Ok(w) => Ok(w.into_response()),
                Err(e) => {
                    tracing::error!(error = %e, "Handler did not complete");
                    Ok(StatusCode::INTERNAL_SERVER_ERROR.into_response())
                }
            }
        })
    }
}
