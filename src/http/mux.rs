//! Request multiplexer.
//!
//! # Responsibilities
//! - Register handlers under path patterns
//! - Dispatch each request to the best matching handler
//! - Answer unmatched requests with 404
//!
//! # Design Decisions
//! - Constructed explicitly and passed by value; there is no process-wide mux
//! - Patterns ending in `/` match the whole subtree, others match exactly
//! - Longest pattern wins, so `/api/v1/` beats `/api/` beats `/`
//! - Routes are fixed once the mux is wrapped or shared

use axum::http::StatusCode;
use thiserror::Error;

use crate::http::handler::{handler_fn, Handler};
use crate::http::request::RequestContext;
use crate::http::writer::ResponseWriter;

/// Error returned when registering a route.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("route pattern must not be empty")]
    EmptyPattern,

    #[error("route pattern `{0}` must start with `/`")]
    NotAbsolute(String),

    #[error("multiple registrations for `{0}`")]
    Duplicate(String),
}

struct Route {
    pattern: String,
    handler: Box<dyn Handler>,
}

impl Route {
    fn matches(&self, path: &str) -> bool {
        if self.pattern.ends_with('/') {
            path.starts_with(&self.pattern)
        } else {
            path == self.pattern
        }
    }
}

/// Dispatches requests to handlers by path pattern.
#[derive(Default)]
pub struct ServeMux {
    routes: Vec<Route>,
}

impl ServeMux {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `pattern`.
    pub fn handle(
        &mut self,
        pattern: &str,
        handler: impl Handler + 'static,
    ) -> Result<&mut Self, RouteError> {
        if pattern.is_empty() {
            return Err(RouteError::EmptyPattern);
        }
        if !pattern.starts_with('/') {
            return Err(RouteError::NotAbsolute(pattern.to_string()));
        }
        if self.routes.iter().any(|r| r.pattern == pattern) {
            return Err(RouteError::Duplicate(pattern.to_string()));
        }

        self.routes.push(Route {
            pattern: pattern.to_string(),
            handler: Box::new(handler),
        });
        // Longest first, so the first match is the most specific one.
        self.routes
            .sort_by(|a, b| b.pattern.len().cmp(&a.pattern.len()));
        Ok(self)
    }

    /// Register a function for `pattern`.
    pub fn handle_fn<F>(&mut self, pattern: &str, f: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(&mut dyn ResponseWriter, &RequestContext) + Send + Sync + 'static,
    {
        self.handle(pattern, handler_fn(f))
    }

    /// Registered patterns, most specific first.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|r| r.pattern.as_str())
    }

    fn lookup(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.matches(path))
    }
}

impl std::fmt::Debug for ServeMux {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServeMux")
            .field("patterns", &self.patterns().collect::<Vec<_>>())
            .finish()
    }
}

impl Handler for ServeMux {
    fn serve(&self, w: &mut dyn ResponseWriter, req: &RequestContext) {
        match self.lookup(req.path()) {
            Some(route) => route.handler.serve(w, req),
            None => {
                tracing::debug!(path = %req.path(), "No route matched");
                if let Ok(value) = "text/plain; charset=utf-8".parse() {
                    w.headers_mut().insert(axum::http::header::CONTENT_TYPE, value);
                }
                w.write_header(StatusCode::NOT_FOUND);
                let _ = w.write(b"404 page not found\n");
            }
        }
    }

    fn pattern_for(&self, req: &RequestContext) -> Option<String> {
        self.lookup(req.path()).map(|r| r.pattern.clone())
    }
}
