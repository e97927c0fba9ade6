//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;

use axum::http::{Method, Uri};
use axum::Router;
use tokio::net::TcpListener;

use http_telemetry::event::fields;
use http_telemetry::{BufferedResponse, Handler, RequestContext, TelemetryEvent};

/// A GET request for `path`.
pub fn get(path: &'static str) -> RequestContext {
    RequestContext::new(Method::GET, Uri::from_static(path))
}

/// Serve one request through `handler` into a fresh in-memory writer.
pub fn serve(handler: &impl Handler, req: &RequestContext) -> BufferedResponse {
    let mut w = BufferedResponse::new();
    handler.serve(&mut w, req);
    w
}

/// `response.status_code` of an event; panics if missing.
pub fn status_of(event: &TelemetryEvent) -> i64 {
    event
        .get(fields::RESPONSE_STATUS_CODE)
        .and_then(|v| v.as_i64())
        .expect("status field must exist on middleware generated event")
}

/// `response.size` of an event; panics if missing.
pub fn size_of(event: &TelemetryEvent) -> i64 {
    event
        .get(fields::RESPONSE_SIZE)
        .and_then(|v| v.as_i64())
        .expect("size field must exist on middleware generated event")
}

/// Serve `app` on an ephemeral local port with connect info enabled.
pub async fn start_server(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await;
    });

    addr
}
