//! Demo server for the HTTP instrumentation.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client ──▶ SetRequestId ──▶ Trace ──▶ axum Router
//!                                           │
//!                     ┌─────────────────────┴──────────────────────┐
//!                     ▼                                            ▼
//!          /api/status (async route)                 fallback: HandlerService
//!          + InstrumentLayer                         └─ InstrumentedHandler
//!                                                       └─ ServeMux
//!                                                          /hello → 200
//!                                                          /fail  → 418
//!                     │                                            │
//!                     └──────────────▶ EventSink ◀─────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use clap::{Parser, ValueEnum};
use tokio::net::TcpListener;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use http_telemetry::config::{load_config, LogFormat, TelemetryConfig};
use http_telemetry::event::build_sink;
use http_telemetry::http::{HandlerService, RouteError, ServeMux, UuidRequestId};
use http_telemetry::instrument::{InstrumentOptions, Instrumentation};
use http_telemetry::observability::init_logging;

#[derive(Parser)]
#[command(name = "telemetry-demo")]
#[command(about = "Serve a few instrumented routes and emit one event per request", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind address.
    #[arg(short, long)]
    bind: Option<String>,

    /// Override the log format.
    #[arg(long, value_enum)]
    log_format: Option<LogFormatArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => TelemetryConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format.into();
    }

    init_logging(&config.logging)?;
    tracing::info!("telemetry-demo v{} starting", env!("CARGO_PKG_VERSION"));

    let sink = build_sink(&config.sink);
    tracing::info!(
        sink = ?config.sink.kind,
        bind_address = %config.listener.bind_address,
        "Configuration loaded"
    );

    let instrumentation =
        Instrumentation::new(sink).with_options(InstrumentOptions::from(&config.instrument));
    let app = build_router(&instrumentation)?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Routes served through the synchronous handler path.
fn demo_mux() -> Result<ServeMux, RouteError> {
    let mut mux = ServeMux::new();
    mux.handle_fn("/hello", |w, _| {
        let _ = w.write(b"hello\n");
    })?
    .handle_fn("/fail", |w, _| w.write_header(StatusCode::IM_A_TEAPOT))?;
    Ok(mux)
}

/// Build the Axum router with all middleware layers.
fn build_router(instrumentation: &Instrumentation) -> Result<Router, RouteError> {
    let mux = instrumentation.wrap(demo_mux()?);

    Ok(Router::new()
        .route("/api/status", get(status))
        .route_layer(instrumentation.layer())
        .fallback_service(HandlerService::new(mux))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(UuidRequestId)))
}

async fn status() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
