//! HTTP service exposing the studio to a browser shell.
//!
//! The API mirrors the studio surfaces: settings, the workspace file map for
//! an embedded editor/preview, workflow state, run/retry triggers, and a
//! WebSocket feed of workflow events. Runs triggered over HTTP settle on a
//! background task; clients follow along on `/api/events` or by polling
//! `/api/workflow`.

mod api;
mod ws;

pub use api::{ApiError, AppState, SharedState, api_router};

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use tower_http::cors::CorsLayer;

/// Build the full application router with API, WebSocket, and CORS.
pub fn build_router(state: SharedState) -> Router {
    api_router()
        .route("/api/events", get(ws::events_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the studio server and block until shutdown.
pub async fn start_server(state: SharedState, host: &str, port: u16) -> Result<()> {
    let app = build_router(state.clone());

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    let local_addr = listener.local_addr()?;
    println!("Synapse Studio API running at http://{local_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await
        .context("Server error")?;

    println!("Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal(state: SharedState) {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    // Pending editor saves land before exit
    if let Err(error) = state.saver.flush() {
        tracing::warn!(%error, "failed to flush pending saves");
    }
    println!("\nShutting down...");
}
