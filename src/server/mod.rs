//! HTTP surface: the RPC endpoint and per-task SSE event feeds.

pub mod handler;
pub mod sse;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{AppError, Result};

pub use handler::AppState;

/// Build the application router.
///
/// Routes:
/// - `POST /rpc` dispatches agent RPC methods.
/// - `GET /tasks/{id}/events` streams task updates as SSE.
/// - `GET /health` answers `ok`.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/rpc", post(handler::rpc))
        .route("/tasks/{id}/events", get(sse::task_events))
        .route("/health", get(handler::health))
        .with_state(state)
}

/// Bind `127.0.0.1:{http_port}` and serve until `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Config` if the server fails to bind, or
/// `AppError::Http` if serving fails.
pub async fn serve_http(state: Arc<AppState>, ct: CancellationToken) -> Result<()> {
    let bind = SocketAddr::from(([127, 0, 0, 1], state.config.http_port));
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|err| AppError::Config(format!("failed to bind HTTP on {bind}: {err}")))?;
    serve_listener(listener, state, ct).await
}

/// Serve on an already-bound listener until `ct` is cancelled.
///
/// Open task-event feeds end when the state's shutdown context stops, so
/// callers should cancel both together.
///
/// # Errors
///
/// Returns `AppError::Http` if serving fails.
pub async fn serve_listener(
    listener: TcpListener,
    state: Arc<AppState>,
    ct: CancellationToken,
) -> Result<()> {
    let local = listener
        .local_addr()
        .map_err(|err| AppError::Http(format!("listener address: {err}")))?;
    info!(bind = %local, "starting HTTP transport");

    let shutdown = state.shutdown.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            ct.cancelled().await;
            shutdown.cancel();
        })
        .await
        .map_err(|err| AppError::Http(format!("HTTP server error: {err}")))?;

    info!("HTTP transport shut down");
    Ok(())
}
