//! Shared application state and the RPC route handler.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::Value;
use tracing::debug;

use crate::agent::Agent;
use crate::config::AppConfig;
use crate::context::Context;
use crate::orchestrator::invoker::Invoker;
use crate::orchestrator::task_manager::TaskManager;
use crate::rpc::{RpcHandler, RpcRequest, RpcResponse};

/// Shared application state accessible by all route handlers.
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Task registry.
    pub tasks: Arc<TaskManager>,
    /// RPC dispatcher.
    pub rpc: RpcHandler,
    /// Server-wide context; cancelled on shutdown.
    pub shutdown: Context,
}

impl AppState {
    /// Wire the task registry, invoker and RPC handler around `agent`.
    #[must_use]
    pub fn new(config: AppConfig, agent: Arc<dyn Agent>, shutdown: Context) -> Self {
        let tasks = Arc::new(TaskManager::new());
        let invoker = Invoker::new(
            Arc::clone(&tasks),
            agent,
            config.source(),
            config.stream.buffer_size,
        );
        let rpc = RpcHandler::new(Arc::clone(&tasks), invoker, shutdown.clone());
        Self {
            config: Arc::new(config),
            tasks,
            rpc,
            shutdown,
        }
    }
}

/// Handler for `POST /rpc`.
///
/// Bodies that do not decode as a request still get an RPC error response
/// rather than an HTTP rejection.
pub async fn rpc(State(state): State<Arc<AppState>>, Json(body): Json<Value>) -> Json<RpcResponse> {
    let id = body.get("id").cloned().unwrap_or(Value::Null);
    match serde_json::from_value::<RpcRequest>(body) {
        Ok(request) => Json(state.rpc.handle(request).await),
        Err(err) => {
            debug!(%err, "undecodable rpc request");
            Json(RpcResponse::error(id, format!("rpc: invalid request: {err}")))
        }
    }
}

/// Handler for `GET /health`.
pub async fn health() -> &'static str {
    "ok"
}
