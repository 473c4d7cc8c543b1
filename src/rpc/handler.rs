//! Method dispatch for agent RPC requests.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{info, info_span, warn, Instrument};

use super::{RpcMethod, RpcRequest, RpcResponse};
use crate::agent::Invocation;
use crate::context::Context;
use crate::models::task::{Task, TaskState};
use crate::orchestrator::invoker::Invoker;
use crate::orchestrator::task_manager::TaskManager;
use crate::{AppError, Result};

/// Dispatches RPC requests against the task registry and invoker.
#[derive(Clone)]
pub struct RpcHandler {
    tasks: Arc<TaskManager>,
    invoker: Invoker,
    ctx: Context,
}

impl RpcHandler {
    /// Build a handler; background invocations run under children of `ctx`.
    #[must_use]
    pub fn new(tasks: Arc<TaskManager>, invoker: Invoker, ctx: Context) -> Self {
        Self {
            tasks,
            invoker,
            ctx,
        }
    }

    /// Handle one request. Failures become error responses, never panics.
    pub async fn handle(&self, request: RpcRequest) -> RpcResponse {
        let id = request.id.clone().unwrap_or(Value::Null);
        let span = info_span!("rpc", method = %request.method);

        async move {
            let outcome = match RpcMethod::parse(&request.method) {
                Some(RpcMethod::Invoke) => self.invoke(request).await,
                Some(RpcMethod::AgentStatus | RpcMethod::TaskStatus) => self.status(&request).await,
                None => Err(AppError::Rpc(format!("unknown method {}", request.method))),
            };

            match outcome {
                Ok(result) => RpcResponse::success(id, result),
                Err(err) => {
                    warn!(%err, "rpc request failed");
                    RpcResponse::error(id, err.to_string())
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn invoke(&self, request: RpcRequest) -> Result<Value> {
        let skill_id = request
            .params
            .skill_id
            .clone()
            .filter(|skill| !skill.is_empty())
            .ok_or_else(|| AppError::Rpc("agent/invoke requires a skill_id".into()))?;

        let task = self.tasks.create(request.id_string(), skill_id).await?;
        info!(task_id = %task.id, skill_id = %task.skill_id, "task submitted");

        // The worker records its own outcome on the task.
        drop(self.invoker.spawn(
            &self.ctx,
            Invocation {
                task_id: task.id.clone(),
                skill_id: task.skill_id,
                args: request.params.args,
            },
        ));

        Ok(json!({ "metadata": metadata(&task.id, TaskState::Running) }))
    }

    async fn status(&self, request: &RpcRequest) -> Result<Value> {
        let task_id = request
            .params
            .args
            .get("id")
            .and_then(id_argument)
            .or_else(|| request.id_string())
            .ok_or_else(|| AppError::Rpc("status requires a task id".into()))?;

        let task = self.tasks.get(&task_id).await?;
        Ok(status_result(&task))
    }
}

/// Task id named by a status argument; numbers render the way numeric
/// request ids do when a task is created.
fn id_argument(value: &Value) -> Option<String> {
    match value {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

/// Metadata bag: `{status: {state, id}, taskId}`.
fn metadata(task_id: &str, state: TaskState) -> Value {
    json!({
        "status": { "state": state, "id": task_id },
        "taskId": task_id,
    })
}

fn status_result(task: &Task) -> Value {
    json!({
        "task": task.snapshot(),
        "metadata": metadata(&task.id, task.state),
    })
}
