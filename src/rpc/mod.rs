//! Minimal JSON-RPC envelope for the agent endpoint.
//!
//! Request:
//! ```json
//! {"jsonrpc": "2.0", "method": "agent/invoke", "id": "req-1",
//!  "params": {"skill_id": "echo", "args": {"text": "hi"}}}
//! ```
//!
//! Response:
//! ```json
//! {"jsonrpc": "2.0", "id": "req-1",
//!  "result": {"metadata": {"status": {"state": "running", "id": "req-1"}, "taskId": "req-1"}}}
//! ```

pub mod handler;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use handler::RpcHandler;

/// Error code used for every RPC failure.
pub const RPC_ERROR_CODE: i64 = -32000;

/// Protocol version echoed in responses.
pub const JSONRPC_VERSION: &str = "2.0";

/// Methods the handler recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcMethod {
    /// `agent/invoke`
    Invoke,
    /// `agent/status`
    AgentStatus,
    /// `task/status`
    TaskStatus,
}

impl RpcMethod {
    /// Match a method name case-insensitively.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "agent/invoke" => Some(Self::Invoke),
            "agent/status" => Some(Self::AgentStatus),
            "task/status" => Some(Self::TaskStatus),
            _ => None,
        }
    }
}

/// Inbound RPC request.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RpcRequest {
    /// Protocol version, ignored on input.
    #[serde(default)]
    pub jsonrpc: Option<String>,
    /// Method name.
    pub method: String,
    /// Opaque request identifier (string or number).
    #[serde(default)]
    pub id: Option<Value>,
    /// Method parameters.
    #[serde(default)]
    pub params: RpcParams,
}

/// Parameters shared by the recognised methods.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RpcParams {
    /// Target skill for `agent/invoke`.
    #[serde(default, alias = "skillId")]
    pub skill_id: Option<String>,
    /// Skill arguments; `id` selects the task for status methods.
    #[serde(default, alias = "arguments")]
    pub args: Map<String, Value>,
}

impl RpcRequest {
    /// Request id rendered as a string, if present and not null.
    #[must_use]
    pub fn id_string(&self) -> Option<String> {
        match &self.id {
            None | Some(Value::Null) => None,
            Some(Value::String(id)) => Some(id.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}

/// RPC error body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RpcError {
    /// Error code, always [`RPC_ERROR_CODE`].
    pub code: i64,
    /// Human-readable message.
    pub message: String,
}

/// Outbound RPC response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcResponse {
    /// Always [`JSONRPC_VERSION`].
    pub jsonrpc: String,
    /// Echo of the request id.
    pub id: Value,
    /// Payload on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    /// Successful response carrying `result`.
    #[must_use]
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Error response with [`RPC_ERROR_CODE`].
    #[must_use]
    pub fn error(id: Value, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id,
            result: None,
            error: Some(RpcError {
                code: RPC_ERROR_CODE,
                message: message.into(),
            }),
        }
    }
}
