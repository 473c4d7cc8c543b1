#![forbid(unsafe_code)]

//! Streaming-events core for in-process producer/consumer pipelines,
//! with a thin agent RPC and task-events SSE surface layered on top.

pub mod agent;
pub mod config;
pub mod context;
pub mod errors;
pub mod models;
pub mod orchestrator;
pub mod rpc;
pub mod server;
pub mod stream;

pub use config::AppConfig;
pub use context::{CancelReason, Context};
pub use errors::{AppError, Result, SinkError, StreamError, StreamOpError};
