//! Agent abstraction invoked by the RPC layer.
//!
//! The [`Agent`] trait decouples the RPC and task plumbing from whatever
//! actually runs a skill. Agents report intermediate output by sending
//! events into the stream they are handed; the invocation worker turns
//! those into task updates.

pub mod echo;

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::context::Context;
use crate::stream::{BoxFuture, Stream};
use crate::Result;

pub use echo::EchoAgent;

/// A single skill invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Task tracking this invocation.
    pub task_id: String,
    /// Skill to run.
    pub skill_id: String,
    /// Skill arguments.
    pub args: Map<String, Value>,
}

/// Something that can run skills.
pub trait Agent: Send + Sync {
    /// Run `invocation`, optionally publishing progress into `events`.
    ///
    /// Agents must not close `events`; the caller owns it.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Agent`](crate::AppError::Agent) when the skill
    /// fails, [`AppError::NotFound`](crate::AppError::NotFound) for unknown
    /// skills, or [`AppError::Stream`](crate::AppError::Stream) when
    /// publishing an event fails.
    fn invoke<'a>(
        &'a self,
        ctx: &'a Context,
        invocation: Invocation,
        events: Arc<dyn Stream>,
    ) -> BoxFuture<'a, Result<Value>>;
}
