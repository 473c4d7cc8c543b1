//! Built-in agent used by the binary and the test suites.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use super::{Agent, Invocation};
use crate::context::Context;
use crate::stream::{BoxFuture, Event, EventType, Stream};
use crate::{AppError, Result, StreamOpError};

/// Skill that echoes its arguments back.
pub const ECHO_SKILL: &str = "echo";

/// Skill that always fails.
pub const FAIL_SKILL: &str = "fail";

/// Agent exposing the `echo` and `fail` skills.
///
/// `echo` publishes `steps` progress events, pausing `step_delay` between
/// them, then a `partial` event, and returns `{"skill", "args"}`.
#[derive(Debug, Clone)]
pub struct EchoAgent {
    steps: u32,
    step_delay: Duration,
}

impl Default for EchoAgent {
    fn default() -> Self {
        Self::new(4, Duration::from_millis(250))
    }
}

impl EchoAgent {
    /// Agent emitting `steps` progress events `step_delay` apart.
    #[must_use]
    pub fn new(steps: u32, step_delay: Duration) -> Self {
        Self { steps, step_delay }
    }

    async fn echo(
        &self,
        ctx: &Context,
        invocation: Invocation,
        events: Arc<dyn Stream>,
    ) -> Result<Value> {
        let publish = |event: Event| {
            let events = Arc::clone(&events);
            async move {
                events
                    .send(ctx, event)
                    .await
                    .map_err(|err| StreamOpError::new(events.id(), "send", err))
            }
        };

        for step in 1..=self.steps {
            if !self.step_delay.is_zero() {
                tokio::time::sleep(self.step_delay).await;
            }
            let progress = f64::from(step) / f64::from(self.steps);
            publish(Event::progress(json!({ "progress": progress })).with_id(format!(
                "{}-{step}",
                invocation.task_id
            )))
            .await?;
        }

        let result = json!({
            "skill": invocation.skill_id,
            "args": Value::Object(invocation.args),
        });
        publish(Event::new(EventType::Partial, result.clone())).await?;
        Ok(result)
    }
}

impl Agent for EchoAgent {
    fn invoke<'a>(
        &'a self,
        ctx: &'a Context,
        invocation: Invocation,
        events: Arc<dyn Stream>,
    ) -> BoxFuture<'a, Result<Value>> {
        Box::pin(async move {
            match invocation.skill_id.as_str() {
                ECHO_SKILL => self.echo(ctx, invocation, events).await,
                FAIL_SKILL => Err(AppError::Agent(format!(
                    "skill {FAIL_SKILL} failed for task {}",
                    invocation.task_id
                ))),
                other => Err(AppError::NotFound(format!("skill {other}"))),
            }
        })
    }
}
