//! Background worker that runs one agent invocation against a task.
//!
//! The worker owns a buffered stream for the agent's intermediate events.
//! A [`Sink`] forwards `progress` events into the task record while the
//! agent runs; the stream is closed once the agent returns and the
//! forwarder is awaited before the terminal state is written, so no
//! progress update can land after completion.

use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::agent::{Agent, Invocation};
use crate::context::Context;
use crate::models::task::TaskState;
use crate::orchestrator::task_manager::TaskManager;
use crate::stream::{EventType, Sink, Source, Stream};
use crate::{AppError, Result, SinkError};

/// Spawns invocation workers.
#[derive(Clone)]
pub struct Invoker {
    tasks: Arc<TaskManager>,
    agent: Arc<dyn Agent>,
    source: Source,
    buffer_size: usize,
}

impl Invoker {
    /// Construct an invoker; agent event streams come from `source`.
    #[must_use]
    pub fn new(
        tasks: Arc<TaskManager>,
        agent: Arc<dyn Agent>,
        source: Source,
        buffer_size: usize,
    ) -> Self {
        Self {
            tasks,
            agent,
            source,
            buffer_size,
        }
    }

    /// Run `invocation` in the background under a child of `ctx`.
    ///
    /// The task must already exist in the submitted state.
    #[must_use]
    pub fn spawn(&self, ctx: &Context, invocation: Invocation) -> JoinHandle<()> {
        let worker = self.clone();
        let ctx = ctx.with_cancel();
        let span = info_span!(
            "invocation",
            task_id = %invocation.task_id,
            skill_id = %invocation.skill_id
        );
        tokio::spawn(async move { worker.run(ctx, invocation).await }.instrument(span))
    }

    async fn run(self, ctx: Context, invocation: Invocation) {
        let task_id = invocation.task_id.clone();
        if let Err(err) = self.tasks.set_state(&task_id, TaskState::Running).await {
            warn!(%err, "could not start task");
            return;
        }
        info!("task running");

        let events = Arc::new(self.source.new_buffered_stream(&ctx, self.buffer_size));
        let agent_events = Arc::clone(&events) as Arc<dyn Stream>;
        let forwarder = tokio::spawn(
            forward_progress(
                Arc::clone(&self.tasks),
                Arc::clone(&agent_events),
                task_id.clone(),
                ctx.clone(),
            )
            .in_current_span(),
        );

        let outcome = tokio::select! {
            biased;
            reason = ctx.done() => {
                debug!(%reason, "invocation interrupted");
                None
            }
            result = self.agent.invoke(&ctx, invocation, agent_events) => Some(result),
        };

        events.close();
        match forwarder.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => debug!(%err, "progress forwarding stopped early"),
            Err(err) => warn!(%err, "progress forwarder panicked"),
        }

        let recorded = match outcome {
            Some(Ok(result)) => self.tasks.complete(&task_id, result).await,
            Some(Err(err)) => {
                warn!(%err, "agent invocation failed");
                self.tasks.fail(&task_id, err.to_string()).await
            }
            None => self.tasks.cancel(&task_id).await,
        };

        match recorded {
            Ok(task) => info!(state = %task.state, "task finished"),
            Err(err) => warn!(%err, "could not record task outcome"),
        }
    }
}

/// Apply `progress` events from `events` to the task until the stream closes.
async fn forward_progress(
    tasks: Arc<TaskManager>,
    events: Arc<dyn Stream>,
    task_id: String,
    ctx: Context,
) -> std::result::Result<(), SinkError<AppError>> {
    Sink::new()
        .consume(&ctx, events.as_ref(), |event| {
            let tasks = Arc::clone(&tasks);
            let task_id = task_id.clone();
            async move {
                match event.event_type {
                    EventType::Progress => {
                        if let Some(progress) = progress_value(&event.data) {
                            tasks.set_progress(&task_id, progress).await?;
                        }
                    }
                    EventType::Error => warn!(data = %event.data, "agent reported an error event"),
                    other => debug!(event_type = %other, "agent event"),
                }
                Result::<()>::Ok(())
            }
        })
        .await
}

/// Extract a progress fraction from `{"progress": f}` or a bare number.
fn progress_value(data: &Value) -> Option<f64> {
    data.get("progress")
        .and_then(Value::as_f64)
        .or_else(|| data.as_f64())
}
