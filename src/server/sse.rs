//! Task-events endpoint: a long-lived SSE feed for one task.
//!
//! The feed blends the task's update subscription with a heartbeat timer.
//! It ends when the subscription ends (terminal task state or server
//! shutdown) or when the client goes away and axum drops the body.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::sse::{self, Sse};
use axum::response::{IntoResponse, Response};
use futures_util::stream::{self as futures_stream, Stream as FuturesStream, StreamExt};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, trace};

use super::handler::AppState;
use crate::models::task::TaskUpdate;
use crate::orchestrator::task_manager::TaskSubscription;
use crate::stream::Event;
use crate::{AppError, Result};

/// One item of the task-events feed.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskFrame {
    /// A task update.
    Task(TaskUpdate),
    /// Periodic keep-alive.
    Heartbeat,
}

impl TaskFrame {
    /// Render as an SSE frame: `event: task` with the task id, or
    /// `event: heartbeat` with `data: {}`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Http` if the update cannot be serialised or its id
    /// cannot be carried by SSE framing.
    pub fn to_sse(&self) -> Result<sse::Event> {
        match self {
            Self::Heartbeat => Event::heartbeat().to_sse(),
            Self::Task(update) => {
                if update.id.contains(['\n', '\r', '\0']) {
                    return Err(AppError::Http(format!(
                        "task id {:?} cannot be framed as SSE",
                        update.id
                    )));
                }
                let data = serde_json::to_string(update)
                    .map_err(|err| AppError::Http(format!("task update encoding: {err}")))?;
                Ok(sse::Event::default()
                    .event("task")
                    .id(update.id.as_str())
                    .data(data))
            }
        }
    }
}

struct Feed {
    subscription: TaskSubscription,
    ticker: Interval,
}

/// Merge `subscription` with a heartbeat every `heartbeat`.
///
/// The first heartbeat fires one interval after the feed starts.
#[must_use]
pub fn task_feed(
    subscription: TaskSubscription,
    heartbeat: Duration,
) -> impl FuturesStream<Item = TaskFrame> + Send + 'static {
    let mut ticker = interval_at(Instant::now() + heartbeat, heartbeat);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    futures_stream::unfold(
        Feed {
            subscription,
            ticker,
        },
        |mut feed| async move {
            let frame = tokio::select! {
                biased;
                update = feed.subscription.next() => TaskFrame::Task(update?),
                _ = feed.ticker.tick() => TaskFrame::Heartbeat,
            };
            Some((frame, feed))
        },
    )
}

/// Handler for `GET /tasks/{id}/events`.
pub async fn task_events(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Response {
    let ctx = state.shutdown.with_cancel();
    let subscription = match state.tasks.subscribe(&ctx, &task_id).await {
        Ok(subscription) => subscription,
        Err(AppError::NotFound(msg)) => {
            debug!(%task_id, "task-events for unknown task");
            return (StatusCode::NOT_FOUND, format!("not found: {msg}")).into_response();
        }
        Err(err) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response();
        }
    };

    info!(%task_id, "task-events subscriber connected");
    let heartbeat = state.config.task_events_heartbeat();

    // Dropping the body (client disconnect) cancels the subscription context.
    let guard = ctx.token().clone().drop_guard();
    let frames = task_feed(subscription, heartbeat).map(move |frame| {
        let _cancel_on_drop = &guard;
        if matches!(frame, TaskFrame::Heartbeat) {
            trace!(%task_id, "task-events heartbeat");
        }
        frame.to_sse()
    });

    (
        [(header::CONNECTION, "keep-alive")],
        Sse::new(frames),
    )
        .into_response()
}
