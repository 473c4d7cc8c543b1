//! In-memory task store with per-task update fan-out.
//!
//! Every mutation is published on the task's broadcast channel while the
//! store lock is held, so a subscriber that snapshots and subscribes under
//! the same lock sees each later update exactly once.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::context::Context;
use crate::models::task::{Task, TaskState, TaskUpdate};
use crate::{AppError, Result};

/// Default per-task broadcast capacity.
pub const DEFAULT_UPDATE_CAPACITY: usize = 64;

struct Entry {
    task: Task,
    updates: broadcast::Sender<TaskUpdate>,
}

/// Thread-safe task registry.
pub struct TaskManager {
    tasks: Mutex<HashMap<String, Entry>>,
    update_capacity: usize,
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskManager {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::with_update_capacity(DEFAULT_UPDATE_CAPACITY)
    }

    /// Create an empty registry whose subscribers buffer up to `capacity` updates.
    #[must_use]
    pub fn with_update_capacity(capacity: usize) -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            update_capacity: capacity.max(1),
        }
    }

    /// Register a new submitted task. A missing `id` is generated.
    ///
    /// # Errors
    ///
    /// Returns `AppError::AlreadyExists` if the id is taken.
    pub async fn create(&self, id: Option<String>, skill_id: impl Into<String>) -> Result<Task> {
        let id = id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut tasks = self.tasks.lock().await;
        if tasks.contains_key(&id) {
            return Err(AppError::AlreadyExists(format!("task {id}")));
        }
        let task = Task::new(id.clone(), skill_id.into());
        let (updates, _) = broadcast::channel(self.update_capacity);
        tasks.insert(
            id.clone(),
            Entry {
                task: task.clone(),
                updates,
            },
        );
        debug!(task_id = %id, "task created");
        Ok(task)
    }

    /// Current record for `id`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for unknown ids.
    pub async fn get(&self, id: &str) -> Result<Task> {
        self.tasks
            .lock()
            .await
            .get(id)
            .map(|entry| entry.task.clone())
            .ok_or_else(|| not_found(id))
    }

    /// Number of tracked tasks.
    pub async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Whether no tasks are tracked.
    pub async fn is_empty(&self) -> bool {
        self.tasks.lock().await.is_empty()
    }

    /// Move the task to `state`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for unknown ids or
    /// `AppError::InvalidTransition` if the lifecycle forbids the move.
    pub async fn set_state(&self, id: &str, state: TaskState) -> Result<Task> {
        self.update(id, |task| transition(task, state)).await
    }

    /// Record progress, clamped to `0.0..=1.0`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for unknown ids or
    /// `AppError::InvalidTransition` once the task is terminal.
    pub async fn set_progress(&self, id: &str, progress: f64) -> Result<Task> {
        self.update(id, |task| {
            if task.state.is_terminal() {
                return Err(AppError::InvalidTransition(format!(
                    "task {} is {}",
                    task.id, task.state
                )));
            }
            task.progress = progress.clamp(0.0, 1.0);
            Ok(())
        })
        .await
    }

    /// Record the result and mark the task complete.
    ///
    /// # Errors
    ///
    /// Same as [`set_state`](Self::set_state).
    pub async fn complete(&self, id: &str, result: Value) -> Result<Task> {
        self.update(id, |task| {
            transition(task, TaskState::Complete)?;
            task.progress = 1.0;
            task.result = Some(result);
            Ok(())
        })
        .await
    }

    /// Record the failure and mark the task failed.
    ///
    /// # Errors
    ///
    /// Same as [`set_state`](Self::set_state).
    pub async fn fail(&self, id: &str, error: impl Into<String>) -> Result<Task> {
        let error = error.into();
        self.update(id, |task| {
            transition(task, TaskState::Failed)?;
            task.error = Some(error);
            Ok(())
        })
        .await
    }

    /// Mark the task cancelled.
    ///
    /// # Errors
    ///
    /// Same as [`set_state`](Self::set_state).
    pub async fn cancel(&self, id: &str) -> Result<Task> {
        self.set_state(id, TaskState::Cancelled).await
    }

    /// Remove terminal tasks last updated at or before `cutoff`.
    ///
    /// Open subscriptions to a removed task end. Returns the number removed.
    pub async fn purge_finished(&self, cutoff: DateTime<Utc>) -> usize {
        let mut tasks = self.tasks.lock().await;
        let before = tasks.len();
        tasks.retain(|_, entry| {
            !(entry.task.state.is_terminal() && entry.task.updated_at <= cutoff)
        });
        before - tasks.len()
    }

    /// Follow updates for `id`.
    ///
    /// The subscription yields the current snapshot first, then every
    /// subsequent update, and ends after a terminal update or when `ctx`
    /// stops.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for unknown ids.
    pub async fn subscribe(&self, ctx: &Context, id: &str) -> Result<TaskSubscription> {
        let tasks = self.tasks.lock().await;
        let entry = tasks.get(id).ok_or_else(|| not_found(id))?;
        Ok(TaskSubscription {
            task_id: id.to_owned(),
            initial: Some(entry.task.snapshot()),
            updates: entry.updates.subscribe(),
            ctx: ctx.clone(),
            finished: false,
        })
    }

    async fn update<F>(&self, id: &str, apply: F) -> Result<Task>
    where
        F: FnOnce(&mut Task) -> Result<()>,
    {
        let mut tasks = self.tasks.lock().await;
        let entry = tasks.get_mut(id).ok_or_else(|| not_found(id))?;
        apply(&mut entry.task)?;
        entry.task.updated_at = Utc::now();
        // No subscribers is fine; the snapshot is still the source of truth.
        let _ = entry.updates.send(entry.task.snapshot());
        Ok(entry.task.clone())
    }
}

fn transition(task: &mut Task, next: TaskState) -> Result<()> {
    if !task.state.can_transition_to(next) {
        return Err(AppError::InvalidTransition(format!(
            "task {} cannot move from {} to {next}",
            task.id, task.state
        )));
    }
    task.state = next;
    Ok(())
}

fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("task {id}"))
}

/// Lazy sequence of updates for one task.
pub struct TaskSubscription {
    task_id: String,
    initial: Option<TaskUpdate>,
    updates: broadcast::Receiver<TaskUpdate>,
    ctx: Context,
    finished: bool,
}

impl TaskSubscription {
    /// Task this subscription follows.
    #[must_use]
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Next update, or `None` once the task is terminal or the context stopped.
    ///
    /// Cancel-safe: dropping the future loses no update.
    pub async fn next(&mut self) -> Option<TaskUpdate> {
        if self.finished {
            return None;
        }
        if let Some(first) = self.initial.take() {
            self.finished = first.state.is_terminal();
            return Some(first);
        }

        loop {
            let received = tokio::select! {
                biased;
                _ = self.ctx.done() => {
                    self.finished = true;
                    return None;
                }
                received = self.updates.recv() => received,
            };

            match received {
                Ok(update) => {
                    self.finished = update.state.is_terminal();
                    return Some(update);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(task_id = %self.task_id, skipped, "subscriber lagged, updates skipped");
                }
                Err(RecvError::Closed) => {
                    self.finished = true;
                    return None;
                }
            }
        }
    }
}
