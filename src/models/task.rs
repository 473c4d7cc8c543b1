//! Task model and lifecycle helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle state of an agent task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Created, worker not started yet.
    Submitted,
    /// Agent invocation in progress.
    Running,
    /// Finished with a result.
    Complete,
    /// Finished with an error.
    Failed,
    /// Abandoned before finishing.
    Cancelled,
}

impl TaskState {
    /// Canonical lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether no further transitions are possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Cancelled)
    }

    /// Determine whether a lifecycle transition is permitted.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (
                Self::Submitted,
                Self::Running | Self::Failed | Self::Cancelled
            ) | (
                Self::Running,
                Self::Complete | Self::Failed | Self::Cancelled
            )
        )
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task record held by the task manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct Task {
    /// Unique task identifier.
    pub id: String,
    /// Skill the agent was asked to run.
    pub skill_id: String,
    /// Current lifecycle state.
    pub state: TaskState,
    /// Completion fraction in `0.0..=1.0`.
    pub progress: f64,
    /// Agent result once complete.
    pub result: Option<Value>,
    /// Failure message once failed.
    pub error: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last change timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Construct a submitted task.
    #[must_use]
    pub fn new(id: String, skill_id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            skill_id,
            state: TaskState::Submitted,
            progress: 0.0,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Point-in-time view published to subscribers.
    #[must_use]
    pub fn snapshot(&self) -> TaskUpdate {
        TaskUpdate {
            id: self.id.clone(),
            state: self.state,
            progress: self.progress,
            result: self.result.clone(),
            error: self.error.clone(),
            updated_at: self.updated_at,
        }
    }
}

/// Task-update record yielded by a subscription.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct TaskUpdate {
    /// Task identifier.
    pub id: String,
    /// State at the time of the update.
    pub state: TaskState,
    /// Completion fraction in `0.0..=1.0`.
    pub progress: f64,
    /// Agent result, once complete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure message, once failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Timestamp of the change.
    pub updated_at: DateTime<Utc>,
}
