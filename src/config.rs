//! Configuration parsing and validation.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::stream::{Backpressure, Source, DEFAULT_BUFFER_SIZE};
use crate::{AppError, Result};

fn default_http_port() -> u16 {
    3000
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

fn default_task_events_seconds() -> u64 {
    20
}

fn default_finished_task_seconds() -> u64 {
    3600
}

/// Settings for streams created on behalf of agent invocations.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct StreamConfig {
    /// Capacity of each invocation's event stream; 0 is raised to 1.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Overflow policy for those streams.
    #[serde(default)]
    pub backpressure: Backpressure,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            backpressure: Backpressure::default(),
        }
    }
}

/// Heartbeat cadence for long-lived responses.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct HeartbeatConfig {
    /// Seconds between heartbeat frames on the task-events endpoint.
    #[serde(default = "default_task_events_seconds")]
    pub task_events_seconds: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            task_events_seconds: default_task_events_seconds(),
        }
    }
}

/// How long finished tasks remain in the registry.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct RetentionConfig {
    /// Seconds a terminal task stays queryable after its last update.
    #[serde(default = "default_finished_task_seconds")]
    pub finished_task_seconds: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            finished_task_seconds: default_finished_task_seconds(),
        }
    }
}

/// Application configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct AppConfig {
    /// HTTP port for the RPC and task-events endpoints.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Invocation stream settings.
    #[serde(default)]
    pub stream: StreamConfig,
    /// Heartbeat settings.
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    /// Finished-task retention.
    #[serde(default)]
    pub retention: RetentionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            stream: StreamConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            retention: RetentionConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse and validate configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Interval between heartbeat frames on the task-events endpoint.
    #[must_use]
    pub fn task_events_heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat.task_events_seconds)
    }

    /// How long finished tasks are kept before the retention sweep drops them.
    #[must_use]
    pub fn finished_task_retention(&self) -> Duration {
        Duration::from_secs(self.retention.finished_task_seconds)
    }

    /// Stream factory configured with the invocation backpressure policy.
    #[must_use]
    pub fn source(&self) -> Source {
        Source::new(self.stream.backpressure)
    }

    fn validate(&mut self) -> Result<()> {
        if self.heartbeat.task_events_seconds == 0 {
            return Err(AppError::Config(
                "heartbeat.task_events_seconds must be greater than zero".into(),
            ));
        }

        self.stream.buffer_size = self.stream.buffer_size.max(1);
        Ok(())
    }
}
