//! Event record and event-type enumeration.

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::response::sse;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{AppError, Result};

/// Closed set of event kinds a producer can emit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Incremental progress report.
    Progress,
    /// Partial result.
    Partial,
    /// Final result; the producer is finished.
    Complete,
    /// The producer failed.
    Error,
    /// Keep-alive with no payload.
    Heartbeat,
}

impl EventType {
    /// Every canonical event type, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Progress,
        Self::Partial,
        Self::Complete,
        Self::Error,
        Self::Heartbeat,
    ];

    /// Canonical lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Progress => "progress",
            Self::Partial => "partial",
            Self::Complete => "complete",
            Self::Error => "error",
            Self::Heartbeat => "heartbeat",
        }
    }

    /// Whether `name` is one of the canonical event type names.
    #[must_use]
    pub fn is_valid(name: &str) -> bool {
        name.parse::<Self>().is_ok()
    }
}

impl Display for EventType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| AppError::Config(format!("unknown event type '{s}'")))
    }
}

/// A typed record transferred from producer to consumer.
///
/// The payload is reference counted: cloning an event shares `data`
/// rather than copying it.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Kind of event.
    pub event_type: EventType,
    /// Optional opaque identifier, echoed verbatim in SSE frames.
    pub id: Option<String>,
    /// Opaque payload.
    pub data: Arc<Value>,
    /// SSE reconnect hint in milliseconds; 0 means unset.
    pub retry: u64,
}

impl Event {
    /// Construct an event with the given type and payload.
    #[must_use]
    pub fn new(event_type: EventType, data: Value) -> Self {
        Self {
            event_type,
            id: None,
            data: Arc::new(data),
            retry: 0,
        }
    }

    /// Progress event carrying `data`.
    #[must_use]
    pub fn progress(data: Value) -> Self {
        Self::new(EventType::Progress, data)
    }

    /// Heartbeat event with an empty object payload.
    #[must_use]
    pub fn heartbeat() -> Self {
        Self::new(EventType::Heartbeat, Value::Object(serde_json::Map::new()))
    }

    /// Attach an identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Attach a reconnect hint in milliseconds.
    #[must_use]
    pub fn with_retry(mut self, retry_ms: u64) -> Self {
        self.retry = retry_ms;
        self
    }

    /// Render as an SSE frame.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Http` if the id contains a line break or NUL,
    /// which SSE framing cannot carry.
    pub fn to_sse(&self) -> Result<sse::Event> {
        let mut frame = sse::Event::default()
            .event(self.event_type.as_str())
            .data(self.data.to_string());
        if let Some(id) = &self.id {
            if id.contains(['\n', '\r', '\0']) {
                return Err(AppError::Http(format!(
                    "event id {id:?} cannot be framed as SSE"
                )));
            }
            frame = frame.id(id.as_str());
        }
        if self.retry > 0 {
            frame = frame.retry(Duration::from_millis(self.retry));
        }
        Ok(frame)
    }
}
