//! In-process event streams.
//!
//! A [`Source`](source::Source) creates streams, producers call
//! [`Stream::send`], and consumers either read through
//! [`Stream::events`] directly or hand the stream to a
//! [`Sink`](sink::Sink).
//!
//! Two variants exist: [`UnbufferedStream`](unbuffered::UnbufferedStream)
//! hands each event directly to a waiting consumer, and
//! [`BufferedStream`](buffered::BufferedStream) queues up to a fixed
//! capacity with a [`Backpressure`] policy.

pub mod buffered;
pub mod event;
pub mod heartbeat;
pub mod sink;
pub mod source;
pub mod unbuffered;

use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::time::Duration;

use futures_util::stream::{self as futures_stream, BoxStream};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::context::Context;
use crate::{AppError, StreamError};

pub use buffered::BufferedStream;
pub use event::{Event, EventType};
pub use sink::Sink;
pub use source::Source;
pub use unbuffered::UnbufferedStream;

/// Default capacity for buffered streams.
pub const DEFAULT_BUFFER_SIZE: usize = 100;

/// Default interval between heartbeat events.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Boxed future returned by the stream traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Policy applied when a buffered stream is full.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Backpressure {
    /// Wait for space.
    #[default]
    Block,
    /// Reject the event with [`StreamError::BufferFull`].
    Drop,
}

impl FromStr for Backpressure {
    type Err = AppError;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "block" => Ok(Self::Block),
            "drop" => Ok(Self::Drop),
            other => Err(AppError::Config(format!(
                "unknown backpressure mode '{other}'"
            ))),
        }
    }
}

/// One-shot broadcast signal that becomes ready when a stream starts closing.
///
/// Every clone observes the same signal.
#[derive(Debug, Clone, Default)]
pub struct Done(CancellationToken);

impl Done {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fire(&self) -> bool {
        let first = !self.0.is_cancelled();
        self.0.cancel();
        first
    }

    /// Whether the signal has fired.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.0.is_cancelled()
    }

    /// Resolve once the signal fires.
    pub async fn wait(&self) {
        self.0.cancelled().await;
    }
}

/// Producer-facing stream capability.
pub trait Stream: Send + Sync {
    /// Diagnostic identifier.
    fn id(&self) -> &str;

    /// Attempt to deliver `event`.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Closed`] after `close`,
    /// [`StreamError::BufferFull`] from a saturated drop-mode stream, or
    /// [`StreamError::Cancelled`] when `ctx` stops first.
    fn send<'a>(
        &'a self,
        ctx: &'a Context,
        event: Event,
    ) -> BoxFuture<'a, Result<(), StreamError>>;

    /// Mark the stream terminal. Idempotent.
    fn close(&self) -> BoxFuture<'_, ()>;

    /// Signal that fires when `close` is first called.
    fn done(&self) -> Done;

    /// Consumer-side access, when the variant offers it.
    fn events(&self) -> Option<&dyn EventReceiver> {
        None
    }
}

/// Consumer-side access to a stream's events.
pub trait EventReceiver: Send + Sync {
    /// Next event, or `None` once the sequence is terminated.
    fn recv(&self) -> BoxFuture<'_, Option<Event>>;

    /// Next event if one is immediately available.
    fn try_recv(&self) -> Option<Event>;
}

/// Adapt a receiver into a [`futures_util::Stream`] of events.
#[must_use]
pub fn events_stream(receiver: &dyn EventReceiver) -> BoxStream<'_, Event> {
    Box::pin(futures_stream::unfold(receiver, |receiver| async move {
        receiver.recv().await.map(|event| (event, receiver))
    }))
}
