//! Consumer loop that drives a handler over a stream's events.

use std::future::Future;

use super::{Event, EventReceiver, Stream};
use crate::context::Context;
use crate::SinkError;

/// Stateless consumer driver. A sink never closes the stream it reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sink;

impl Sink {
    /// Create a sink.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Feed every event from `stream` to `handler` until the stream closes.
    ///
    /// Once the stream's done signal fires, events still in flight are
    /// handed to the handler before returning. Streams without consumer
    /// access are waited on without invoking the handler.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Cancelled`] if `ctx` stops first, or
    /// [`SinkError::Handler`] with the first handler failure; no further
    /// events are consumed after a failure.
    #[allow(clippy::unused_self)]
    pub async fn consume<S, F, Fut, E>(
        &self,
        ctx: &Context,
        stream: &S,
        mut handler: F,
    ) -> Result<(), SinkError<E>>
    where
        S: Stream + ?Sized,
        F: FnMut(Event) -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        let done = stream.done();

        let Some(events) = stream.events() else {
            return tokio::select! {
                biased;
                reason = ctx.done() => Err(SinkError::Cancelled(reason)),
                () = done.wait() => Ok(()),
            };
        };

        loop {
            tokio::select! {
                biased;
                reason = ctx.done() => return Err(SinkError::Cancelled(reason)),
                () = done.wait() => return drain(ctx, events, &mut handler).await,
                next = events.recv() => match next {
                    Some(event) => handler(event).await.map_err(SinkError::Handler)?,
                    None => return Ok(()),
                },
            }
        }
    }
}

async fn drain<F, Fut, E>(
    ctx: &Context,
    events: &dyn EventReceiver,
    handler: &mut F,
) -> Result<(), SinkError<E>>
where
    F: FnMut(Event) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    loop {
        let next = tokio::select! {
            biased;
            reason = ctx.done() => return Err(SinkError::Cancelled(reason)),
            next = events.recv() => next,
        };
        match next {
            Some(event) => handler(event).await.map_err(SinkError::Handler)?,
            None => return Ok(()),
        }
    }
}
