//! Zero-capacity hand-off stream.
//!
//! A send publishes an *offer* holding its event and waits. A consumer
//! completes the hand-off by taking the event out of the offer; a sender
//! that gives up (closure, cancellation, or its future being dropped)
//! takes it back instead. Both sides race on the same slot, so an event is
//! delivered exactly when the corresponding `send` returns `Ok`.
//!
//! Closing flags the stream, fires [`Done`] to release pending sends, waits
//! for every in-flight send to resolve, and only then terminates the event
//! sequence.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::{mpsc, oneshot};
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use super::{BoxFuture, Done, Event, EventReceiver, Stream};
use crate::context::Context;
use crate::StreamError;

type Handoff = (Event, oneshot::Sender<()>);

/// A pending event waiting to be taken by a consumer or retracted by its sender.
struct Offer {
    slot: Mutex<Option<Handoff>>,
}

impl Offer {
    fn new(event: Event, ack: oneshot::Sender<()>) -> Self {
        Self {
            slot: Mutex::new(Some((event, ack))),
        }
    }

    /// Consumer side: take the event and wake the sender.
    fn accept(&self) -> Option<Event> {
        let taken = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        taken.map(|(event, ack)| {
            let _ = ack.send(());
            event
        })
    }

    /// Sender side: returns `true` if the event was still pending.
    fn retract(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
    }
}

/// Retracts the offer if the send future is dropped mid-flight.
struct RetractOnDrop(Arc<Offer>);

impl Drop for RetractOnDrop {
    fn drop(&mut self) {
        self.0.retract();
    }
}

struct State {
    closed: bool,
    /// Publishing side of the offer queue; taken when the sequence is finalised.
    offers: Option<mpsc::UnboundedSender<Arc<Offer>>>,
}

/// Unbuffered stream: `send` completes only once a consumer takes the event.
pub struct UnbufferedStream {
    id: String,
    state: RwLock<State>,
    receiver: tokio::sync::Mutex<mpsc::UnboundedReceiver<Arc<Offer>>>,
    pending: TaskTracker,
    done: Done,
}

impl UnbufferedStream {
    /// Create an open stream.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            id: Uuid::new_v4().to_string(),
            state: RwLock::new(State {
                closed: false,
                offers: Some(tx),
            }),
            receiver: tokio::sync::Mutex::new(rx),
            pending: TaskTracker::new(),
            done: Done::new(),
        }
    }

    /// Diagnostic identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .closed
    }

    /// Number of sends currently waiting for a consumer.
    #[must_use]
    pub fn pending_sends(&self) -> usize {
        self.pending.len()
    }

    /// Hand `event` to a consumer.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Closed`] if the stream is closed before a
    /// consumer takes the event, or [`StreamError::Cancelled`] if `ctx`
    /// stops first.
    pub async fn send(&self, ctx: &Context, event: Event) -> Result<(), StreamError> {
        if let Some(reason) = ctx.err() {
            return Err(reason.into());
        }

        // The pending-send token is taken under the same lock that `close`
        // uses to flip the flag, so `close` never misses an in-flight send.
        let (offers, _pending) = {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            match (&state.offers, state.closed) {
                (Some(offers), false) => (offers.clone(), self.pending.token()),
                _ => return Err(StreamError::Closed),
            }
        };

        let (ack_tx, ack_rx) = oneshot::channel();
        let offer = Arc::new(Offer::new(event, ack_tx));
        let _retract = RetractOnDrop(Arc::clone(&offer));
        let published = offers.send(Arc::clone(&offer)).is_ok();
        drop(offers);
        if !published {
            return Err(StreamError::Closed);
        }

        let outcome = tokio::select! {
            biased;
            _ = ack_rx => Ok(()),
            () = self.done.wait() => Err(StreamError::Closed),
            reason = ctx.done() => Err(StreamError::Cancelled(reason)),
        };

        // Whoever empties the slot first decides the outcome.
        if offer.retract() {
            Err(outcome.err().unwrap_or(StreamError::Closed))
        } else {
            Ok(())
        }
    }

    /// Close the stream and wait for pending sends to resolve.
    ///
    /// Subsequent calls return once the first close has finished draining.
    pub async fn close(&self) {
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            if !state.closed {
                state.closed = true;
                self.done.fire();
                self.pending.close();
            }
        }

        self.pending.wait().await;

        let offers = self
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .offers
            .take();
        drop(offers);
    }

    /// Take the next event, waiting for a sender.
    ///
    /// Returns `None` once the stream is closed and drained.
    pub async fn recv(&self) -> Option<Event> {
        let mut receiver = self.receiver.lock().await;
        while let Some(offer) = receiver.recv().await {
            if let Some(event) = offer.accept() {
                return Some(event);
            }
        }
        None
    }

    /// Take an event from a sender that is already waiting, if any.
    #[must_use]
    pub fn try_recv(&self) -> Option<Event> {
        let mut receiver = self.receiver.try_lock().ok()?;
        while let Ok(offer) = receiver.try_recv() {
            if let Some(event) = offer.accept() {
                return Some(event);
            }
        }
        None
    }
}

impl Default for UnbufferedStream {
    fn default() -> Self {
        Self::new()
    }
}

impl Stream for UnbufferedStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn send<'a>(
        &'a self,
        ctx: &'a Context,
        event: Event,
    ) -> BoxFuture<'a, Result<(), StreamError>> {
        Box::pin(UnbufferedStream::send(self, ctx, event))
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(UnbufferedStream::close(self))
    }

    fn done(&self) -> Done {
        self.done.clone()
    }

    fn events(&self) -> Option<&dyn EventReceiver> {
        Some(self)
    }
}

impl EventReceiver for UnbufferedStream {
    fn recv(&self) -> BoxFuture<'_, Option<Event>> {
        Box::pin(UnbufferedStream::recv(self))
    }

    fn try_recv(&self) -> Option<Event> {
        UnbufferedStream::try_recv(self)
    }
}
