//! Bounded FIFO stream with a block-or-drop overflow policy.
//!
//! The queue and the closed flag share one mutex, so an enqueue either
//! lands before `close` (and is drained by consumers afterwards) or
//! observes the closed flag. Waiters register on a [`Notify`] before
//! inspecting the queue to avoid lost wake-ups.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use uuid::Uuid;

use super::{Backpressure, BoxFuture, Done, Event, EventReceiver, Stream};
use crate::context::Context;
use crate::StreamError;

enum Pop {
    Event(Event),
    /// Closed and empty.
    Finished,
    Empty,
}

struct State {
    queue: VecDeque<Event>,
    closed: bool,
}

/// Buffered stream with fixed capacity.
pub struct BufferedStream {
    id: String,
    capacity: usize,
    backpressure: Backpressure,
    state: Mutex<State>,
    /// Signalled when an event is enqueued or the stream closes.
    items: Notify,
    /// Signalled when queue space frees up.
    space: Notify,
    done: Done,
}

impl BufferedStream {
    /// Create an open stream; a capacity of 0 is raised to 1.
    #[must_use]
    pub fn new(capacity: usize, backpressure: Backpressure) -> Self {
        let capacity = capacity.max(1);
        Self {
            id: Uuid::new_v4().to_string(),
            capacity,
            backpressure,
            state: Mutex::new(State {
                queue: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            items: Notify::new(),
            space: Notify::new(),
            done: Done::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Diagnostic identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Maximum number of queued events.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Overflow policy.
    #[must_use]
    pub fn backpressure(&self) -> Backpressure {
        self.backpressure
    }

    /// Number of events currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    /// Whether `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Enqueue `event`.
    ///
    /// In [`Backpressure::Block`] mode this waits for space; in
    /// [`Backpressure::Drop`] mode it never waits.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Closed`] once the stream is closed,
    /// [`StreamError::BufferFull`] when a drop-mode stream is saturated, or
    /// [`StreamError::Cancelled`] if `ctx` stops while waiting for space.
    pub async fn send(&self, ctx: &Context, event: Event) -> Result<(), StreamError> {
        if let Some(reason) = ctx.err() {
            return Err(reason.into());
        }

        loop {
            let space = self.space.notified();
            tokio::pin!(space);
            space.as_mut().enable();

            {
                let mut state = self.lock();
                if state.closed {
                    return Err(StreamError::Closed);
                }
                if state.queue.len() < self.capacity {
                    state.queue.push_back(event);
                    drop(state);
                    self.items.notify_one();
                    return Ok(());
                }
                if self.backpressure == Backpressure::Drop {
                    return Err(StreamError::BufferFull);
                }
            }

            tokio::select! {
                biased;
                () = self.done.wait() => return Err(StreamError::Closed),
                reason = ctx.done() => return Err(StreamError::Cancelled(reason)),
                () = &mut space => {}
            }
        }
    }

    /// Close the stream. Idempotent; queued events stay readable.
    pub fn close(&self) {
        let first = {
            let mut state = self.lock();
            !std::mem::replace(&mut state.closed, true)
        };
        if first {
            self.done.fire();
            self.items.notify_waiters();
        }
    }

    /// Discard every currently queued event, returning how many were dropped.
    ///
    /// Never waits; sends may keep arriving until `close`.
    pub fn drain(&self) -> usize {
        let drained = {
            let mut state = self.lock();
            let count = state.queue.len();
            state.queue.clear();
            count
        };
        if drained > 0 {
            self.space.notify_waiters();
        }
        drained
    }

    /// Take the next event, waiting while the queue is empty.
    ///
    /// Returns `None` once the stream is closed and empty.
    pub async fn recv(&self) -> Option<Event> {
        loop {
            let items = self.items.notified();
            tokio::pin!(items);
            items.as_mut().enable();

            match self.pop() {
                Pop::Event(event) => return Some(event),
                Pop::Finished => return None,
                Pop::Empty => items.await,
            }
        }
    }

    /// Take the next queued event without waiting.
    #[must_use]
    pub fn try_recv(&self) -> Option<Event> {
        match self.pop() {
            Pop::Event(event) => Some(event),
            Pop::Finished | Pop::Empty => None,
        }
    }

    fn pop(&self) -> Pop {
        let mut state = self.lock();
        match state.queue.pop_front() {
            Some(event) => {
                drop(state);
                self.space.notify_waiters();
                Pop::Event(event)
            }
            None if state.closed => Pop::Finished,
            None => Pop::Empty,
        }
    }
}

impl Stream for BufferedStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn send<'a>(
        &'a self,
        ctx: &'a Context,
        event: Event,
    ) -> BoxFuture<'a, Result<(), StreamError>> {
        Box::pin(BufferedStream::send(self, ctx, event))
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move { BufferedStream::close(self) })
    }

    fn done(&self) -> Done {
        self.done.clone()
    }

    fn events(&self) -> Option<&dyn EventReceiver> {
        Some(self)
    }
}

impl EventReceiver for BufferedStream {
    fn recv(&self) -> BoxFuture<'_, Option<Event>> {
        Box::pin(BufferedStream::recv(self))
    }

    fn try_recv(&self) -> Option<Event> {
        BufferedStream::try_recv(self)
    }
}
