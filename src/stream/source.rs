//! Stream factory.

use super::{Backpressure, BufferedStream, UnbufferedStream};
use crate::context::Context;

/// Creates streams with a default backpressure policy.
///
/// A source keeps no reference to the streams it hands out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Source {
    backpressure: Backpressure,
}

impl Source {
    /// Source whose buffered streams use `backpressure`.
    #[must_use]
    pub fn new(backpressure: Backpressure) -> Self {
        Self { backpressure }
    }

    /// Policy applied to buffered streams from this source.
    #[must_use]
    pub fn backpressure(&self) -> Backpressure {
        self.backpressure
    }

    /// New unbuffered stream.
    ///
    /// The context is accepted for symmetry; the stream's lifecycle is not
    /// bound to it.
    #[must_use]
    #[allow(clippy::unused_self)]
    pub fn new_stream(&self, _ctx: &Context) -> UnbufferedStream {
        UnbufferedStream::new()
    }

    /// New buffered stream holding up to `size` events (at least one).
    #[must_use]
    pub fn new_buffered_stream(&self, _ctx: &Context, size: usize) -> BufferedStream {
        BufferedStream::new(size, self.backpressure)
    }
}
