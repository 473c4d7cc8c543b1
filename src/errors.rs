//! Error types shared across the application.

use std::fmt::{Display, Formatter};

use crate::context::CancelReason;

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Failure outcomes of a stream operation.
///
/// Each variant is a distinct identity usable in equality checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamError {
    /// The stream was closed before or while the send was attempted.
    Closed,
    /// A drop-mode buffered stream was saturated.
    BufferFull,
    /// The caller's context was cancelled or hit its deadline.
    Cancelled(CancelReason),
}

impl Display for StreamError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => f.write_str("stream closed"),
            Self::BufferFull => f.write_str("stream buffer full"),
            Self::Cancelled(reason) => Display::fmt(reason, f),
        }
    }
}

impl std::error::Error for StreamError {}

impl From<CancelReason> for StreamError {
    fn from(reason: CancelReason) -> Self {
        Self::Cancelled(reason)
    }
}

/// A [`StreamError`] annotated with the stream and operation it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOpError {
    /// Identifier of the stream that failed.
    pub stream_id: String,
    /// Operation name, e.g. `send`.
    pub op: &'static str,
    source: StreamError,
}

impl StreamOpError {
    /// Wrap `source` with diagnostic context.
    #[must_use]
    pub fn new(stream_id: impl Into<String>, op: &'static str, source: StreamError) -> Self {
        Self {
            stream_id: stream_id.into(),
            op,
            source,
        }
    }

    /// The wrapped error identity.
    #[must_use]
    pub fn kind(&self) -> StreamError {
        self.source
    }
}

impl Display for StreamOpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "stream {} {}: {}", self.stream_id, self.op, self.source)
    }
}

impl std::error::Error for StreamOpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

impl From<StreamOpError> for StreamError {
    fn from(err: StreamOpError) -> Self {
        err.source
    }
}

/// Outcome of a failed [`Sink::consume`](crate::stream::sink::Sink::consume).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkError<E> {
    /// The consumer's context was cancelled before the stream closed.
    Cancelled(CancelReason),
    /// The handler failed; carried verbatim.
    Handler(E),
}

impl<E: Display> Display for SinkError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled(reason) => Display::fmt(reason, f),
            Self::Handler(err) => Display::fmt(err, f),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for SinkError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Cancelled(_) => None,
            Self::Handler(err) => Some(err),
        }
    }
}

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Stream operation failure.
    Stream(StreamOpError),
    /// RPC decoding or dispatch failure.
    Rpc(String),
    /// Requested entity does not exist.
    NotFound(String),
    /// Agent invocation failure.
    Agent(String),
    /// Entity with the same identifier already exists.
    AlreadyExists(String),
    /// Invalid task state transition.
    InvalidTransition(String),
    /// HTTP server failure.
    Http(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Stream(err) => write!(f, "stream: {err}"),
            Self::Rpc(msg) => write!(f, "rpc: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Agent(msg) => write!(f, "agent: {msg}"),
            Self::AlreadyExists(msg) => write!(f, "already exists: {msg}"),
            Self::InvalidTransition(msg) => write!(f, "invalid transition: {msg}"),
            Self::Http(msg) => write!(f, "http: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Stream(err) => Some(err),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<StreamOpError> for AppError {
    fn from(err: StreamOpError) -> Self {
        Self::Stream(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
