use thiserror::Error;

/// Represents the default rejection value carried by futures and streams.
///
/// The core never inspects rejection values; any `Clone` type can be used as
/// the error parameter. This enum is the default and is what the `then`
/// family converts the [`Cancelled`] sentinel into.
#[derive(Error, Debug, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AsyncError {
    /// A general error with a message describing what went wrong.
    #[error("{0}")]
    Error(String),

    /// The operation was cancelled before it could settle.
    #[error("Task was cancelled!")]
    Cancelled,
}

impl AsyncError {
    pub fn error(message: impl Into<String>) -> Self {
        AsyncError::Error(message.into())
    }

    /// Returns true if this error is a general error with a message.
    pub fn is_error(&self) -> bool {
        matches!(self, AsyncError::Error { .. })
    }

    /// Returns true if this error represents a cancelled operation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AsyncError::Cancelled)
    }
}

/// Sentinel raised through the rejection channel when a `then`-style chain
/// observes a cancellation.
#[derive(Error, Debug, Clone, Copy, Eq, PartialEq, Default)]
#[error("Task was cancelled!")]
pub struct Cancelled;

impl From<Cancelled> for AsyncError {
    fn from(_: Cancelled) -> Self {
        AsyncError::Cancelled
    }
}

/// Misuse of a stream's consumer side.
#[derive(Error, Debug, Clone, Copy, Eq, PartialEq)]
pub enum StreamError {
    /// `listen` was called on a stream that has already been listened to.
    #[error("stream is already being listened to")]
    AlreadyListened,
}
