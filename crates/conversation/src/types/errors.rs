//! Error types for the conversation channel.

use std::time::Duration;

use thiserror::Error;

/// Result of a send attempt
pub type SendResult<T> = Result<T, SendError>;

/// Result of a call into an external collaborator
pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

/// Why a send was not delivered. Every variant is a non-fatal, user-visible notice.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("message is empty")]
    Empty,

    #[error("message too long: {length} characters (max {max})")]
    TooLong { length: usize, max: usize },

    #[error("sending too fast, retry in {}ms", retry_after.as_millis())]
    RateLimited { retry_after: Duration },

    #[error("failed to store message: {0}")]
    WriteFailed(#[from] CollaboratorError),
}

impl SendError {
    /// Rejected locally, before any write was attempted
    pub fn is_rejection(&self) -> bool {
        !matches!(self, SendError::WriteFailed(_))
    }
}

/// Failure reported by a history, transport or write collaborator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl CollaboratorError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }
}
