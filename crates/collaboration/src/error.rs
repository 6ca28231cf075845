use thiserror::Error;

pub type CollaborationResult<T> = Result<T, CollaborationError>;

#[derive(Debug, Error)]
pub enum CollaborationError {
    #[error("collaboration runs require a running tokio runtime")]
    RuntimeUnavailable(#[from] tokio::runtime::TryCurrentError),
}
