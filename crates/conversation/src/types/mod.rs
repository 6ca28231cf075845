//! Shared error and result types.

pub mod errors;

pub use errors::{CollaboratorError, CollaboratorResult, SendError, SendResult};
