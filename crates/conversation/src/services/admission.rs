//! Client-side admission control for outgoing messages.

use std::time::Duration;

use parley_config::ConversationConfig;
use tokio::time::Instant;

use crate::types::SendError;
use crate::utils::Validator;

/// Maximum accepted message length, in characters
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 2000;

/// Minimum spacing between two accepted sends
pub const DEFAULT_MIN_SEND_INTERVAL: Duration = Duration::from_millis(1000);

/// Outcome of an admission check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionDecision {
    /// Passed; carries the trimmed content to forward
    Accepted(String),
    /// Blank input, treated as a no-op request
    RejectedEmpty,
    RejectedTooLong { length: usize, max: usize },
    RejectedRateLimit { retry_after: Duration },
}

impl AdmissionDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, AdmissionDecision::Accepted(_))
    }

    pub fn into_result(self) -> Result<String, SendError> {
        match self {
            AdmissionDecision::Accepted(content) => Ok(content),
            AdmissionDecision::RejectedEmpty => Err(SendError::Empty),
            AdmissionDecision::RejectedTooLong { length, max } => {
                Err(SendError::TooLong { length, max })
            }
            AdmissionDecision::RejectedRateLimit { retry_after } => {
                Err(SendError::RateLimited { retry_after })
            }
        }
    }
}

/// Per-sender rate limit and size bound.
///
/// The timestamp of the last accepted send is the guard's only state and it
/// changes only on acceptance.
#[derive(Debug, Clone)]
pub struct AdmissionGuard {
    max_length: usize,
    min_interval: Duration,
    last_accepted_at: Option<Instant>,
}

impl AdmissionGuard {
    pub fn new(max_length: usize, min_interval: Duration) -> Self {
        Self {
            max_length,
            min_interval,
            last_accepted_at: None,
        }
    }

    pub fn from_config(config: &ConversationConfig) -> Self {
        Self::new(config.max_message_length, config.min_send_interval())
    }

    pub fn try_accept(&mut self, content: &str, now: Instant) -> AdmissionDecision {
        let trimmed = match Validator::message_content(content, self.max_length) {
            Ok(trimmed) => trimmed,
            Err(SendError::TooLong { length, max }) => {
                return AdmissionDecision::RejectedTooLong { length, max }
            }
            Err(_) => return AdmissionDecision::RejectedEmpty,
        };

        if let Some(last) = self.last_accepted_at {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < self.min_interval {
                return AdmissionDecision::RejectedRateLimit {
                    retry_after: self.min_interval - elapsed,
                };
            }
        }

        self.last_accepted_at = Some(now);
        AdmissionDecision::Accepted(trimmed.to_string())
    }

    pub fn last_accepted_at(&self) -> Option<Instant> {
        self.last_accepted_at
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

impl Default for AdmissionGuard {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_LENGTH, DEFAULT_MIN_SEND_INTERVAL)
    }
}
