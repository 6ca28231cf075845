//! Validation utilities.

use crate::types::SendError;

/// Validation utilities
pub struct Validator;

impl Validator {
    /// Validate outgoing message content and return it trimmed.
    ///
    /// Blank content is rejected first. The length bound applies to the
    /// content as typed, counted in characters.
    pub fn message_content(content: &str, max_length: usize) -> Result<&str, SendError> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(SendError::Empty);
        }

        let length = content.chars().count();
        if length > max_length {
            return Err(SendError::TooLong {
                length,
                max: max_length,
            });
        }

        Ok(trimmed)
    }
}
