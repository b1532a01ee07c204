use thiserror::Error;

/// A malformed datetime, date, offset or timezone value, or a conflicting /
/// missing combination of date fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct DateTimeValidationError(pub String);

impl DateTimeValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A recurrence rule that violates the supported grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Recurrence rule {index} {field} {reason}")]
pub struct InvalidInputError {
    /// Position of the offending entry in the recurrence list.
    pub index: usize,
    /// Rule key (`FREQ`, `BYDAY`, ...) or entry kind (`EXDATE`, `RULE`).
    pub field: String,
    pub reason: String,
}

impl InvalidInputError {
    pub fn new(index: usize, field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            index,
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CadenceError {
    #[error(transparent)]
    InvalidInput(#[from] InvalidInputError),

    #[error(transparent)]
    DateTimeValidation(#[from] DateTimeValidationError),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),
}

pub type Result<T, E = CadenceError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_message_names_index_and_field() {
        let err = InvalidInputError::new(0, "BYMONTHDAY", "must be 1-29 for month 2");
        assert_eq!(
            err.to_string(),
            "Recurrence rule 0 BYMONTHDAY must be 1-29 for month 2"
        );
    }

    #[test]
    fn wrapped_errors_keep_their_message() {
        let err: CadenceError = DateTimeValidationError::new("Invalid timeZone").into();
        assert_eq!(err.to_string(), "Invalid timeZone");
        assert!(matches!(err, CadenceError::DateTimeValidation(_)));
    }
}
