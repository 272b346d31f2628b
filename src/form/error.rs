use thiserror::Error;

use crate::tree::ErrorTree;

/// Failure raised by user-supplied validators and handlers.
pub type ValidatorError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type FormResult<T> = Result<T, FormError>;

#[derive(Debug, Error)]
pub enum FormError {
    #[error("form state lock poisoned while {0}")]
    StatePoisoned(&'static str),

    /// The schema engine reported a structural failure rather than field errors.
    #[error("schema validation failed: {0}")]
    Schema(#[source] SchemaError),

    #[error("form validator failed: {0}")]
    FormValidator(#[source] ValidatorError),

    #[error("submit handler failed: {0}")]
    Submit(#[source] ValidatorError),

    #[error("ui event carries neither a field name nor an id")]
    MissingFieldName,
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct SchemaError {
    message: String,
    #[source]
    source: Option<ValidatorError>,
}

impl SchemaError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(message: impl Into<String>, source: impl Into<ValidatorError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// How a whole-form validator can fail.
#[derive(Debug)]
pub enum FormValidatorError {
    /// A rejection carrying an error tree; merged like a normal result.
    Errors(ErrorTree),
    /// Anything else; surfaced to the caller as [`FormError::FormValidator`].
    Fatal(ValidatorError),
}

impl FormValidatorError {
    pub fn fatal(error: impl Into<ValidatorError>) -> Self {
        FormValidatorError::Fatal(error.into())
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn schema_error_keeps_its_source() {
        let error = FormError::Schema(SchemaError::with_source(
            "schema is malformed",
            "unknown rule `emial`",
        ));
        assert_eq!(
            error.to_string(),
            "schema validation failed: schema is malformed"
        );
        let schema = error.source().expect("schema error source");
        assert_eq!(
            schema.source().map(ToString::to_string),
            Some("unknown rule `emial`".to_string())
        );
    }

    #[test]
    fn poisoned_state_names_the_operation() {
        let error = FormError::StatePoisoned("submitting form");
        assert_eq!(
            error.to_string(),
            "form state lock poisoned while submitting form"
        );
    }
}
