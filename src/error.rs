use thiserror::Error;

use crate::db::DbError;
use crate::llm::LlmError;

/// A failure outside the process: the LLM API or the key-value store.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Store(#[from] DbError),
}

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange { field: &'static str, value: f64, min: f64, max: f64 },
    #[error("{kind} {id} is still used by {} assistant(s)", used_by.len())]
    InUse { kind: &'static str, id: String, used_by: Vec<String> },
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Error type of the configuration layer.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error(transparent)]
    Schema(#[from] crate::schema::SchemaParseError),
}

impl From<DbError> for ConfigError {
    fn from(e: DbError) -> Self {
        ConfigError::Upstream(UpstreamError::Store(e))
    }
}

impl From<LlmError> for ConfigError {
    fn from(e: LlmError) -> Self {
        ConfigError::Upstream(UpstreamError::Llm(e))
    }
}

pub fn check_range(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<(), ValidationError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange { field, value, min, max })
    }
}

pub fn check_not_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::Empty(field))
    } else {
        Ok(())
    }
}
