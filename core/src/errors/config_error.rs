// core/src/errors/config_error.rs
use std::fmt;

use thiserror::Error;

/// One rejected configuration field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(String),

    #[error("config parse error: {0:#}")]
    Parse(#[source] anyhow::Error),

    #[error("config validation failed: {}", join_fields(.0))]
    Invalid(Vec<FieldError>),

    #[error("env var invalid: {key}")]
    EnvInvalid {
        key: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ConfigError {
    pub fn fields(&self) -> &[FieldError] {
        match self {
            ConfigError::Invalid(errs) => errs,
            _ => &[],
        }
    }
}

fn join_fields(errs: &[FieldError]) -> String {
    errs.iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
