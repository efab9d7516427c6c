// core/src/errors/orbit_error.rs
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrbitError {
    #[error("insufficient variants: generated {generated}, need at least {required}")]
    InsufficientVariants { generated: usize, required: usize },

    #[error("insufficient transform diversity: {distinct} distinct transform types, need at least 2")]
    InsufficientDiversity { distinct: usize },

    #[error("empty input code")]
    EmptyInput,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("transform not applicable: {0}")]
    NotApplicable(String),

    #[error("transform failed: {0}")]
    Failed(String),
}
