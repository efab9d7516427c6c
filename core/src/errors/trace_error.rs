// core/src/errors/trace_error.rs
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TraceError {
    #[error("trace prediction cancelled: {0}")]
    Cancelled(String),

    #[error("trace semaphore closed unexpectedly")]
    SemaphoreClosed,
}
