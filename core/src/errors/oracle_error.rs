// core/src/errors/oracle_error.rs
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    #[error("oracle request timeout")]
    Timeout,

    #[error("oracle rejected credentials (check api key)")]
    Unauthorized,

    #[error("oracle rate limited")]
    RateLimited,

    #[error("oracle returned HTTP {status}")]
    HttpStatus { status: u16, body_snippet: String },

    #[error("oracle transport error")]
    Transport(#[source] anyhow::Error),

    #[error("could not decode oracle response")]
    Decode(#[source] anyhow::Error),

    #[error("oracle returned an empty completion")]
    EmptyResponse,
}

impl OracleError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OracleError::Unavailable(_) | OracleError::Timeout | OracleError::RateLimited
        )
    }
}
