// core/src/errors/store_error.rs
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("threshold state i/o error: {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("threshold state decode error")]
    Decode(#[source] serde_json::Error),

    #[error("threshold state encode error")]
    Encode(#[source] serde_json::Error),
}
