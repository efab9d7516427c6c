mod config_error;
mod oracle_error;
mod orbit_error;
mod store_error;
mod trace_error;

pub use config_error::{ConfigError, FieldError};
pub use oracle_error::OracleError;
pub use orbit_error::{OrbitError, TransformError};
pub use store_error::StoreError;
pub use trace_error::TraceError;
