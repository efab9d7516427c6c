pub mod analyzer;
pub mod api;
pub mod config;
pub mod digest;
pub mod errors;
pub mod oracle;
pub mod orbit;
pub mod scorer;
pub mod similarity;
pub mod threshold;
pub mod trace;
pub mod transform;

pub use analyzer::Analyzer;
