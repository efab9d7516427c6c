pub mod analyze;
pub mod cli;
pub mod input;
pub mod thresholds;
