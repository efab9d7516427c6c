mod extract;
mod predictor;
mod prompt;
mod types;

pub use extract::extract_json_object;
pub use predictor::{TraceBatch, TracePredictor};
pub use prompt::{build_user_prompt, SYSTEM_PROMPT};
pub use types::{ExecutionTrace, TraceState, TraceStep};
