use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceStep {
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub operation: String,
    #[serde(default)]
    pub variables: BTreeMap<String, Value>,
    #[serde(default, alias = "sideEffects")]
    pub side_effects: Vec<String>,
}

/// Final program state as predicted by the oracle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceState {
    #[serde(default)]
    pub variables: BTreeMap<String, Value>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Predicted execution of one variant. `variant_id` is a lookup key into the
/// orbit, not an owning reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub variant_id: String,
    pub steps: Vec<TraceStep>,
    pub final_state: TraceState,
    pub confidence: f64,
    pub error: Option<String>,
    pub prediction_time: Duration,
}

impl ExecutionTrace {
    pub fn failed(variant_id: &str, error: impl Into<String>, prediction_time: Duration) -> Self {
        Self {
            variant_id: variant_id.to_string(),
            steps: Vec::new(),
            final_state: TraceState::default(),
            confidence: 0.0,
            error: Some(error.into()),
            prediction_time,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Wire shape of the oracle's JSON answer.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct PredictedTrace {
    #[serde(default)]
    pub steps: Vec<TraceStep>,
    #[serde(default, alias = "finalState")]
    pub final_state: TraceState,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    0.5
}
