use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::orbit::CodeVariant;
use crate::scorer::{Decision, ScoreSummary};
use crate::similarity::TraceAnomaly;
use crate::trace::ExecutionTrace;

/// Outcome of one analysis, with enough detail for an external audit log.
#[derive(Debug, Clone, Serialize)]
pub struct CtvpResult {
    pub analysis_id: String,
    pub analyzed_at: DateTime<Utc>,
    pub code: String,
    pub tool_name: String,
    pub decision: Decision,
    pub reasoning: String,
    pub score: f64,
    pub summary: Option<ScoreSummary>,
    pub pairwise_scores: Vec<f64>,
    pub anomalies: Vec<TraceAnomaly>,
    pub variants: Vec<CodeVariant>,
    pub traces: Vec<ExecutionTrace>,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    pub cached: bool,
    /// Resolved to Allow for lack of evidence rather than on the merits.
    pub fail_open: bool,
    /// Provisional Allow returned while a background analysis runs.
    pub pending: bool,
}

impl CtvpResult {
    fn base(code: &str, tool_name: &str, decision: Decision, reasoning: String) -> Self {
        Self {
            analysis_id: Uuid::new_v4().to_string(),
            analyzed_at: Utc::now(),
            code: code.to_string(),
            tool_name: tool_name.to_string(),
            decision,
            reasoning,
            score: 1.0,
            summary: None,
            pairwise_scores: Vec::new(),
            anomalies: Vec::new(),
            variants: Vec::new(),
            traces: Vec::new(),
            duration: Duration::ZERO,
            cached: false,
            fail_open: false,
            pending: false,
        }
    }

    pub fn fail_open(code: &str, tool_name: &str, reason: &str, duration: Duration) -> Self {
        let mut r = Self::base(
            code,
            tool_name,
            Decision::Allow,
            format!("Analysis inconclusive, allowing by default: {reason}"),
        );
        r.fail_open = true;
        r.duration = duration;
        r
    }

    pub fn pending(code: &str, tool_name: &str) -> Self {
        let mut r = Self::base(
            code,
            tool_name,
            Decision::Allow,
            "Consistency analysis pending; allowing provisionally.".to_string(),
        );
        r.fail_open = true;
        r.pending = true;
        r
    }

    pub(crate) fn scored(code: &str, tool_name: &str, decision: Decision, reasoning: String) -> Self {
        Self::base(code, tool_name, decision, reasoning)
    }

    /// True for ask, deny and block.
    pub fn is_flagged(&self) -> bool {
        self.decision > Decision::Allow
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}
