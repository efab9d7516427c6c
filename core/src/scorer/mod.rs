//! Aggregation of pairwise scores into one decision.

mod reasoning;

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::similarity::{SimilarityResult, TraceAnomaly};

pub use reasoning::generate_reasoning;

/// Any anomaly at or above this severity blocks outright.
pub const BLOCK_SEVERITY: f64 = 0.95;
/// Anomalies at or above this severity count toward ask-to-deny escalation.
pub const ESCALATION_SEVERITY: f64 = 0.7;
const ESCALATION_COUNT: usize = 2;

/// Ordered by severity: `Allow < Ask < Deny < Block`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Ask,
    Deny,
    Block,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Ask => "ask",
            Decision::Deny => "deny",
            Decision::Block => "block",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    /// The 25th percentile; this is what drives the decision.
    pub aggregate: f64,
    pub min: f64,
    pub p25: f64,
    pub p50: f64,
    pub mean: f64,
    pub pairs: usize,
}

/// Sorted-ascending element at `floor(n / 4)`. Empty input means no evidence
/// of divergence and yields 1.0.
pub fn compute_aggregate_score(results: &[SimilarityResult]) -> ScoreSummary {
    if results.is_empty() {
        return ScoreSummary {
            aggregate: 1.0,
            min: 1.0,
            p25: 1.0,
            p50: 1.0,
            mean: 1.0,
            pairs: 0,
        };
    }

    let mut scores: Vec<f64> = results.iter().map(|r| r.score).collect();
    scores.sort_by(|a, b| a.total_cmp(b));
    let n = scores.len();
    let at = |idx: usize| scores[idx.min(n - 1)];

    let p25 = at(n / 4);
    ScoreSummary {
        aggregate: p25,
        min: scores[0],
        p25,
        p50: at(n / 2),
        mean: scores.iter().sum::<f64>() / n as f64,
        pairs: n,
    }
}

/// Union of all pairwise anomalies, first occurrence kept per
/// `(type, description)`, most severe first.
pub fn collect_anomalies(results: &[SimilarityResult]) -> Vec<TraceAnomaly> {
    let mut seen = HashSet::new();
    let mut out: Vec<TraceAnomaly> = results
        .iter()
        .flat_map(|r| r.anomalies.iter())
        .filter(|a| seen.insert((a.anomaly_type, a.description.clone())))
        .cloned()
        .collect();
    out.sort_by(|a, b| b.severity.total_cmp(&a.severity));
    out
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scorer {
    deny_threshold: f64,
    ask_threshold: f64,
}

impl Scorer {
    pub fn new(deny_threshold: f64, ask_threshold: f64) -> Self {
        Self {
            deny_threshold,
            ask_threshold,
        }
    }

    pub fn thresholds(&self) -> (f64, f64) {
        (self.deny_threshold, self.ask_threshold)
    }

    pub fn make_decision(&self, score: f64, anomalies: &[TraceAnomaly]) -> Decision {
        if anomalies.iter().any(|a| a.severity >= BLOCK_SEVERITY) {
            return Decision::Block;
        }
        if score < self.deny_threshold {
            return Decision::Deny;
        }
        if score < self.ask_threshold {
            let serious = anomalies
                .iter()
                .filter(|a| a.severity >= ESCALATION_SEVERITY)
                .count();
            if serious >= ESCALATION_COUNT {
                return Decision::Deny;
            }
            return Decision::Ask;
        }
        Decision::Allow
    }
}
