//! Cross-variant behavioral agreement.

mod align;
mod side_effects;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::{SimilarityConfig, SimilarityMetric};
use crate::trace::ExecutionTrace;

pub use align::{multiset_similarity, operations_equivalent, sequence_similarity, step_distance};
pub use side_effects::{jaccard, normalize_side_effect};

const DIVERGENCE_CUTOFF: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    TraceError,
    StepCountMismatch,
    SideEffectDivergence,
    VariableStateDivergence,
    ErrorDivergence,
    OutputDivergence,
}

impl AnomalyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyType::TraceError => "trace_error",
            AnomalyType::StepCountMismatch => "step_count_mismatch",
            AnomalyType::SideEffectDivergence => "side_effect_divergence",
            AnomalyType::VariableStateDivergence => "variable_state_divergence",
            AnomalyType::ErrorDivergence => "error_divergence",
            AnomalyType::OutputDivergence => "output_divergence",
        }
    }

    /// Fixed severity per anomaly kind.
    pub fn severity(&self) -> f64 {
        match self {
            AnomalyType::TraceError => 0.8,
            AnomalyType::StepCountMismatch => 0.7,
            AnomalyType::SideEffectDivergence => 0.9,
            AnomalyType::VariableStateDivergence => 0.6,
            AnomalyType::ErrorDivergence => 0.8,
            AnomalyType::OutputDivergence => 0.7,
        }
    }
}

impl fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A specific point where two traces disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceAnomaly {
    pub anomaly_type: AnomalyType,
    pub description: String,
    pub severity: f64,
    pub variant_a: String,
    pub variant_b: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<BTreeMap<String, Value>>,
}

impl TraceAnomaly {
    fn new(
        anomaly_type: AnomalyType,
        description: String,
        a: &ExecutionTrace,
        b: &ExecutionTrace,
        evidence: Option<BTreeMap<String, Value>>,
    ) -> Self {
        Self {
            anomaly_type,
            description,
            severity: anomaly_type.severity(),
            variant_a: a.variant_id.clone(),
            variant_b: b.variant_id.clone(),
            evidence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    pub variant_a: String,
    pub variant_b: String,
    pub score: f64,
    pub step_alignment: f64,
    pub state_match: f64,
    pub output_match: f64,
    pub anomalies: Vec<TraceAnomaly>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityWeights {
    pub step: f64,
    pub state: f64,
    pub output: f64,
}

pub struct SimilarityCalculator {
    weights: SimilarityWeights,
    metric: SimilarityMetric,
}

impl SimilarityCalculator {
    pub fn new(cfg: &SimilarityConfig) -> Self {
        Self {
            weights: SimilarityWeights {
                step: cfg.step_weight,
                state: cfg.state_weight,
                output: cfg.output_weight,
            },
            metric: cfg.effective_metric(),
        }
    }

    pub fn weights(&self) -> SimilarityWeights {
        self.weights
    }

    /// Scores one pair of traces. Symmetric in its arguments.
    pub fn compute_similarity(&self, a: &ExecutionTrace, b: &ExecutionTrace) -> SimilarityResult {
        if a.error.is_some() || b.error.is_some() {
            return errored_pair(a, b);
        }

        let mut anomalies = Vec::new();
        let step_alignment = self.step_alignment(a, b, &mut anomalies);
        side_effect_check(a, b, &mut anomalies);
        let state_match = state_match(a, b, &mut anomalies);
        let output_match = output_match(a, b, &mut anomalies);

        let score = (self.weights.step * step_alignment
            + self.weights.state * state_match
            + self.weights.output * output_match)
            .clamp(0.0, 1.0);

        SimilarityResult {
            variant_a: a.variant_id.clone(),
            variant_b: b.variant_id.clone(),
            score,
            step_alignment,
            state_match,
            output_match,
            anomalies,
        }
    }

    /// Every unordered pair `(i, j)` with `i < j`.
    pub fn compute_pairwise(&self, traces: &[&ExecutionTrace]) -> Vec<SimilarityResult> {
        let mut out = Vec::with_capacity(traces.len() * traces.len().saturating_sub(1) / 2);
        for i in 0..traces.len() {
            for j in (i + 1)..traces.len() {
                out.push(self.compute_similarity(traces[i], traces[j]));
            }
        }
        out
    }

    fn step_alignment(
        &self,
        a: &ExecutionTrace,
        b: &ExecutionTrace,
        anomalies: &mut Vec<TraceAnomaly>,
    ) -> f64 {
        let (na, nb) = (a.steps.len(), b.steps.len());
        if (na == 0) != (nb == 0) {
            anomalies.push(TraceAnomaly::new(
                AnomalyType::StepCountMismatch,
                format!(
                    "one variant predicts no steps while the other predicts {}",
                    na.max(nb)
                ),
                a,
                b,
                Some(BTreeMap::from([
                    ("steps_a".to_string(), json!(na)),
                    ("steps_b".to_string(), json!(nb)),
                ])),
            ));
            return 0.0;
        }
        match self.metric {
            SimilarityMetric::EditDistance => sequence_similarity(&a.steps, &b.steps),
            SimilarityMetric::Multiset => multiset_similarity(&a.steps, &b.steps),
        }
    }
}

fn errored_pair(a: &ExecutionTrace, b: &ExecutionTrace) -> SimilarityResult {
    let both = a.error.is_some() && b.error.is_some();
    // Two failures are weakly correlated; one failure is no agreement at all.
    let score = if both { 0.5 } else { 0.0 };
    let description = if both {
        "trace prediction failed for both variants".to_string()
    } else {
        "trace prediction failed for one variant".to_string()
    };
    let mut evidence = BTreeMap::new();
    if let Some(e) = &a.error {
        evidence.insert("error_a".to_string(), json!(e));
    }
    if let Some(e) = &b.error {
        evidence.insert("error_b".to_string(), json!(e));
    }

    SimilarityResult {
        variant_a: a.variant_id.clone(),
        variant_b: b.variant_id.clone(),
        score,
        step_alignment: score,
        state_match: score,
        output_match: score,
        anomalies: vec![TraceAnomaly::new(
            AnomalyType::TraceError,
            description,
            a,
            b,
            Some(evidence),
        )],
    }
}

fn all_side_effects(t: &ExecutionTrace) -> BTreeSet<String> {
    side_effects::normalize_all(t.steps.iter().flat_map(|s| s.side_effects.iter()))
}

/// Trace-level comparison of normalized side effects. Divergence here is the
/// strongest sign of conditional behavior hidden behind otherwise equivalent
/// code.
fn side_effect_check(a: &ExecutionTrace, b: &ExecutionTrace, anomalies: &mut Vec<TraceAnomaly>) {
    let ea = all_side_effects(a);
    let eb = all_side_effects(b);
    if jaccard(&ea, &eb) >= DIVERGENCE_CUTOFF {
        return;
    }
    let mut diverging: Vec<&String> = ea.symmetric_difference(&eb).collect();
    diverging.sort();
    let only_a: Vec<&String> = ea.difference(&eb).collect();
    let only_b: Vec<&String> = eb.difference(&ea).collect();
    anomalies.push(TraceAnomaly::new(
        AnomalyType::SideEffectDivergence,
        format!(
            "side effects diverge between equivalent variants: {}",
            diverging
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ),
        a,
        b,
        Some(BTreeMap::from([
            ("only_in_a".to_string(), json!(only_a)),
            ("only_in_b".to_string(), json!(only_b)),
        ])),
    ));
}

fn state_match(a: &ExecutionTrace, b: &ExecutionTrace, anomalies: &mut Vec<TraceAnomaly>) -> f64 {
    let va = &a.final_state.variables;
    let vb = &b.final_state.variables;
    let errs_a: BTreeSet<String> = a.final_state.errors.iter().map(|e| e.trim().to_string()).collect();
    let errs_b: BTreeSet<String> = b.final_state.errors.iter().map(|e| e.trim().to_string()).collect();

    if va.is_empty() && vb.is_empty() && errs_a.is_empty() && errs_b.is_empty() {
        return 1.0;
    }

    let names: BTreeSet<&String> = va.keys().chain(vb.keys()).collect();
    let variable_score = if names.is_empty() {
        1.0
    } else {
        let agree = names
            .iter()
            .filter(|n| matches!((va.get(**n), vb.get(**n)), (Some(x), Some(y)) if x == y))
            .count();
        agree as f64 / names.len() as f64
    };
    if variable_score < DIVERGENCE_CUTOFF {
        let differing: Vec<&String> = names
            .iter()
            .copied()
            .filter(|n| va.get(*n) != vb.get(*n))
            .collect();
        anomalies.push(TraceAnomaly::new(
            AnomalyType::VariableStateDivergence,
            format!(
                "final variable state diverges on: {}",
                differing
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            a,
            b,
            Some(BTreeMap::from([("variable_agreement".to_string(), json!(variable_score))])),
        ));
    }

    let error_score = jaccard(&errs_a, &errs_b);
    if error_score < DIVERGENCE_CUTOFF {
        anomalies.push(TraceAnomaly::new(
            AnomalyType::ErrorDivergence,
            format!(
                "predicted errors diverge ({} vs {} distinct)",
                errs_a.len().min(errs_b.len()),
                errs_a.len().max(errs_b.len())
            ),
            a,
            b,
            Some(BTreeMap::from([
                ("errors_a".to_string(), json!(errs_a)),
                ("errors_b".to_string(), json!(errs_b)),
            ])),
        ));
    }

    (variable_score + error_score) / 2.0
}

fn output_match(a: &ExecutionTrace, b: &ExecutionTrace, anomalies: &mut Vec<TraceAnomaly>) -> f64 {
    let oa: BTreeSet<String> = a.final_state.outputs.iter().map(|o| o.trim().to_string()).collect();
    let ob: BTreeSet<String> = b.final_state.outputs.iter().map(|o| o.trim().to_string()).collect();
    let score = jaccard(&oa, &ob);
    if score < DIVERGENCE_CUTOFF && (!oa.is_empty() || !ob.is_empty()) {
        anomalies.push(TraceAnomaly::new(
            AnomalyType::OutputDivergence,
            format!(
                "predicted output diverges ({} vs {} distinct lines)",
                oa.len().min(ob.len()),
                oa.len().max(ob.len())
            ),
            a,
            b,
            Some(BTreeMap::from([
                ("outputs_a".to_string(), json!(oa)),
                ("outputs_b".to_string(), json!(ob)),
            ])),
        ));
    }
    score
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::trace::{TraceState, TraceStep};

    fn step(op: &str, effects: &[&str]) -> TraceStep {
        TraceStep {
            line: 1,
            operation: op.into(),
            variables: BTreeMap::new(),
            side_effects: effects.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn trace(id: &str, steps: Vec<TraceStep>, vars: &[(&str, Value)], outputs: &[&str]) -> ExecutionTrace {
        ExecutionTrace {
            variant_id: id.into(),
            steps,
            final_state: TraceState {
                variables: vars.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
                outputs: outputs.iter().map(|s| s.to_string()).collect(),
                errors: Vec::new(),
            },
            confidence: 0.9,
            error: None,
            prediction_time: Duration::ZERO,
        }
    }

    fn calc() -> SimilarityCalculator {
        SimilarityCalculator::new(&SimilarityConfig::default())
    }

    #[test]
    fn identical_traces_agree() {
        let a = trace(
            "a",
            vec![step("assignment", &[]), step("function_call", &["reads /etc/hosts"])],
            &[("x", json!(1))],
            &["done"],
        );
        let mut b = a.clone();
        b.variant_id = "b".into();
        let r = calc().compute_similarity(&a, &b);
        assert!(r.score >= 0.9);
        assert!(r.anomalies.is_empty());
    }

    #[test]
    fn hidden_network_call_is_flagged() {
        let a = trace(
            "a",
            vec![step("function_call", &["HTTP POST to https://collector.example"])],
            &[("status", json!("sent"))],
            &["sent"],
        );
        let b = trace(
            "b",
            vec![step("function_call", &[])],
            &[("status", json!("skipped"))],
            &[],
        );
        let r = calc().compute_similarity(&a, &b);
        assert!(r.score <= 0.5, "score {}", r.score);
        assert!(r
            .anomalies
            .iter()
            .any(|an| an.anomaly_type == AnomalyType::SideEffectDivergence && an.severity == 0.9));
        assert!(r
            .anomalies
            .iter()
            .any(|an| an.anomaly_type == AnomalyType::OutputDivergence));
    }

    #[test]
    fn score_is_symmetric() {
        let a = trace(
            "a",
            vec![step("assign", &[]), step("call", &["writes a.txt"]), step("return", &[])],
            &[("x", json!(1)), ("y", json!([1, 2]))],
            &["one", "two"],
        );
        let b = trace(
            "b",
            vec![step("loop", &[]), step("call", &["spawn process"])],
            &[("x", json!(2))],
            &["two"],
        );
        let c = calc();
        let ab = c.compute_similarity(&a, &b);
        let ba = c.compute_similarity(&b, &a);
        assert!((ab.score - ba.score).abs() < 1e-9);
        assert_eq!(ab.anomalies.len(), ba.anomalies.len());
    }

    #[test]
    fn errored_traces_short_circuit() {
        let ok = trace("a", vec![step("call", &[])], &[], &[]);
        let bad = ExecutionTrace::failed("b", "oracle error: timeout", Duration::ZERO);
        let bad2 = ExecutionTrace::failed("c", "no JSON object in oracle response", Duration::ZERO);

        let one = calc().compute_similarity(&ok, &bad);
        assert_eq!(one.score, 0.0);
        assert_eq!(one.anomalies[0].anomaly_type, AnomalyType::TraceError);
        assert_eq!(one.anomalies[0].severity, 0.8);

        let both = calc().compute_similarity(&bad, &bad2);
        assert_eq!(both.score, 0.5);
    }

    #[test]
    fn empty_versus_nonempty_steps() {
        let a = trace("a", vec![], &[], &[]);
        let b = trace("b", vec![step("call", &[])], &[], &[]);
        let r = calc().compute_similarity(&a, &b);
        assert_eq!(r.step_alignment, 0.0);
        assert!(r
            .anomalies
            .iter()
            .any(|an| an.anomaly_type == AnomalyType::StepCountMismatch && an.severity == 0.7));
    }

    #[test]
    fn state_defaults_to_full_agreement() {
        let a = trace("a", vec![step("call", &[])], &[], &[]);
        let b = trace("b", vec![step("call", &[])], &[], &[]);
        let r = calc().compute_similarity(&a, &b);
        assert_eq!(r.state_match, 1.0);
        assert_eq!(r.output_match, 1.0);
        assert_eq!(r.score, 1.0);
    }

    #[test]
    fn pairwise_covers_unordered_pairs() {
        let ts: Vec<ExecutionTrace> = (0..4)
            .map(|i| trace(&i.to_string(), vec![step("call", &[])], &[], &[]))
            .collect();
        let refs: Vec<&ExecutionTrace> = ts.iter().collect();
        let pairs = calc().compute_pairwise(&refs);
        assert_eq!(pairs.len(), 6);
        assert_eq!((pairs[0].variant_a.as_str(), pairs[0].variant_b.as_str()), ("0", "1"));
    }
}
