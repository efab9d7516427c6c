use crate::similarity::TraceAnomaly;

use super::Decision;

const TOP_ANOMALIES: usize = 3;

/// Deterministic human-readable explanation of a decision. `anomalies` is
/// expected most-severe first.
pub fn generate_reasoning(
    variant_count: usize,
    score: f64,
    anomalies: &[TraceAnomaly],
    decision: Decision,
) -> String {
    let mut lines = vec![format!(
        "Analyzed {variant_count} semantically equivalent variants; consistency score {score:.3}."
    )];

    if anomalies.is_empty() {
        lines.push("No behavioral divergence detected.".to_string());
    } else {
        lines.push(format!("Detected {} anomalies:", anomalies.len()));
        for a in anomalies.iter().take(TOP_ANOMALIES) {
            lines.push(format!(
                "- [{}] {} (severity {:.2})",
                a.anomaly_type, a.description, a.severity
            ));
        }
        if anomalies.len() > TOP_ANOMALIES {
            lines.push(format!("+{} more", anomalies.len() - TOP_ANOMALIES));
        }
    }

    lines.push(format!("Decision: {}", decision.as_str().to_uppercase()));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::AnomalyType;

    fn anomaly(desc: &str, severity: f64) -> TraceAnomaly {
        TraceAnomaly {
            anomaly_type: AnomalyType::OutputDivergence,
            description: desc.into(),
            severity,
            variant_a: "a".into(),
            variant_b: "b".into(),
            evidence: None,
        }
    }

    #[test]
    fn truncates_to_top_three() {
        let anomalies: Vec<TraceAnomaly> = (0..5).map(|i| anomaly(&format!("d{i}"), 0.7)).collect();
        let text = generate_reasoning(5, 0.42, &anomalies, Decision::Ask);
        assert_eq!(
            text,
            "Analyzed 5 semantically equivalent variants; consistency score 0.420.\n\
             Detected 5 anomalies:\n\
             - [output_divergence] d0 (severity 0.70)\n\
             - [output_divergence] d1 (severity 0.70)\n\
             - [output_divergence] d2 (severity 0.70)\n\
             +2 more\n\
             Decision: ASK"
        );
    }

    #[test]
    fn clean_run() {
        let text = generate_reasoning(4, 1.0, &[], Decision::Allow);
        assert!(text.contains("No behavioral divergence"));
        assert!(text.ends_with("Decision: ALLOW"));
    }
}
