use std::collections::HashMap;

use crate::trace::TraceStep;

use super::side_effects::{jaccard, normalize_all};

const OPERATION_GROUPS: &[&[&str]] = &[
    &[
        "assignment", "assign", "set", "store", "declare", "define", "variable_assignment",
    ],
    &[
        "function_call", "call", "invoke", "invocation", "method_call", "execute", "exec",
        "command",
    ],
    &["return", "exit", "yield", "return_value"],
    &["loop", "for", "while", "iterate", "iteration", "for_loop", "while_loop"],
    &[
        "conditional", "if", "branch", "condition", "if_statement", "else", "switch", "case",
    ],
];

const OPERATION_MISMATCH_PENALTY: f64 = 0.5;
const SIDE_EFFECT_WEIGHT: f64 = 0.5;

fn group_of(op: &str) -> Option<usize> {
    OPERATION_GROUPS.iter().position(|g| g.contains(&op))
}

pub fn operations_equivalent(a: &str, b: &str) -> bool {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a == b {
        return true;
    }
    matches!((group_of(&a), group_of(&b)), (Some(x), Some(y)) if x == y)
}

/// Substitution cost between two steps, in [0, 1].
pub fn step_distance(a: &TraceStep, b: &TraceStep) -> f64 {
    let op = if operations_equivalent(&a.operation, &b.operation) {
        0.0
    } else {
        OPERATION_MISMATCH_PENALTY
    };
    let effects = jaccard(&normalize_all(&a.side_effects), &normalize_all(&b.side_effects));
    op + SIDE_EFFECT_WEIGHT * (1.0 - effects)
}

/// Edit-distance alignment of two step sequences: insert/delete cost 1,
/// substitution costs `step_distance`. Returns `1 - distance / max_len`.
pub fn sequence_similarity(a: &[TraceStep], b: &[TraceStep]) -> f64 {
    let (n, m) = (a.len(), b.len());
    if n == 0 && m == 0 {
        return 1.0;
    }

    let mut prev: Vec<f64> = (0..=m).map(|j| j as f64).collect();
    let mut cur = vec![0.0; m + 1];
    for i in 1..=n {
        cur[0] = i as f64;
        for j in 1..=m {
            let sub = prev[j - 1] + step_distance(&a[i - 1], &b[j - 1]);
            let del = prev[j] + 1.0;
            let ins = cur[j - 1] + 1.0;
            cur[j] = sub.min(del).min(ins);
        }
        std::mem::swap(&mut prev, &mut cur);
    }

    let distance = prev[m];
    (1.0 - distance / n.max(m) as f64).clamp(0.0, 1.0)
}

fn fingerprint(step: &TraceStep) -> String {
    let effects: Vec<String> = normalize_all(&step.side_effects).into_iter().collect();
    format!(
        "{}|{}",
        step.operation.trim().to_lowercase(),
        effects.join(",")
    )
}

fn multiplicities(steps: &[TraceStep]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for s in steps {
        *counts.entry(fingerprint(s)).or_insert(0) += 1;
    }
    counts
}

/// Order-insensitive comparison: multiset intersection over multiset union
/// of step fingerprints.
pub fn multiset_similarity(a: &[TraceStep], b: &[TraceStep]) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let ca = multiplicities(a);
    let cb = multiplicities(b);

    let mut inter = 0usize;
    let mut union = 0usize;
    for (key, &na) in &ca {
        let nb = cb.get(key).copied().unwrap_or(0);
        inter += na.min(nb);
        union += na.max(nb);
    }
    for (key, &nb) in &cb {
        if !ca.contains_key(key) {
            union += nb;
        }
    }
    if union == 0 {
        return 1.0;
    }
    inter as f64 / union as f64
}
