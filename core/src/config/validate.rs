use regex::Regex;

use crate::errors::{ConfigError, FieldError};
use crate::transform::TransformType;

use super::types::{AppConfig, OracleConfig};
use super::{AnalysisMode, SimilarityMetric};

const WEIGHT_TOLERANCE: f64 = 0.01;

fn in_unit(v: f64) -> bool {
    (0.0..=1.0).contains(&v)
}

impl AppConfig {
    /// Checks every field an analysis depends on and reports all problems
    /// at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errs: Vec<FieldError> = Vec::new();

        if self.mode.parse::<AnalysisMode>().is_err() {
            errs.push(FieldError::new(
                "mode",
                format!("unknown mode '{}', expected sync, async or hybrid", self.mode),
            ));
        }
        if self.timeout_ms == 0 {
            errs.push(FieldError::new("timeout_ms", "must be greater than 0"));
        }

        let orbit = &self.orbit;
        if orbit.min_size < 2 {
            errs.push(FieldError::new("orbit.min_size", "must be at least 2"));
        }
        if orbit.size < orbit.min_size {
            errs.push(FieldError::new(
                "orbit.size",
                format!("must be >= orbit.min_size ({})", orbit.min_size),
            ));
        }
        if orbit.max_attempts == 0 {
            errs.push(FieldError::new("orbit.max_attempts", "must be greater than 0"));
        }
        if orbit.transforms.is_empty() {
            errs.push(FieldError::new("orbit.transforms", "must not be empty"));
        }
        for name in &orbit.transforms {
            if TransformType::from_name(name).is_none() {
                errs.push(FieldError::new(
                    "orbit.transforms",
                    format!("unknown transform '{name}'"),
                ));
            }
        }

        if self.trace.max_steps == 0 {
            errs.push(FieldError::new("trace.max_steps", "must be greater than 0"));
        }
        if self.trace.max_parallel == 0 {
            errs.push(FieldError::new("trace.max_parallel", "must be greater than 0"));
        }

        let sim = &self.similarity;
        if sim.metric.parse::<SimilarityMetric>().is_err() {
            errs.push(FieldError::new(
                "similarity.metric",
                format!("unknown metric '{}', expected edit_distance or multiset", sim.metric),
            ));
        }
        for (field, w) in [
            ("similarity.step_weight", sim.step_weight),
            ("similarity.state_weight", sim.state_weight),
            ("similarity.output_weight", sim.output_weight),
        ] {
            if !in_unit(w) {
                errs.push(FieldError::new(field, "must be within [0, 1]"));
            }
        }
        let sum = sim.step_weight + sim.state_weight + sim.output_weight;
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            errs.push(FieldError::new(
                "similarity",
                format!("weights must sum to 1.0 (got {sum:.3})"),
            ));
        }

        let th = &self.threshold;
        if !in_unit(th.deny) {
            errs.push(FieldError::new("threshold.deny", "must be within [0, 1]"));
        }
        if !in_unit(th.ask) {
            errs.push(FieldError::new("threshold.ask", "must be within [0, 1]"));
        }
        if th.deny > th.ask {
            errs.push(FieldError::new("threshold.deny", "must not exceed threshold.ask"));
        }
        if !(th.target_fpr > 0.0 && th.target_fpr < 1.0) {
            errs.push(FieldError::new("threshold.target_fpr", "must be within (0, 1)"));
        }
        if !(th.adaptation_rate > 0.0 && th.adaptation_rate <= 1.0) {
            errs.push(FieldError::new(
                "threshold.adaptation_rate",
                "must be within (0, 1]",
            ));
        }

        for (i, trig) in self.triggers.iter().enumerate() {
            if let Err(e) = Regex::new(&trig.tool_pattern) {
                errs.push(FieldError::new(
                    format!("triggers[{i}].tool_pattern"),
                    format!("invalid regex: {e}"),
                ));
            }
            if let Some(mode) = &trig.mode {
                if mode.parse::<AnalysisMode>().is_err() {
                    errs.push(FieldError::new(
                        format!("triggers[{i}].mode"),
                        format!("unknown mode '{mode}'"),
                    ));
                }
            }
        }

        if self.budget.daily_cost_limit_usd < 0.0 {
            errs.push(FieldError::new("budget.daily_cost_limit_usd", "must not be negative"));
        }

        if self.cache.enabled && self.cache.max_entries == 0 {
            errs.push(FieldError::new("cache.max_entries", "must be greater than 0"));
        }

        match &self.oracle {
            OracleConfig::Http(http) => {
                if http.base_url.trim().is_empty() {
                    errs.push(FieldError::new("oracle.base_url", "must not be empty"));
                }
                if http.model.trim().is_empty() {
                    errs.push(FieldError::new("oracle.model", "must not be empty"));
                }
            }
            OracleConfig::Command(cmd) => {
                if cmd.program.trim().is_empty() {
                    errs.push(FieldError::new("oracle.program", "must not be empty"));
                }
            }
        }

        if errs.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errs))
        }
    }
}
