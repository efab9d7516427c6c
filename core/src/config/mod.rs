mod load;
mod types;
mod validate;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use load::{apply_env_overrides, load_default, load_from_path, parse_str};
pub use types::*;

/// How the process-facing entry point waits for an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    Sync,
    Async,
    Hybrid,
}

impl FromStr for AnalysisMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sync" => Ok(AnalysisMode::Sync),
            "async" => Ok(AnalysisMode::Async),
            "hybrid" => Ok(AnalysisMode::Hybrid),
            other => Err(format!("unknown analysis mode: {other}")),
        }
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AnalysisMode::Sync => "sync",
            AnalysisMode::Async => "async",
            AnalysisMode::Hybrid => "hybrid",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimilarityMetric {
    /// Ordered edit-distance alignment of steps.
    EditDistance,
    /// Order-insensitive multiset comparison of step fingerprints.
    Multiset,
}

impl FromStr for SimilarityMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "edit_distance" => Ok(SimilarityMetric::EditDistance),
            "multiset" => Ok(SimilarityMetric::Multiset),
            other => Err(format!("unknown similarity metric: {other}")),
        }
    }
}

impl SimilarityConfig {
    /// `ignore_ordering` wins over the metric name.
    pub fn effective_metric(&self) -> SimilarityMetric {
        if self.ignore_ordering {
            return SimilarityMetric::Multiset;
        }
        self.metric
            .parse()
            .unwrap_or(SimilarityMetric::EditDistance)
    }
}

impl AppConfig {
    pub fn analysis_mode(&self) -> AnalysisMode {
        self.mode.parse().unwrap_or(AnalysisMode::Sync)
    }
}
