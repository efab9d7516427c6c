//! Stable re-exports for consumers (`cli`, `plugins`, and external crates).
//!
//! Prefer importing from `ctvp_core::api` instead of reaching into internal modules.

pub use crate::analyzer::{Analyzer, CtvpResult, MetricsSnapshot};
pub use crate::config::{
    AnalysisMode, AppConfig, CommandOracleConfig, HttpOracleConfig, LoggingConfig, OracleConfig,
    SimilarityMetric, ThresholdConfig,
};
pub use crate::errors::{ConfigError, FieldError, OracleError, OrbitError, StoreError};
pub use crate::oracle::Oracle;
pub use crate::orbit::{CodeVariant, OrbitGenerator, SemanticOrbit};
pub use crate::scorer::{Decision, ScoreSummary, Scorer};
pub use crate::similarity::{AnomalyType, SimilarityCalculator, SimilarityResult, TraceAnomaly};
pub use crate::threshold::{
    FileThresholdStore, MemoryThresholdStore, ThresholdManager, ThresholdState, ThresholdStats,
    ThresholdStore,
};
pub use crate::trace::{ExecutionTrace, TracePredictor, TraceState, TraceStep};
pub use crate::transform::{detect_language, Language, TransformType};
