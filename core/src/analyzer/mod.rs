//! End-to-end orchestration: gating, caching, the verification pipeline and
//! metrics.

mod cache;
mod metrics;
mod result;
mod trigger;

use std::sync::Arc;
use std::time::{Duration, Instant as StdInstant};

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::config::{AnalysisMode, AppConfig};
use crate::errors::ConfigError;
use crate::oracle::Oracle;
use crate::orbit::OrbitGenerator;
use crate::scorer::{collect_anomalies, compute_aggregate_score, generate_reasoning, Scorer};
use crate::similarity::SimilarityCalculator;
use crate::threshold::{ThresholdManager, ThresholdStats, ThresholdStore};
use crate::trace::{ExecutionTrace, TracePredictor};

pub use cache::{cache_key, ResultCache};
pub use metrics::MetricsSnapshot;
pub use result::CtvpResult;
pub use trigger::{Trigger, TriggerSet};

pub struct Analyzer {
    enabled: bool,
    mode: AnalysisMode,
    hybrid_wait: Duration,
    timeout: Duration,
    min_size: usize,
    triggers: TriggerSet,
    generator: OrbitGenerator,
    predictor: TracePredictor,
    similarity: SimilarityCalculator,
    thresholds: ThresholdManager,
    cache: ResultCache,
    metrics: Mutex<MetricsSnapshot>,
    span: tracing::Span,
}

impl Analyzer {
    /// Validates `cfg` up front; nothing is analyzed with a bad configuration.
    pub fn new(
        cfg: AppConfig,
        oracle: Arc<dyn Oracle>,
        store: Arc<dyn ThresholdStore>,
    ) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let mode = cfg.analysis_mode();

        Ok(Self {
            enabled: cfg.enabled,
            mode,
            hybrid_wait: Duration::from_millis(cfg.hybrid_wait_ms),
            timeout: Duration::from_millis(cfg.timeout_ms),
            min_size: cfg.orbit.min_size,
            triggers: TriggerSet::new(&cfg.triggers),
            generator: OrbitGenerator::new(cfg.orbit.clone()),
            predictor: TracePredictor::new(oracle, cfg.trace.clone()),
            similarity: SimilarityCalculator::new(&cfg.similarity),
            thresholds: ThresholdManager::new(cfg.threshold.clone(), store),
            cache: ResultCache::new(
                cfg.cache.enabled,
                cfg.cache.max_entries,
                Duration::from_secs(cfg.cache.ttl_secs),
            ),
            metrics: Mutex::new(MetricsSnapshot::default()),
            span: tracing::info_span!("ctvp.analyzer"),
        })
    }

    /// Logging context for the analyzer and its trace predictor.
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.predictor = self.predictor.with_span(span.clone());
        self.span = span;
        self
    }

    pub fn should_analyze(&self, tool_name: &str, code: &str) -> bool {
        self.enabled && self.triggers.matching(tool_name, code).is_some()
    }

    /// Process-facing entry point. `None` when no trigger fires; otherwise
    /// the result according to the effective analysis mode.
    pub async fn evaluate(self: &Arc<Self>, tool_name: &str, code: &str) -> Option<CtvpResult> {
        if !self.enabled {
            return None;
        }
        let trigger = self.triggers.matching(tool_name, code)?;
        let mode = trigger.mode.unwrap_or(self.mode);

        match mode {
            AnalysisMode::Sync => Some(self.analyze(code, tool_name).await),
            AnalysisMode::Async => {
                self.spawn_analysis(code, tool_name);
                Some(CtvpResult::pending(code, tool_name))
            }
            AnalysisMode::Hybrid => {
                let handle = self.spawn_analysis(code, tool_name);
                match tokio::time::timeout(self.hybrid_wait, handle).await {
                    Ok(Ok(result)) => Some(result),
                    Ok(Err(e)) => {
                        self.span.in_scope(|| {
                            tracing::warn!(target: "ctvp.analyzer", error = %e, "background analysis failed")
                        });
                        Some(CtvpResult::pending(code, tool_name))
                    }
                    Err(_) => {
                        self.span.in_scope(|| {
                            tracing::debug!(
                                target: "ctvp.analyzer",
                                wait_ms = self.hybrid_wait.as_millis() as u64,
                                "hybrid wait elapsed, continuing in background"
                            )
                        });
                        Some(CtvpResult::pending(code, tool_name))
                    }
                }
            }
        }
    }

    fn spawn_analysis(self: &Arc<Self>, code: &str, tool_name: &str) -> tokio::task::JoinHandle<CtvpResult> {
        let this = Arc::clone(self);
        let code = code.to_string();
        let tool_name = tool_name.to_string();
        tokio::spawn(async move { this.analyze(&code, &tool_name).await })
    }

    pub async fn analyze(&self, code: &str, tool_name: &str) -> CtvpResult {
        let started = StdInstant::now();
        let key = cache_key(code, tool_name);

        if let Some(mut hit) = self.cache.get(&key) {
            hit.cached = true;
            self.record(&hit, started.elapsed());
            self.span.in_scope(|| {
                tracing::debug!(
                    target: "ctvp.analyzer",
                    tool = tool_name,
                    decision = %hit.decision,
                    "cache hit"
                )
            });
            return hit;
        }

        let deadline = Instant::now() + self.timeout;

        let orbit = match self
            .generator
            .generate(code)
            .and_then(|o| o.validate(self.min_size).map(|_| o))
        {
            Ok(orbit) => orbit,
            Err(e) => {
                return self.fail_open(code, tool_name, &format!("orbit generation failed: {e}"), started)
            }
        };

        let batch = self.predictor.predict_traces(&orbit, deadline).await;
        let successful: Vec<&ExecutionTrace> = batch.traces.iter().filter(|t| t.is_ok()).collect();
        if successful.len() < self.min_size {
            let mut reason = format!(
                "only {} of {} traces predicted, {} required",
                successful.len(),
                batch.traces.len(),
                self.min_size
            );
            if let Some(e) = &batch.first_error {
                reason.push_str(&format!(" ({e})"));
            }
            let mut result = self.fail_open(code, tool_name, &reason, started);
            result.variants = orbit.variants;
            result.traces = batch.traces;
            return result;
        }

        let pairs = self.similarity.compute_pairwise(&successful);
        let summary = compute_aggregate_score(&pairs);
        let anomalies = collect_anomalies(&pairs);

        let (deny, ask) = self.thresholds.thresholds();
        let decision = Scorer::new(deny, ask).make_decision(summary.aggregate, &anomalies);
        let reasoning = generate_reasoning(orbit.len(), summary.aggregate, &anomalies, decision);

        let mut result = CtvpResult::scored(code, tool_name, decision, reasoning);
        result.score = summary.aggregate;
        result.summary = Some(summary);
        result.pairwise_scores = pairs.iter().map(|p| p.score).collect();
        result.anomalies = anomalies;
        result.variants = orbit.variants;
        result.traces = batch.traces;
        result.duration = started.elapsed();

        self.cache.insert(key, result.clone());
        self.record(&result, result.duration);

        self.span.in_scope(|| {
            tracing::info!(
                target: "ctvp.analyzer",
                analysis_id = %result.analysis_id,
                tool = tool_name,
                decision = %result.decision,
                score = result.score,
                anomalies = result.anomalies.len(),
                deny_threshold = deny,
                ask_threshold = ask,
                duration_ms = result.duration.as_millis() as u64,
                "analysis complete"
            )
        });
        result
    }

    fn fail_open(&self, code: &str, tool_name: &str, reason: &str, started: StdInstant) -> CtvpResult {
        let result = CtvpResult::fail_open(code, tool_name, reason, started.elapsed());
        self.record(&result, result.duration);
        self.span.in_scope(|| {
            tracing::warn!(
                target: "ctvp.analyzer",
                analysis_id = %result.analysis_id,
                tool = tool_name,
                reason,
                "analysis failed open"
            )
        });
        result
    }

    fn record(&self, result: &CtvpResult, elapsed: Duration) {
        self.metrics.lock().record(
            result.decision,
            result.score,
            elapsed.as_secs_f64() * 1000.0,
            result.cached,
            result.fail_open,
        );
    }

    /// Labels a past decision. `was_positive` is whether that decision
    /// flagged the code.
    pub fn provide_feedback(&self, score: f64, was_correct: bool, was_positive: bool) {
        self.thresholds.provide_feedback(score, was_correct, was_positive);
    }

    pub fn reset_thresholds(&self) {
        self.thresholds.reset();
    }

    pub fn threshold_stats(&self) -> ThresholdStats {
        self.thresholds.stats()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.lock().clone()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}
