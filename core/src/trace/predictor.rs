use std::sync::Arc;
use std::time::Instant as StdInstant;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::sync::Semaphore;
use tokio::time::{timeout_at, Instant};
use tracing::Instrument;

use crate::config::TraceConfig;
use crate::errors::TraceError;
use crate::oracle::Oracle;
use crate::orbit::{CodeVariant, SemanticOrbit};
use crate::transform::detect_language;

use super::extract::extract_json_object;
use super::prompt::{build_user_prompt, SYSTEM_PROMPT};
use super::types::{ExecutionTrace, PredictedTrace};

/// Traces for a whole orbit, in variant order, plus the first error that
/// stopped any variant from being predicted at all.
#[derive(Debug, Clone)]
pub struct TraceBatch {
    pub traces: Vec<ExecutionTrace>,
    pub first_error: Option<TraceError>,
}

impl TraceBatch {
    pub fn successful(&self) -> usize {
        self.traces.iter().filter(|t| t.is_ok()).count()
    }
}

pub struct TracePredictor {
    oracle: Arc<dyn Oracle>,
    cfg: TraceConfig,
    span: tracing::Span,
}

impl TracePredictor {
    pub fn new(oracle: Arc<dyn Oracle>, cfg: TraceConfig) -> Self {
        Self {
            oracle,
            cfg,
            span: tracing::info_span!("ctvp.trace"),
        }
    }

    /// Logging context for everything this predictor emits.
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    /// Predicts one variant with no deadline of its own.
    pub async fn predict_trace(&self, variant: &CodeVariant) -> ExecutionTrace {
        predict_one(self.oracle.as_ref(), &self.cfg, variant, None)
            .instrument(self.span.clone())
            .await
    }

    pub async fn predict_traces(&self, orbit: &SemanticOrbit, deadline: Instant) -> TraceBatch {
        let batch = if self.cfg.parallel {
            self.predict_parallel(orbit, deadline)
                .instrument(self.span.clone())
                .await
        } else {
            self.predict_sequential(orbit, deadline)
                .instrument(self.span.clone())
                .await
        };
        self.span.in_scope(|| {
            tracing::debug!(
                target: "ctvp.trace",
                variants = orbit.len(),
                successful = batch.successful(),
                parallel = self.cfg.parallel,
                first_error = ?batch.first_error,
                "trace prediction finished"
            )
        });
        batch
    }

    async fn predict_sequential(&self, orbit: &SemanticOrbit, deadline: Instant) -> TraceBatch {
        let mut traces = Vec::with_capacity(orbit.len());
        let mut first_error = None;

        for variant in &orbit.variants {
            if Instant::now() >= deadline {
                let err = TraceError::Cancelled("deadline exceeded before prediction".into());
                traces.push(ExecutionTrace::failed(&variant.id, err.to_string(), Default::default()));
                first_error.get_or_insert(err);
                continue;
            }
            traces.push(predict_one(self.oracle.as_ref(), &self.cfg, variant, Some(deadline)).await);
        }

        TraceBatch {
            traces,
            first_error,
        }
    }

    /// One unit of work per variant, admitted through a counting semaphore.
    /// Each unit writes only its own slot; slots are read after all units
    /// have completed.
    async fn predict_parallel(&self, orbit: &SemanticOrbit, deadline: Instant) -> TraceBatch {
        let sem = Arc::new(Semaphore::new(self.cfg.max_parallel.max(1)));
        let mut slots: Vec<Option<ExecutionTrace>> = vec![None; orbit.len()];
        let mut futs = FuturesUnordered::new();

        for (idx, variant) in orbit.variants.iter().enumerate() {
            let sem = sem.clone();
            let oracle = self.oracle.as_ref();
            let cfg = &self.cfg;
            futs.push(async move {
                let permit = match timeout_at(deadline, sem.acquire_owned()).await {
                    Ok(Ok(permit)) => permit,
                    Ok(Err(_)) => return (idx, Err(TraceError::SemaphoreClosed)),
                    Err(_) => {
                        return (
                            idx,
                            Err(TraceError::Cancelled(
                                "deadline exceeded waiting for a prediction slot".into(),
                            )),
                        )
                    }
                };
                let trace = predict_one(oracle, cfg, variant, Some(deadline)).await;
                drop(permit);
                (idx, Ok(trace))
            });
        }

        let mut first_error = None;
        while let Some((idx, res)) = futs.next().await {
            match res {
                Ok(trace) => slots[idx] = Some(trace),
                Err(err) => {
                    slots[idx] = Some(ExecutionTrace::failed(
                        &orbit.variants[idx].id,
                        err.to_string(),
                        Default::default(),
                    ));
                    first_error.get_or_insert(err);
                }
            }
        }

        let traces = slots
            .into_iter()
            .zip(&orbit.variants)
            .map(|(slot, v)| {
                slot.unwrap_or_else(|| {
                    ExecutionTrace::failed(&v.id, "prediction did not complete", Default::default())
                })
            })
            .collect();

        TraceBatch {
            traces,
            first_error,
        }
    }
}

/// Never fails: every problem is recorded on the returned trace.
async fn predict_one(
    oracle: &dyn Oracle,
    cfg: &TraceConfig,
    variant: &CodeVariant,
    deadline: Option<Instant>,
) -> ExecutionTrace {
    let started = StdInstant::now();
    let language = detect_language(&variant.transformed_code);
    let user_prompt = build_user_prompt(&variant.transformed_code, language, cfg);

    let call = oracle.complete(SYSTEM_PROMPT, &user_prompt);
    let raw = match deadline {
        Some(deadline) => match timeout_at(deadline, call).await {
            Ok(res) => res,
            Err(_) => {
                tracing::warn!(
                    target: "ctvp.trace",
                    variant_id = %variant.id,
                    "oracle call cancelled at analysis deadline"
                );
                return ExecutionTrace::failed(
                    &variant.id,
                    "oracle call cancelled: deadline exceeded",
                    started.elapsed(),
                );
            }
        },
        None => call.await,
    };

    let raw = match raw {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(
                target: "ctvp.trace",
                variant_id = %variant.id,
                oracle = oracle.name(),
                error = %e,
                retryable = e.is_retryable(),
                "oracle call failed"
            );
            return ExecutionTrace::failed(&variant.id, format!("oracle error: {e}"), started.elapsed());
        }
    };

    match parse_trace(&raw, cfg) {
        Ok(predicted) => ExecutionTrace {
            variant_id: variant.id.clone(),
            steps: predicted.steps,
            final_state: predicted.final_state,
            confidence: predicted.confidence,
            error: None,
            prediction_time: started.elapsed(),
        },
        Err(msg) => {
            tracing::warn!(
                target: "ctvp.trace",
                variant_id = %variant.id,
                error = %msg,
                "unusable oracle response"
            );
            ExecutionTrace::failed(&variant.id, msg, started.elapsed())
        }
    }
}

pub(crate) fn parse_trace(raw: &str, cfg: &TraceConfig) -> Result<PredictedTrace, String> {
    let json = extract_json_object(raw).ok_or_else(|| "no JSON object in oracle response".to_string())?;
    let mut predicted: PredictedTrace =
        serde_json::from_str(json).map_err(|e| format!("malformed trace JSON: {e}"))?;

    predicted.steps.truncate(cfg.max_steps);
    predicted.confidence = if predicted.confidence.is_finite() {
        predicted.confidence.clamp(0.0, 1.0)
    } else {
        0.0
    };
    if !cfg.include_variables {
        for step in &mut predicted.steps {
            step.variables.clear();
        }
        predicted.final_state.variables.clear();
    }
    if !cfg.include_side_effects {
        for step in &mut predicted.steps {
            step.side_effects.clear();
        }
    }
    Ok(predicted)
}
