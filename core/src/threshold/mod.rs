//! Adaptive deny/ask thresholds driven by user feedback.

mod store;

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::config::ThresholdConfig;

pub use store::{FileThresholdStore, MemoryThresholdStore, ThresholdStore};

const SAMPLE_WINDOW: usize = 1000;
const ADAPT_EVERY: u64 = 10;

const DENY_MIN: f64 = 0.1;
const DENY_MAX: f64 = 0.5;
const ASK_GAP: f64 = 0.1;
const ASK_MAX: f64 = 0.8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdState {
    pub deny_threshold: f64,
    pub ask_threshold: f64,
    #[serde(default)]
    pub true_positives: u64,
    #[serde(default)]
    pub false_positives: u64,
    #[serde(default)]
    pub true_negatives: u64,
    #[serde(default)]
    pub false_negatives: u64,
    #[serde(default)]
    pub false_positive_rate: f64,
    #[serde(default)]
    pub true_positive_rate: f64,
    #[serde(default)]
    pub sample_count: u64,
    pub last_updated: DateTime<Utc>,
}

impl ThresholdState {
    pub fn new(deny_threshold: f64, ask_threshold: f64) -> Self {
        Self {
            deny_threshold,
            ask_threshold,
            true_positives: 0,
            false_positives: 0,
            true_negatives: 0,
            false_negatives: 0,
            false_positive_rate: 0.0,
            true_positive_rate: 0.0,
            sample_count: 0,
            last_updated: Utc::now(),
        }
    }

    /// Both thresholds finite, within `[0, 1]`, and `deny <= ask`.
    pub fn is_valid(&self) -> bool {
        let unit = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        unit(self.deny_threshold)
            && unit(self.ask_threshold)
            && self.deny_threshold <= self.ask_threshold
    }
}

/// `(fpr, tpr)` over the retained feedback window.
fn window_rates(samples: &VecDeque<FeedbackSample>) -> (f64, f64) {
    let (mut tp, mut fp, mut tn, mut fn_) = (0u64, 0u64, 0u64, 0u64);
    for s in samples {
        match (s.was_positive, s.was_correct) {
            (true, true) => tp += 1,
            (true, false) => fp += 1,
            (false, true) => tn += 1,
            (false, false) => fn_ += 1,
        }
    }
    (ratio(fp, fp + tn), ratio(tp, tp + fn_))
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeedbackSample {
    pub score: f64,
    pub was_correct: bool,
    pub was_positive: bool,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdStats {
    pub deny_threshold: f64,
    pub ask_threshold: f64,
    pub true_positives: u64,
    pub false_positives: u64,
    pub true_negatives: u64,
    pub false_negatives: u64,
    pub sample_count: u64,
    pub false_positive_rate: f64,
    pub true_positive_rate: f64,
    pub recent_samples: usize,
    pub adaptive: bool,
    pub target_fpr: f64,
    pub last_updated: DateTime<Utc>,
}

pub struct ThresholdManager {
    cfg: ThresholdConfig,
    state: RwLock<ThresholdState>,
    samples: Mutex<VecDeque<FeedbackSample>>,
    store: Arc<dyn ThresholdStore>,
}

impl ThresholdManager {
    /// Loads persisted state when available; any load failure falls back to
    /// the configured defaults.
    pub fn new(cfg: ThresholdConfig, store: Arc<dyn ThresholdStore>) -> Self {
        let state = match store.load() {
            Ok(Some(state)) if !state.is_valid() => {
                tracing::warn!(
                    target: "ctvp.threshold",
                    deny = state.deny_threshold,
                    ask = state.ask_threshold,
                    "persisted thresholds out of range, using defaults"
                );
                ThresholdState::new(cfg.deny, cfg.ask)
            }
            Ok(Some(state)) => {
                tracing::debug!(
                    target: "ctvp.threshold",
                    deny = state.deny_threshold,
                    ask = state.ask_threshold,
                    samples = state.sample_count,
                    "loaded persisted thresholds"
                );
                state
            }
            Ok(None) => ThresholdState::new(cfg.deny, cfg.ask),
            Err(e) => {
                tracing::warn!(
                    target: "ctvp.threshold",
                    error = %e,
                    "failed to load threshold state, using defaults"
                );
                ThresholdState::new(cfg.deny, cfg.ask)
            }
        };

        Self {
            cfg,
            state: RwLock::new(state),
            samples: Mutex::new(VecDeque::with_capacity(SAMPLE_WINDOW)),
            store,
        }
    }

    /// `(deny, ask)`.
    pub fn thresholds(&self) -> (f64, f64) {
        let s = self.state.read();
        (s.deny_threshold, s.ask_threshold)
    }

    pub fn snapshot(&self) -> ThresholdState {
        self.state.read().clone()
    }

    /// Records whether a past decision was right. `was_positive` means the
    /// analysis flagged the code (deny, ask or block). A no-op when adaptation
    /// is disabled.
    pub fn provide_feedback(&self, score: f64, was_correct: bool, was_positive: bool) {
        if !self.cfg.adaptive {
            return;
        }

        let persist = {
            // Lock order: state, then samples.
            let mut s = self.state.write();
            let (fpr, tpr) = {
                let mut samples = self.samples.lock();
                if samples.len() == SAMPLE_WINDOW {
                    samples.pop_front();
                }
                samples.push_back(FeedbackSample {
                    score,
                    was_correct,
                    was_positive,
                    at: Utc::now(),
                });
                window_rates(&samples)
            };

            match (was_positive, was_correct) {
                (true, true) => s.true_positives += 1,
                (true, false) => s.false_positives += 1,
                (false, true) => s.true_negatives += 1,
                (false, false) => s.false_negatives += 1,
            }
            s.sample_count += 1;
            s.false_positive_rate = fpr;
            s.true_positive_rate = tpr;
            s.last_updated = Utc::now();

            if s.sample_count >= self.cfg.min_samples && s.sample_count % ADAPT_EVERY == 0 {
                self.adapt(&mut s);
                Some(s.clone())
            } else {
                None
            }
        };

        if let Some(state) = persist {
            self.persist(&state);
        }
    }

    fn adapt(&self, s: &mut ThresholdState) {
        let fpr = s.false_positive_rate;
        let target = self.cfg.target_fpr;
        let rate = self.cfg.adaptation_rate;

        let delta = if fpr > target * 1.5 {
            rate * (fpr - target)
        } else if fpr < target * 0.5 {
            -rate * (target - fpr)
        } else {
            return;
        };

        let before = (s.deny_threshold, s.ask_threshold);
        let deny = (s.deny_threshold + delta).clamp(DENY_MIN, DENY_MAX);
        let ask = (s.ask_threshold + delta).clamp(deny + ASK_GAP, ASK_MAX);
        s.deny_threshold = deny;
        s.ask_threshold = ask;

        tracing::info!(
            target: "ctvp.threshold",
            fpr,
            target_fpr = target,
            old_deny = before.0,
            old_ask = before.1,
            deny,
            ask,
            "thresholds adapted"
        );
    }

    fn persist(&self, state: &ThresholdState) {
        if let Err(e) = self.store.save(state) {
            tracing::warn!(target: "ctvp.threshold", error = %e, "failed to persist thresholds");
        }
    }

    /// Back to configured defaults; counters and samples cleared.
    pub fn reset(&self) {
        let state = ThresholdState::new(self.cfg.deny, self.cfg.ask);
        {
            let mut s = self.state.write();
            *s = state.clone();
            self.samples.lock().clear();
        }
        self.persist(&state);
        tracing::info!(target: "ctvp.threshold", "thresholds reset to defaults");
    }

    pub fn stats(&self) -> ThresholdStats {
        let s = self.state.read();
        ThresholdStats {
            deny_threshold: s.deny_threshold,
            ask_threshold: s.ask_threshold,
            true_positives: s.true_positives,
            false_positives: s.false_positives,
            true_negatives: s.true_negatives,
            false_negatives: s.false_negatives,
            sample_count: s.sample_count,
            false_positive_rate: s.false_positive_rate,
            true_positive_rate: s.true_positive_rate,
            recent_samples: self.samples.lock().len(),
            adaptive: self.cfg.adaptive,
            target_fpr: self.cfg.target_fpr,
            last_updated: s.last_updated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(cfg: ThresholdConfig) -> (ThresholdManager, Arc<MemoryThresholdStore>) {
        let store = Arc::new(MemoryThresholdStore::new());
        (ThresholdManager::new(cfg, store.clone()), store)
    }

    fn cfg() -> ThresholdConfig {
        ThresholdConfig {
            state_path: String::new(),
            ..ThresholdConfig::default()
        }
    }

    #[test]
    fn starts_from_config_defaults() {
        let (m, _) = manager(cfg());
        assert_eq!(m.thresholds(), (0.3, 0.5));
    }

    #[test]
    fn prefers_persisted_state() {
        let store = Arc::new(MemoryThresholdStore::with_state(ThresholdState::new(0.25, 0.45)));
        let m = ThresholdManager::new(cfg(), store);
        assert_eq!(m.thresholds(), (0.25, 0.45));
    }

    #[test]
    fn rejects_out_of_range_persisted_state() {
        for bad in [
            ThresholdState::new(0.9, 0.2),
            ThresholdState::new(-0.1, 0.5),
            ThresholdState::new(0.3, 1.5),
            ThresholdState::new(f64::NAN, 0.5),
        ] {
            let store = Arc::new(MemoryThresholdStore::with_state(bad));
            let m = ThresholdManager::new(cfg(), store);
            assert_eq!(m.thresholds(), (0.3, 0.5));
        }
    }

    #[test]
    fn concurrent_feedback_keeps_rates_consistent() {
        let m = Arc::new(ThresholdManager::new(
            ThresholdConfig {
                min_samples: u64::MAX,
                ..cfg()
            },
            Arc::new(MemoryThresholdStore::new()),
        ));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let m = m.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        // even threads report false positives, odd ones true negatives
                        m.provide_feedback(0.5, t % 2 == 1, t % 2 == 0);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let s = m.stats();
        assert_eq!(s.sample_count, 400);
        assert_eq!(s.recent_samples, 400);
        assert_eq!(s.false_positive_rate, 0.5);
    }

    #[test]
    fn counts_outcomes() {
        let (m, _) = manager(cfg());
        m.provide_feedback(0.2, true, true);
        m.provide_feedback(0.2, false, true);
        m.provide_feedback(0.9, true, false);
        m.provide_feedback(0.9, false, false);
        let s = m.stats();
        assert_eq!(
            (s.true_positives, s.false_positives, s.true_negatives, s.false_negatives),
            (1, 1, 1, 1)
        );
        assert_eq!(s.sample_count, 4);
        assert_eq!(s.false_positive_rate, 0.5);
        assert_eq!(s.true_positive_rate, 0.5);
        assert_eq!(s.recent_samples, 4);
    }

    #[test]
    fn non_adaptive_ignores_feedback() {
        let (m, _) = manager(ThresholdConfig {
            adaptive: false,
            ..cfg()
        });
        m.provide_feedback(0.2, false, true);
        assert_eq!(m.stats().sample_count, 0);
    }

    #[test]
    fn high_false_positive_rate_raises_thresholds() {
        let (m, store) = manager(cfg());
        // 50 samples, 10 of them false positives: fpr = 10 / 50 = 0.2
        for i in 0..50 {
            m.provide_feedback(0.4, i >= 10, i < 10);
        }
        let (deny, ask) = m.thresholds();
        // delta = 0.1 * (0.2 - 0.05) = 0.015
        assert!((deny - 0.315).abs() < 1e-9, "deny={deny}");
        assert!((ask - 0.515).abs() < 1e-9, "ask={ask}");
        let saved = store.load().unwrap().unwrap();
        assert_eq!(saved.sample_count, 50);
    }

    #[test]
    fn low_false_positive_rate_lowers_thresholds() {
        let (m, _) = manager(cfg());
        for _ in 0..50 {
            m.provide_feedback(0.9, true, false);
        }
        let (deny, ask) = m.thresholds();
        // fpr 0, delta = -0.1 * 0.05
        assert!((deny - 0.295).abs() < 1e-9);
        assert!((ask - 0.495).abs() < 1e-9);
    }

    #[test]
    fn no_adaptation_before_min_samples() {
        let (m, _) = manager(cfg());
        for _ in 0..40 {
            m.provide_feedback(0.2, false, true);
        }
        assert_eq!(m.thresholds(), (0.3, 0.5));
    }

    #[test]
    fn adaptation_respects_bounds() {
        let (m, _) = manager(ThresholdConfig {
            min_samples: 10,
            adaptation_rate: 1.0,
            ..cfg()
        });
        for _ in 0..200 {
            m.provide_feedback(0.2, false, true);
        }
        let (deny, ask) = m.thresholds();
        assert_eq!(deny, DENY_MAX);
        assert_eq!(ask, ASK_MAX);
        assert!(ask >= deny + ASK_GAP);
    }

    #[test]
    fn reset_restores_defaults() {
        let (m, store) = manager(ThresholdConfig {
            min_samples: 10,
            ..cfg()
        });
        for _ in 0..20 {
            m.provide_feedback(0.2, false, true);
        }
        assert_ne!(m.thresholds(), (0.3, 0.5));
        m.reset();
        assert_eq!(m.thresholds(), (0.3, 0.5));
        assert_eq!(m.stats().sample_count, 0);
        assert_eq!(store.load().unwrap().unwrap().deny_threshold, 0.3);
    }

    #[test]
    fn sample_window_is_bounded() {
        let (m, _) = manager(ThresholdConfig {
            min_samples: u64::MAX,
            ..cfg()
        });
        for _ in 0..(SAMPLE_WINDOW + 5) {
            m.provide_feedback(0.5, true, false);
        }
        assert_eq!(m.stats().recent_samples, SAMPLE_WINDOW);
    }
}
