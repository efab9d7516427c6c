use serde::Serialize;

use crate::scorer::Decision;

/// Point-in-time view of analyzer counters. Means are running means over
/// every call to `analyze`, cache hits included.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_analyses: u64,
    pub allow_count: u64,
    pub ask_count: u64,
    pub deny_count: u64,
    pub block_count: u64,
    pub cache_hits: u64,
    pub cache_hit_rate: f64,
    pub avg_score: f64,
    pub avg_duration_ms: f64,
    pub fail_open_count: u64,
}

fn running_mean(avg: f64, n: u64, x: f64) -> f64 {
    let n = n as f64;
    avg * (n - 1.0) / n + x / n
}

impl MetricsSnapshot {
    pub(crate) fn record(
        &mut self,
        decision: Decision,
        score: f64,
        duration_ms: f64,
        cached: bool,
        fail_open: bool,
    ) {
        self.total_analyses += 1;
        let n = self.total_analyses;

        match decision {
            Decision::Allow => self.allow_count += 1,
            Decision::Ask => self.ask_count += 1,
            Decision::Deny => self.deny_count += 1,
            Decision::Block => self.block_count += 1,
        }
        if cached {
            self.cache_hits += 1;
        }
        if fail_open {
            self.fail_open_count += 1;
        }

        self.cache_hit_rate = running_mean(self.cache_hit_rate, n, if cached { 1.0 } else { 0.0 });
        self.avg_score = running_mean(self.avg_score, n, score);
        self.avg_duration_ms = running_mean(self.avg_duration_ms, n, duration_ms);
    }
}
