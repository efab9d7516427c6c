use std::sync::Arc;

use anyhow::{Context, Result};

use ctvp_core::api::{
    Analyzer, AppConfig, FileThresholdStore, MemoryThresholdStore, Oracle, OracleConfig,
    ThresholdStore,
};

use crate::oracle::{CommandOracle, HttpOracle};

pub fn build_oracle(cfg: &AppConfig) -> Result<Arc<dyn Oracle>> {
    match &cfg.oracle {
        OracleConfig::Http(http_cfg) => Ok(Arc::new(
            HttpOracle::new(http_cfg).context("failed to build http oracle client")?,
        )),
        OracleConfig::Command(cmd_cfg) => Ok(Arc::new(CommandOracle::new(cmd_cfg))),
    }
}

/// Empty `state_path` keeps thresholds in memory for the life of the process.
pub fn build_threshold_store(cfg: &AppConfig) -> Arc<dyn ThresholdStore> {
    let path = cfg.threshold.state_path.trim();
    if path.is_empty() {
        Arc::new(MemoryThresholdStore::new())
    } else {
        Arc::new(FileThresholdStore::from_config_path(path))
    }
}

pub fn build_analyzer(cfg: AppConfig) -> Result<Analyzer> {
    let oracle = build_oracle(&cfg)?;
    let store = build_threshold_store(&cfg);
    tracing::debug!(
        target: "ctvp.analyzer",
        oracle = oracle.name(),
        mode = %cfg.mode,
        "building analyzer"
    );
    Analyzer::new(cfg, oracle, store).context("invalid ctvp configuration")
}
