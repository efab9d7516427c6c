use ctvp_core::api::{AppConfig, ThresholdManager, ThresholdStats};
use ctvp_plugins::factory;

use crate::commands::cli::{FeedbackArgs, ThresholdsAction, ThresholdsArgs};
use crate::error::CliError;

fn manager(cfg: &AppConfig) -> ThresholdManager {
    ThresholdManager::new(cfg.threshold.clone(), factory::build_threshold_store(cfg))
}

fn print_stats(stats: &ThresholdStats) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(stats)?);
    Ok(())
}

pub fn run_feedback(args: FeedbackArgs, cfg: AppConfig) -> Result<i32, CliError> {
    if !(0.0..=1.0).contains(&args.score) {
        return Err(CliError::Command("--score must be within [0, 1]".to_string()));
    }
    if !cfg.threshold.adaptive {
        tracing::warn!(target: "ctvp.threshold", "adaptive thresholds disabled; feedback ignored");
    }
    let m = manager(&cfg);
    m.provide_feedback(args.score, !args.incorrect, args.flagged);
    print_stats(&m.stats())?;
    Ok(0)
}

pub fn run_thresholds(args: ThresholdsArgs, cfg: AppConfig) -> Result<i32, CliError> {
    let m = manager(&cfg);
    if let ThresholdsAction::Reset = args.action {
        m.reset();
    }
    print_stats(&m.stats())?;
    Ok(0)
}
