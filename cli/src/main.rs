mod commands;
mod error;
mod logging;

use clap::Parser;
use ctvp_core::api::AppConfig;
use ctvp_core::config;

use commands::cli;

#[tokio::main]
async fn main() {
    let args = cli::Args::parse();

    let cfg = match load_config(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("ctvp: {e}");
            std::process::exit(1);
        }
    };
    let _guard = logging::init(&cfg.logging, args.log_level.as_deref());

    match dispatch(args.command, cfg).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            tracing::error!(target: "ctvp.cli", error = %e, "command failed");
            eprintln!("ctvp: {e}");
            std::process::exit(1);
        }
    }
}

fn load_config(path: Option<&str>) -> Result<AppConfig, error::CliError> {
    let cfg = match path {
        Some(p) => config::load_from_path(shellexpand::tilde(p).into_owned())?,
        None => config::load_default()?,
    };
    cfg.validate()?;
    Ok(cfg)
}

async fn dispatch(cmd: cli::Commands, cfg: AppConfig) -> Result<i32, error::CliError> {
    match cmd {
        cli::Commands::Analyze(a) => commands::analyze::run_analyze(a, cfg).await,
        cli::Commands::Check(c) => commands::analyze::run_check(c, cfg).await,
        cli::Commands::Feedback(f) => commands::thresholds::run_feedback(f, cfg),
        cli::Commands::Thresholds(t) => commands::thresholds::run_thresholds(t, cfg),
        cli::Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&cfg.redacted())?);
            Ok(0)
        }
    }
}
