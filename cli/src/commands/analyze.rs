use std::sync::Arc;

use ctvp_core::api::{detect_language, AppConfig, CtvpResult, Decision};
use ctvp_plugins::factory;

use crate::commands::cli::{AnalyzeArgs, CheckArgs, OutputFormat};
use crate::commands::input::read_code;
use crate::error::CliError;

/// Process exit code for a decision; 1 is reserved for errors.
pub fn exit_code(decision: Decision) -> i32 {
    match decision {
        Decision::Allow => 0,
        Decision::Ask => 2,
        Decision::Deny => 3,
        Decision::Block => 4,
    }
}

pub async fn run_analyze(args: AnalyzeArgs, cfg: AppConfig) -> Result<i32, CliError> {
    let code = read_code(&args.input).await?;
    let tool = args.input.tool.as_str();
    let analyzer = Arc::new(factory::build_analyzer(one_shot(cfg))?);

    let result = if args.force {
        Some(analyzer.analyze(&code, tool).await)
    } else {
        analyzer.evaluate(tool, &code).await
    };

    let Some(result) = result else {
        match args.format {
            OutputFormat::Json => println!("{}", serde_json::json!({ "analyzed": false })),
            OutputFormat::Text => println!("No trigger matched tool '{tool}'; not analyzed."),
        }
        return Ok(0);
    };

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => println!("{}", format_text(&result)),
    }
    Ok(exit_code(result.decision))
}

/// The process exits after one command, so a background analysis would be
/// dropped. Every mode collapses to sync here.
fn one_shot(mut cfg: AppConfig) -> AppConfig {
    cfg.mode = "sync".to_string();
    for t in &mut cfg.triggers {
        t.mode = None;
    }
    cfg
}

pub fn format_text(r: &CtvpResult) -> String {
    let mut out = format!(
        "decision: {}\nscore:    {:.3}\nvariants: {}\nduration: {} ms\n",
        r.decision,
        r.score,
        r.variants.len(),
        r.duration.as_millis()
    );
    if r.fail_open {
        out.push_str("note:     fail-open\n");
    }
    out.push('\n');
    out.push_str(&r.reasoning);
    out
}

pub async fn run_check(args: CheckArgs, cfg: AppConfig) -> Result<i32, CliError> {
    let code = read_code(&args.input).await?;
    let analyzer = factory::build_analyzer(cfg)?;
    let fires = analyzer.should_analyze(&args.input.tool, &code);
    println!(
        "tool: {}\nlanguage: {}\nbytes: {}\nanalyze: {}",
        args.input.tool,
        detect_language(&code),
        code.len(),
        fires
    );
    Ok(0)
}
