use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Pre-execution consistency verification for agent-proposed code")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file; defaults to ./ctvp.toml when present.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Log level when RUST_LOG is unset; overrides `logging.level`.
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the full consistency analysis on a snippet.
    Analyze(AnalyzeArgs),
    /// Report whether a snippet would be analyzed, without calling the oracle.
    Check(CheckArgs),
    /// Label a past decision to drive threshold adaptation.
    Feedback(FeedbackArgs),
    /// Inspect or reset adaptive thresholds.
    Thresholds(ThresholdsArgs),
    /// Print the effective, validated configuration.
    Config,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct InputArgs {
    /// Tool name the snippet is destined for (e.g. Bash, Write).
    #[arg(long, default_value = "Bash")]
    pub tool: String,

    #[arg(long, group = "input")]
    pub code: Option<String>,

    #[arg(long, group = "input")]
    pub file: Option<String>,

    #[arg(long, group = "input")]
    pub stdin: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Analyze even when no trigger matches.
    #[arg(long, default_value_t = false)]
    pub force: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct CheckArgs {
    #[command(flatten)]
    pub input: InputArgs,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct FeedbackArgs {
    /// Aggregate score of the decision being labeled.
    #[arg(long)]
    pub score: f64,

    /// The decision flagged the code (ask, deny or block).
    #[arg(long, default_value_t = false)]
    pub flagged: bool,

    /// The decision was wrong.
    #[arg(long, default_value_t = false)]
    pub incorrect: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ThresholdsArgs {
    #[command(subcommand)]
    pub action: ThresholdsAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ThresholdsAction {
    Show,
    Reset,
}
