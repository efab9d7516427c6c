use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// One of `sync`, `async`, `hybrid`.
    #[serde(default = "default_mode")]
    pub mode: String,

    #[serde(default = "default_hybrid_wait_ms")]
    pub hybrid_wait_ms: u64,

    /// Budget for one whole analysis, not for a single oracle call.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub orbit: OrbitConfig,

    #[serde(default)]
    pub trace: TraceConfig,

    #[serde(default)]
    pub similarity: SimilarityConfig,

    #[serde(default)]
    pub threshold: ThresholdConfig,

    #[serde(default = "default_triggers")]
    pub triggers: Vec<TriggerConfig>,

    #[serde(default)]
    pub budget: BudgetConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub oracle: OracleConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_enabled() -> bool {
    true
}

fn default_mode() -> String {
    "sync".to_string()
}

fn default_hybrid_wait_ms() -> u64 {
    2_000
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_triggers() -> Vec<TriggerConfig> {
    vec![
        TriggerConfig {
            tool_pattern: "^Bash$".into(),
            min_code_size: 50,
            languages: Vec::new(),
            mode: None,
        },
        TriggerConfig {
            tool_pattern: "^(Write|Edit|MultiEdit)$".into(),
            min_code_size: 100,
            languages: vec![
                "shell".into(),
                "python".into(),
                "javascript".into(),
                "go".into(),
            ],
            mode: None,
        },
    ]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            mode: default_mode(),
            hybrid_wait_ms: default_hybrid_wait_ms(),
            timeout_ms: default_timeout_ms(),
            orbit: OrbitConfig::default(),
            trace: TraceConfig::default(),
            similarity: SimilarityConfig::default(),
            threshold: ThresholdConfig::default(),
            triggers: default_triggers(),
            budget: BudgetConfig::default(),
            cache: CacheConfig::default(),
            oracle: OracleConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

const REDACTED: &str = "***";

impl AppConfig {
    /// Copy safe to print: secrets are masked.
    pub fn redacted(&self) -> AppConfig {
        let mut cfg = self.clone();
        if let OracleConfig::Http(ref mut http) = cfg.oracle {
            if !http.api_key.is_empty() {
                http.api_key = REDACTED.to_string();
            }
        }
        cfg
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrbitConfig {
    /// Target number of variants, identity included.
    #[serde(default = "default_orbit_size")]
    pub size: usize,

    #[serde(default = "default_orbit_min_size")]
    pub min_size: usize,

    /// Transform names in preference order.
    #[serde(default = "default_transforms")]
    pub transforms: Vec<String>,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
}

fn default_orbit_size() -> usize {
    5
}

fn default_orbit_min_size() -> usize {
    3
}

fn default_transforms() -> Vec<String> {
    vec![
        "variable_rename".into(),
        "dead_code_injection".into(),
        "statement_reorder".into(),
        "reformat".into(),
        "comment_modify".into(),
    ]
}

fn default_max_attempts() -> usize {
    3
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            size: default_orbit_size(),
            min_size: default_orbit_min_size(),
            transforms: default_transforms(),
            max_attempts: default_max_attempts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceConfig {
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    #[serde(default = "default_parallel")]
    pub parallel: bool,

    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    #[serde(default = "default_true")]
    pub include_variables: bool,

    #[serde(default = "default_true")]
    pub include_side_effects: bool,
}

fn default_max_steps() -> usize {
    50
}

fn default_parallel() -> bool {
    true
}

fn default_max_parallel() -> usize {
    4
}

fn default_true() -> bool {
    true
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            parallel: default_parallel(),
            max_parallel: default_max_parallel(),
            include_variables: true,
            include_side_effects: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityConfig {
    /// `edit_distance` or `multiset`.
    #[serde(default = "default_metric")]
    pub metric: String,

    #[serde(default = "default_step_weight")]
    pub step_weight: f64,

    #[serde(default = "default_state_weight")]
    pub state_weight: f64,

    #[serde(default = "default_output_weight")]
    pub output_weight: f64,

    #[serde(default)]
    pub ignore_ordering: bool,
}

fn default_metric() -> String {
    "edit_distance".to_string()
}

fn default_step_weight() -> f64 {
    0.4
}

fn default_state_weight() -> f64 {
    0.3
}

fn default_output_weight() -> f64 {
    0.3
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            metric: default_metric(),
            step_weight: default_step_weight(),
            state_weight: default_state_weight(),
            output_weight: default_output_weight(),
            ignore_ordering: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    #[serde(default = "default_deny")]
    pub deny: f64,

    #[serde(default = "default_ask")]
    pub ask: f64,

    #[serde(default = "default_true")]
    pub adaptive: bool,

    #[serde(default = "default_target_fpr")]
    pub target_fpr: f64,

    #[serde(default = "default_min_samples")]
    pub min_samples: u64,

    #[serde(default = "default_adaptation_rate")]
    pub adaptation_rate: f64,

    /// Where adapted thresholds are persisted. Empty keeps them in memory.
    #[serde(default = "default_state_path")]
    pub state_path: String,
}

fn default_deny() -> f64 {
    0.3
}

fn default_ask() -> f64 {
    0.5
}

fn default_target_fpr() -> f64 {
    0.05
}

fn default_min_samples() -> u64 {
    50
}

fn default_adaptation_rate() -> f64 {
    0.1
}

fn default_state_path() -> String {
    "~/.ctvp/thresholds.json".to_string()
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            deny: default_deny(),
            ask: default_ask(),
            adaptive: true,
            target_fpr: default_target_fpr(),
            min_samples: default_min_samples(),
            adaptation_rate: default_adaptation_rate(),
            state_path: default_state_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Regex matched against the tool name.
    pub tool_pattern: String,

    #[serde(default)]
    pub min_code_size: usize,

    /// Empty means any language.
    #[serde(default)]
    pub languages: Vec<String>,

    /// Overrides the global mode for matching calls.
    #[serde(default)]
    pub mode: Option<String>,
}

/// Spend limits read by an external cost tracker; not enforced here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    #[serde(default = "default_max_calls_per_analysis")]
    pub max_calls_per_analysis: u32,

    #[serde(default = "default_daily_call_limit")]
    pub daily_call_limit: u64,

    #[serde(default = "default_daily_cost_limit_usd")]
    pub daily_cost_limit_usd: f64,
}

fn default_max_calls_per_analysis() -> u32 {
    10
}

fn default_daily_call_limit() -> u64 {
    1_000
}

fn default_daily_cost_limit_usd() -> f64 {
    5.0
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_calls_per_analysis: default_max_calls_per_analysis(),
            daily_call_limit: default_daily_call_limit(),
            daily_cost_limit_usd: default_daily_cost_limit_usd(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,

    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_cache_max_entries() -> usize {
    1_000
}

fn default_cache_ttl_secs() -> u64 {
    3_600
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: default_cache_max_entries(),
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider")]
pub enum OracleConfig {
    #[serde(rename = "http")]
    Http(HttpOracleConfig),
    #[serde(rename = "command")]
    Command(CommandOracleConfig),
}

impl Default for OracleConfig {
    fn default() -> Self {
        OracleConfig::Http(HttpOracleConfig::default())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpOracleConfig {
    #[serde(default = "default_oracle_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_oracle_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_oracle_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_oracle_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_oracle_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u32 {
    2_048
}

fn default_oracle_timeout_ms() -> u64 {
    20_000
}

impl Default for HttpOracleConfig {
    fn default() -> Self {
        Self {
            base_url: default_oracle_url(),
            api_key: String::new(),
            model: default_oracle_model(),
            max_tokens: default_max_tokens(),
            temperature: 0.0,
            timeout_ms: default_oracle_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOracleConfig {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_program_args")]
    pub args: Vec<String>,
    #[serde(default = "default_command_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_program() -> String {
    "claude".to_string()
}

fn default_program_args() -> Vec<String> {
    vec!["-p".to_string()]
}

fn default_command_timeout_ms() -> u64 {
    60_000
}

impl Default for CommandOracleConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_program_args(),
            timeout_ms: default_command_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// When set, logs also go to a daily-rolling file in this directory.
    #[serde(default)]
    pub directory: Option<String>,

    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_file_prefix() -> String {
    "ctvp.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
            file_prefix: default_file_prefix(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacted_masks_api_key() {
        let mut cfg = AppConfig::default();
        if let OracleConfig::Http(ref mut http) = cfg.oracle {
            http.api_key = "sk-live-secret".into();
        }
        let out = serde_json::to_string_pretty(&cfg.redacted()).unwrap();
        assert!(!out.contains("sk-live-secret"), "{out}");
        assert!(out.contains(REDACTED));

        // the original is untouched
        match cfg.oracle {
            OracleConfig::Http(http) => assert_eq!(http.api_key, "sk-live-secret"),
            OracleConfig::Command(_) => unreachable!(),
        }
    }

    #[test]
    fn redacted_leaves_empty_key_empty() {
        let cfg = AppConfig::default().redacted();
        match cfg.oracle {
            OracleConfig::Http(http) => assert!(http.api_key.is_empty()),
            OracleConfig::Command(_) => unreachable!(),
        }
    }
}
