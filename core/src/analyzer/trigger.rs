use regex::Regex;

use crate::config::{AnalysisMode, TriggerConfig};
use crate::transform::detect_language;

#[derive(Debug, Clone)]
pub struct Trigger {
    pattern: Regex,
    min_code_size: usize,
    languages: Vec<String>,
    pub mode: Option<AnalysisMode>,
}

impl Trigger {
    pub fn matches(&self, tool_name: &str, code: &str) -> bool {
        if !self.pattern.is_match(tool_name) || code.len() < self.min_code_size {
            return false;
        }
        if self.languages.is_empty() {
            return true;
        }
        let detected = detect_language(code);
        self.languages
            .iter()
            .any(|l| l.eq_ignore_ascii_case(detected.as_str()))
    }
}

/// Compiled trigger rules, checked in configuration order.
#[derive(Debug, Clone, Default)]
pub struct TriggerSet {
    triggers: Vec<Trigger>,
}

impl TriggerSet {
    /// Rules with an uncompilable pattern are skipped with a warning;
    /// validation rejects them before this point in normal use.
    pub fn new(configs: &[TriggerConfig]) -> Self {
        let triggers = configs
            .iter()
            .filter_map(|t| match Regex::new(&t.tool_pattern) {
                Ok(pattern) => Some(Trigger {
                    pattern,
                    min_code_size: t.min_code_size,
                    languages: t.languages.clone(),
                    mode: t.mode.as_deref().and_then(|m| m.parse().ok()),
                }),
                Err(e) => {
                    tracing::warn!(
                        target: "ctvp.analyzer",
                        pattern = %t.tool_pattern,
                        error = %e,
                        "skipping trigger with invalid pattern"
                    );
                    None
                }
            })
            .collect();
        Self { triggers }
    }

    /// First rule that fires for this call.
    pub fn matching(&self, tool_name: &str, code: &str) -> Option<&Trigger> {
        self.triggers.iter().find(|t| t.matches(tool_name, code))
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(pattern: &str, min: usize, langs: &[&str], mode: Option<&str>) -> TriggerConfig {
        TriggerConfig {
            tool_pattern: pattern.into(),
            min_code_size: min,
            languages: langs.iter().map(|s| s.to_string()).collect(),
            mode: mode.map(str::to_string),
        }
    }

    #[test]
    fn size_gate() {
        let set = TriggerSet::new(&[rule("^Bash$", 50, &[], None)]);
        let short = "x".repeat(40);
        let long = "x".repeat(80);
        assert!(set.matching("Bash", &short).is_none());
        assert!(set.matching("Bash", &long).is_some());
        assert!(set.matching("BashTool", &long).is_none());
    }

    #[test]
    fn language_allow_list() {
        let set = TriggerSet::new(&[rule("^Write$", 0, &["python"], None)]);
        assert!(set.matching("Write", "import os\ndef f():\n    pass\n").is_some());
        assert!(set.matching("Write", "package main\nfunc main() {}\n").is_none());
    }

    #[test]
    fn first_match_wins_and_carries_mode() {
        let set = TriggerSet::new(&[
            rule("^Bash$", 10, &[], Some("hybrid")),
            rule(".*", 0, &[], Some("async")),
        ]);
        let t = set.matching("Bash", "echo hello world").unwrap();
        assert_eq!(t.mode, Some(AnalysisMode::Hybrid));
        let t = set.matching("Read", "x").unwrap();
        assert_eq!(t.mode, Some(AnalysisMode::Async));
    }

    #[test]
    fn invalid_pattern_is_skipped() {
        let set = TriggerSet::new(&[rule("(", 0, &[], None), rule("^Bash$", 0, &[], None)]);
        assert_eq!(set.len(), 1);
    }
}
