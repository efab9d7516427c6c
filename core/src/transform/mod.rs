//! Semantics-preserving rewriters.
//!
//! Each transform is a tagged variant dispatched through a fixed table; all of
//! them are line/keyword heuristics rather than parsers, so "preserving" is an
//! intent, not a guarantee.

mod comment;
mod dead_code;
mod language;
mod reformat;
mod rename;
mod reorder;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::TransformError;

pub use language::{detect_language, Language};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformType {
    Identity,
    VariableRename,
    DeadCodeInjection,
    StatementReorder,
    Reformat,
    CommentModify,
}

impl TransformType {
    /// Every rewriting transform, in default preference order.
    pub const REWRITERS: [TransformType; 5] = [
        TransformType::VariableRename,
        TransformType::DeadCodeInjection,
        TransformType::StatementReorder,
        TransformType::Reformat,
        TransformType::CommentModify,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TransformType::Identity => "identity",
            TransformType::VariableRename => "variable_rename",
            TransformType::DeadCodeInjection => "dead_code_injection",
            TransformType::StatementReorder => "statement_reorder",
            TransformType::Reformat => "reformat",
            TransformType::CommentModify => "comment_modify",
        }
    }

    /// Resolves configured names; `identity` is not selectable.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Self::REWRITERS.into_iter().find(|t| t.name() == name)
    }

    pub fn can_transform(&self, code: &str) -> bool {
        match self {
            TransformType::Identity => true,
            TransformType::VariableRename => rename::can_transform(code),
            TransformType::DeadCodeInjection => dead_code::can_transform(code),
            TransformType::StatementReorder => reorder::can_transform(code),
            TransformType::Reformat => reformat::can_transform(code),
            TransformType::CommentModify => comment::can_transform(code),
        }
    }

    pub fn transform(&self, code: &str) -> Result<Transformed, TransformError> {
        match self {
            TransformType::Identity => Ok(Transformed {
                code: code.to_string(),
                details: BTreeMap::new(),
            }),
            TransformType::VariableRename => rename::transform(code),
            TransformType::DeadCodeInjection => dead_code::transform(code),
            TransformType::StatementReorder => reorder::transform(code),
            TransformType::Reformat => reformat::transform(code),
            TransformType::CommentModify => comment::transform(code),
        }
    }
}

impl fmt::Display for TransformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Output of one rewrite: the new code plus what changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed {
    pub code: String,
    pub details: BTreeMap<String, String>,
}

/// Ordered registry of enabled transforms, built once from configuration.
#[derive(Debug, Clone)]
pub struct TransformEngine {
    order: Vec<TransformType>,
}

impl TransformEngine {
    /// Unknown names are skipped; config validation reports them earlier.
    pub fn from_names(names: &[String]) -> Self {
        let mut order: Vec<TransformType> = Vec::with_capacity(names.len());
        for t in names.iter().filter_map(|n| TransformType::from_name(n)) {
            if !order.contains(&t) {
                order.push(t);
            }
        }
        Self { order }
    }

    pub fn types(&self) -> &[TransformType] {
        &self.order
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for TransformEngine {
    fn default() -> Self {
        Self {
            order: TransformType::REWRITERS.to_vec(),
        }
    }
}

pub(crate) fn is_substantive(line: &str) -> bool {
    let t = line.trim();
    if t.is_empty() {
        return false;
    }
    let is_comment = (t.starts_with('#') && !t.starts_with("#["))
        || t.starts_with("//")
        || t.starts_with("/*")
        || t.starts_with('*');
    !is_comment
}

pub(crate) fn first_substantive_index(lines: &[&str]) -> Option<usize> {
    lines.iter().position(|l| is_substantive(l))
}

pub(crate) fn leading_whitespace(line: &str) -> String {
    line.chars().take_while(|c| c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_config() {
        for t in TransformType::REWRITERS {
            assert_eq!(TransformType::from_name(t.name()), Some(t));
        }
        assert_eq!(TransformType::from_name("identity"), None);
        assert_eq!(TransformType::from_name(" Reformat "), Some(TransformType::Reformat));
    }

    #[test]
    fn engine_keeps_configured_order_without_duplicates() {
        let engine = TransformEngine::from_names(&[
            "reformat".into(),
            "comment_modify".into(),
            "reformat".into(),
            "bogus".into(),
        ]);
        assert_eq!(
            engine.types(),
            &[TransformType::Reformat, TransformType::CommentModify]
        );
    }

    #[test]
    fn substantive_lines_skip_comments() {
        assert!(!is_substantive("   # comment"));
        assert!(!is_substantive("// note"));
        assert!(is_substantive("#[derive(Debug)]"));
        assert!(is_substantive("x = 1"));
    }
}
