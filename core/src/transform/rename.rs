use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::errors::TransformError;

use super::Transformed;

/// Ordered synonym table: `(from, to)`.
const SYNONYMS: &[(&str, &str)] = &[
    ("data", "payload"),
    ("result", "outcome"),
    ("tmp", "scratch"),
    ("temp", "scratch"),
    ("path", "file_path"),
    ("url", "endpoint"),
    ("count", "total"),
    ("value", "val"),
    ("item", "entry"),
    ("items", "entries"),
    ("config", "settings"),
    ("response", "reply"),
    ("output", "produced"),
    ("buf", "buffer"),
    ("msg", "message"),
    ("content", "body"),
];

const MAX_SHORT_IDENT: usize = 12;

lazy_static! {
    static ref ASSIGNMENT: Regex = Regex::new(
        r"(?m)^\s*(?:let\s+|const\s+|var\s+|local\s+|export\s+)?([a-z][a-z0-9_]*)\s*=(?:[^=]|$)"
    )
    .expect("assignment regex");
}

fn word_regex(word: &str) -> Result<Regex, TransformError> {
    Regex::new(&format!(r"\b{}\b", regex::escape(word)))
        .map_err(|e| TransformError::Failed(e.to_string()))
}

fn synonym_hits(code: &str) -> Vec<(&'static str, &'static str)> {
    SYNONYMS
        .iter()
        .filter(|(from, to)| {
            let has_from = word_regex(from).map(|re| re.is_match(code)).unwrap_or(false);
            let has_to = word_regex(to).map(|re| re.is_match(code)).unwrap_or(true);
            has_from && !has_to
        })
        .copied()
        .collect()
}

fn short_assignment_target(code: &str) -> Option<String> {
    ASSIGNMENT
        .captures_iter(code)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .find(|name| name.len() <= MAX_SHORT_IDENT)
}

pub(super) fn can_transform(code: &str) -> bool {
    !synonym_hits(code).is_empty() || short_assignment_target(code).is_some()
}

pub(super) fn transform(code: &str) -> Result<Transformed, TransformError> {
    let mut details = BTreeMap::new();
    let hits = synonym_hits(code);

    if !hits.is_empty() {
        let mut out = code.to_string();
        let mut renames = Vec::with_capacity(hits.len());
        for (from, to) in hits {
            let re = word_regex(from)?;
            out = re.replace_all(&out, to).into_owned();
            renames.push(format!("{from}->{to}"));
        }
        details.insert("strategy".into(), "synonym".into());
        details.insert("renames".into(), renames.join(","));
        return Ok(Transformed { code: out, details });
    }

    let Some(name) = short_assignment_target(code) else {
        return Err(TransformError::NotApplicable(
            "no renameable identifier found".into(),
        ));
    };
    let renamed = format!("renamed_{name}");
    let re = word_regex(&name)?;
    let out = re.replace_all(code, renamed.as_str()).into_owned();
    details.insert("strategy".into(), "prefix".into());
    details.insert("renames".into(), format!("{name}->{renamed}"));
    Ok(Transformed { code: out, details })
}
