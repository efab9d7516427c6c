use std::collections::BTreeSet;
use std::hash::Hash;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // HTTP verbs are short enough to hide inside other words ("target", "compost").
    static ref HTTP_VERB: Regex = Regex::new(r"\b(get|post)\b").expect("valid regex");
}

/// Buckets checked in order; the first bucket with a matching keyword wins.
const BUCKETS: &[(&str, &[&str])] = &[
    (
        "network",
        &[
            "network", "http", "url", "curl", "wget", "socket", "dns", "connect", "request",
            "download", "upload", "fetch", "send",
        ],
    ),
    (
        "process",
        &[
            "process", "exec", "spawn", "subprocess", "fork", "command", "shell", "kill",
        ],
    ),
    ("env", &["env", "environment", "getenv", "setenv", "export"]),
    (
        "file_write",
        &[
            "write", "creat", "delet", "remov", "unlink", "mkdir", "chmod", "chown", "append",
            "save", "truncat", "renam", "overwrit",
        ],
    ),
    ("file_read", &["read", "open", "load", "stat", "list", "cat "]),
];

/// Maps free-text effect descriptions onto coarse buckets so that two
/// phrasings of the same effect compare equal.
pub fn normalize_side_effect(effect: &str) -> String {
    let lower = effect.trim().to_lowercase();
    for (bucket, keywords) in BUCKETS {
        let verb = *bucket == "network" && HTTP_VERB.is_match(&lower);
        if verb || keywords.iter().any(|k| lower.contains(k)) {
            return (*bucket).to_string();
        }
    }
    lower.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn normalize_all<'a>(effects: impl IntoIterator<Item = &'a String>) -> BTreeSet<String> {
    effects
        .into_iter()
        .map(|e| normalize_side_effect(e))
        .filter(|e| !e.is_empty())
        .collect()
}

/// |A ∩ B| / |A ∪ B|, with two empty sets counting as identical.
pub fn jaccard<T: Ord + Eq + Hash>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let inter = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    inter / union
}
