use std::collections::BTreeMap;

use crate::errors::TransformError;

use super::language::detect_language;
use super::{first_substantive_index, leading_whitespace, Transformed};

const MARKER_TEXT: &str = "equivalent variant: comment added, behavior unchanged";

pub(super) fn can_transform(code: &str) -> bool {
    let lines: Vec<&str> = code.lines().collect();
    first_substantive_index(&lines).is_some()
}

pub(super) fn transform(code: &str) -> Result<Transformed, TransformError> {
    let lines: Vec<&str> = code.lines().collect();
    let Some(idx) = first_substantive_index(&lines) else {
        return Err(TransformError::NotApplicable("no substantive line".into()));
    };

    let prefix = if detect_language(code).uses_slash_comments() {
        "//"
    } else {
        "#"
    };
    let indent = leading_whitespace(lines[idx]);

    let mut out: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
    out.insert(idx, format!("{indent}{prefix} {MARKER_TEXT}"));
    let mut code_out = out.join("\n");
    if code.ends_with('\n') {
        code_out.push('\n');
    }

    let mut details = BTreeMap::new();
    details.insert("comment_prefix".into(), prefix.to_string());
    details.insert("before_line".into(), (idx + 1).to_string());
    Ok(Transformed {
        code: code_out,
        details,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_comment_after_shebang() {
        let t = transform("#!/bin/sh\nrm -rf build\n").unwrap();
        assert_eq!(
            t.code,
            format!("#!/bin/sh\n# {MARKER_TEXT}\nrm -rf build\n")
        );
    }

    #[test]
    fn slash_comment_for_c_like() {
        let t = transform("const x = require('x');").unwrap();
        assert!(t.code.starts_with("// "));
        assert_eq!(t.details["comment_prefix"], "//");
    }
}
