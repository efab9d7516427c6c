use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::errors::TransformError;

use super::Transformed;

lazy_static! {
    static ref BARE_COMMA: Regex = Regex::new(r",([^\s])").expect("bare comma regex");
}

pub(super) fn can_transform(code: &str) -> bool {
    !code.trim().is_empty()
}

pub(super) fn transform(code: &str) -> Result<Transformed, TransformError> {
    let mut edits: Vec<&str> = Vec::new();

    let mut text = code.to_string();
    if text.contains('\r') {
        text = text.replace("\r\n", "\n").replace('\r', "\n");
        edits.push("line_endings");
    }

    let mut trimmed_any = false;
    let lines: Vec<String> = text
        .split('\n')
        .map(|l| {
            let t = l.trim_end();
            if t.len() != l.len() {
                trimmed_any = true;
            }
            t.to_string()
        })
        .collect();
    if trimmed_any {
        edits.push("trailing_whitespace");
    }

    // Runs of three or more blank lines become one.
    let mut collapsed: Vec<String> = Vec::with_capacity(lines.len());
    let mut collapsed_any = false;
    let mut i = 0;
    while i < lines.len() {
        if lines[i].is_empty() {
            let start = i;
            while i < lines.len() && lines[i].is_empty() {
                i += 1;
            }
            let run = i - start;
            // The final empty element is the trailing newline, not a blank line.
            let at_end = i == lines.len();
            let blanks = if at_end { run.saturating_sub(1) } else { run };
            if blanks >= 3 {
                collapsed_any = true;
                collapsed.push(String::new());
                if at_end {
                    collapsed.push(String::new());
                }
            } else {
                collapsed.extend(std::iter::repeat(String::new()).take(run));
            }
        } else {
            collapsed.push(lines[i].clone());
            i += 1;
        }
    }
    if collapsed_any {
        edits.push("blank_lines");
    }

    let mut out = collapsed.join("\n");

    if BARE_COMMA.is_match(&out) {
        out = BARE_COMMA.replace_all(&out, ", $1").into_owned();
        edits.push("comma_spacing");
    }

    if !out.ends_with('\n') {
        out.push('\n');
        edits.push("trailing_newline");
    }

    let mut details = BTreeMap::new();
    details.insert(
        "edits".into(),
        if edits.is_empty() {
            "none".to_string()
        } else {
            edits.join(",")
        },
    );
    Ok(Transformed { code: out, details })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_everything_it_knows() {
        let code = "a = f(1,2)   \r\n\r\n\r\n\r\nb = 3";
        let t = transform(code).unwrap();
        assert_eq!(t.code, "a = f(1, 2)\n\nb = 3\n");
        assert_eq!(
            t.details["edits"],
            "line_endings,trailing_whitespace,blank_lines,comma_spacing,trailing_newline"
        );
    }

    #[test]
    fn keeps_two_blank_lines() {
        let t = transform("a\n\n\nb\n").unwrap();
        assert_eq!(t.code, "a\n\n\nb\n");
        assert_eq!(t.details["edits"], "none");
    }

    #[test]
    fn only_adds_trailing_newline() {
        let t = transform("echo hi").unwrap();
        assert_eq!(t.code, "echo hi\n");
        assert_eq!(t.details["edits"], "trailing_newline");
    }
}
