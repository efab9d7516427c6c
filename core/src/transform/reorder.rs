use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::errors::TransformError;

use super::{leading_whitespace, Transformed};

lazy_static! {
    static ref SIMPLE_ASSIGNMENT: Regex = Regex::new(
        r"^\s*(?:let\s+|const\s+|var\s+|local\s+)?([A-Za-z_]\w*)\s*=([^=].*)$"
    )
    .expect("simple assignment regex");
}

struct Assignment<'a> {
    lhs: &'a str,
    rhs: &'a str,
}

fn parse_assignment(line: &str) -> Option<Assignment<'_>> {
    let caps = SIMPLE_ASSIGNMENT.captures(line)?;
    Some(Assignment {
        lhs: caps.get(1)?.as_str(),
        rhs: caps.get(2)?.as_str(),
    })
}

fn mentions(text: &str, ident: &str) -> bool {
    Regex::new(&format!(r"\b{}\b", regex::escape(ident)))
        .map(|re| re.is_match(text))
        .unwrap_or(true)
}

/// Independence here only looks at variable names; side effects hidden in
/// the right-hand sides are not considered.
fn independent(a: &Assignment<'_>, b: &Assignment<'_>) -> bool {
    a.lhs != b.lhs && !mentions(a.rhs, b.lhs) && !mentions(b.rhs, a.lhs)
}

fn find_swap(lines: &[&str]) -> Option<usize> {
    lines.windows(2).position(|pair| {
        if leading_whitespace(pair[0]) != leading_whitespace(pair[1]) {
            return false;
        }
        match (parse_assignment(pair[0]), parse_assignment(pair[1])) {
            (Some(a), Some(b)) => independent(&a, &b),
            _ => false,
        }
    })
}

pub(super) fn can_transform(code: &str) -> bool {
    code.lines().filter(|l| parse_assignment(l).is_some()).count() >= 2
}

pub(super) fn transform(code: &str) -> Result<Transformed, TransformError> {
    let lines: Vec<&str> = code.lines().collect();
    let Some(i) = find_swap(&lines) else {
        return Err(TransformError::NotApplicable("no safe reorder found".into()));
    };

    let mut out: Vec<&str> = lines.clone();
    out.swap(i, i + 1);
    let mut code_out = out.join("\n");
    if code.ends_with('\n') {
        code_out.push('\n');
    }

    let mut details = BTreeMap::new();
    details.insert("swapped_lines".into(), format!("{}-{}", i + 1, i + 2));
    Ok(Transformed {
        code: code_out,
        details,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swaps_independent_assignments() {
        let t = transform("a = 1\nb = 2\nprint(a + b)\n").unwrap();
        assert_eq!(t.code, "b = 2\na = 1\nprint(a + b)\n");
        assert_eq!(t.details["swapped_lines"], "1-2");
    }

    #[test]
    fn refuses_dependent_pair() {
        let err = transform("a = 1\nb = a + 1\n").unwrap_err();
        assert_eq!(
            err,
            TransformError::NotApplicable("no safe reorder found".into())
        );
    }

    #[test]
    fn refuses_anti_dependency() {
        assert!(transform("a = b\nb = 2\n").is_err());
    }

    #[test]
    fn skips_to_later_independent_pair() {
        let t = transform("a = 1\nb = a\nc = 3\n").unwrap();
        assert_eq!(t.code, "a = 1\nc = 3\nb = a\n");
    }

    #[test]
    fn comparisons_are_not_assignments() {
        assert!(!can_transform("a == 1\nb == 2\n"));
    }
}
