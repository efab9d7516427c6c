use std::collections::BTreeMap;

use crate::errors::TransformError;

use super::language::{detect_language, Language};
use super::{first_substantive_index, leading_whitespace, Transformed};

fn no_op_for(lang: Language) -> &'static str {
    match lang {
        Language::Python => "pass",
        Language::Go => "_ = 0",
        Language::JavaScript => "void 0;",
        _ => ":",
    }
}

pub(super) fn can_transform(code: &str) -> bool {
    let lines: Vec<&str> = code.lines().collect();
    first_substantive_index(&lines).is_some()
}

pub(super) fn transform(code: &str) -> Result<Transformed, TransformError> {
    let lines: Vec<&str> = code.lines().collect();
    let Some(idx) = first_substantive_index(&lines) else {
        return Err(TransformError::NotApplicable("no substantive line".into()));
    };

    let lang = detect_language(code);
    let stmt = no_op_for(lang);

    // A block opener takes the indentation of its body.
    let anchor = lines[idx];
    let indent = if anchor.trim_end().ends_with(':') || anchor.trim_end().ends_with('{') {
        lines
            .get(idx + 1)
            .map(|l| leading_whitespace(l))
            .unwrap_or_else(|| leading_whitespace(anchor))
    } else {
        leading_whitespace(anchor)
    };

    let mut out: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
    out.insert(idx + 1, format!("{indent}{stmt}"));
    let mut code_out = out.join("\n");
    if code.ends_with('\n') {
        code_out.push('\n');
    }

    let mut details = BTreeMap::new();
    details.insert("statement".into(), stmt.to_string());
    details.insert("after_line".into(), (idx + 1).to_string());
    details.insert("style".into(), lang.as_str().to_string());
    Ok(Transformed {
        code: code_out,
        details,
    })
}
