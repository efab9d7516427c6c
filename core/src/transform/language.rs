use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Best-effort language tag. This is keyword sniffing, not a lexer; it only
/// gates triggers and picks comment/no-op syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Shell,
    Python,
    Go,
    JavaScript,
    Rust,
    Java,
    Unknown,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Shell => "shell",
            Language::Python => "python",
            Language::Go => "go",
            Language::JavaScript => "javascript",
            Language::Rust => "rust",
            Language::Java => "java",
            Language::Unknown => "unknown",
        }
    }

    /// `//` languages versus `#` languages.
    pub fn uses_slash_comments(&self) -> bool {
        matches!(
            self,
            Language::Go | Language::JavaScript | Language::Rust | Language::Java
        )
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

lazy_static! {
    static ref SHELL_MARKERS: Regex = Regex::new(
        r"(?m)^\s*(?:sudo\s+)?(?:echo|curl|wget|rm|cp|mv|mkdir|chmod|chown|export|cd|ls|cat|grep|sed|awk|apt|apt-get|yum|brew|pip|npm|git|docker|kubectl|source|tar|find|ssh|scp|nc|base64)(?:\s|$)|\$\("
    )
    .expect("shell marker regex");
    static ref PYTHON_MARKERS: Regex = Regex::new(
        r#"(?m)^\s*def\s+\w+\s*\(|^\s*import\s+[A-Za-z_][\w.]*(?:\s+as\s+\w+)?(?:\s*,\s*[\w.]+)*\s*$|^\s*from\s+[\w.]+\s+import\s|\bprint\(|^\s*elif\s|__name__|\bself\."#
    )
    .expect("python marker regex");
    static ref GO_MARKERS: Regex =
        Regex::new(r"(?m)^\s*package\s+\w+\s*$|^\s*func\s+[\w(]|:=|\bfmt\.")
            .expect("go marker regex");
    static ref JS_MARKERS: Regex = Regex::new(
        r#"(?m)\bfunction\s*\w*\s*\(|\bconsole\.|=>|\brequire\(|^\s*(?:const|var)\s+\w+|^\s*import\s.*\sfrom\s+['"]|\bdocument\."#
    )
    .expect("javascript marker regex");
    static ref RUST_MARKERS: Regex =
        Regex::new(r"(?m)\bfn\s+\w+|\blet\s+mut\s|println!|^\s*use\s+\w+::|^\s*impl\b|::new\(")
            .expect("rust marker regex");
    static ref JAVA_MARKERS: Regex = Regex::new(
        r"(?m)\bpublic\s+(?:final\s+)?class\b|\bpublic\s+static\s+void\b|\bSystem\.out\.|^\s*import\s+java\."
    )
    .expect("java marker regex");
}

fn shebang_language(first_line: &str) -> Option<Language> {
    let line = first_line.trim();
    if !line.starts_with("#!") {
        return None;
    }
    if line.contains("python") {
        Some(Language::Python)
    } else if line.contains("node") || line.contains("deno") {
        Some(Language::JavaScript)
    } else if line.contains("sh") {
        Some(Language::Shell)
    } else {
        None
    }
}

/// Ordered heuristic: shebang first, then shell, python, go, javascript,
/// rust, java keyword probes.
pub fn detect_language(code: &str) -> Language {
    if let Some(first) = code.lines().next() {
        if let Some(lang) = shebang_language(first) {
            return lang;
        }
    }

    let probes: [(&Regex, Language); 6] = [
        (&SHELL_MARKERS, Language::Shell),
        (&PYTHON_MARKERS, Language::Python),
        (&GO_MARKERS, Language::Go),
        (&JS_MARKERS, Language::JavaScript),
        (&RUST_MARKERS, Language::Rust),
        (&JAVA_MARKERS, Language::Java),
    ];
    probes
        .iter()
        .find(|(re, _)| re.is_match(code))
        .map(|(_, lang)| *lang)
        .unwrap_or(Language::Unknown)
}
