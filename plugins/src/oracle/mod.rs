mod command;
mod http;

pub use command::CommandOracle;
pub use http::HttpOracle;

/// First `max` characters of `s`, for error messages.
pub(crate) fn snippet(s: &str, max: usize) -> String {
    let trimmed = s.trim();
    match trimmed.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
