//! Helpers for sanitizing data before it enters tracing span attributes.
//!
//! Submitted text is user mail and upload paths reveal the storage layout.
//! Neither goes into spans verbatim.

use std::path::Path;

/// Maximum number of characters kept by [`preview`].
pub const PREVIEW_CHARS: usize = 32;

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Returns a short, single-line prefix of `text` for log correlation.
///
/// Truncates on a char boundary and appends `…` when anything was cut.
pub fn preview(text: &str) -> String {
    let single_line: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let trimmed = single_line.trim();

    let mut out: String = trimmed.chars().take(PREVIEW_CHARS).collect();
    if trimmed.chars().count() > PREVIEW_CHARS {
        out.push('…');
    }
    out
}

/// Truncates an error body from a remote provider so it cannot flood logs.
pub fn truncate_body(body: &str, max_len: usize) -> String {
    if body.chars().count() > max_len {
        let head: String = body.chars().take(max_len).collect();
        format!("{}... (truncated)", head)
    } else {
        body.to_string()
    }
}
