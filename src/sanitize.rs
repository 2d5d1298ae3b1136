use once_cell::sync::Lazy;
use regex::Regex;

use crate::article::UNTITLED;

const MAX_LEN: usize = 200;

static ILLEGAL_CHARS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[<>:"/\\|?*]"#).unwrap());

fn trim_name(name: &str) -> &str {
    name.trim_matches(|c| c == ' ' || c == '.')
}

/// Turns an article title into a directory name usable on any platform.
///
/// Characters illegal on Windows become `_`, surrounding spaces and dots
/// are removed and the result is cut to 200 characters. Applying it
/// twice gives the same name.
pub fn sanitize_filename(title: &str) -> String {

    let replaced = ILLEGAL_CHARS_RE.replace_all(title, "_");
    let trimmed = trim_name(&replaced);

    let truncated: String = trimmed.chars().take(MAX_LEN).collect();
    let name = trim_name(&truncated);

    if name.is_empty() {
        UNTITLED.to_string()
    } else {
        name.to_string()
    }
}
