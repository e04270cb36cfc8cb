//! Best-effort string `format` checks.

use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

/// Returns a violation message, or `None` when the value passes (or the
/// format name is unknown; unknown formats constrain nothing).
pub(crate) fn check_format(format_name: &str, text: &str) -> Option<String> {
    match format_name {
        "email" => {
            if EMAIL.is_match(text) {
                None
            } else {
                Some("expected an email address".to_string())
            }
        }
        "regex" => match Regex::new(text) {
            Ok(_) => None,
            Err(_) => Some("expected a valid regular expression".to_string()),
        },
        "uri" | "url" => {
            // Scheme-prefix check only; full URL parsing belongs to callers
            // that actually dereference the value.
            if text.contains("://") || text.starts_with("mailto:") {
                None
            } else {
                Some("expected a URI".to_string())
            }
        }
        _ => None,
    }
}
