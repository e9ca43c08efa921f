//! Output path templating.

use regex_lite::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;

use super::types::Metadata;

const UNKNOWN: &str = "Unknown";

fn placeholder_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([a-z_]+)\}").ok()).as_ref()
}

/// Makes a string safe to use as a single path component.
pub fn sanitize_component(value: &str) -> String {
    let replaced: String = value
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = replaced.trim().trim_matches('.').trim();
    if trimmed.is_empty() {
        UNKNOWN.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Renders a `/`-separated pattern such as `{artist}/{album}/{track} - {title}`.
///
/// Placeholders with no known value render as `Unknown`. Each rendered
/// segment is sanitised on its own, so metadata can never add directories.
pub fn format_path(meta: &Metadata, pattern: &str) -> PathBuf {
    pattern
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| match placeholder_regex() {
            Some(re) => {
                let rendered = re.replace_all(segment, |caps: &regex_lite::Captures<'_>| {
                    meta.field(&caps[1]).unwrap_or(UNKNOWN).replace(['/', '\\'], "_")
                });
                sanitize_component(&rendered)
            }
            None => sanitize_component(segment),
        })
        .collect()
}
