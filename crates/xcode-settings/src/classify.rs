//! Line classifiers for xcodebuild text output.
//!
//! Each function looks at a single line and answers one question about it.
//! They hold no state; the parsers in this crate combine them.

use std::sync::OnceLock;

use regex_lite::Regex;

const TOOL_ERROR_PREFIX: &str = "xcodebuild: error: ";

fn target_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Bare names end before an optional trailing colon; quoted names may
    // contain spaces.
    RE.get_or_init(|| {
        Regex::new(r#"^\s*Build settings for action \S+ and target (?:"([^"]+)"|(.+?)):?\s*$"#)
            .expect("target header pattern is valid")
    })
}

/// Message of an `xcodebuild: error: <message>` line.
pub fn tool_error_message(line: &str) -> Option<&str> {
    let message = line.trim_end().strip_prefix(TOOL_ERROR_PREFIX)?.trim();
    if message.is_empty() {
        None
    } else {
        Some(message)
    }
}

/// The quoted substring of a `Information about project "Name":` line.
pub fn quoted_name(line: &str) -> Option<&str> {
    let start = line.find('"')? + 1;
    let end = line.rfind("\":")?;
    if end > start {
        Some(&line[start..end])
    } else {
        None
    }
}

/// Project or workspace name of an `Information about project "Name":` line.
pub fn project_title(line: &str) -> Option<&str> {
    if !line.trim_start().starts_with("Information about ") {
        return None;
    }
    quoted_name(line)
}

/// Normalized group name if `line` is a group header (`    Build Configurations:`).
///
/// The name is lowercased with whitespace runs collapsed to `_`, so
/// `Build Configurations:` becomes `build_configurations`.
pub fn group_header(line: &str) -> Option<String> {
    let body = line.trim().strip_suffix(':')?.trim();
    if body.is_empty() {
        return None;
    }
    let name = body
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_");
    Some(name)
}

/// Free-form sentences such as `If no build configuration is specified ... is used.`
pub fn is_prose(line: &str) -> bool {
    line.trim_end().ends_with('.')
}

/// Whether the line starts with indentation.
pub fn is_indented(line: &str) -> bool {
    line.starts_with([' ', '\t'])
}

/// Member value of an indented group line; `None` for blank lines and prose.
pub fn group_member(line: &str) -> Option<&str> {
    if !is_indented(line) || is_prose(line) {
        return None;
    }
    let value = line.trim();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Target name of a `Build settings for action build and target <NAME>:` line.
pub fn target_header(line: &str) -> Option<&str> {
    let caps = target_header_re().captures(line)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().trim())
        .filter(|name| !name.is_empty())
}

/// `KEY = VALUE` split on the first `=`, both sides trimmed.
pub fn key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, value.trim()))
}
