//! Parsers for the textual output of `xcodebuild`.
//!
//! `xcodebuild -list` and `xcodebuild -showBuildSettings` print grouped,
//! indented free-form text rather than a machine-readable format. This
//! crate turns that text into [`ProjectInfo`] and [`SettingsTable`].
//!
//! Line classification lives in [`classify`] as pure predicates so that
//! format drift between Xcode releases stays contained there.

pub mod classify;
mod error;
mod info;
mod settings;

pub use error::ParseError;
pub use info::{parse_project_info, ProjectInfo, GROUP_CONFIGURATIONS, GROUP_SCHEMES, GROUP_TARGETS};
pub use settings::{parse_settings, SettingsRecord, SettingsTable, TargetSettings, DEFAULT_TARGET};

/// Check raw tool output for the two fatal signals shared by every query:
/// an explicit `xcodebuild: error:` line, or no output at all.
pub fn check_output(output: &str) -> Result<(), ParseError> {
    if let Some(message) = output.lines().find_map(classify::tool_error_message) {
        return Err(ParseError::ToolError(message.to_string()));
    }
    if output.trim().is_empty() {
        return Err(ParseError::EmptyOutput);
    }
    Ok(())
}
