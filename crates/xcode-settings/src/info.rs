//! `xcodebuild -list` output.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::{check_output, classify, ParseError};

/// Group holding scheme names.
pub const GROUP_SCHEMES: &str = "schemes";
/// Group holding target names.
pub const GROUP_TARGETS: &str = "targets";
/// Group holding build configuration names.
pub const GROUP_CONFIGURATIONS: &str = "build_configurations";

/// Schemes, configurations and targets listed for a project or workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectInfo {
    name: Option<String>,
    groups: BTreeMap<String, Vec<String>>,
}

impl ProjectInfo {
    /// Project or workspace display name, when the output carried one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Members of a named group, in output order.
    pub fn group(&self, name: &str) -> &[String] {
        self.groups.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn schemes(&self) -> &[String] {
        self.group(GROUP_SCHEMES)
    }

    pub fn configurations(&self) -> &[String] {
        self.group(GROUP_CONFIGURATIONS)
    }

    pub fn targets(&self) -> &[String] {
        self.group(GROUP_TARGETS)
    }

    pub fn has_scheme(&self, scheme: &str) -> bool {
        self.schemes().iter().any(|s| s == scheme)
    }

    pub fn has_configuration(&self, configuration: &str) -> bool {
        self.configurations().iter().any(|c| c == configuration)
    }

    /// All group names present in the output.
    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }
}

/// Where the line scanner is within the listing.
enum ListState {
    /// Nothing but blank lines seen so far.
    Start,
    /// Past the title, outside any group.
    NoGroup,
    /// Collecting members for the named group.
    InGroup(String),
}

/// Parse the output of `xcodebuild -list`.
///
/// ```text
/// Information about project "MyApp":
///     Targets:
///         MyApp
///
///     Build Configurations:
///         Debug
///         Release
///
///     If no build configuration is specified and -scheme is not passed then "Release" is used.
///
///     Schemes:
///         MyApp
/// ```
pub fn parse_project_info(output: &str) -> Result<ProjectInfo, ParseError> {
    check_output(output)?;

    let mut info = ProjectInfo::default();
    let mut state = ListState::Start;

    for line in output.lines() {
        if let Some(title) = classify::project_title(line) {
            info.name.get_or_insert_with(|| title.to_string());
            state = ListState::NoGroup;
            continue;
        }

        state = match state {
            ListState::Start if line.trim().is_empty() => ListState::Start,
            ListState::Start if classify::quoted_name(line).is_some() => {
                info.name = classify::quoted_name(line).map(str::to_string);
                ListState::NoGroup
            }
            current => match classify::group_header(line) {
                Some(group) => {
                    info.groups.entry(group.clone()).or_default();
                    ListState::InGroup(group)
                }
                None => {
                    if let ListState::InGroup(group) = &current {
                        if let Some(member) = classify::group_member(line) {
                            info.groups
                                .entry(group.clone())
                                .or_default()
                                .push(member.to_string());
                        }
                    }
                    current
                }
            },
        };
    }

    for members in info.groups.values_mut() {
        dedup_preserving_order(members);
    }

    log::debug!(
        "parsed project info for {:?}: {} scheme(s), {} configuration(s)",
        info.name,
        info.schemes().len(),
        info.configurations().len()
    );

    Ok(info)
}

fn dedup_preserving_order(values: &mut Vec<String>) {
    let mut seen = HashSet::new();
    values.retain(|v| !v.is_empty() && seen.insert(v.clone()));
}
