//! `xcodebuild -showBuildSettings` output.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{check_output, classify, ParseError};

/// Target name used when the output carries no target headers at all.
///
/// Older Xcode releases printed a single unsectioned block of settings;
/// that block is treated as one implicit target under this name.
pub const DEFAULT_TARGET: &str = "(default)";

/// Flat key/value settings for one target.
pub type SettingsRecord = BTreeMap<String, String>;

/// Settings printed for a single target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetSettings {
    pub name: String,
    pub settings: SettingsRecord,
}

impl TargetSettings {
    /// Value for `key`, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }
}

/// Build settings keyed by target, in the order the tool printed them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SettingsTable {
    targets: Vec<TargetSettings>,
}

impl SettingsTable {
    pub fn get(&self, target: &str) -> Option<&TargetSettings> {
        self.targets.iter().find(|t| t.name == target)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetSettings> {
        self.targets.iter()
    }

    pub fn target_names(&self) -> impl Iterator<Item = &str> {
        self.targets.iter().map(|t| t.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Index of `name`, appending an empty record the first time it is seen.
    fn slot(&mut self, name: &str) -> usize {
        match self.targets.iter().position(|t| t.name == name) {
            Some(index) => index,
            None => {
                self.targets.push(TargetSettings {
                    name: name.to_string(),
                    settings: SettingsRecord::new(),
                });
                self.targets.len() - 1
            }
        }
    }
}

impl FromIterator<(String, SettingsRecord)> for SettingsTable {
    fn from_iter<I: IntoIterator<Item = (String, SettingsRecord)>>(iter: I) -> Self {
        let mut table = SettingsTable::default();
        for (name, settings) in iter {
            let index = table.slot(&name);
            table.targets[index].settings.extend(settings);
        }
        table
    }
}

/// Which record key/value lines currently land in.
enum ScanState {
    /// Before the first target header.
    Preamble,
    /// Inside the section for the target at this index.
    InTarget(usize),
}

/// Parse the output of `xcodebuild -showBuildSettings`.
///
/// Each `Build settings for action build and target <NAME>:` line opens a
/// section; `KEY = VALUE` lines fill the open section. Anything else is
/// ignored. Settings printed before the first header only survive when the
/// output has no headers at all, in which case they form [`DEFAULT_TARGET`].
pub fn parse_settings(output: &str) -> Result<SettingsTable, ParseError> {
    check_output(output)?;

    let mut table = SettingsTable::default();
    let mut preamble = SettingsRecord::new();
    let mut state = ScanState::Preamble;

    for line in output.lines() {
        if let Some(target) = classify::target_header(line) {
            state = ScanState::InTarget(table.slot(target));
            continue;
        }

        let Some((key, value)) = classify::key_value(line) else {
            continue;
        };

        let record = match state {
            ScanState::Preamble => &mut preamble,
            ScanState::InTarget(index) => &mut table.targets[index].settings,
        };
        record.insert(key.to_string(), value.to_string());
    }

    if table.is_empty() {
        if !preamble.is_empty() {
            table.targets.push(TargetSettings {
                name: DEFAULT_TARGET.to_string(),
                settings: preamble,
            });
        }
    } else if !preamble.is_empty() {
        log::debug!(
            "ignoring {} setting(s) printed before the first target header",
            preamble.len()
        );
    }

    Ok(table)
}
