//! Build configuration
//!
//! Three layers, merged in order:
//! 1. Built-in defaults
//! 2. Repository config (`.ipa.toml`, or the file named by `--config`)
//! 3. Command-line flags
//!
//! The merged value deserializes into [`BuildOptions`] and is validated once.

mod defaults;
mod merge;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::xcodebuild::ProjectLocation;

pub use defaults::BuiltinDefaults;
pub use merge::{deep_merge, merge_layers};

/// Repository config file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".ipa.toml";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("{0} and {1} are mutually exclusive")]
    Conflict(&'static str, &'static str),
}

/// Fully merged build options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildOptions {
    #[serde(default)]
    pub workspace: Option<PathBuf>,
    #[serde(default)]
    pub project: Option<PathBuf>,
    #[serde(default)]
    pub scheme: Option<String>,
    #[serde(default)]
    pub configuration: Option<String>,
    pub sdk: String,
    pub destination: PathBuf,
    /// Output archive name override
    #[serde(default)]
    pub ipa: Option<String>,
    /// Provisioning profile embedded instead of the dSYM
    #[serde(default)]
    pub embed: Option<PathBuf>,
    /// Signing identity
    #[serde(default)]
    pub identity: Option<String>,
    #[serde(default)]
    pub xcconfig: Option<PathBuf>,
    /// Extra raw arguments for xcodebuild
    #[serde(default)]
    pub xcargs: Option<String>,
    pub clean: bool,
    pub archive: bool,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub quiet: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        let defaults = BuiltinDefaults::default();
        Self {
            workspace: None,
            project: None,
            scheme: None,
            configuration: None,
            sdk: defaults.sdk,
            destination: PathBuf::from(defaults.destination),
            ipa: None,
            embed: None,
            identity: None,
            xcconfig: None,
            xcargs: None,
            clean: defaults.clean,
            archive: defaults.archive,
            verbose: false,
            quiet: false,
        }
    }
}

impl BuildOptions {
    /// Merge the layers and validate the result.
    ///
    /// With `config_path` the file must exist; otherwise `.ipa.toml` in
    /// `working_dir` is read when present.
    pub fn load(
        working_dir: &Path,
        config_path: Option<&Path>,
        overrides: &BuildOverrides,
    ) -> Result<Self, ConfigError> {
        let mut layers = vec![BuiltinDefaults::default().to_value()];

        match config_path {
            Some(path) => layers.push(load_toml_file(path)?),
            None => {
                let path = working_dir.join(CONFIG_FILE_NAME);
                if path.is_file() {
                    layers.push(load_toml_file(&path)?);
                }
            }
        }

        layers.push(overrides.to_value());
        Self::from_value(merge_layers(layers))
    }

    /// Deserialize a merged value and validate it.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        let options: BuildOptions =
            serde_json::from_value(value).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workspace.is_some() && self.project.is_some() {
            return Err(ConfigError::Conflict("workspace", "project"));
        }
        if self.verbose && self.quiet {
            return Err(ConfigError::Conflict("verbose", "quiet"));
        }
        if self.sdk.trim().is_empty() {
            return Err(ConfigError::Invalid("sdk must not be empty".to_string()));
        }
        if let Some(ref ipa) = self.ipa {
            if ipa.trim().is_empty() || ipa.contains('/') {
                return Err(ConfigError::Invalid(format!(
                    "ipa name must be a plain file name, got {:?}",
                    ipa
                )));
            }
        }
        Ok(())
    }

    /// The explicitly configured workspace or project, if any.
    pub fn location(&self) -> Option<ProjectLocation> {
        self.workspace
            .clone()
            .map(ProjectLocation::Workspace)
            .or_else(|| self.project.clone().map(ProjectLocation::Project))
    }
}

/// Command-line layer. Unset fields leave lower layers untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdk: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipa: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xcconfig: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xcargs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clean: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbose: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiet: Option<bool>,
}

impl BuildOverrides {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Default::default()))
    }
}

/// Read a TOML file as a JSON value for merging.
fn load_toml_file(path: &Path) -> Result<Value, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: toml::Value = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    log::debug!("loaded config from {}", path.display());
    Ok(toml_to_json(value))
}

fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => {
            Value::Object(table.into_iter().map(|(k, v)| (k, toml_to_json(v))).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_only() {
        let dir = TempDir::new().unwrap();
        let options = BuildOptions::load(dir.path(), None, &BuildOverrides::default()).unwrap();
        assert_eq!(options, BuildOptions::default());
        assert!(options.location().is_none());
    }

    #[test]
    fn test_repo_file_then_cli() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "scheme = \"App\"\ndestination = \"build\"\narchive = false\n",
        )
        .unwrap();

        let overrides = BuildOverrides {
            destination: Some(PathBuf::from("out")),
            ..Default::default()
        };
        let options = BuildOptions::load(dir.path(), None, &overrides).unwrap();

        assert_eq!(options.scheme.as_deref(), Some("App"));
        assert_eq!(options.destination, PathBuf::from("out"));
        assert!(!options.archive);
        assert!(options.clean);
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = BuildOptions::load(dir.path(), Some(&missing), &BuildOverrides::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_bad_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "scheme = ").unwrap();
        let err = BuildOptions::load(dir.path(), Some(&path), &BuildOverrides::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let mut value = BuiltinDefaults::default().to_value();
        value["schem"] = json!("typo");
        assert!(matches!(
            BuildOptions::from_value(value),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_workspace_and_project_conflict() {
        let value = deep_merge(
            BuiltinDefaults::default().to_value(),
            json!({"workspace": "A.xcworkspace", "project": "A.xcodeproj"}),
        );
        assert!(matches!(
            BuildOptions::from_value(value),
            Err(ConfigError::Conflict("workspace", "project"))
        ));
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        let overrides = BuildOverrides {
            verbose: Some(true),
            quiet: Some(true),
            ..Default::default()
        };
        let value = deep_merge(BuiltinDefaults::default().to_value(), overrides.to_value());
        assert!(matches!(
            BuildOptions::from_value(value),
            Err(ConfigError::Conflict("verbose", "quiet"))
        ));
    }

    #[test]
    fn test_ipa_name_must_be_plain() {
        let options = BuildOptions {
            ipa: Some("out/App.ipa".to_string()),
            ..Default::default()
        };
        assert!(matches!(options.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_location_prefers_configured_kind() {
        let options = BuildOptions {
            project: Some(PathBuf::from("App.xcodeproj")),
            ..Default::default()
        };
        assert_eq!(
            options.location(),
            Some(ProjectLocation::Project(PathBuf::from("App.xcodeproj")))
        );
    }

    #[test]
    fn test_overrides_skip_unset_fields() {
        let overrides = BuildOverrides {
            clean: Some(false),
            ..Default::default()
        };
        assert_eq!(overrides.to_value(), json!({"clean": false}));
    }
}
