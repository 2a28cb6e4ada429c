//! Artifact location
//!
//! Finds the application target in a settings table and derives where the
//! built app, its dSYM, and the output archives live.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use xcode_settings::{SettingsTable, TargetSettings};

pub const WRAPPER_EXTENSION: &str = "WRAPPER_EXTENSION";
pub const WRAPPER_NAME: &str = "WRAPPER_NAME";
pub const WRAPPER_SUFFIX: &str = "WRAPPER_SUFFIX";
pub const BUILT_PRODUCTS_DIR: &str = "BUILT_PRODUCTS_DIR";

/// `WRAPPER_EXTENSION` of an application bundle.
pub const APP_EXTENSION: &str = "app";
/// Output archive extension.
pub const IPA_EXTENSION: &str = "ipa";

/// Artifact errors
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("App settings could not be found")]
    AppTargetNotFound,

    #[error("target {target:?} has no {key} setting")]
    MissingSetting { target: String, key: &'static str },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// First target, in table order, whose product is an `.app` bundle.
pub fn find_app_target(table: &SettingsTable) -> Result<&TargetSettings, ArtifactError> {
    table
        .iter()
        .find(|t| t.get(WRAPPER_EXTENSION) == Some(APP_EXTENSION))
        .ok_or(ArtifactError::AppTargetNotFound)
}

fn require<'a>(target: &'a TargetSettings, key: &'static str) -> Result<&'a str, ArtifactError> {
    target
        .get(key)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ArtifactError::MissingSetting {
            target: target.name.clone(),
            key,
        })
}

/// `WRAPPER_NAME` without `WRAPPER_SUFFIX`, plus `.ipa`.
///
/// Without a `WRAPPER_SUFFIX` setting the suffix is `.<WRAPPER_EXTENSION>`.
pub fn ipa_name(target: &TargetSettings) -> Result<String, ArtifactError> {
    let wrapper = require(target, WRAPPER_NAME)?;
    let suffix = match target.get(WRAPPER_SUFFIX) {
        Some(suffix) => suffix.to_string(),
        None => format!(".{}", target.get(WRAPPER_EXTENSION).unwrap_or(APP_EXTENSION)),
    };
    let stem = wrapper.strip_suffix(suffix.as_str()).unwrap_or(wrapper);
    Ok(format!("{}.{}", stem, IPA_EXTENSION))
}

/// Append `.ipa` to a user-supplied archive name unless already present.
pub fn normalize_ipa_name(name: &str) -> String {
    let has_extension = Path::new(name)
        .extension()
        .map_or(false, |e| e.eq_ignore_ascii_case(IPA_EXTENSION));
    if has_extension {
        name.to_string()
    } else {
        format!("{}.{}", name, IPA_EXTENSION)
    }
}

/// Concrete paths for one build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactPaths {
    pub target: String,
    pub wrapper_name: String,
    /// `BUILT_PRODUCTS_DIR/WRAPPER_NAME`
    pub app: PathBuf,
    /// `<app>.dSYM`
    pub dsym: PathBuf,
    /// `<destination>/<ipa name>`
    pub ipa: PathBuf,
    /// `<destination>/<WRAPPER_NAME>.dSYM.zip`
    pub dsym_archive: PathBuf,
}

impl ArtifactPaths {
    /// Derive every path from the app target's settings.
    ///
    /// Creates `destination` if needed; output paths are absolute.
    pub fn derive(
        target: &TargetSettings,
        destination: &Path,
        ipa_override: Option<&str>,
    ) -> Result<Self, ArtifactError> {
        let products = require(target, BUILT_PRODUCTS_DIR)?;
        let wrapper_name = require(target, WRAPPER_NAME)?.to_string();

        let app = Path::new(products).join(&wrapper_name);
        let mut dsym = app.clone().into_os_string();
        dsym.push(".dSYM");

        let ipa_file = match ipa_override {
            Some(name) => normalize_ipa_name(name),
            None => ipa_name(target)?,
        };

        let destination = prepare_destination(destination)?;

        Ok(Self {
            target: target.name.clone(),
            ipa: destination.join(ipa_file),
            dsym_archive: destination.join(format!("{}.dSYM.zip", wrapper_name)),
            wrapper_name,
            app,
            dsym: PathBuf::from(dsym),
        })
    }
}

fn prepare_destination(destination: &Path) -> Result<PathBuf, ArtifactError> {
    let io_err = |source| ArtifactError::Io {
        path: destination.to_path_buf(),
        source,
    };
    fs::create_dir_all(destination).map_err(io_err)?;
    destination.canonicalize().map_err(io_err)
}

/// Size and SHA-256 of a finished artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDigest {
    pub size: u64,
    pub sha256: String,
}

impl FileDigest {
    pub fn of(path: &Path) -> Result<Self, ArtifactError> {
        let io_err = |source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut file = File::open(path).map_err(io_err)?;
        let mut hasher = Sha256::new();
        let size = io::copy(&mut file, &mut hasher).map_err(io_err)?;
        Ok(Self {
            size,
            sha256: hex::encode(hasher.finalize()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use xcode_settings::{parse_settings, SettingsRecord};

    fn target(name: &str, pairs: &[(&str, &str)]) -> (String, SettingsRecord) {
        let record = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        (name.to_string(), record)
    }

    fn three_targets() -> SettingsTable {
        vec![
            target("Core", &[(WRAPPER_EXTENSION, "framework"), (WRAPPER_NAME, "Core.framework")]),
            target(
                "MyApp",
                &[
                    (BUILT_PRODUCTS_DIR, "/tmp/Products/Release-iphoneos"),
                    (WRAPPER_NAME, "MyApp.app"),
                    (WRAPPER_SUFFIX, ".app"),
                    (WRAPPER_EXTENSION, "app"),
                ],
            ),
            target("MyAppTests", &[(WRAPPER_EXTENSION, "xctest")]),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_picks_app_among_three() {
        let table = three_targets();
        let app = find_app_target(&table).unwrap();
        assert_eq!(app.name, "MyApp");
        assert_eq!(ipa_name(app).unwrap(), "MyApp.ipa");
    }

    #[test]
    fn test_first_app_target_wins() {
        let table: SettingsTable = vec![
            target("A", &[(WRAPPER_EXTENSION, "app")]),
            target("B", &[(WRAPPER_EXTENSION, "app")]),
        ]
        .into_iter()
        .collect();
        assert_eq!(find_app_target(&table).unwrap().name, "A");
    }

    #[test]
    fn test_no_app_target() {
        let table: SettingsTable = vec![target("Lib", &[(WRAPPER_EXTENSION, "a")])]
            .into_iter()
            .collect();
        assert!(matches!(
            find_app_target(&table),
            Err(ArtifactError::AppTargetNotFound)
        ));
    }

    #[test]
    fn test_derive_paths() {
        let dest = TempDir::new().unwrap();
        let table = three_targets();
        let app = find_app_target(&table).unwrap();

        let paths = ArtifactPaths::derive(app, dest.path(), None).unwrap();
        let dest = dest.path().canonicalize().unwrap();

        assert_eq!(paths.app, PathBuf::from("/tmp/Products/Release-iphoneos/MyApp.app"));
        assert_eq!(paths.dsym, PathBuf::from("/tmp/Products/Release-iphoneos/MyApp.app.dSYM"));
        assert_eq!(paths.ipa, dest.join("MyApp.ipa"));
        assert_eq!(paths.dsym_archive, dest.join("MyApp.app.dSYM.zip"));
        assert!(paths.ipa.is_absolute());
    }

    #[test]
    fn test_derive_creates_destination_and_honors_override() {
        let root = TempDir::new().unwrap();
        let dest = root.path().join("out/nested");
        let table = three_targets();
        let app = find_app_target(&table).unwrap();

        let paths = ArtifactPaths::derive(app, &dest, Some("Beta")).unwrap();
        assert!(dest.is_dir());
        assert_eq!(paths.ipa.file_name().unwrap(), "Beta.ipa");
    }

    #[test]
    fn test_missing_setting_named() {
        let table: SettingsTable = vec![target("App", &[(WRAPPER_EXTENSION, "app")])]
            .into_iter()
            .collect();
        let dest = TempDir::new().unwrap();
        let err = ArtifactPaths::derive(find_app_target(&table).unwrap(), dest.path(), None)
            .unwrap_err();
        assert!(matches!(
            err,
            ArtifactError::MissingSetting { key: BUILT_PRODUCTS_DIR, .. }
        ));
    }

    #[test]
    fn test_ipa_name_without_suffix_setting() {
        let table = parse_settings(
            "Build settings for action build and target \"My App\":\n    WRAPPER_NAME = My App.app\n    WRAPPER_EXTENSION = app\n",
        )
        .unwrap();
        assert_eq!(ipa_name(find_app_target(&table).unwrap()).unwrap(), "My App.ipa");
    }

    #[test]
    fn test_normalize_ipa_name() {
        assert_eq!(normalize_ipa_name("App"), "App.ipa");
        assert_eq!(normalize_ipa_name("App.ipa"), "App.ipa");
        assert_eq!(normalize_ipa_name("App.IPA"), "App.IPA");
        assert_eq!(normalize_ipa_name("App.v2"), "App.v2.ipa");
    }

    #[test]
    fn test_file_digest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.bin");
        fs::write(&path, b"abc").unwrap();

        let digest = FileDigest::of(&path).unwrap();
        assert_eq!(digest.size, 3);
        assert_eq!(
            digest.sha256,
            "ba7816bf8f01cfea414140de5dbae2223b00361a96177a9cb410ff61f20015ad"
        );
    }
}
