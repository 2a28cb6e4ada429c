//! Archive inspection
//!
//! Decodes the provisioning profile embedded in an `.ipa`.

use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::archive::{self, ArchiveError};
use crate::artifact::IPA_EXTENSION;
use crate::exec::{ExecError, Invocation, OutputMode, ToolRunner};

const PROFILE_NAME: &str = "embedded.mobileprovision";

/// Inspection errors
#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    #[error("{} is not an .ipa file", .0.display())]
    NotAnIpa(PathBuf),

    #[error("{} not found in archive", .0)]
    MissingProfile(String),

    #[error("failed to create temporary file: {0}")]
    Temp(#[source] std::io::Error),

    #[error("`{command}` failed with {summary}")]
    Decode { command: String, summary: String },

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Entry name of the provisioning profile.
///
/// `Payload/<stem>.app/embedded.mobileprovision` is preferred; otherwise the
/// first `Payload/*.app/embedded.mobileprovision` in archive order.
pub fn find_provisioning_entry<'a>(names: &'a [String], stem: &str) -> Result<&'a str, InspectError> {
    let expected = format!("Payload/{}.app/{}", stem, PROFILE_NAME);
    if let Some(name) = names.iter().find(|n| **n == expected) {
        return Ok(name.as_str());
    }

    names
        .iter()
        .map(String::as_str)
        .find(|name| is_app_profile(name))
        .ok_or(InspectError::MissingProfile(expected))
}

/// `Payload/<anything>.app/embedded.mobileprovision`
fn is_app_profile(name: &str) -> bool {
    let Some(rest) = name.strip_prefix("Payload/") else {
        return false;
    };
    let Some(bundle) = rest.strip_suffix(&format!("/{}", PROFILE_NAME)) else {
        return false;
    };
    bundle.ends_with(".app") && !bundle.contains('/')
}

/// Decoded (plist) provisioning profile of `ipa`.
pub fn show_provisioning(runner: &dyn ToolRunner, ipa: &Path) -> Result<String, InspectError> {
    let is_ipa = ipa
        .extension()
        .map_or(false, |e| e.eq_ignore_ascii_case(IPA_EXTENSION));
    let stem = match ipa.file_stem() {
        Some(stem) if is_ipa => stem.to_string_lossy().into_owned(),
        _ => return Err(InspectError::NotAnIpa(ipa.to_path_buf())),
    };

    let names = archive::entry_names(ipa)?;
    let entry = find_provisioning_entry(&names, &stem)?;
    log::debug!("decoding {}", entry);

    let temp = NamedTempFile::new().map_err(InspectError::Temp)?;
    archive::extract_entry(ipa, entry, temp.path())?;

    let invocation = Invocation::new("security")
        .args(["cms", "-D", "-i"])
        .arg(temp.path().display().to_string());
    let output = runner.run(&invocation, OutputMode::Capture)?;
    if !output.success() {
        return Err(InspectError::Decode {
            command: invocation.to_string(),
            summary: output.failure_summary(),
        });
    }
    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::mock::{Matcher, ScriptedRunner};
    use crate::exec::ToolOutput;
    use std::fs;
    use tempfile::TempDir;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_prefers_matching_stem() {
        let list = names(&[
            "Payload/Other.app/embedded.mobileprovision",
            "Payload/App.app/embedded.mobileprovision",
        ]);
        assert_eq!(
            find_provisioning_entry(&list, "App").unwrap(),
            "Payload/App.app/embedded.mobileprovision"
        );
    }

    #[test]
    fn test_falls_back_to_any_app() {
        let list = names(&[
            "Payload/",
            "Payload/App.app/Plugins/Ext.appex/embedded.mobileprovision",
            "Payload/Renamed.app/embedded.mobileprovision",
        ]);
        assert_eq!(
            find_provisioning_entry(&list, "App-1.2").unwrap(),
            "Payload/Renamed.app/embedded.mobileprovision"
        );
    }

    #[test]
    fn test_missing_profile_names_expected_path() {
        let err = find_provisioning_entry(&names(&["Payload/App.app/App"]), "App").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Payload/App.app/embedded.mobileprovision not found in archive"
        );
    }

    #[test]
    fn test_rejects_non_ipa() {
        let runner = ScriptedRunner::new();
        let err = show_provisioning(&runner, Path::new("App.zip")).unwrap_err();
        assert!(matches!(err, InspectError::NotAnIpa(_)));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_show_decodes_extracted_profile() {
        let tmp = TempDir::new().unwrap();
        let app = tmp.path().join("Payload/App.app");
        fs::create_dir_all(&app).unwrap();
        fs::write(app.join(PROFILE_NAME), b"signed-blob").unwrap();
        let ipa = tmp.path().join("App.ipa");
        archive::zip_dir(&tmp.path().join("Payload"), &ipa).unwrap();

        let runner = ScriptedRunner::new().on(Matcher::program("security").arg("cms"), |inv| {
            let path = inv.value_of("-i").unwrap();
            assert_eq!(fs::read(path).unwrap(), b"signed-blob");
            ToolOutput::ok("<plist><dict/></plist>\n")
        });

        let plist = show_provisioning(&runner, &ipa).unwrap();
        assert_eq!(plist, "<plist><dict/></plist>\n");
    }

    #[test]
    fn test_decode_failure() {
        let tmp = TempDir::new().unwrap();
        let app = tmp.path().join("Payload/App.app");
        fs::create_dir_all(&app).unwrap();
        fs::write(app.join(PROFILE_NAME), b"x").unwrap();
        let ipa = tmp.path().join("App.ipa");
        archive::zip_dir(&tmp.path().join("Payload"), &ipa).unwrap();

        let runner = ScriptedRunner::new().on(Matcher::program("security"), |_| {
            ToolOutput::failed(1, "security: failed to decode message")
        });
        assert!(matches!(
            show_provisioning(&runner, &ipa),
            Err(InspectError::Decode { .. })
        ));
    }
}
