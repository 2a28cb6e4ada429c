//! Toolchain support files
//!
//! Apps that bundle Swift runtime dylibs or a WatchKit app need matching
//! files from the toolchain next to `Payload/` in the archive:
//!
//! - `SwiftSupport/libswift*.dylib` for every `libswift*` in `<app>/Frameworks`
//! - `WatchKitSupport/WK` when `<app>/Watch` holds a `.app`
//!
//! [`SupportPlan::scan`] looks at the app bundle alone, so an app that needs
//! nothing never touches the toolchain. Every planned copy is staged under
//! one temporary directory and the archive is only appended to once all of
//! them succeeded.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use globset::Glob;
use serde::Serialize;
use tempfile::TempDir;

use crate::archive::{self, ArchiveError};
use crate::toolchain::Toolchain;

const SWIFT_LIBRARY_PATTERN: &str = "libswift*";
const WATCHKIT_STUB_NAME: &str = "WK";

/// Errors for support-file injection
#[derive(Debug, thiserror::Error)]
pub enum SupportError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to copy {} to {}: {source}", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] globset::Error),
}

/// Kind of support files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SupportKind {
    Swift,
    WatchKit,
}

impl SupportKind {
    /// Top-level directory in the archive.
    pub fn dir_name(&self) -> &'static str {
        match self {
            SupportKind::Swift => "SwiftSupport",
            SupportKind::WatchKit => "WatchKitSupport",
        }
    }
}

impl fmt::Display for SupportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// A file copied out of the toolchain and into the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InjectedFile {
    pub kind: SupportKind,
    pub source: PathBuf,
    /// Archive entry name, e.g. `SwiftSupport/libswiftCore.dylib`
    pub entry: String,
}

/// What [`SupportInjector::inject`] added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InjectionReport {
    pub files: Vec<InjectedFile>,
}

impl InjectionReport {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn count(&self, kind: SupportKind) -> usize {
        self.files.iter().filter(|f| f.kind == kind).count()
    }
}

/// Support files an app bundle needs, by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupportPlan {
    /// `libswift*` names found in `<app>/Frameworks`, sorted
    pub swift_libraries: Vec<String>,
    /// `<app>/Watch` holds a `.app`
    pub watchkit: bool,
}

impl SupportPlan {
    /// Inspect `app` without consulting the toolchain.
    pub fn scan(app: &Path) -> Result<Self, SupportError> {
        let matcher = Glob::new(SWIFT_LIBRARY_PATTERN)?.compile_matcher();

        let mut swift_libraries: Vec<String> = dir_entries(&app.join("Frameworks"))?
            .into_iter()
            .filter(|name| matcher.is_match(name))
            .collect();
        swift_libraries.sort();

        let watchkit = dir_entries(&app.join("Watch"))?
            .iter()
            .any(|name| Path::new(name).extension().map_or(false, |e| e == "app"));

        Ok(Self {
            swift_libraries,
            watchkit,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.swift_libraries.is_empty() && !self.watchkit
    }
}

/// Copies support files from the active toolchain into an archive.
pub struct SupportInjector {
    toolchain: Toolchain,
    sdk: String,
}

impl SupportInjector {
    pub fn new(toolchain: Toolchain, sdk: impl Into<String>) -> Self {
        Self {
            toolchain,
            sdk: sdk.into(),
        }
    }

    /// Copy what `plan` names into `ipa`. An empty plan leaves the archive
    /// untouched; a failed copy leaves it untouched too.
    pub fn inject(&self, plan: &SupportPlan, ipa: &Path) -> Result<InjectionReport, SupportError> {
        let mut report = InjectionReport::default();
        if plan.is_empty() {
            return Ok(report);
        }

        let staging = TempDir::new().map_err(|source| SupportError::Io {
            path: std::env::temp_dir(),
            source,
        })?;

        let library_dir = self.toolchain.swift_library_dir(&self.sdk);
        let mut copies: Vec<(SupportKind, PathBuf, &str)> = plan
            .swift_libraries
            .iter()
            .map(|name| (SupportKind::Swift, library_dir.join(name), name.as_str()))
            .collect();
        if plan.watchkit {
            copies.push((SupportKind::WatchKit, self.toolchain.watchkit_stub(), WATCHKIT_STUB_NAME));
        }

        let mut dirs: Vec<PathBuf> = Vec::new();
        for (kind, source, name) in copies {
            let dir = staging.path().join(kind.dir_name());
            if !dirs.contains(&dir) {
                fs::create_dir(&dir).map_err(|source| SupportError::Io {
                    path: dir.clone(),
                    source,
                })?;
                dirs.push(dir.clone());
            }

            let dest = dir.join(name);
            fs::copy(&source, &dest).map_err(|e| SupportError::Copy {
                from: source.clone(),
                to: dest.clone(),
                source: e,
            })?;
            log::debug!("staged {}", source.display());
            report.files.push(InjectedFile {
                kind,
                source,
                entry: format!("{}/{}", kind.dir_name(), name),
            });
        }

        archive::append_dirs(ipa, &dirs)?;
        Ok(report)
    }
}

/// File names in `dir`; a missing directory has none.
fn dir_entries(dir: &Path) -> Result<Vec<String>, SupportError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(SupportError::Io {
                path: dir.to_path_buf(),
                source,
            })
        }
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| SupportError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}
