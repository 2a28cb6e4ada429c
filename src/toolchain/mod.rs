//! Active Xcode toolchain
//!
//! Locates the developer directory (`xcode-select --print-path`), parses
//! `xcodebuild -version`, and knows where runtime support files live
//! inside the developer directory.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex_lite::Regex;
use serde::Serialize;

use crate::exec::{ExecError, Invocation, OutputMode, ToolRunner};

/// Oldest Xcode the pipeline drives.
pub const MINIMUM_XCODE: (u32, u32) = (4, 0);

const XCODE_SELECT: &str = "xcode-select";

fn version_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\.(\d+)(?:\.(\d+))?").expect("version pattern is valid"))
}

/// Toolchain errors
#[derive(Debug, thiserror::Error)]
pub enum ToolchainError {
    #[error("could not determine the active developer directory: {0}")]
    DeveloperDir(String),

    #[error("Xcode {found} is not supported (minimum {}.{})", MINIMUM_XCODE.0, MINIMUM_XCODE.1)]
    Unsupported { found: XcodeVersion },

    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Parsed `xcodebuild -version` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct XcodeVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    /// `Build version` line, e.g. `15F31d`
    pub build: Option<String>,
}

impl XcodeVersion {
    /// Parse the first dotted version number in the output.
    ///
    /// ```text
    /// Xcode 15.4
    /// Build version 15F31d
    /// ```
    pub fn parse(output: &str) -> Option<Self> {
        let caps = version_re().captures(output)?;
        let number = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

        let build = output
            .lines()
            .find_map(|line| line.trim().strip_prefix("Build version "))
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty());

        Some(Self {
            major: number(1)?,
            minor: number(2)?,
            patch: number(3).unwrap_or(0),
            build,
        })
    }

    pub fn at_least(&self, major: u32, minor: u32) -> bool {
        (self.major, self.minor) >= (major, minor)
    }
}

impl fmt::Display for XcodeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        if self.patch > 0 {
            write!(f, ".{}", self.patch)?;
        }
        if let Some(ref build) = self.build {
            write!(f, " ({})", build)?;
        }
        Ok(())
    }
}

/// Reject Xcode releases older than [`MINIMUM_XCODE`].
pub fn check_minimum_version(version: &XcodeVersion) -> Result<(), ToolchainError> {
    if version.at_least(MINIMUM_XCODE.0, MINIMUM_XCODE.1) {
        Ok(())
    } else {
        Err(ToolchainError::Unsupported {
            found: version.clone(),
        })
    }
}

/// Active developer directory via `xcode-select --print-path`.
pub fn developer_dir(runner: &dyn ToolRunner) -> Result<PathBuf, ToolchainError> {
    let invocation = Invocation::new(XCODE_SELECT).arg("--print-path");
    let output = runner.run(&invocation, OutputMode::Capture)?;

    if !output.success() {
        return Err(ToolchainError::DeveloperDir(output.failure_summary()));
    }
    let path = output.stdout.trim();
    if path.is_empty() {
        return Err(ToolchainError::DeveloperDir(
            "xcode-select printed nothing".to_string(),
        ));
    }
    Ok(PathBuf::from(path))
}

/// Paths inside a developer directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    developer_dir: PathBuf,
}

impl Toolchain {
    pub fn new(developer_dir: impl Into<PathBuf>) -> Self {
        Self {
            developer_dir: developer_dir.into(),
        }
    }

    /// Ask `xcode-select` for the active developer directory.
    pub fn locate(runner: &dyn ToolRunner) -> Result<Self, ToolchainError> {
        developer_dir(runner).map(Self::new)
    }

    pub fn developer_dir(&self) -> &Path {
        &self.developer_dir
    }

    /// Directory holding the Swift runtime dylibs for `sdk`.
    pub fn swift_library_dir(&self, sdk: &str) -> PathBuf {
        self.developer_dir
            .join("Toolchains/XcodeDefault.xctoolchain/usr/lib/swift")
            .join(sdk)
    }

    /// The WatchKit companion stub binary.
    pub fn watchkit_stub(&self) -> PathBuf {
        self.developer_dir.join(
            "Platforms/iPhoneOS.platform/Developer/SDKs/iPhoneOS.sdk/Library/Application Support/WatchKit/WK",
        )
    }
}
