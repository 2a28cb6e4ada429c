//! Packaging
//!
//! Wraps the built app into an `.ipa` with `xcrun PackageApplication` and
//! compresses the dSYM bundle next to it.

use std::path::{Path, PathBuf};

use crate::archive::{self, ArchiveError};
use crate::artifact::ArtifactPaths;
use crate::exec::{ExecError, Invocation, OutputMode, ToolRunner};

/// Packaging errors
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("`{command}` failed with {summary}")]
    Failed { command: String, summary: String },

    #[error("PackageApplication did not produce {}", .0.display())]
    NoOutput(PathBuf),

    #[error("dSYM not found at {}", .0.display())]
    MissingSymbols(PathBuf),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Signing inputs for `PackageApplication`.
#[derive(Debug, Clone, Default)]
pub struct Signing<'a> {
    /// Embedded instead of the dSYM when set
    pub embed: Option<&'a Path>,
    pub identity: Option<&'a str>,
}

/// The `xcrun -sdk <sdk> PackageApplication ...` invocation.
pub fn package_invocation(sdk: &str, paths: &ArtifactPaths, signing: &Signing<'_>) -> Invocation {
    let embed = signing.embed.unwrap_or(&paths.dsym);
    let mut invocation = Invocation::new("xcrun")
        .args(["-sdk", sdk, "PackageApplication", "-v"])
        .arg(paths.app.display().to_string())
        .arg("-o")
        .arg(paths.ipa.display().to_string())
        .arg("--embed")
        .arg(embed.display().to_string());
    if let Some(identity) = signing.identity {
        invocation = invocation.args(["--sign", identity]);
    }
    invocation
}

/// Run `PackageApplication`; a non-zero exit or a missing `.ipa` is an error.
pub fn package_application(
    runner: &dyn ToolRunner,
    sdk: &str,
    paths: &ArtifactPaths,
    signing: &Signing<'_>,
    verbose: bool,
) -> Result<(), PackageError> {
    let invocation = package_invocation(sdk, paths, signing);
    let output = runner.run(&invocation, OutputMode::for_verbosity(verbose))?;

    if !output.success() {
        return Err(PackageError::Failed {
            command: invocation.to_string(),
            summary: output.failure_summary(),
        });
    }
    if !paths.ipa.is_file() {
        return Err(PackageError::NoOutput(paths.ipa.clone()));
    }
    Ok(())
}

/// Zip the dSYM bundle into `<destination>/<WRAPPER_NAME>.dSYM.zip`.
pub fn bundle_symbols(paths: &ArtifactPaths) -> Result<usize, PackageError> {
    if !paths.dsym.is_dir() {
        return Err(PackageError::MissingSymbols(paths.dsym.clone()));
    }
    Ok(archive::zip_dir(&paths.dsym, &paths.dsym_archive)?)
}
