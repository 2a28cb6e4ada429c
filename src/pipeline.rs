//! Build pipeline
//!
//! Drives one `ipa build` run as a linear sequence of stages:
//! - Check the Xcode version
//! - Resolve workspace/project, scheme and configuration
//! - Validate them against `xcodebuild -list`
//! - Check the settings name an app target before building
//! - Build (`clean`, `build`, `archive`)
//! - Re-read settings for the final paths
//! - Package the `.ipa`, zip the dSYM, inject support files
//!
//! The first failure ends the run. Files already written stay in place.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use xcode_settings::{ParseError, SettingsTable};

use crate::artifact::{self, ArtifactError, ArtifactPaths, FileDigest};
use crate::config::{BuildOptions, ConfigError};
use crate::exec::ToolRunner;
use crate::inspect::InspectError;
use crate::package::{self, Signing};
use crate::resolve::{self, Chooser, Source};
use crate::support::{InjectedFile, SupportInjector, SupportPlan};
use crate::toolchain::{self, Toolchain, XcodeVersion};
use crate::xcodebuild::{split_extra_args, BuildAction, BuildFlags, ProjectLocation, XcodeBuild, XcodeError};

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    CheckToolchain,
    ResolveInputs,
    ValidateInputs,
    DiscoverTarget,
    Build,
    ReadSettings,
    Package,
    BundleSymbols,
    InjectSupport,
    Report,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::CheckToolchain => "toolchain check",
            Stage::ResolveInputs => "input resolution",
            Stage::ValidateInputs => "input validation",
            Stage::DiscoverTarget => "target discovery",
            Stage::Build => "build",
            Stage::ReadSettings => "settings query",
            Stage::Package => "packaging",
            Stage::BundleSymbols => "symbol bundling",
            Stage::InjectSupport => "support injection",
            Stage::Report => "report",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable process exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    /// Configuration or usage error
    Config = 1,
    /// No project, unknown scheme or configuration, unsupported Xcode
    Resolution = 10,
    /// xcodebuild reported an error
    ExternalTool = 20,
    /// xcodebuild printed nothing
    EmptyOutput = 21,
    BuildFailed = 30,
    AppTargetNotFound = 40,
    PackagingFailed = 50,
    SymbolsFailed = 60,
    InjectionFailed = 70,
    Io = 80,
}

impl ExitCode {
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }
}

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Message printed by xcodebuild, verbatim
    #[error("{0}")]
    ExternalTool(String),

    #[error("xcodebuild produced no output; is Xcode installed and selected?")]
    EmptyOutput,

    #[error("{0}")]
    Resolution(String),

    #[error("App settings could not be found")]
    ArtifactNotFound,

    #[error("{stage} failed: {reason}")]
    StepFailure { stage: Stage, reason: String },

    #[error(transparent)]
    Inspect(#[from] InspectError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl PipelineError {
    fn step(stage: Stage, reason: impl fmt::Display) -> Self {
        PipelineError::StepFailure {
            stage,
            reason: reason.to_string(),
        }
    }

    /// Map an xcodebuild error; explicit tool errors and empty output keep
    /// their own classes, anything else fails `stage`.
    fn xcode(stage: Stage, err: XcodeError) -> Self {
        match err {
            XcodeError::Output(ParseError::ToolError(message)) => PipelineError::ExternalTool(message),
            XcodeError::Output(ParseError::EmptyOutput) => PipelineError::EmptyOutput,
            other => PipelineError::step(stage, other),
        }
    }

    fn artifact(stage: Stage, err: ArtifactError) -> Self {
        match err {
            ArtifactError::AppTargetNotFound => PipelineError::ArtifactNotFound,
            ArtifactError::Io { path, source } => PipelineError::Io(io::Error::new(
                source.kind(),
                format!("{}: {}", path.display(), source),
            )),
            other => PipelineError::step(stage, other),
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        match self {
            PipelineError::Config(_) => ExitCode::Config,
            PipelineError::ExternalTool(_) => ExitCode::ExternalTool,
            PipelineError::EmptyOutput => ExitCode::EmptyOutput,
            PipelineError::Resolution(_) => ExitCode::Resolution,
            PipelineError::ArtifactNotFound => ExitCode::AppTargetNotFound,
            PipelineError::StepFailure { stage, .. } => match stage {
                Stage::CheckToolchain | Stage::ResolveInputs | Stage::ValidateInputs => {
                    ExitCode::Resolution
                }
                Stage::DiscoverTarget | Stage::ReadSettings => ExitCode::AppTargetNotFound,
                Stage::Build => ExitCode::BuildFailed,
                Stage::Package => ExitCode::PackagingFailed,
                Stage::BundleSymbols => ExitCode::SymbolsFailed,
                Stage::InjectSupport => ExitCode::InjectionFailed,
                Stage::Report => ExitCode::Io,
            },
            PipelineError::Inspect(e) => match e {
                InspectError::NotAnIpa(_) => ExitCode::Config,
                InspectError::Decode { .. } | InspectError::Exec(_) => ExitCode::ExternalTool,
                _ => ExitCode::Io,
            },
            PipelineError::Io(_) => ExitCode::Io,
        }
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Working state of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    pub location: ProjectLocation,
    pub scheme: String,
    pub configuration: String,
    pub sdk: String,
    pub destination: PathBuf,
    pub xcconfig: Option<PathBuf>,
    pub extra_args: Vec<String>,
    pub actions: Vec<BuildAction>,
}

impl BuildContext {
    pub fn flags(&self) -> BuildFlags {
        BuildFlags {
            sdk: Some(self.sdk.clone()),
            location: Some(self.location.clone()),
            scheme: Some(self.scheme.clone()),
            configuration: Some(self.configuration.clone()),
            xcconfig: self.xcconfig.clone(),
            extra_args: self.extra_args.clone(),
        }
    }
}

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub target: String,
    pub scheme: String,
    pub configuration: String,
    pub ipa: PathBuf,
    pub size: u64,
    pub sha256: String,
    pub dsym_archive: PathBuf,
    pub injected: Vec<InjectedFile>,
}

/// Runs the build pipeline.
pub struct Pipeline<'a> {
    runner: &'a dyn ToolRunner,
    chooser: &'a dyn Chooser,
    options: BuildOptions,
    working_dir: PathBuf,
}

impl<'a> Pipeline<'a> {
    pub fn new(runner: &'a dyn ToolRunner, chooser: &'a dyn Chooser, options: BuildOptions) -> Self {
        Self {
            runner,
            chooser,
            options,
            working_dir: PathBuf::from("."),
        }
    }

    /// Directory relative paths and project discovery are resolved against.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Run every stage and report the artifacts.
    pub fn run(&self) -> PipelineResult<BuildReport> {
        let ctx = self.resolve()?;
        let xcode = self.xcodebuild();

        self.status(&format!(
            "Building \"{}\" with Scheme \"{}\" and Configuration \"{}\"",
            ctx.location, ctx.scheme, ctx.configuration
        ));

        // DiscoverTarget
        let table = xcode
            .settings(&ctx.flags())
            .map_err(|e| PipelineError::xcode(Stage::DiscoverTarget, e))?;
        let target = artifact::find_app_target(&table)
            .map_err(|e| PipelineError::artifact(Stage::DiscoverTarget, e))?;
        log::debug!("app target {:?}", target.name);

        // Build
        xcode
            .build(&ctx.flags(), &ctx.actions)
            .map_err(|e| PipelineError::xcode(Stage::Build, e))?;

        // ReadSettings
        let table = xcode
            .settings(&ctx.flags())
            .map_err(|e| PipelineError::xcode(Stage::ReadSettings, e))?;
        let target = artifact::find_app_target(&table)
            .map_err(|e| PipelineError::artifact(Stage::ReadSettings, e))?;
        let paths = ArtifactPaths::derive(target, &ctx.destination, self.options.ipa.as_deref())
            .map_err(|e| PipelineError::artifact(Stage::ReadSettings, e))?;
        log::debug!("archive {}", paths.ipa.display());

        // Package
        let embed = self.options.embed.as_ref().map(|p| self.resolve_path(p));
        let signing = Signing {
            embed: embed.as_deref(),
            identity: self.options.identity.as_deref(),
        };
        package::package_application(self.runner, &ctx.sdk, &paths, &signing, self.options.verbose)
            .map_err(|e| PipelineError::step(Stage::Package, e))?;

        // BundleSymbols
        package::bundle_symbols(&paths).map_err(|e| PipelineError::step(Stage::BundleSymbols, e))?;

        // InjectSupport
        let injected = self.inject_support(&ctx.sdk, &paths)?;

        // Report
        let digest =
            FileDigest::of(&paths.ipa).map_err(|e| PipelineError::step(Stage::Report, e))?;
        self.status(&format!("{} successfully built", paths.ipa.display()));

        Ok(BuildReport {
            target: paths.target.clone(),
            scheme: ctx.scheme,
            configuration: ctx.configuration,
            ipa: paths.ipa.clone(),
            size: digest.size,
            sha256: digest.sha256,
            dsym_archive: paths.dsym_archive.clone(),
            injected,
        })
    }

    /// Resolve and validate the inputs without building.
    pub fn resolve(&self) -> PipelineResult<BuildContext> {
        let xcode = self.xcodebuild();
        self.check_toolchain(&xcode)?;

        // ResolveInputs
        let location = match self.options.location() {
            Some(location) => self.resolve_location(location),
            None => resolve::discover_location(&self.working_dir, self.chooser)
                .map_err(|e| PipelineError::Resolution(e.to_string()))?,
        };
        let info = xcode
            .info(Some(&location))
            .map_err(|e| PipelineError::xcode(Stage::ResolveInputs, e))?;

        let configuration =
            resolve::resolve_configuration(self.options.configuration.as_deref(), &info, self.chooser)
                .map_err(|e| PipelineError::Resolution(e.to_string()))?;
        if configuration.source == Source::Defaulted {
            self.warn(&format!(
                "Configuration was not passed, defaulting to {}",
                configuration.value
            ));
        }
        let scheme = resolve::resolve_scheme(self.options.scheme.as_deref(), &info, self.chooser)
            .map_err(|e| PipelineError::Resolution(e.to_string()))?;

        // ValidateInputs
        resolve::validate(&scheme.value, &configuration.value, &info)
            .map_err(|e| PipelineError::Resolution(e.to_string()))?;

        Ok(BuildContext {
            location,
            scheme: scheme.value,
            configuration: configuration.value,
            sdk: self.options.sdk.clone(),
            destination: self.resolve_path(&self.options.destination),
            xcconfig: self.options.xcconfig.as_ref().map(|p| self.resolve_path(p)),
            extra_args: self
                .options
                .xcargs
                .as_deref()
                .map(split_extra_args)
                .unwrap_or_default(),
            actions: BuildAction::sequence(self.options.clean, self.options.archive),
        })
    }

    /// Resolve the inputs and return the settings xcodebuild reports for them.
    pub fn settings(&self) -> PipelineResult<SettingsTable> {
        let ctx = self.resolve()?;
        self.xcodebuild()
            .settings(&ctx.flags())
            .map_err(|e| PipelineError::xcode(Stage::ReadSettings, e))
    }

    fn check_toolchain(&self, xcode: &XcodeBuild<'_>) -> PipelineResult<()> {
        let output = xcode
            .version()
            .map_err(|e| PipelineError::xcode(Stage::CheckToolchain, e))?;

        match XcodeVersion::parse(&output) {
            Some(version) => {
                log::debug!("Xcode {}", version);
                toolchain::check_minimum_version(&version)
                    .map_err(|e| PipelineError::Resolution(e.to_string()))
            }
            None => {
                self.warn(&format!(
                    "Could not determine the Xcode version from {:?}",
                    output.lines().next().unwrap_or_default()
                ));
                Ok(())
            }
        }
    }

    /// Only consults the toolchain when the app needs support files.
    fn inject_support(&self, sdk: &str, paths: &ArtifactPaths) -> PipelineResult<Vec<InjectedFile>> {
        let plan =
            SupportPlan::scan(&paths.app).map_err(|e| PipelineError::step(Stage::InjectSupport, e))?;
        if plan.is_empty() {
            log::debug!("no support files needed");
            return Ok(Vec::new());
        }

        let toolchain =
            Toolchain::locate(self.runner).map_err(|e| PipelineError::step(Stage::InjectSupport, e))?;
        let report = SupportInjector::new(toolchain, sdk)
            .inject(&plan, &paths.ipa)
            .map_err(|e| PipelineError::step(Stage::InjectSupport, e))?;

        for file in &report.files {
            log::debug!("injected {}", file.entry);
        }
        Ok(report.files)
    }

    fn xcodebuild(&self) -> XcodeBuild<'a> {
        XcodeBuild::new(self.runner).verbose(self.options.verbose)
    }

    fn resolve_location(&self, location: ProjectLocation) -> ProjectLocation {
        match location {
            ProjectLocation::Workspace(p) => ProjectLocation::Workspace(self.resolve_path(&p)),
            ProjectLocation::Project(p) => ProjectLocation::Project(self.resolve_path(&p)),
        }
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if self.working_dir == Path::new(".") {
            path.to_path_buf()
        } else {
            self.working_dir.join(path)
        }
    }

    fn status(&self, message: &str) {
        if !self.options.quiet {
            log::info!("{}", message);
        }
    }

    fn warn(&self, message: &str) {
        if !self.options.quiet {
            log::warn!("{}", message);
        }
    }
}
