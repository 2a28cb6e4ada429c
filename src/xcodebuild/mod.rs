//! xcodebuild invocations
//!
//! Builds argv for `xcodebuild` from typed flags and runs the four
//! operations the pipeline needs: `-list`, `-showBuildSettings`,
//! `-version`, and the build itself.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use xcode_settings::{classify, parse_project_info, parse_settings, ParseError, ProjectInfo, SettingsTable};

use crate::exec::{ExecError, Invocation, OutputMode, ToolRunner};

const XCODEBUILD: &str = "xcodebuild";

/// Workspace or project to build. The two are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "path")]
pub enum ProjectLocation {
    Workspace(PathBuf),
    Project(PathBuf),
}

impl ProjectLocation {
    pub fn path(&self) -> &Path {
        match self {
            ProjectLocation::Workspace(p) | ProjectLocation::Project(p) => p,
        }
    }

    /// `-workspace <path>` or `-project <path>`
    pub fn to_args(&self) -> [String; 2] {
        let flag = match self {
            ProjectLocation::Workspace(_) => "-workspace",
            ProjectLocation::Project(_) => "-project",
        };
        [flag.to_string(), self.path().display().to_string()]
    }
}

impl fmt::Display for ProjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path().display())
    }
}

/// xcodebuild actions run by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildAction {
    Clean,
    Build,
    Archive,
}

impl BuildAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildAction::Clean => "clean",
            BuildAction::Build => "build",
            BuildAction::Archive => "archive",
        }
    }

    /// Actions in execution order: `clean` and `archive` are optional,
    /// `build` always runs.
    pub fn sequence(clean: bool, archive: bool) -> Vec<BuildAction> {
        let mut actions = Vec::with_capacity(3);
        if clean {
            actions.push(BuildAction::Clean);
        }
        actions.push(BuildAction::Build);
        if archive {
            actions.push(BuildAction::Archive);
        }
        actions
    }
}

/// Flags shared by the settings query and the build invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildFlags {
    pub sdk: Option<String>,
    pub location: Option<ProjectLocation>,
    pub scheme: Option<String>,
    pub configuration: Option<String>,
    pub xcconfig: Option<PathBuf>,
    /// Raw extra arguments appended verbatim
    pub extra_args: Vec<String>,
}

impl BuildFlags {
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(ref sdk) = self.sdk {
            args.extend(["-sdk".to_string(), sdk.clone()]);
        }
        if let Some(ref location) = self.location {
            args.extend(location.to_args());
        }
        if let Some(ref scheme) = self.scheme {
            args.extend(["-scheme".to_string(), scheme.clone()]);
        }
        if let Some(ref configuration) = self.configuration {
            args.extend(["-configuration".to_string(), configuration.clone()]);
        }
        if let Some(ref xcconfig) = self.xcconfig {
            args.extend(["-xcconfig".to_string(), xcconfig.display().to_string()]);
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

/// Split a raw `--xcargs` string into arguments, honoring single and double quotes.
pub fn split_extra_args(raw: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;

    for c in raw.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_token = true;
            }
            None if c.is_whitespace() => {
                if in_token {
                    args.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            None => {
                current.push(c);
                in_token = true;
            }
        }
    }
    if in_token {
        args.push(current);
    }
    args
}

/// xcodebuild errors
#[derive(Debug, thiserror::Error)]
pub enum XcodeError {
    #[error(transparent)]
    Output(#[from] ParseError),

    #[error("`{command}` failed with {summary}")]
    Failed { command: String, summary: String },

    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Runs xcodebuild through a [`ToolRunner`].
pub struct XcodeBuild<'a> {
    runner: &'a dyn ToolRunner,
    verbose: bool,
}

impl<'a> XcodeBuild<'a> {
    pub fn new(runner: &'a dyn ToolRunner) -> Self {
        Self {
            runner,
            verbose: false,
        }
    }

    /// Let build output through to the terminal.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// `xcodebuild [-workspace W | -project P] -list`
    pub fn info(&self, location: Option<&ProjectLocation>) -> Result<ProjectInfo, XcodeError> {
        let mut invocation = Invocation::new(XCODEBUILD);
        if let Some(location) = location {
            invocation = invocation.args(location.to_args());
        }
        let stdout = self.query(invocation.arg("-list"))?;
        Ok(parse_project_info(&stdout)?)
    }

    /// `xcodebuild <flags> -showBuildSettings`
    pub fn settings(&self, flags: &BuildFlags) -> Result<SettingsTable, XcodeError> {
        let invocation = Invocation::new(XCODEBUILD)
            .args(flags.to_args())
            .arg("-showBuildSettings");
        let stdout = self.query(invocation)?;
        Ok(parse_settings(&stdout)?)
    }

    /// Raw `xcodebuild -version` output.
    pub fn version(&self) -> Result<String, XcodeError> {
        let stdout = self.query(Invocation::new(XCODEBUILD).arg("-version"))?;
        xcode_settings::check_output(&stdout)?;
        Ok(stdout)
    }

    /// `xcodebuild <flags> <actions>`; any non-zero exit is an error.
    pub fn build(&self, flags: &BuildFlags, actions: &[BuildAction]) -> Result<(), XcodeError> {
        let invocation = Invocation::new(XCODEBUILD)
            .args(flags.to_args())
            .args(actions.iter().map(BuildAction::as_str))
            .env_remove("CC");

        log::debug!("{}", invocation);
        let output = self
            .runner
            .run(&invocation, OutputMode::for_verbosity(self.verbose))?;

        if !output.success() {
            return Err(XcodeError::Failed {
                command: invocation.to_string(),
                summary: output.failure_summary(),
            });
        }
        Ok(())
    }

    /// Run a query and return stdout. Explicit tool errors on stderr are
    /// surfaced; a missing tool reads as empty output.
    fn query(&self, invocation: Invocation) -> Result<String, XcodeError> {
        log::debug!("{}", invocation);
        let output = match self.runner.run(&invocation, OutputMode::Capture) {
            Ok(output) => output,
            Err(ExecError::NotFound { program }) => {
                log::debug!("{} not found", program);
                return Err(ParseError::EmptyOutput.into());
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(message) = output.stderr.lines().find_map(classify::tool_error_message) {
            return Err(ParseError::ToolError(message.to_string()).into());
        }
        Ok(output.stdout)
    }
}
