//! External tool execution
//!
//! Every subprocess the pipeline starts goes through [`ToolRunner`]:
//! - `SystemRunner`: real child processes via `std::process`
//! - `mock::ScriptedRunner`: canned in-process responses for tests
//!
//! Calls block until the child exits. There is no timeout and no retry.

pub mod mock;

use std::fmt;
use std::io;
use std::process::{Command, Stdio};

/// How a child's output streams are wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Capture stdout and stderr (queries whose output gets parsed).
    Capture,
    /// Pass both streams through to the terminal (verbose mode).
    Inherit,
    /// Drop stdout, capture stderr for error reporting.
    Quiet,
}

impl OutputMode {
    /// `Inherit` when verbose, `Quiet` otherwise.
    pub fn for_verbosity(verbose: bool) -> Self {
        if verbose {
            OutputMode::Inherit
        } else {
            OutputMode::Quiet
        }
    }
}

/// A single external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Variables removed from the child environment
    pub env_remove: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env_remove: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env_remove(mut self, key: impl Into<String>) -> Self {
        self.env_remove.push(key.into());
        self
    }

    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }

    /// The argument following `flag`, e.g. `value_of("-o")`.
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Result of a finished child process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code; `None` when terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Successful exit with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed exit with the given code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Short description of a failure: exit status plus the last stderr line.
    pub fn failure_summary(&self) -> String {
        let status = match self.code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        };
        match self.stderr.lines().rev().find(|l| !l.trim().is_empty()) {
            Some(last) => format!("{}: {}", status, last.trim()),
            None => status,
        }
    }
}

/// Errors starting a child process. Non-zero exits are not errors here;
/// callers inspect [`ToolOutput::success`].
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("{program} not found")]
    NotFound { program: String },

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Runs external commands.
pub trait ToolRunner: Send + Sync {
    fn run(&self, invocation: &Invocation, mode: OutputMode) -> Result<ToolOutput, ExecError>;
}

/// Runs commands as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, invocation: &Invocation, mode: OutputMode) -> Result<ToolOutput, ExecError> {
        log::debug!("$ {}", invocation);

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);
        for key in &invocation.env_remove {
            cmd.env_remove(key);
        }

        let (stdout, stderr) = match mode {
            OutputMode::Capture => (Stdio::piped(), Stdio::piped()),
            OutputMode::Inherit => (Stdio::inherit(), Stdio::inherit()),
            OutputMode::Quiet => (Stdio::null(), Stdio::piped()),
        };
        cmd.stdin(Stdio::null()).stdout(stdout).stderr(stderr);

        let output = cmd.output().map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                ExecError::NotFound {
                    program: invocation.program.clone(),
                }
            } else {
                ExecError::Spawn {
                    program: invocation.program.clone(),
                    source: e,
                }
            }
        })?;

        Ok(ToolOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
