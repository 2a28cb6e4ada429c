//! Scripted tool runner
//!
//! Answers invocations from a list of rules instead of spawning processes,
//! and records every call so tests can assert on what ran and in what order.

use std::sync::Mutex;

use super::{ExecError, Invocation, OutputMode, ToolOutput, ToolRunner};

type Handler = Box<dyn Fn(&Invocation) -> ToolOutput + Send + Sync>;

/// Selects invocations by program name and required arguments.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    program: Option<String>,
    args: Vec<String>,
}

impl Matcher {
    /// Match any invocation of `program`.
    pub fn program(program: impl Into<String>) -> Self {
        Self {
            program: Some(program.into()),
            args: Vec::new(),
        }
    }

    /// Additionally require `arg` to be present.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn matches(&self, invocation: &Invocation) -> bool {
        if let Some(ref program) = self.program {
            if &invocation.program != program {
                return false;
            }
        }
        self.args.iter().all(|a| invocation.has_arg(a))
    }
}

struct Rule {
    matcher: Matcher,
    handler: Handler,
}

/// A [`ToolRunner`] driven by canned responses.
///
/// Rules are checked in registration order; the first match answers. An
/// invocation with no matching rule behaves like a missing program.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Vec<Rule>,
    calls: Mutex<Vec<(Invocation, OutputMode)>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer matching invocations with `handler`.
    pub fn on<H>(mut self, matcher: Matcher, handler: H) -> Self
    where
        H: Fn(&Invocation) -> ToolOutput + Send + Sync + 'static,
    {
        self.rules.push(Rule {
            matcher,
            handler: Box::new(handler),
        });
        self
    }

    /// Answer matching invocations with a fixed successful stdout.
    pub fn on_stdout(self, matcher: Matcher, stdout: impl Into<String>) -> Self {
        let stdout = stdout.into();
        self.on(matcher, move |_| ToolOutput::ok(stdout.clone()))
    }

    /// Every invocation seen so far, in order.
    pub fn calls(&self) -> Vec<Invocation> {
        self.lock().iter().map(|(inv, _)| inv.clone()).collect()
    }

    /// Output mode requested for each call, in order.
    pub fn modes(&self) -> Vec<OutputMode> {
        self.lock().iter().map(|(_, mode)| *mode).collect()
    }

    /// Number of recorded calls selected by `matcher`.
    pub fn count(&self, matcher: &Matcher) -> usize {
        self.lock().iter().filter(|(inv, _)| matcher.matches(inv)).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(Invocation, OutputMode)>> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ToolRunner for ScriptedRunner {
    fn run(&self, invocation: &Invocation, mode: OutputMode) -> Result<ToolOutput, ExecError> {
        self.lock().push((invocation.clone(), mode));

        self.rules
            .iter()
            .find(|rule| rule.matcher.matches(invocation))
            .map(|rule| (rule.handler)(invocation))
            .ok_or_else(|| ExecError::NotFound {
                program: invocation.program.clone(),
            })
    }
}
