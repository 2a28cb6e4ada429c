//! Input resolution
//!
//! Fills in whatever the user left unspecified: the workspace or project
//! (by scanning the working directory), the scheme and the configuration
//! (from `xcodebuild -list`). Ambiguities go to a [`Chooser`].

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use xcode_settings::ProjectInfo;

use crate::xcodebuild::ProjectLocation;

/// Configuration used when none is given and the project lists it (or lists none).
pub const DEFAULT_CONFIGURATION: &str = "Debug";

/// Resolution errors
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("no Xcode workspace or project found in {}", .0.display())]
    NoProject(PathBuf),

    #[error("no schemes found")]
    NoSchemes,

    #[error("scheme {0:?} not found")]
    UnknownScheme(String),

    #[error("configuration {0:?} not found")]
    UnknownConfiguration(String),

    #[error("several {what} available ({}); pass one explicitly", .options.join(", "))]
    Ambiguous {
        what: &'static str,
        options: Vec<String>,
    },

    #[error("no {0} selected")]
    NoSelection(&'static str),

    #[error("failed to scan {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Picks one value among several candidates.
pub trait Chooser {
    /// `what` names the kind of value ("scheme", "configuration", ...).
    fn choose(&self, what: &'static str, options: &[String]) -> Result<String, ResolveError>;
}

/// Asks on the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct PromptChooser;

impl Chooser for PromptChooser {
    fn choose(&self, what: &'static str, options: &[String]) -> Result<String, ResolveError> {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut output = io::stderr();
        prompt(&mut input, &mut output, what, options)
    }
}

/// Show a numbered menu and read answers until one names an option, either
/// by number or by exact name. End of input is [`ResolveError::NoSelection`].
pub fn prompt<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    what: &'static str,
    options: &[String],
) -> Result<String, ResolveError> {
    let io_err = |source| ResolveError::Io {
        path: PathBuf::from("<stdin>"),
        source,
    };

    writeln!(output, "Select a {}:", what).map_err(io_err)?;
    for (i, option) in options.iter().enumerate() {
        writeln!(output, "  {}. {}", i + 1, option).map_err(io_err)?;
    }

    loop {
        write!(output, "? ").map_err(io_err)?;
        output.flush().map_err(io_err)?;

        let mut line = String::new();
        if input.read_line(&mut line).map_err(io_err)? == 0 {
            return Err(ResolveError::NoSelection(what));
        }
        let answer = line.trim();

        if let Ok(n) = answer.parse::<usize>() {
            if (1..=options.len()).contains(&n) {
                return Ok(options[n - 1].clone());
            }
        }
        if let Some(found) = options.iter().find(|o| o.as_str() == answer) {
            return Ok(found.clone());
        }
        writeln!(output, "Invalid choice {:?}", answer).map_err(io_err)?;
    }
}

/// Non-interactive chooser.
///
/// Answers from a queue of preset values, in order; a preset that is not
/// among the options, or an empty queue, fails with
/// [`ResolveError::Ambiguous`].
#[derive(Debug, Default)]
pub struct FixedChooser {
    answers: Mutex<Vec<String>>,
    asked: Mutex<Vec<&'static str>>,
}

impl FixedChooser {
    /// A chooser that refuses every choice.
    pub fn refuse() -> Self {
        Self::default()
    }

    pub fn with_answers<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut answers: Vec<String> = answers.into_iter().map(Into::into).collect();
        answers.reverse();
        Self {
            answers: Mutex::new(answers),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Kinds of values asked for so far.
    pub fn asked(&self) -> Vec<&'static str> {
        self.asked
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Chooser for FixedChooser {
    fn choose(&self, what: &'static str, options: &[String]) -> Result<String, ResolveError> {
        self.asked
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(what);

        let answer = self
            .answers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop();

        match answer {
            Some(answer) if options.contains(&answer) => Ok(answer),
            _ => Err(ResolveError::Ambiguous {
                what,
                options: options.to_vec(),
            }),
        }
    }
}

/// How a resolved value was arrived at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Passed by the user
    Given,
    /// Fell back to a default
    Defaulted,
    /// The only candidate
    Only,
    /// Picked by the chooser
    Chosen,
}

/// A resolved value and its [`Source`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub value: String,
    pub source: Source,
}

impl Resolved {
    fn new(value: impl Into<String>, source: Source) -> Self {
        Self {
            value: value.into(),
            source,
        }
    }
}

/// Find a workspace (preferred) or project in `dir`.
pub fn discover_location(
    dir: &Path,
    chooser: &dyn Chooser,
) -> Result<ProjectLocation, ResolveError> {
    let entries = fs::read_dir(dir).map_err(|source| ResolveError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut workspaces = Vec::new();
    let mut projects = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ResolveError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let name = entry.file_name().to_string_lossy().into_owned();
        match Path::new(&name).extension().and_then(|e| e.to_str()) {
            Some("xcworkspace") => workspaces.push(name),
            Some("xcodeproj") => projects.push(name),
            _ => {}
        }
    }
    workspaces.sort();
    projects.sort();

    if !workspaces.is_empty() {
        let name = pick("workspace", workspaces, chooser)?;
        return Ok(ProjectLocation::Workspace(dir.join(name)));
    }
    if !projects.is_empty() {
        let name = pick("project", projects, chooser)?;
        return Ok(ProjectLocation::Project(dir.join(name)));
    }
    Err(ResolveError::NoProject(dir.to_path_buf()))
}

fn pick(
    what: &'static str,
    mut candidates: Vec<String>,
    chooser: &dyn Chooser,
) -> Result<String, ResolveError> {
    if candidates.len() == 1 {
        return Ok(candidates.remove(0));
    }
    chooser.choose(what, &candidates)
}

/// Resolve the configuration to build.
///
/// Without one given: `Debug` when the project lists none or lists `Debug`,
/// the sole entry when there is one, otherwise the chooser decides.
pub fn resolve_configuration(
    requested: Option<&str>,
    info: &ProjectInfo,
    chooser: &dyn Chooser,
) -> Result<Resolved, ResolveError> {
    if let Some(configuration) = requested {
        return Ok(Resolved::new(configuration, Source::Given));
    }

    let configurations = info.configurations();
    if configurations.is_empty() || info.has_configuration(DEFAULT_CONFIGURATION) {
        return Ok(Resolved::new(DEFAULT_CONFIGURATION, Source::Defaulted));
    }
    if let [only] = configurations {
        return Ok(Resolved::new(only.clone(), Source::Only));
    }
    chooser
        .choose("configuration", configurations)
        .map(|c| Resolved::new(c, Source::Chosen))
}

/// Resolve the scheme to build: the given one, the sole listed one, or the
/// chooser's pick. A project without schemes is an error.
pub fn resolve_scheme(
    requested: Option<&str>,
    info: &ProjectInfo,
    chooser: &dyn Chooser,
) -> Result<Resolved, ResolveError> {
    if let Some(scheme) = requested {
        return Ok(Resolved::new(scheme, Source::Given));
    }

    match info.schemes() {
        [] => Err(ResolveError::NoSchemes),
        [only] => Ok(Resolved::new(only.clone(), Source::Only)),
        schemes => chooser
            .choose("scheme", schemes)
            .map(|s| Resolved::new(s, Source::Chosen)),
    }
}

/// Check the scheme and configuration against the project listing.
///
/// Workspace listings carry no configurations; the configuration check is
/// skipped when the listing has none.
pub fn validate(scheme: &str, configuration: &str, info: &ProjectInfo) -> Result<(), ResolveError> {
    if !info.has_scheme(scheme) {
        return Err(ResolveError::UnknownScheme(scheme.to_string()));
    }
    if !info.configurations().is_empty() && !info.has_configuration(configuration) {
        return Err(ResolveError::UnknownConfiguration(configuration.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use xcode_settings::parse_project_info;

    fn info(configurations: &[&str], schemes: &[&str]) -> ProjectInfo {
        let mut text = String::from("Information about project \"App\":\n");
        text.push_str("    Build Configurations:\n");
        for c in configurations {
            text.push_str(&format!("        {}\n", c));
        }
        text.push_str("\n    Schemes:\n");
        for s in schemes {
            text.push_str(&format!("        {}\n", s));
        }
        parse_project_info(&text).unwrap()
    }

    #[test]
    fn test_discover_prefers_workspace() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("App.xcodeproj")).unwrap();
        fs::create_dir(dir.path().join("App.xcworkspace")).unwrap();
        fs::write(dir.path().join("README.md"), "").unwrap();

        let location = discover_location(dir.path(), &FixedChooser::refuse()).unwrap();
        assert_eq!(
            location,
            ProjectLocation::Workspace(dir.path().join("App.xcworkspace"))
        );
    }

    #[test]
    fn test_discover_project_fallback() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("Only.xcodeproj")).unwrap();

        let location = discover_location(dir.path(), &FixedChooser::refuse()).unwrap();
        assert_eq!(
            location,
            ProjectLocation::Project(dir.path().join("Only.xcodeproj"))
        );
    }

    #[test]
    fn test_discover_several_uses_chooser() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("B.xcodeproj")).unwrap();
        fs::create_dir(dir.path().join("A.xcodeproj")).unwrap();

        let chooser = FixedChooser::with_answers(["B.xcodeproj"]);
        let location = discover_location(dir.path(), &chooser).unwrap();
        assert_eq!(location.path(), dir.path().join("B.xcodeproj"));
        assert_eq!(chooser.asked(), ["project"]);

        let err = discover_location(dir.path(), &FixedChooser::refuse()).unwrap_err();
        match err {
            ResolveError::Ambiguous { what, options } => {
                assert_eq!(what, "project");
                assert_eq!(options, ["A.xcodeproj", "B.xcodeproj"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_discover_nothing() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            discover_location(dir.path(), &FixedChooser::refuse()),
            Err(ResolveError::NoProject(_))
        ));
    }

    #[test]
    fn test_configuration_defaults_to_debug() {
        let chooser = FixedChooser::refuse();
        let listed = resolve_configuration(None, &info(&["Debug", "Release"], &["App"]), &chooser).unwrap();
        assert_eq!(listed, Resolved::new("Debug", Source::Defaulted));

        let none = resolve_configuration(None, &info(&[], &["App"]), &chooser).unwrap();
        assert_eq!(none.value, "Debug");
        assert_eq!(none.source, Source::Defaulted);
    }

    #[test]
    fn test_configuration_single_and_several() {
        let single = resolve_configuration(None, &info(&["Release"], &["App"]), &FixedChooser::refuse()).unwrap();
        assert_eq!(single, Resolved::new("Release", Source::Only));

        let chooser = FixedChooser::with_answers(["Beta"]);
        let several = resolve_configuration(None, &info(&["Release", "Beta"], &["App"]), &chooser).unwrap();
        assert_eq!(several, Resolved::new("Beta", Source::Chosen));

        let given = resolve_configuration(Some("Ad Hoc"), &info(&[], &[]), &FixedChooser::refuse()).unwrap();
        assert_eq!(given.source, Source::Given);
    }

    #[test]
    fn test_scheme_resolution() {
        let chooser = FixedChooser::refuse();
        assert!(matches!(
            resolve_scheme(None, &info(&["Debug"], &[]), &chooser),
            Err(ResolveError::NoSchemes)
        ));
        assert_eq!(
            resolve_scheme(None, &info(&["Debug"], &["App"]), &chooser).unwrap(),
            Resolved::new("App", Source::Only)
        );
        assert!(matches!(
            resolve_scheme(None, &info(&["Debug"], &["App", "Widget"]), &chooser),
            Err(ResolveError::Ambiguous { what: "scheme", .. })
        ));
    }

    #[test]
    fn test_validate() {
        let listing = info(&["Debug", "Release"], &["App"]);
        assert!(validate("App", "Release", &listing).is_ok());
        assert!(matches!(
            validate("Nope", "Release", &listing),
            Err(ResolveError::UnknownScheme(s)) if s == "Nope"
        ));
        assert!(matches!(
            validate("App", "Profile", &listing),
            Err(ResolveError::UnknownConfiguration(c)) if c == "Profile"
        ));
        assert!(validate("App", "Anything", &info(&[], &["App"])).is_ok());
    }

    #[test]
    fn test_prompt_by_number_and_name() {
        let options = vec!["App".to_string(), "Widget".to_string()];
        let mut out = Vec::new();

        let mut input = io::Cursor::new("2\n");
        assert_eq!(prompt(&mut input, &mut out, "scheme", &options).unwrap(), "Widget");

        let mut input = io::Cursor::new("9\nApp\n");
        assert_eq!(prompt(&mut input, &mut out, "scheme", &options).unwrap(), "App");

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("  1. App"));
        assert!(text.contains("Invalid choice \"9\""));
    }

    #[test]
    fn test_prompt_eof() {
        let options = vec!["App".to_string(), "Widget".to_string()];
        let mut input = io::Cursor::new("");
        let err = prompt(&mut input, &mut io::sink(), "scheme", &options).unwrap_err();
        assert!(matches!(err, ResolveError::NoSelection("scheme")));
    }
}
