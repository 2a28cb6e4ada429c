//! ipa CLI
//!
//! Entry point for the `ipa` command-line tool.

use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use ipa_build::inspect;
use ipa_build::{
    BuildOptions, BuildOverrides, BuildReport, Chooser, FixedChooser, Pipeline, PipelineError,
    PromptChooser, SystemRunner,
};
use log::LevelFilter;

#[derive(Parser)]
#[command(name = "ipa")]
#[command(about = "Build and inspect iOS app archives", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the app and package it into an .ipa
    Build {
        #[command(flatten)]
        project: ProjectArgs,

        /// Output directory for the .ipa and dSYM archive
        #[arg(long, short = 'd')]
        destination: Option<PathBuf>,

        /// Output .ipa name
        #[arg(long)]
        ipa: Option<String>,

        /// Provisioning profile to embed
        #[arg(long, short = 'm')]
        embed: Option<PathBuf>,

        /// Signing identity
        #[arg(long, short = 'i')]
        identity: Option<String>,

        /// xcconfig file passed to xcodebuild
        #[arg(long)]
        xcconfig: Option<PathBuf>,

        /// Extra arguments passed to xcodebuild
        #[arg(long, allow_hyphen_values = true)]
        xcargs: Option<String>,

        /// Skip `clean`
        #[arg(long)]
        no_clean: bool,

        /// Skip `archive`
        #[arg(long)]
        no_archive: bool,

        /// Print the build report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the provisioning profile embedded in an .ipa
    Show {
        /// Path to the .ipa
        ipa: PathBuf,

        #[arg(long)]
        verbose: bool,
    },

    /// Print the build settings xcodebuild reports, as JSON
    Settings {
        #[command(flatten)]
        project: ProjectArgs,
    },
}

#[derive(Args)]
struct ProjectArgs {
    /// Workspace (.xcworkspace) to build
    #[arg(long, short = 'w', conflicts_with = "project")]
    workspace: Option<PathBuf>,

    /// Project (.xcodeproj) to build
    #[arg(long, short = 'p')]
    project: Option<PathBuf>,

    /// Scheme to build
    #[arg(long, short = 's')]
    scheme: Option<String>,

    /// Build configuration
    #[arg(long, short = 'c')]
    configuration: Option<String>,

    /// SDK (default: iphoneos)
    #[arg(long)]
    sdk: Option<String>,

    /// Config file (default: ./.ipa.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Show tool output and debug logs
    #[arg(long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print errors
    #[arg(long, short = 'q')]
    quiet: bool,
}

impl ProjectArgs {
    fn overrides(&self) -> BuildOverrides {
        BuildOverrides {
            workspace: self.workspace.clone(),
            project: self.project.clone(),
            scheme: self.scheme.clone(),
            configuration: self.configuration.clone(),
            sdk: self.sdk.clone(),
            verbose: self.verbose.then_some(true),
            quiet: self.quiet.then_some(true),
            ..Default::default()
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Build {
            project,
            destination,
            ipa,
            embed,
            identity,
            xcconfig,
            xcargs,
            no_clean,
            no_archive,
            json,
        } => {
            let overrides = BuildOverrides {
                destination,
                ipa,
                embed,
                identity,
                xcconfig,
                xcargs,
                clean: no_clean.then_some(false),
                archive: no_archive.then_some(false),
                ..project.overrides()
            };
            run_build(project.config.as_deref(), &overrides, json)
        }
        Commands::Show { ipa, verbose } => {
            init_logging(verbose, false);
            run_show(&ipa)
        }
        Commands::Settings { project } => run_settings(project.config.as_deref(), &project.overrides()),
    };

    if let Err(e) = result {
        eprintln!("error: {}", e);
        process::exit(e.exit_code().as_i32());
    }
}

fn load_options(config: Option<&Path>, overrides: &BuildOverrides) -> Result<BuildOptions, PipelineError> {
    let options = BuildOptions::load(Path::new("."), config, overrides)?;
    init_logging(options.verbose, options.quiet);
    Ok(options)
}

fn chooser() -> Box<dyn Chooser> {
    if std::io::stdin().is_terminal() {
        Box::new(PromptChooser)
    } else {
        Box::new(FixedChooser::refuse())
    }
}

fn run_build(config: Option<&Path>, overrides: &BuildOverrides, json: bool) -> Result<(), PipelineError> {
    let options = load_options(config, overrides)?;
    let quiet = options.quiet;
    let chooser = chooser();

    let report = Pipeline::new(&SystemRunner, chooser.as_ref(), options).run()?;

    if json {
        let out = serde_json::to_string_pretty(&report)
            .map_err(|e| PipelineError::Io(e.into()))?;
        println!("{}", out);
    } else if !quiet {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &BuildReport) {
    println!("ipa:    {} ({} bytes)", report.ipa.display(), report.size);
    println!("sha256: {}", report.sha256);
    println!("dSYM:   {}", report.dsym_archive.display());
    for file in &report.injected {
        println!("added:  {}", file.entry);
    }
}

fn run_show(ipa: &Path) -> Result<(), PipelineError> {
    let plist = inspect::show_provisioning(&SystemRunner, ipa)?;
    print!("{}", plist);
    std::io::stdout().flush()?;
    Ok(())
}

fn run_settings(config: Option<&Path>, overrides: &BuildOverrides) -> Result<(), PipelineError> {
    let options = load_options(config, overrides)?;
    let chooser = chooser();

    let table = Pipeline::new(&SystemRunner, chooser.as_ref(), options).settings()?;
    let out = serde_json::to_string_pretty(&table).map_err(|e| PipelineError::Io(e.into()))?;
    println!("{}", out);
    Ok(())
}

/// Default level `info`, `debug` with `--verbose`, `error` with `--quiet`;
/// `RUST_LOG` overrides.
fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else if quiet {
        LevelFilter::Error
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| match record.level() {
            log::Level::Info => writeln!(buf, "{}", record.args()),
            level => writeln!(buf, "{}: {}", level.as_str().to_lowercase(), record.args()),
        })
        .init();
}
