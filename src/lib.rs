//! ipa-build - build and package iOS apps from Xcode projects
//!
//! Drives `xcodebuild` through clean, build and archive, locates the built
//! app from the reported build settings, packages it into an `.ipa`, zips
//! its dSYM, and adds the Swift and WatchKit support files the app needs.

pub mod archive;
pub mod artifact;
pub mod config;
pub mod exec;
pub mod inspect;
pub mod package;
pub mod pipeline;
pub mod resolve;
pub mod support;
pub mod toolchain;
pub mod xcodebuild;

pub use config::{BuildOptions, BuildOverrides, ConfigError};
pub use exec::{SystemRunner, ToolRunner};
pub use pipeline::{BuildContext, BuildReport, ExitCode, Pipeline, PipelineError, PipelineResult, Stage};
pub use resolve::{Chooser, FixedChooser, PromptChooser};
pub use xcode_settings::{ProjectInfo, SettingsTable};
