//! Test fixtures for pipeline tests
//!
//! Captured xcodebuild output lives in `tests/fixtures/xcodebuild/`. A
//! [`Project`] lays out a fake working directory, build products and
//! developer directory in a temp dir and scripts a tool runner against it.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use ipa_build::archive;
use ipa_build::exec::mock::{Matcher, ScriptedRunner};
use ipa_build::exec::ToolOutput;
use tempfile::TempDir;

pub const XCODE_VERSION: &str = "Xcode 15.4\nBuild version 15F31d\n";

/// Captured xcodebuild output by file name.
pub fn xcodebuild_output(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/xcodebuild")
        .join(name);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("{}: {}", path.display(), e))
}

/// A fake project checkout plus build products and toolchain.
pub struct Project {
    pub root: TempDir,
    /// Working directory holding `App.xcodeproj`
    pub work: PathBuf,
    /// `BUILT_PRODUCTS_DIR`
    pub products: PathBuf,
    pub app: PathBuf,
    pub dsym: PathBuf,
    pub developer: PathBuf,
}

impl Project {
    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        let work = root.path().join("work");
        let products = root.path().join("DerivedData/Build/Products/Debug-iphoneos");
        let app = products.join("App.app");
        let dsym = products.join("App.app.dSYM");
        let developer = root.path().join("Xcode.app/Contents/Developer");

        fs::create_dir_all(work.join("App.xcodeproj")).unwrap();
        fs::create_dir_all(&app).unwrap();
        fs::write(app.join("App"), b"\xcf\xfa\xed\xfe").unwrap();
        fs::write(app.join("Info.plist"), b"<plist/>").unwrap();
        fs::create_dir_all(dsym.join("Contents/Resources/DWARF")).unwrap();
        fs::write(dsym.join("Contents/Resources/DWARF/App"), b"dwarf").unwrap();
        fs::create_dir_all(&developer).unwrap();

        Self {
            root,
            work,
            products,
            app,
            dsym,
            developer,
        }
    }

    /// Add `Frameworks/<name>` to the app and the matching toolchain dylib.
    pub fn with_swift_library(self, name: &str) -> Self {
        fs::create_dir_all(self.app.join("Frameworks")).unwrap();
        fs::write(self.app.join("Frameworks").join(name), b"app").unwrap();

        let toolchain = self
            .developer
            .join("Toolchains/XcodeDefault.xctoolchain/usr/lib/swift/iphoneos");
        fs::create_dir_all(&toolchain).unwrap();
        fs::write(toolchain.join(name), b"toolchain").unwrap();
        self
    }

    /// Settings fixture with `{{PRODUCTS}}` filled in.
    pub fn settings(&self, name: &str) -> String {
        xcodebuild_output(name).replace("{{PRODUCTS}}", &self.products.display().to_string())
    }

    /// A runner answering every tool the pipeline calls, successfully.
    pub fn runner(&self) -> ScriptedRunner {
        self.runner_with(Script::default())
    }

    pub fn runner_with(&self, script: Script) -> ScriptedRunner {
        let settings = self.settings(script.settings);
        let first_settings = script.first_settings.unwrap_or_else(|| settings.clone());
        let queries = AtomicUsize::new(0);
        let app = self.app.clone();
        let select = script
            .select
            .unwrap_or_else(|| ToolOutput::ok(format!("{}\n", self.developer.display())));
        let build = script.build;

        ScriptedRunner::new()
            .on_stdout(Matcher::program("xcodebuild").arg("-version"), script.version)
            .on_stdout(Matcher::program("xcodebuild").arg("-list"), xcodebuild_output(script.list))
            .on(Matcher::program("xcodebuild").arg("-showBuildSettings"), move |_| {
                if queries.fetch_add(1, Ordering::SeqCst) == 0 {
                    ToolOutput::ok(first_settings.clone())
                } else {
                    ToolOutput::ok(settings.clone())
                }
            })
            .on(Matcher::program("xcodebuild"), move |_| build.clone())
            .on(Matcher::program("xcrun").arg("PackageApplication"), move |inv| {
                let output = inv.value_of("-o").expect("-o");
                archive::zip_dir(&app, Path::new(output)).unwrap();
                ToolOutput::ok("")
            })
            .on(Matcher::program("xcode-select").arg("--print-path"), move |_| select.clone())
    }
}

/// Knobs for [`Project::runner_with`].
pub struct Script {
    pub version: &'static str,
    pub list: &'static str,
    pub settings: &'static str,
    pub build: ToolOutput,
    /// Answer to the first settings query only; later queries get `settings`
    pub first_settings: Option<String>,
    /// `xcode-select --print-path`; defaults to the fake developer dir
    pub select: Option<ToolOutput>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            version: XCODE_VERSION,
            list: "list_project.txt",
            settings: "settings_app.txt",
            build: ToolOutput::ok(""),
            first_settings: None,
            select: None,
        }
    }
}
