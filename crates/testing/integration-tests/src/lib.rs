//! Integration test utilities for the quill pipeline
//!
//! A [`Project`] is a set of modules written to a temporary directory as
//! JSON, compiled from disk through the driver and then run or checked for
//! the expected error.

use anyhow::{Context, Result};
use ql_ast::Module;
use ql_driver::{compile_files, Compilation, Evaluation};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Result of running a test project
#[derive(Debug)]
pub enum TestResult {
    /// The project behaved as expected
    Pass,
    /// It did not
    Fail {
        /// What went wrong
        reason: String,
    },
}

impl TestResult {
    /// Panic with the failure reason
    pub fn assert_pass(self) {
        if let Self::Fail { reason } = self {
            panic!("{reason}");
        }
    }

    /// Panic unless the project failed with a reason containing `pattern`
    pub fn assert_fail_contains(self, pattern: &str) {
        match self {
            Self::Pass => panic!("expected a failure mentioning `{pattern}`"),
            Self::Fail { reason } => assert!(reason.contains(pattern), "unexpected failure: {reason}"),
        }
    }
}

/// What a project should do
#[derive(Debug, Clone)]
pub enum Expected {
    /// Export `export` returns a value displayed as `display` and prints `output`
    Success {
        /// Export to call
        export: String,
        /// Display form of the result
        display: String,
        /// `console.log` lines
        output: Vec<String>,
    },
    /// Compilation fails with a message containing every pattern
    CompileError {
        /// Expected message fragments
        patterns: Vec<String>,
    },
}

/// A multi-module test project
#[derive(Debug)]
pub struct Project {
    /// Project name, also the directory name
    pub name: String,
    /// Modules in declaration order
    pub modules: Vec<Module>,
    /// Entry module
    pub entry: String,
    /// Expected behavior
    pub expected: Expected,
}

impl Project {
    /// Create an empty project whose entry module is `main`
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modules: Vec::new(),
            entry: "main".to_string(),
            expected: Expected::CompileError { patterns: Vec::new() },
        }
    }

    /// Add a module
    #[must_use]
    pub fn module(mut self, module: Module) -> Self {
        self.modules.push(module);
        self
    }

    /// Use `name` as the entry module
    #[must_use]
    pub fn entry(mut self, name: &str) -> Self {
        self.entry = name.to_string();
        self
    }

    /// Expect `export` to return a value displayed as `display`
    #[must_use]
    pub fn expect_success(mut self, export: &str, display: &str) -> Self {
        self.expected = Expected::Success {
            export: export.to_string(),
            display: display.to_string(),
            output: Vec::new(),
        };
        self
    }

    /// Expect these `console.log` lines from the successful run
    #[must_use]
    pub fn expect_output(mut self, lines: &[&str]) -> Self {
        if let Expected::Success { output, .. } = &mut self.expected {
            *output = lines.iter().map(|line| (*line).to_string()).collect();
        }
        self
    }

    /// Expect compilation to fail with a message containing each pattern
    #[must_use]
    pub fn expect_errors(mut self, patterns: &[&str]) -> Self {
        self.expected = Expected::CompileError {
            patterns: patterns.iter().map(|pattern| (*pattern).to_string()).collect(),
        };
        self
    }

    /// Write the modules and a configuration file, then compile from disk
    ///
    /// # Errors
    /// Returns an error if writing fails or the unit does not compile
    pub fn compile(&self) -> Result<Compilation> {
        let dir = TempDir::new().context("failed to create temporary directory")?;
        let root = dir.path().join(&self.name);
        fs::create_dir_all(&root)?;

        let mut paths: Vec<PathBuf> = Vec::with_capacity(self.modules.len());
        for module in &self.modules {
            let path = root.join(format!("{}.json", module.name));
            fs::write(&path, serde_json::to_string_pretty(module)?)
                .with_context(|| format!("failed to write {}", path.display()))?;
            paths.push(path);
        }
        let config = root.join("quill.toml");
        fs::write(&config, format!("entry = {:?}\n", self.entry))?;

        compile_files(Some(&config), &paths)
    }

    /// Run the project and compare against the expectation
    #[must_use]
    pub fn run(&self) -> TestResult {
        let fail = |reason: String| TestResult::Fail {
            reason: format!("{}: {reason}", self.name),
        };
        match (&self.expected, self.compile()) {
            (Expected::Success { export, display, output }, Ok(compilation)) => {
                let evaluation = match compilation.run(export) {
                    Ok(evaluation) => evaluation,
                    Err(error) => return fail(format!("`{export}` failed: {error}")),
                };
                check_evaluation(&evaluation, display, output).map_or(TestResult::Pass, fail)
            }
            (Expected::Success { .. }, Err(error)) => fail(format!("compilation failed: {error:#}")),
            (Expected::CompileError { .. }, Ok(_)) => fail("compiled, but errors were expected".to_string()),
            (Expected::CompileError { patterns }, Err(error)) => {
                let message = format!("{error:#}");
                patterns
                    .iter()
                    .find(|pattern| !message.contains(pattern.as_str()))
                    .map_or(TestResult::Pass, |pattern| {
                        fail(format!("error `{message}` does not mention `{pattern}`"))
                    })
            }
        }
    }
}

fn check_evaluation(evaluation: &Evaluation, display: &str, output: &[String]) -> Option<String> {
    if evaluation.display != display {
        return Some(format!("expected `{display}`, got `{}`", evaluation.display));
    }
    if evaluation.output != output {
        return Some(format!("expected output {output:?}, got {:?}", evaluation.output));
    }
    None
}
