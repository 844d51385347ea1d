//! Defects4J command-line wrapper.

use super::{Invocation, ToolRunner};
use crate::error::{FixtureError, Result};
use std::path::Path;

/// Whether the benchmark still ships a bug.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BugStatus {
    Active,
    Deprecated,
}

/// Thin wrapper around the `defects4j` executable.
#[derive(Debug, Clone)]
pub struct Defects4j<'a> {
    runner: &'a ToolRunner,
    executable: String,
}

impl<'a> Defects4j<'a> {
    pub fn new(runner: &'a ToolRunner, executable: impl Into<String>) -> Self {
        Self {
            runner,
            executable: executable.into(),
        }
    }

    /// Query the benchmark for a bug; deprecated bugs are reported, not failed.
    pub async fn info(&self, project: &str, bug_nr: u32) -> Result<BugStatus> {
        let output = self
            .runner
            .probe(Invocation::new(format!(
                "{} info -p {} -b {}",
                self.executable, project, bug_nr
            )))
            .await?;

        if output.success() {
            tracing::debug!("{}", output.stdout);
            return Ok(BugStatus::Active);
        }

        if is_deprecated_message(&output.stderr, project, bug_nr) {
            return Ok(BugStatus::Deprecated);
        }

        tracing::error!("{}", super::describe(&output));
        Err(FixtureError::ToolFailed {
            command: output.command,
            code: output.code,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    /// Check out the buggy revision into `work_dir`.
    pub async fn checkout(&self, project: &str, bug_nr: u32, work_dir: &Path) -> Result<()> {
        self.runner
            .run(Invocation::new(format!(
                "{} checkout -p {} -v {}b -w {}",
                self.executable,
                project,
                bug_nr,
                work_dir.display()
            )))
            .await?;
        Ok(())
    }

    /// Export a single project property from a checked-out revision.
    pub async fn export(&self, work_dir: &Path, property: &str) -> Result<String> {
        let output = self
            .runner
            .run(
                Invocation::new(format!("{} export -p {}", self.executable, property))
                    .cwd(work_dir),
            )
            .await?;
        Ok(strip_ant_output(&output.stdout))
    }

    /// Compile the project and run its full test suite.
    pub async fn test(&self, work_dir: &Path) -> Result<()> {
        self.runner
            .run(Invocation::new(format!("{} test", self.executable)).cwd(work_dir))
            .await?;
        Ok(())
    }

    /// The command a fixture's build script runs.
    pub fn compile_command(&self) -> String {
        format!("{} compile", self.executable)
    }
}

fn is_deprecated_message(stderr: &str, project: &str, bug_nr: u32) -> bool {
    stderr.starts_with(&format!(
        "Error: {}-{} is a deprecated bug",
        project, bug_nr
    ))
}

/// Drop the build tool's progress lines from exported output.
fn strip_ant_output(stdout: &str) -> String {
    stdout
        .lines()
        .filter(|line| !line.starts_with("Running ant"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
