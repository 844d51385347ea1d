//! External tool invocation.
//!
//! Every external step (benchmark checkout, property export, test runs,
//! coverage instrumentation, report generation, oracle extraction) goes through
//! [`ToolRunner`], which runs a shell command with a timeout and captures its
//! output. A non-zero exit is an error unless the caller uses [`ToolRunner::probe`].

pub mod defects4j;
pub mod gzoltar;

use crate::error::{FixtureError, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

/// Locale and timezone variables the benchmark's tests expect.
pub const BENCHMARK_ENV: &[(&str, &str)] = &[
    ("TZ", "America/Los_Angeles"),
    ("LANG", "en_US.UTF-8"),
    ("LANGUAGE", "en_US"),
    ("LC_CTYPE", "en_US.UTF-8"),
    ("LC_NUMERIC", "en_US.UTF-8"),
    ("LC_TIME", "en_US.UTF-8"),
    ("LC_COLLATE", "en_US.UTF-8"),
    ("LC_MONETARY", "en_US.UTF-8"),
    ("LC_MESSAGES", "en_US.UTF-8"),
    ("LC_PAPER", "en_US.UTF-8"),
    ("LC_NAME", "en_US.UTF-8"),
    ("LC_ADDRESS", "en_US.UTF-8"),
    ("LC_TELEPHONE", "en_US.UTF-8"),
    ("LC_MEASUREMENT", "en_US.UTF-8"),
    ("LC_IDENTIFICATION", "en_US.UTF-8"),
];

const DEFAULT_JAVA8_HOME: &str = "/usr/lib/jvm/java-8-openjdk";

/// Captured result of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub command: String,
    /// Exit code, `None` when terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    fn into_failure(self) -> FixtureError {
        FixtureError::ToolFailed {
            command: self.command,
            code: self.code,
            stdout: self.stdout,
            stderr: self.stderr,
        }
    }
}

/// A command to run, with its working directory and extra environment.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub command: String,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl Invocation {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn benchmark_env(mut self) -> Self {
        self.env.extend(
            BENCHMARK_ENV
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        );
        self
    }
}

/// Runs shell commands with a fixed upper bound on their duration.
#[derive(Debug, Clone)]
pub struct ToolRunner {
    timeout: Duration,
    java_home: Option<PathBuf>,
}

impl ToolRunner {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            java_home: None,
        }
    }

    /// Prefix `PATH` with `<java_home>/bin` and export `JAVA_HOME` for every
    /// command run from now on.
    pub fn with_java_home(mut self, java_home: Option<PathBuf>) -> Self {
        self.java_home = java_home;
        self
    }

    pub fn java_home(&self) -> Option<&Path> {
        self.java_home.as_deref()
    }

    /// Run a command that must succeed.
    pub async fn run(&self, invocation: Invocation) -> Result<CommandOutput> {
        let output = self.probe(invocation).await?;
        if !output.success() {
            tracing::error!("{}", describe(&output));
            tracing::error!("Command failed");
            return Err(output.into_failure());
        }
        tracing::debug!("{}", describe(&output));
        Ok(output)
    }

    /// Run a command whose exit code the caller inspects itself.
    ///
    /// Spawn failures and timeouts are still errors.
    pub async fn probe(&self, invocation: Invocation) -> Result<CommandOutput> {
        tracing::debug!("Executing command {}", invocation.command);
        let start = Instant::now();

        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(&invocation.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // own group, so a timeout takes the tool's children down with the shell
        #[cfg(unix)]
        command.process_group(0);

        if let Some(ref cwd) = invocation.cwd {
            command.current_dir(cwd);
        }
        if let Some(ref java_home) = self.java_home {
            let path = std::env::var_os("PATH").unwrap_or_default();
            let mut paths = vec![java_home.join("bin")];
            paths.extend(std::env::split_paths(&path));
            if let Ok(joined) = std::env::join_paths(paths) {
                command.env("PATH", joined);
            }
            command.env("JAVA_HOME", java_home);
        }
        for (key, value) in &invocation.env {
            command.env(key, value);
        }

        let child = command.spawn().map_err(|source| FixtureError::Spawn {
            command: invocation.command.clone(),
            source,
        })?;

        let pid = child.id();
        let result = tokio::time::timeout(self.timeout, child.wait_with_output()).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(output)) => Ok(CommandOutput {
                command: invocation.command,
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                duration_ms,
            }),
            Ok(Err(source)) => Err(FixtureError::Spawn {
                command: invocation.command,
                source,
            }),
            Err(_) => {
                tracing::error!(
                    "Command `{}` timed out after {:?}",
                    invocation.command,
                    self.timeout
                );
                if let Some(pid) = pid {
                    kill_process_group(pid).await;
                }
                Err(FixtureError::ToolTimeout {
                    command: invocation.command,
                    seconds: self.timeout.as_secs(),
                })
            }
        }
    }
}

#[cfg(unix)]
async fn kill_process_group(pgid: u32) {
    let killed = Command::new("kill")
        .arg("-KILL")
        .arg("--")
        .arg(format!("-{}", pgid))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    if let Err(e) = killed {
        tracing::warn!("Failed to kill process group {}: {}", pgid, e);
    }
}

#[cfg(not(unix))]
async fn kill_process_group(_pgid: u32) {}

/// Multi-line summary of a finished command for the log.
pub fn describe(output: &CommandOutput) -> String {
    format!(
        "Command: \"{}\"\nExit code: {:?}\nDuration: {}ms\nStdout:\n{}\nStderr:\n{}",
        output.command, output.code, output.duration_ms, output.stdout, output.stderr
    )
}

/// Locate an executable on `PATH`.
pub fn resolve_executable(name: &str) -> Result<PathBuf> {
    which::which(name).map_err(|_| {
        tracing::error!("Could not find executable {}", name);
        FixtureError::MissingExecutable(name.to_string())
    })
}

fn is_java8_javac(output: &CommandOutput) -> bool {
    // javac reports its version on stderr
    output.success() && output.stderr.trim().starts_with("javac 1.8")
}

/// Decide which JDK to run the benchmark with.
///
/// Returns `None` when the `javac` on `PATH` already is Java 8, otherwise the
/// configured (or conventional) Java 8 home if it holds a Java 8 `javac`.
pub async fn java8_home_override(
    runner: &ToolRunner,
    javac: &str,
    configured: Option<&Path>,
) -> Result<Option<PathBuf>> {
    let default_javac = runner
        .probe(Invocation::new(format!("{} -version", javac)))
        .await;
    if matches!(default_javac, Ok(ref output) if is_java8_javac(output)) {
        return Ok(None);
    }

    let java_home = match configured {
        Some(path) => path.to_path_buf(),
        None => {
            tracing::info!("Using java home {}", DEFAULT_JAVA8_HOME);
            PathBuf::from(DEFAULT_JAVA8_HOME)
        }
    };

    let candidate = java_home.join("bin").join("javac");
    let output = runner
        .probe(Invocation::new(format!("{} -version", candidate.display())))
        .await?;
    if is_java8_javac(&output) {
        Ok(Some(java_home))
    } else {
        Err(FixtureError::NoJava8(java_home))
    }
}
