//! GZoltar coverage agent and report generator.

use super::{Invocation, ToolRunner};
use crate::error::{FixtureError, Result};
use std::path::{Path, PathBuf};

/// Location and launch settings of a GZoltar build.
#[derive(Debug, Clone)]
pub struct GzoltarInstall {
    /// Root of the GZoltar source tree (built with maven when jars are missing).
    pub home: PathBuf,
    pub version: String,
    /// Hamcrest jar appended to every GZoltar classpath.
    pub hamcrest_jar: PathBuf,
    pub java: String,
    pub mvn: String,
}

impl GzoltarInstall {
    pub fn cli_jar(&self) -> PathBuf {
        self.home.join("com.gzoltar.cli").join("target").join(format!(
            "com.gzoltar.cli-{}-jar-with-dependencies.jar",
            self.version
        ))
    }

    pub fn agent_jar(&self) -> PathBuf {
        self.home
            .join("com.gzoltar.agent.rt")
            .join("target")
            .join(format!("com.gzoltar.agent.rt-{}-all.jar", self.version))
    }
}

/// The two files GZoltar's text formatter produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFiles {
    pub ranking: PathBuf,
    pub tests: PathBuf,
}

impl ReportFiles {
    pub fn in_dir(output_dir: &Path) -> Self {
        let txt = output_dir.join("sfl").join("txt");
        Self {
            ranking: txt.join("ochiai.ranking.csv"),
            tests: txt.join("tests.csv"),
        }
    }

    pub fn ensure_present(&self) -> Result<()> {
        for path in [&self.ranking, &self.tests] {
            if !path.exists() {
                return Err(FixtureError::MissingReport(path.clone()));
            }
        }
        Ok(())
    }
}

/// Inputs of a coverage-instrumented test run.
#[derive(Debug, Clone)]
pub struct CoverageRun<'a> {
    pub test_classpath: &'a [String],
    pub build_dir: &'a str,
    /// Colon separated include patterns for the agent.
    pub includes: &'a str,
    pub tests_file: &'a Path,
    pub data_file: &'a Path,
}

pub struct Gzoltar<'a> {
    runner: &'a ToolRunner,
    install: &'a GzoltarInstall,
}

impl<'a> Gzoltar<'a> {
    pub fn new(runner: &'a ToolRunner, install: &'a GzoltarInstall) -> Self {
        Self { runner, install }
    }

    /// Build GZoltar from source if either jar is missing.
    pub async fn ensure_built(&self) -> Result<()> {
        if self.install.cli_jar().exists() && self.install.agent_jar().exists() {
            return Ok(());
        }
        tracing::info!("Compiling GZoltar...");
        self.runner
            .run(
                Invocation::new(format!("{} clean install", self.install.mvn))
                    .cwd(&self.install.home),
            )
            .await?;
        tracing::info!("Compile OK");
        Ok(())
    }

    fn classpath(&self, test_classpath: &[String]) -> String {
        let mut entries: Vec<String> = test_classpath.to_vec();
        entries.push(self.install.hamcrest_jar.display().to_string());
        entries.push(self.install.cli_jar().display().to_string());
        entries.join(":")
    }

    pub fn run_tests_command(&self, run: &CoverageRun<'_>) -> String {
        format!(
            "{java} -javaagent:{agent}=destfile={data},buildlocation={build},includes=\"{includes}\",excludes=\"\",inclnolocationclasses=false,output=\"FILE\" \
             -cp {cp} com.gzoltar.cli.Main runTestMethods --testMethods {tests} --collectCoverage",
            java = self.install.java,
            agent = self.install.agent_jar().display(),
            data = run.data_file.display(),
            build = run.build_dir,
            includes = run.includes,
            cp = self.classpath(run.test_classpath),
            tests = run.tests_file.display(),
        )
    }

    pub fn report_command(
        &self,
        test_classpath: &[String],
        build_dir: &str,
        data_file: &Path,
        output_dir: &Path,
    ) -> String {
        let classpath = self.classpath(test_classpath);
        let data_file = data_file.display().to_string();
        let output_dir = output_dir.display().to_string();
        [
            self.install.java.as_str(),
            "-cp",
            classpath.as_str(),
            "com.gzoltar.cli.Main",
            "faultLocalizationReport",
            "--buildLocation",
            build_dir,
            "--granularity",
            "line",
            "--inclPublicMethods",
            "--inclStaticConstructors",
            "--inclDeprecatedMethods",
            "--dataFile",
            data_file.as_str(),
            "--outputDirectory",
            output_dir.as_str(),
            "--family",
            "sfl",
            "--formula",
            "ochiai",
            "--metric",
            "entropy",
            "--formatter",
            "txt",
        ]
        .join(" ")
    }

    /// Run the selected tests under the coverage agent.
    ///
    /// Output on stderr is tolerated here; the tests themselves may log.
    pub async fn run_tests(&self, fixture_root: &Path, run: &CoverageRun<'_>) -> Result<()> {
        let output = self
            .runner
            .run(
                Invocation::new(self.run_tests_command(run))
                    .cwd(fixture_root)
                    .benchmark_env(),
            )
            .await?;
        if !output.stderr.is_empty() {
            tracing::warn!(
                "GZoltar wrote {} lines to stderr while executing tests",
                output.stderr.lines().count()
            );
        }
        Ok(())
    }

    /// Generate the line-level ochiai ranking into `output_dir`.
    pub async fn report(
        &self,
        fixture_root: &Path,
        test_classpath: &[String],
        build_dir: &str,
        data_file: &Path,
        output_dir: &Path,
    ) -> Result<ReportFiles> {
        let output = self
            .runner
            .run(
                Invocation::new(self.report_command(
                    test_classpath,
                    build_dir,
                    data_file,
                    output_dir,
                ))
                .cwd(fixture_root)
                .benchmark_env(),
            )
            .await?;
        if !output.stderr.is_empty() {
            return Err(FixtureError::ReportStderr(output.stderr));
        }

        let files = ReportFiles::in_dir(output_dir);
        files.ensure_present()?;
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn install() -> GzoltarInstall {
        GzoltarInstall {
            home: PathBuf::from("/opt/gzoltar"),
            version: "1.7.4-SNAPSHOT".to_string(),
            hamcrest_jar: PathBuf::from("/opt/lib/hamcrest-core-1.3.jar"),
            java: "java".to_string(),
            mvn: "mvn".to_string(),
        }
    }

    #[test]
    fn test_jar_locations() {
        let install = install();
        assert_eq!(
            install.cli_jar(),
            PathBuf::from("/opt/gzoltar/com.gzoltar.cli/target/com.gzoltar.cli-1.7.4-SNAPSHOT-jar-with-dependencies.jar")
        );
        assert_eq!(
            install.agent_jar(),
            PathBuf::from("/opt/gzoltar/com.gzoltar.agent.rt/target/com.gzoltar.agent.rt-1.7.4-SNAPSHOT-all.jar")
        );
    }

    #[test]
    fn test_run_tests_command() {
        let runner = ToolRunner::new(Duration::from_secs(1));
        let install = install();
        let gzoltar = Gzoltar::new(&runner, &install);
        let classpath = vec!["build/classes".to_string(), "lib/junit.jar".to_string()];
        let command = gzoltar.run_tests_command(&CoverageRun {
            test_classpath: &classpath,
            build_dir: "build/classes",
            includes: "pkg.Bar:pkg.Bar\\$*",
            tests_file: Path::new("/tmp/gz/tests.txt"),
            data_file: Path::new("/tmp/gz/gzoltar.ser"),
        });

        assert!(command.starts_with("java -javaagent:/opt/gzoltar/com.gzoltar.agent.rt/target/"));
        assert!(command.contains("destfile=/tmp/gz/gzoltar.ser,buildlocation=build/classes,"));
        assert!(command.contains("includes=\"pkg.Bar:pkg.Bar\\$*\""));
        assert!(command.contains(
            "-cp build/classes:lib/junit.jar:/opt/lib/hamcrest-core-1.3.jar:/opt/gzoltar/com.gzoltar.cli/"
        ));
        assert!(command.ends_with("runTestMethods --testMethods /tmp/gz/tests.txt --collectCoverage"));
    }

    #[test]
    fn test_report_command_flags() {
        let runner = ToolRunner::new(Duration::from_secs(1));
        let install = install();
        let gzoltar = Gzoltar::new(&runner, &install);
        let command = gzoltar.report_command(
            &["build/classes".to_string()],
            "build/classes",
            Path::new("/tmp/gz/gzoltar.ser"),
            Path::new("/tmp/gz"),
        );
        for flag in [
            "faultLocalizationReport",
            "--granularity line",
            "--inclPublicMethods",
            "--inclStaticConstructors",
            "--inclDeprecatedMethods",
            "--family sfl",
            "--formula ochiai",
            "--metric entropy",
            "--formatter txt",
            "--outputDirectory /tmp/gz",
        ] {
            assert!(command.contains(flag), "missing {flag} in {command}");
        }
    }

    #[test]
    fn test_report_files_missing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let files = ReportFiles::in_dir(temp_dir.path());
        assert!(matches!(
            files.ensure_present(),
            Err(FixtureError::MissingReport(_))
        ));

        std::fs::create_dir_all(temp_dir.path().join("sfl/txt")).unwrap();
        std::fs::write(&files.ranking, "name;suspiciousness_value\n").unwrap();
        std::fs::write(&files.tests, "name,outcome,runtime,stacktrace\n").unwrap();
        assert!(files.ensure_present().is_ok());
    }
}
