//! Oracle based localization from the developer fix.

use super::SuspiciousLine;
use crate::error::{FixtureError, Result};
use crate::toolchain::{self, Invocation, ToolRunner};
use std::path::{Path, PathBuf};

/// Where the oracle script lives and where its output is cached.
#[derive(Debug, Clone)]
pub struct Oracle {
    /// `get_buggy_lines.sh <Project> <bug> <outDir>`
    pub script: PathBuf,
    pub cache_dir: PathBuf,
    /// Executable names used to derive the script's environment.
    pub defects4j: String,
    pub sloccount: String,
}

impl Oracle {
    pub fn cache_file(&self, project: &str, bug_nr: u32) -> PathBuf {
        self.cache_dir
            .join(format!("{}-{}.buggy.lines", project, bug_nr))
    }

    /// `D4J_HOME` and `SLOC_HOME` as the oracle script expects them.
    fn script_env(&self) -> Result<Vec<(String, String)>> {
        let defects4j = toolchain::resolve_executable(&self.defects4j)?;
        let sloccount = toolchain::resolve_executable(&self.sloccount)?;

        let d4j_home = defects4j
            .ancestors()
            .nth(3)
            .ok_or_else(|| FixtureError::MissingExecutable(self.defects4j.clone()))?;
        let sloc_home = sloccount
            .parent()
            .ok_or_else(|| FixtureError::MissingExecutable(self.sloccount.clone()))?;

        Ok(vec![
            ("D4J_HOME".to_string(), d4j_home.display().to_string()),
            ("SLOC_HOME".to_string(), sloc_home.display().to_string()),
        ])
    }

    /// Buggy lines of a bug, each with score 1.0.
    ///
    /// The cache file is reused when present and never invalidated.
    pub async fn localize(
        &self,
        runner: &ToolRunner,
        project: &str,
        bug_nr: u32,
        src_dir: &str,
    ) -> Result<Vec<SuspiciousLine>> {
        let cache_file = self.cache_file(project, bug_nr);
        tokio::fs::create_dir_all(&self.cache_dir)
            .await
            .map_err(FixtureError::fs(&self.cache_dir))?;

        let mut script_output = None;
        if cache_file.exists() {
            tracing::debug!("Re-using existing buggy lines file");
        } else {
            let mut invocation = Invocation::new(format!(
                "{} {} {} {}",
                self.script.display(),
                project,
                bug_nr,
                self.cache_dir.display()
            ));
            for (key, value) in self.script_env()? {
                invocation = invocation.env(key, value);
            }
            script_output = Some(runner.run(invocation).await?);
        }

        let content = tokio::fs::read_to_string(&cache_file)
            .await
            .map_err(FixtureError::fs(&cache_file))?;

        if content.trim().is_empty() {
            tokio::fs::remove_file(&cache_file)
                .await
                .map_err(FixtureError::fs(&cache_file))?;
            if let Some(ref output) = script_output {
                tracing::error!("command output:");
                tracing::error!("{}", toolchain::describe(output));
            }
            return Err(FixtureError::EmptyOracle(format!("{}-{}", project, bug_nr)));
        }

        parse_oracle_lines(&content, src_dir)
    }
}

/// Parse `<relative-file>#<line>#<free text>` records.
pub fn parse_oracle_lines(content: &str, src_dir: &str) -> Result<Vec<SuspiciousLine>> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let malformed = || FixtureError::Malformed {
                what: "buggy lines record",
                line: line.to_string(),
            };
            let mut parts = line.splitn(3, '#');
            let file = parts.next().filter(|f| !f.is_empty()).ok_or_else(malformed)?;
            let line_nr = parts
                .next()
                .and_then(|nr| nr.trim().parse::<u32>().ok())
                .ok_or_else(malformed)?;

            let path = Path::new(src_dir).join(file);
            Ok(SuspiciousLine::new(path.to_string_lossy(), line_nr, 1.0))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn oracle(cache_dir: &Path) -> Oracle {
        Oracle {
            script: PathBuf::from("/nonexistent/get_buggy_lines.sh"),
            cache_dir: cache_dir.to_path_buf(),
            defects4j: "defects4j".to_string(),
            sloccount: "sloccount".to_string(),
        }
    }

    #[test]
    fn test_parse_oracle_lines() {
        let lines = parse_oracle_lines(
            "org/foo/Bar.java#42#  return a - b;\norg/foo/Bar.java#43#FAULT_OF_OMISSION\n\n",
            "src/main/java",
        )
        .unwrap();
        assert_eq!(
            lines,
            vec![
                SuspiciousLine::new("src/main/java/org/foo/Bar.java", 42, 1.0),
                SuspiciousLine::new("src/main/java/org/foo/Bar.java", 43, 1.0),
            ]
        );
    }

    #[test]
    fn test_parse_free_text_may_contain_separator() {
        let lines = parse_oracle_lines("A.java#7#if (x # y)", "src").unwrap();
        assert_eq!(lines, vec![SuspiciousLine::new("src/A.java", 7, 1.0)]);
    }

    #[test]
    fn test_parse_rejects_bad_line_number() {
        let err = parse_oracle_lines("A.java#seven#text", "src").unwrap_err();
        assert!(matches!(err, FixtureError::Malformed { .. }));
    }

    #[test]
    fn test_cache_file_name() {
        let oracle = oracle(Path::new("/work/buggy_lines"));
        assert_eq!(
            oracle.cache_file("Lang", 7),
            PathBuf::from("/work/buggy_lines/Lang-7.buggy.lines")
        );
    }

    #[tokio::test]
    async fn test_localize_reads_cached_oracle() {
        let cache_dir = tempfile::tempdir().unwrap();
        let oracle = oracle(cache_dir.path());
        std::fs::write(oracle.cache_file("Foo", 1), "src/Bar.java#42#off-by-one\n").unwrap();

        let runner = ToolRunner::new(Duration::from_secs(5));
        let lines = oracle.localize(&runner, "Foo", 1, "source").await.unwrap();
        assert_eq!(lines, vec![SuspiciousLine::new("source/src/Bar.java", 42, 1.0)]);
    }

    #[tokio::test]
    async fn test_empty_cache_is_deleted_and_fails() {
        let cache_dir = tempfile::tempdir().unwrap();
        let oracle = oracle(cache_dir.path());
        let cache_file = oracle.cache_file("Foo", 2);
        std::fs::write(&cache_file, "\n  \n").unwrap();

        let runner = ToolRunner::new(Duration::from_secs(5));
        let err = oracle.localize(&runner, "Foo", 2, "src").await.unwrap_err();
        assert!(matches!(err, FixtureError::EmptyOracle(_)));
        assert!(!cache_file.exists());
    }
}
