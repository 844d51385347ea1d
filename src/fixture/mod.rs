//! The bug fixture: a checked-out buggy revision plus its `bug.json`
//! descriptor and `compile.sh` build script.

pub mod assembler;
pub mod update;

use crate::catalog::ProjectInfo;
use crate::error::{FixtureError, Result};
use crate::localize::{SuspiciousLine, Strategy};
use crate::toolchain::BENCHMARK_ENV;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const DESCRIPTOR_FILE: &str = "bug.json";
pub const BUILD_SCRIPT_FILE: &str = "compile.sh";
pub const ALL_TESTS_FILE: &str = "all_tests";

/// Contents of `bug.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BugFixture {
    pub src_dir: String,
    pub test_dir: String,
    pub source_build_dir: String,
    pub test_build_dir: String,
    pub compile_class_path: Vec<String>,
    pub test_class_path: Vec<String>,
    pub env: IndexMap<String, String>,
    pub flaky_tests: Vec<String>,
    /// Most suspicious first.
    pub buggy_lines: Vec<SuspiciousLine>,
    pub negative_tests: Vec<String>,
    pub positive_tests: Vec<String>,
}

impl BugFixture {
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(DESCRIPTOR_FILE);
        let content = std::fs::read_to_string(&path).map_err(FixtureError::fs(&path))?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn write(&self, root: &Path) -> Result<PathBuf> {
        let path = root.join(DESCRIPTOR_FILE);
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content).map_err(FixtureError::fs(&path))?;
        Ok(path)
    }
}

/// The environment tests of the benchmark are run with.
pub fn benchmark_env() -> IndexMap<String, String> {
    BENCHMARK_ENV
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// `<Project>_<bug:03>_buggy[_perfect]`
pub fn fixture_dir_name(project: &str, bug_nr: u32, strategy: Strategy) -> String {
    format!("{}_{:03}_buggy{}", project, bug_nr, strategy.dir_suffix())
}

/// Project name and bug number of a fixture directory name.
pub fn parse_fixture_dir_name(name: &str) -> Option<(&str, u32)> {
    let mut parts = name.split('_');
    let project = parts.next().filter(|p| !p.is_empty())?;
    let bug_nr = parts.next()?.parse().ok()?;
    Some((project, bug_nr))
}

/// Negative tests must not also be declared flaky by the project.
pub fn ensure_disjoint(negative_tests: &[String], project: &ProjectInfo) -> Result<()> {
    let overlap: Vec<String> = negative_tests
        .iter()
        .filter(|test| project.is_flaky(test))
        .cloned()
        .collect();

    if overlap.is_empty() {
        return Ok(());
    }
    tracing::error!("The following tests are marked both as negative tests and flaky tests:");
    for test in &overlap {
        tracing::error!("{}", test);
    }
    Err(FixtureError::NegativeTestsFlaky(overlap))
}

/// Every test that is not expected to fail, in universe order.
pub fn positive_tests(all_tests: &[String], negative_tests: &[String]) -> Vec<String> {
    let negative: HashSet<&str> = negative_tests.iter().map(String::as_str).collect();
    all_tests
        .iter()
        .filter(|test| !negative.contains(test.as_str()))
        .cloned()
        .collect()
}

/// Non-empty trimmed lines of an exported multi-line property.
pub fn property_lines(value: &str) -> Vec<String> {
    value
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

/// Parse the test runner's `method(class)` listing into `class::method` ids.
pub fn parse_all_tests(content: &str) -> Result<Vec<String>> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.strip_suffix(')')
                .and_then(|rest| rest.split_once('('))
                .map(|(method, class)| format!("{}::{}", class, method))
                .ok_or_else(|| FixtureError::Malformed {
                    what: "test listing",
                    line: line.to_string(),
                })
        })
        .collect()
}

/// Minimal script that rebuilds the fixture.
pub fn build_script(java_override: bool, compile_command: &str) -> String {
    let mut script = String::from("set -e\n");
    if java_override {
        script.push_str("export PATH=$JAVA_HOME/bin:$PATH\n");
    }
    script.push_str(compile_command);
    script.push('\n');
    script
}

pub fn write_build_script(root: &Path, content: &str) -> Result<PathBuf> {
    let path = root.join(BUILD_SCRIPT_FILE);
    std::fs::write(&path, content).map_err(FixtureError::fs(&path))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o744))
            .map_err(FixtureError::fs(&path))?;
    }

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_fixture_dir_name() {
        assert_eq!(fixture_dir_name("Lang", 7, Strategy::Spectrum), "Lang_007_buggy");
        assert_eq!(
            fixture_dir_name("Math", 105, Strategy::Perfect),
            "Math_105_buggy_perfect"
        );
    }

    #[test]
    fn test_parse_fixture_dir_name() {
        assert_eq!(parse_fixture_dir_name("Lang_007_buggy"), Some(("Lang", 7)));
        assert_eq!(
            parse_fixture_dir_name("Math_105_buggy_perfect"),
            Some(("Math", 105))
        );
        assert_eq!(parse_fixture_dir_name("README.md"), None);
        assert_eq!(parse_fixture_dir_name("_001_buggy"), None);
    }

    #[test]
    fn test_ensure_disjoint() {
        let negative = strings(&["a.B::c", "a.B::d"]);
        let project = ProjectInfo::new("Foo", 1).flaky(["a.B::e"]);
        assert!(ensure_disjoint(&negative, &project).is_ok());

        let project = ProjectInfo::new("Foo", 1).flaky(["a.B::d", "a.B::e"]);
        match ensure_disjoint(&negative, &project).unwrap_err() {
            FixtureError::NegativeTestsFlaky(tests) => assert_eq!(tests, strings(&["a.B::d"])),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_positive_tests() {
        let all = strings(&["a.B::c", "a.B::d", "a.C::e"]);
        assert_eq!(
            positive_tests(&all, &strings(&["a.B::d"])),
            strings(&["a.B::c", "a.C::e"])
        );
    }

    #[test]
    fn test_parse_all_tests() {
        let tests = parse_all_tests(
            "testAdd(org.foo.CalcTest)\n\ntestSub(org.foo.CalcTest)\n  testX(org.foo.Other$Inner)  \n",
        )
        .unwrap();
        assert_eq!(
            tests,
            strings(&[
                "org.foo.CalcTest::testAdd",
                "org.foo.CalcTest::testSub",
                "org.foo.Other$Inner::testX",
            ])
        );
        assert!(parse_all_tests("no parentheses here").is_err());
    }

    #[test]
    fn test_property_lines() {
        assert_eq!(
            property_lines(" a.B::c \n\na.B::d\n"),
            strings(&["a.B::c", "a.B::d"])
        );
        assert!(property_lines("").is_empty());
    }

    #[test]
    fn test_build_script() {
        assert_eq!(
            build_script(false, "defects4j compile"),
            "set -e\ndefects4j compile\n"
        );
        assert_eq!(
            build_script(true, "defects4j compile"),
            "set -e\nexport PATH=$JAVA_HOME/bin:$PATH\ndefects4j compile\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_build_script_mode() {
        use std::os::unix::fs::PermissionsExt;
        let temp_dir = tempfile::tempdir().unwrap();
        let path = write_build_script(temp_dir.path(), "set -e\n").unwrap();
        let mode = std::fs::metadata(path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o744);
    }

    #[test]
    fn test_descriptor_field_names() {
        let fixture = BugFixture {
            src_dir: "src/main/java".into(),
            test_dir: "src/test/java".into(),
            source_build_dir: "target/classes".into(),
            test_build_dir: "target/test-classes".into(),
            compile_class_path: strings(&["target/classes"]),
            test_class_path: strings(&["target/classes", "target/test-classes"]),
            env: benchmark_env(),
            flaky_tests: vec![],
            buggy_lines: vec![SuspiciousLine::new("src/main/java/A.java", 3, 1.0)],
            negative_tests: strings(&["a.ATest::x"]),
            positive_tests: vec![],
        };

        let temp_dir = tempfile::tempdir().unwrap();
        fixture.write(temp_dir.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(temp_dir.path().join(DESCRIPTOR_FILE)).unwrap(),
        )
        .unwrap();

        for key in [
            "srcDir",
            "testDir",
            "sourceBuildDir",
            "testBuildDir",
            "compileClassPath",
            "testClassPath",
            "env",
            "flakyTests",
            "buggyLines",
            "negativeTests",
            "positiveTests",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["env"]["TZ"], "America/Los_Angeles");
        assert_eq!(json["buggyLines"][0]["lineNr"], 3);

        assert_eq!(BugFixture::load(temp_dir.path()).unwrap(), fixture);
    }
}
