//! Spectrum based localization from a GZoltar coverage run.

use super::resolver::ClassNameResolver;
use super::SuspiciousLine;
use crate::error::{FixtureError, Result};
use crate::toolchain::gzoltar::{CoverageRun, Gzoltar};
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;

const TEST_RESULT_LINE: &str =
    r"^[a-z0-9]+(\.[a-z0-9]+)*\.[\w$]+#[\w\[\]=._\- ]+,(PASS|FAIL),.*$";

/// What the coverage run needs to know about a checked-out bug.
#[derive(Debug, Clone, Copy)]
pub struct SpectrumInput<'a> {
    /// Every test of the project version, as `Class::method`.
    pub all_tests: &'a [String],
    pub negative_tests: &'a [String],
    pub flaky_tests: &'a [String],
    pub test_classpath: &'a [String],
    pub relevant_classes: &'a [String],
    pub src_dir: &'a str,
    pub src_build_dir: &'a str,
}

/// Agent include patterns covering each relevant class and its nested classes.
pub fn instrumentation_includes(relevant_classes: &[String]) -> String {
    relevant_classes
        .iter()
        .map(|class| class.trim())
        .filter(|class| !class.is_empty())
        .flat_map(|class| {
            let escaped = class.replace('$', "\\$");
            [escaped.clone(), format!("{}\\$*", escaped)]
        })
        .collect::<Vec<_>>()
        .join(":")
}

/// One `JUNIT,<class>#<method>` line per non-flaky test.
pub fn test_selection_manifest(all_tests: &[String], flaky_tests: &[String]) -> String {
    let flaky: HashSet<&str> = flaky_tests.iter().map(String::as_str).collect();
    all_tests
        .iter()
        .filter(|test| !flaky.contains(test.as_str()))
        .map(|test| format!("JUNIT,{}\n", test.replace("::", "#")))
        .collect()
}

/// Check the outcomes of the coverage run against the declared oracle.
///
/// Every failing test must be a negative test and vice versa, and every
/// negative test must have run.
pub fn sanity_check(tests_csv: &str, all_tests: &[String], negative_tests: &[String]) -> Result<()> {
    let pattern = Regex::new(TEST_RESULT_LINE).map_err(|e| FixtureError::Malformed {
        what: "test result pattern",
        line: e.to_string(),
    })?;
    let universe: HashSet<&str> = all_tests.iter().map(String::as_str).collect();
    let negative: HashSet<&str> = negative_tests.iter().map(String::as_str).collect();

    let mut executed: HashSet<String> = HashSet::new();
    let mut failures = Vec::new();

    for line in tests_csv.lines().skip(1).map(str::trim) {
        // failure messages sometimes spill over into the next line
        if !pattern.is_match(line) {
            tracing::warn!("Skipping probably corrupted test result line '{}'", line);
            continue;
        }

        let mut fields = line.split(',');
        let name = fields.next().unwrap_or_default().replace('#', "::");
        let outcome = fields.next().unwrap_or_default();
        let class_name = name.split("::").next().unwrap_or_default().to_string();
        executed.insert(name.clone());

        if !universe.contains(name.as_str()) && !universe.contains(class_name.as_str()) {
            if name.starts_with("org.junit") {
                tracing::warn!("Ignoring result for testcase {}", name);
                continue;
            }
            tracing::error!("Encountered result for unexpected test {}", name);
            failures.push(format!("unexpected test {}", name));
            continue;
        }

        let expected_fail =
            negative.contains(name.as_str()) || negative.contains(class_name.as_str());
        if (outcome == "FAIL") != expected_fail {
            tracing::error!("Unexpected result {} for test {}", outcome, name);
            failures.push(format!("unexpected {} for test {}", outcome, name));
        }
    }

    for test in negative_tests {
        if !executed.contains(test) {
            tracing::error!("Test {} is missing in GZoltar report", test);
            failures.push(format!("test {} is missing in coverage report", test));
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        tracing::error!("Expected negative tests: {}", negative_tests.join(", "));
        Err(FixtureError::SanityCheck(failures))
    }
}

/// Parse an ochiai ranking into suspicious lines.
///
/// Rows look like `org.jsoup.helper$HttpConnection$Response#parse(int):123;0.5`.
/// Rows with score zero are dropped; every other row must resolve to an
/// existing source file under `fixture_root`.
pub fn parse_ranking(
    content: &str,
    src_dir: &str,
    fixture_root: &Path,
    resolver: &dyn ClassNameResolver,
) -> Result<Vec<SuspiciousLine>> {
    let mut lines = Vec::new();

    for row in content.lines().skip(1).map(str::trim) {
        if row.is_empty() {
            continue;
        }
        let malformed = || FixtureError::Malformed {
            what: "ranking row",
            line: row.to_string(),
        };

        let (name, score) = row.rsplit_once(';').ok_or_else(malformed)?;
        let sus_score: f64 = score.trim().parse().map_err(|_| malformed())?;
        if sus_score == 0.0 {
            continue;
        }

        let (method_ref, line_nr) = name.split_once(':').ok_or_else(malformed)?;
        let line_nr: u32 = line_nr.trim().parse().map_err(|_| malformed())?;

        let relative = resolver
            .source_file(method_ref)
            .ok_or_else(|| FixtureError::UnresolvedSource {
                path: method_ref.to_string(),
                entry: name.to_string(),
            })?;
        let file = Path::new(src_dir).join(relative);
        if !fixture_root.join(&file).exists() {
            tracing::error!(
                "Could not find java file {} for name {}",
                file.display(),
                name
            );
            return Err(FixtureError::UnresolvedSource {
                path: file.display().to_string(),
                entry: name.to_string(),
            });
        }

        lines.push(SuspiciousLine::new(file.to_string_lossy(), line_nr, sus_score));
    }

    Ok(lines)
}

/// Run the coverage analysis for a checked-out bug.
///
/// Each run gets its own scratch directory under `work_dir`, removed when the
/// run ends.
pub async fn localize(
    gzoltar: &Gzoltar<'_>,
    work_dir: &Path,
    fixture_root: &Path,
    input: &SpectrumInput<'_>,
    resolver: &dyn ClassNameResolver,
) -> Result<Vec<SuspiciousLine>> {
    gzoltar.ensure_built().await?;

    // the tools run from the fixture root, so scratch paths must be absolute
    let work_dir = std::path::absolute(work_dir).map_err(FixtureError::fs(work_dir))?;
    tokio::fs::create_dir_all(&work_dir)
        .await
        .map_err(FixtureError::fs(&work_dir))?;
    let scratch = tempfile::TempDir::with_prefix_in("gzoltar-", &work_dir)
        .map_err(FixtureError::fs(&work_dir))?;

    let tests_file = scratch.path().join("tests.txt");
    tokio::fs::write(
        &tests_file,
        test_selection_manifest(input.all_tests, input.flaky_tests),
    )
    .await
    .map_err(FixtureError::fs(&tests_file))?;

    let data_file = scratch.path().join("gzoltar.ser");
    let includes = instrumentation_includes(input.relevant_classes);
    gzoltar
        .run_tests(
            fixture_root,
            &CoverageRun {
                test_classpath: input.test_classpath,
                build_dir: input.src_build_dir,
                includes: &includes,
                tests_file: &tests_file,
                data_file: &data_file,
            },
        )
        .await?;

    let report = gzoltar
        .report(
            fixture_root,
            input.test_classpath,
            input.src_build_dir,
            &data_file,
            scratch.path(),
        )
        .await?;

    let tests_csv = tokio::fs::read_to_string(&report.tests)
        .await
        .map_err(FixtureError::fs(&report.tests))?;
    sanity_check(&tests_csv, input.all_tests, input.negative_tests)?;

    let ranking = tokio::fs::read_to_string(&report.ranking)
        .await
        .map_err(FixtureError::fs(&report.ranking))?;
    parse_ranking(&ranking, input.src_dir, fixture_root, resolver)
}
