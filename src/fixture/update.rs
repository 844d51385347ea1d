//! In-place refresh of prepared fixtures after catalog changes.

use super::{parse_fixture_dir_name, DESCRIPTOR_FILE};
use crate::catalog::Catalog;
use crate::error::{FixtureError, Result};
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
pub struct UpdateSummary {
    pub deleted: Vec<PathBuf>,
    pub updated: Vec<PathBuf>,
    pub unchanged: usize,
}

/// Delete fixtures of disabled projects and blacklisted bugs, and rewrite
/// `flakyTests` of the remaining ones where it differs from the catalog.
///
/// Only `flakyTests` is touched; every other descriptor field, including its
/// key order, is preserved.
pub fn update(bugs_dir: &Path, catalog: &Catalog) -> Result<UpdateSummary> {
    let mut dirs: Vec<PathBuf> = std::fs::read_dir(bugs_dir)
        .map_err(FixtureError::fs(bugs_dir))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();

    let mut summary = UpdateSummary::default();
    for dir in dirs {
        let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some((project, bug_nr)) = parse_fixture_dir_name(name) else {
            tracing::warn!("Ignoring {} as it is not a fixture directory", name);
            continue;
        };
        let Some(info) = catalog.get(project) else {
            tracing::warn!("Ignoring {} as project {} is unknown", name, project);
            continue;
        };

        if info.disabled || info.is_blacklisted(bug_nr) {
            tracing::info!("Deleting bug dir {}", name);
            std::fs::remove_dir_all(&dir).map_err(FixtureError::fs(&dir))?;
            summary.deleted.push(dir);
            continue;
        }

        let descriptor = dir.join(DESCRIPTOR_FILE);
        if !descriptor.exists() {
            tracing::warn!("Ignoring {} as it has no {}", name, DESCRIPTOR_FILE);
            continue;
        }
        if refresh_flaky_tests(&descriptor, &info.flaky_tests)? {
            tracing::info!("Updating bug.json for bug {}", name);
            summary.updated.push(dir);
        } else {
            summary.unchanged += 1;
        }
    }

    Ok(summary)
}

/// Returns whether the descriptor was rewritten.
fn refresh_flaky_tests(descriptor: &Path, flaky_tests: &[String]) -> Result<bool> {
    let content = std::fs::read_to_string(descriptor).map_err(FixtureError::fs(descriptor))?;
    let mut data: serde_json::Value = serde_json::from_str(&content)?;

    let expected = serde_json::json!(flaky_tests);
    if data.get("flakyTests") == Some(&expected) {
        return Ok(false);
    }

    let Some(object) = data.as_object_mut() else {
        return Err(FixtureError::Malformed {
            what: "fixture descriptor",
            line: descriptor.display().to_string(),
        });
    };
    object.insert("flakyTests".to_string(), expected);
    std::fs::write(descriptor, serde_json::to_string_pretty(&data)?)
        .map_err(FixtureError::fs(descriptor))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ProjectInfo;
    use std::fs;

    fn write_fixture(bugs_dir: &Path, name: &str, flaky: &[&str]) -> PathBuf {
        let dir = bugs_dir.join(name);
        fs::create_dir_all(&dir).unwrap();
        let data = serde_json::json!({
            "srcDir": "src",
            "flakyTests": flaky,
            "buggyLines": [{"file": "src/A.java", "lineNr": 1, "susScore": 1.0}],
        });
        fs::write(dir.join(DESCRIPTOR_FILE), serde_json::to_string_pretty(&data).unwrap()).unwrap();
        dir
    }

    fn catalog() -> Catalog {
        Catalog::new(vec![
            ProjectInfo::new("Lang", 65).skip([2]).flaky(["a.BTest::x"]),
            ProjectInfo::new("Gone", 10).disabled(),
        ])
    }

    #[test]
    fn test_update_rewrites_only_differing_flaky_tests() {
        let bugs_dir = tempfile::tempdir().unwrap();
        let stale = write_fixture(bugs_dir.path(), "Lang_001_buggy", &[]);
        let current = write_fixture(bugs_dir.path(), "Lang_003_buggy", &["a.BTest::x"]);
        let before = fs::read_to_string(current.join(DESCRIPTOR_FILE)).unwrap();

        let summary = update(bugs_dir.path(), &catalog()).unwrap();
        assert_eq!(summary.updated, vec![stale.clone()]);
        assert_eq!(summary.unchanged, 1);

        let data: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(stale.join(DESCRIPTOR_FILE)).unwrap()).unwrap();
        assert_eq!(data["flakyTests"], serde_json::json!(["a.BTest::x"]));
        assert_eq!(data["buggyLines"][0]["lineNr"], 1);
        let keys: Vec<&String> = data.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["srcDir", "flakyTests", "buggyLines"]);

        assert_eq!(fs::read_to_string(current.join(DESCRIPTOR_FILE)).unwrap(), before);
    }

    #[test]
    fn test_update_deletes_blacklisted_and_disabled() {
        let bugs_dir = tempfile::tempdir().unwrap();
        let blacklisted = write_fixture(bugs_dir.path(), "Lang_002_buggy_perfect", &[]);
        let disabled = write_fixture(bugs_dir.path(), "Gone_004_buggy", &[]);
        let kept = write_fixture(bugs_dir.path(), "Lang_004_buggy", &["a.BTest::x"]);

        let summary = update(bugs_dir.path(), &catalog()).unwrap();
        assert_eq!(summary.deleted, vec![disabled.clone(), blacklisted.clone()]);
        assert!(!blacklisted.exists());
        assert!(!disabled.exists());
        assert!(kept.exists());
    }

    #[test]
    fn test_update_ignores_foreign_directories() {
        let bugs_dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(bugs_dir.path().join("notes")).unwrap();
        fs::create_dir_all(bugs_dir.path().join("Other_001_buggy")).unwrap();
        fs::create_dir_all(bugs_dir.path().join("Lang_005_buggy")).unwrap();
        fs::write(bugs_dir.path().join("README.md"), "hi").unwrap();

        let summary = update(bugs_dir.path(), &catalog()).unwrap();
        assert!(summary.deleted.is_empty());
        assert!(summary.updated.is_empty());
        assert!(bugs_dir.path().join("Other_001_buggy").exists());
    }
}
