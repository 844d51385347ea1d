//! Classpath canonicalization.
//!
//! The benchmark exports classpaths as flat, colon separated lists that mix
//! fixture-relative paths with absolute archives from local caches, and often
//! carry several versions of the same library. [`Canonicalizer`] turns such a
//! list into a short, portable one: duplicates removed, conflicting library
//! versions resolved against the project's own dependency metadata, and
//! external archives copied into the fixture's `lib/` directory.

pub mod manifest;

use crate::error::{FixtureError, Result};
use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

const MAVEN_LOCAL_REPO: &str = "${maven.repo.local}";

/// Settings for classpath canonicalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClasspathSettings {
    /// Directory suffix under which the benchmark ships its test framework jars.
    #[serde(default = "default_framework_lib_dir")]
    pub framework_lib_dir: String,

    /// Artifact id of the test framework whose bundled version always wins.
    #[serde(default = "default_test_framework")]
    pub test_framework: String,

    /// Prefix for archives copied into the fixture's `lib/` directory.
    #[serde(default = "default_inline_prefix")]
    pub inline_prefix: String,
}

fn default_framework_lib_dir() -> String {
    "defects4j/framework/projects/lib".to_string()
}

fn default_test_framework() -> String {
    "junit".to_string()
}

fn default_inline_prefix() -> String {
    "apr-inlined-".to_string()
}

impl Default for ClasspathSettings {
    fn default() -> Self {
        Self {
            framework_lib_dir: default_framework_lib_dir(),
            test_framework: default_test_framework(),
            inline_prefix: default_inline_prefix(),
        }
    }
}

pub struct Canonicalizer {
    root: PathBuf,
    settings: ClasspathSettings,
}

impl Canonicalizer {
    /// A relative `root` is resolved against the working directory.
    pub fn new(root: impl Into<PathBuf>, settings: ClasspathSettings) -> Self {
        let root = root.into();
        Self {
            root: std::path::absolute(&root).unwrap_or(root),
            settings,
        }
    }

    /// Canonicalize a raw classpath.
    ///
    /// Applying this to its own output yields the same list.
    pub fn canonicalize(&self, raw: &[String]) -> Result<Vec<String>> {
        tracing::debug!("Original classpath {:?}", raw);

        let mut entries: IndexSet<String> = raw
            .iter()
            .map(|entry| entry.trim())
            .filter(|entry| !entry.is_empty())
            .map(normalize)
            .collect();

        let mut preferred: IndexSet<(String, String)> = IndexSet::new();
        preferred.extend(self.framework_pins(&entries));
        preferred.extend(self.pom_pins(&entries)?);
        preferred.extend(self.ant_pins()?);

        let mut versions: IndexMap<&str, Vec<&str>> = IndexMap::new();
        for (artifact_id, version) in &preferred {
            versions.entry(artifact_id).or_default().push(version);
        }
        for (artifact_id, versions) in &versions {
            if versions.len() > 1 {
                tracing::warn!("Ambiguous versions {:?} for {}, keeping all", versions, artifact_id);
            }
            eliminate_conflicts(&mut entries, artifact_id, versions);
        }

        let entries: IndexSet<String> = entries
            .into_iter()
            .map(|entry| self.relativize(entry))
            .collect();

        let mut result = IndexSet::with_capacity(entries.len());
        for entry in entries {
            result.insert(self.inline(entry)?);
        }

        tracing::debug!("Simplified classpath {:?}", result);
        Ok(result.into_iter().collect())
    }

    /// Test framework jars bundled with the benchmark win over the project's own.
    fn framework_pins(&self, entries: &IndexSet<String>) -> Vec<(String, String)> {
        let framework = &self.settings.test_framework;
        let prefix = format!("{}-", framework);
        let Ok(pattern) = Regex::new(&format!(r"^{}-\d+\.\d+\.jar$", regex::escape(framework)))
        else {
            return Vec::new();
        };

        entries
            .iter()
            .map(Path::new)
            .filter(|path| {
                path.parent()
                    .is_some_and(|dir| dir.ends_with(&self.settings.framework_lib_dir))
            })
            .filter_map(|path| path.file_name()?.to_str())
            .filter(|file_name| pattern.is_match(file_name))
            .filter_map(|file_name| {
                let version = file_name.strip_prefix(&prefix)?.strip_suffix(".jar")?;
                Some((framework.clone(), version.to_string()))
            })
            .collect()
    }

    fn pom_pins(&self, entries: &IndexSet<String>) -> Result<Vec<(String, String)>> {
        let pom_path = self.root.join("pom.xml");
        if !pom_path.exists() {
            return Ok(Vec::new());
        }
        let pom = manifest::Pom::load(&pom_path)?;

        let mut pins = Vec::new();
        for (artifact_id, version) in pom.pinned_dependencies() {
            if artifact_id == self.settings.test_framework {
                continue;
            }

            let pattern = format!(
                "*/{artifact}/{version}/{artifact}*.jar",
                artifact = glob::Pattern::escape(artifact_id),
                version = glob::Pattern::escape(&version),
            );
            let Ok(pattern) = glob::Pattern::new(&pattern) else {
                continue;
            };

            let Some(matched) = entries.iter().find(|entry| pattern.matches(entry)) else {
                tracing::debug!("No classpath entry for {} {}", artifact_id, version);
                continue;
            };

            let pinned = file_name(matched)
                .and_then(|name| name.strip_prefix(artifact_id))
                .and_then(|rest| rest.strip_prefix('-'))
                .and_then(|rest| rest.strip_suffix(".jar"));
            if let Some(pinned) = pinned {
                pins.push((artifact_id.to_string(), pinned.to_string()));
            }
        }
        Ok(pins)
    }

    fn ant_pins(&self) -> Result<Vec<(String, String)>> {
        let build_path = self.root.join("maven-build.xml");
        if !build_path.exists() {
            return Ok(Vec::new());
        }

        let pins = manifest::ant_path_locations(&build_path)?
            .into_iter()
            .filter(|location| location.starts_with(MAVEN_LOCAL_REPO))
            .filter_map(|location| {
                let version_dir = Path::new(&location).parent()?;
                let version = version_dir.file_name()?.to_str()?.to_string();
                let artifact_id = version_dir.parent()?.file_name()?.to_str()?.to_string();
                Some((artifact_id, version))
            })
            .filter(|(artifact_id, _)| *artifact_id != self.settings.test_framework)
            .collect();
        Ok(pins)
    }

    fn relativize(&self, entry: String) -> String {
        match Path::new(&entry).strip_prefix(&self.root) {
            Ok(relative) if relative.as_os_str().is_empty() => ".".to_string(),
            Ok(relative) => relative.to_string_lossy().to_string(),
            Err(_) => entry,
        }
    }

    /// Copy an absolute archive into `lib/` and return its fixture-relative path.
    fn inline(&self, entry: String) -> Result<String> {
        let source = Path::new(&entry);
        if !source.is_absolute() || !entry.ends_with(".jar") {
            return Ok(entry);
        }
        let Some(name) = file_name(&entry) else {
            return Ok(entry);
        };

        let lib_dir = self.root.join("lib");
        std::fs::create_dir_all(&lib_dir).map_err(FixtureError::fs(&lib_dir))?;

        let jar_name = format!("{}{}", self.settings.inline_prefix, name);
        let target = lib_dir.join(&jar_name);
        if !target.exists() {
            let options = fs_extra::file::CopyOptions {
                overwrite: false,
                skip_exist: true,
                buffer_size: 64 * 1024,
            };
            fs_extra::file::copy(source, &target, &options).map_err(|e| FixtureError::Copy {
                from: source.to_path_buf(),
                to: target.clone(),
                reason: e.to_string(),
            })?;
            tracing::debug!("Inlined {}", entry);
        }

        Ok(format!("lib/{}", jar_name))
    }
}

/// Drop every version of `artifact_id` that is not one of the preferred ones.
///
/// When the metadata prefers several versions of one artifact, all of them stay.
fn eliminate_conflicts(entries: &mut IndexSet<String>, artifact_id: &str, versions: &[&str]) {
    let Ok(pattern) = Regex::new(&format!(r"^{}-\d+\.\d+.*\.jar$", regex::escape(artifact_id)))
    else {
        return;
    };
    let keep: Vec<String> = versions
        .iter()
        .map(|version| format!("{}-{}.jar", artifact_id, version))
        .collect();

    entries.retain(|entry| {
        let Some(name) = file_name(entry) else {
            return true;
        };
        if !pattern.is_match(name) || keep.iter().any(|k| k == name) {
            return true;
        }
        tracing::debug!("Removed superfluous JAR {}", entry);
        false
    });
}

fn file_name(entry: &str) -> Option<&str> {
    Path::new(entry).file_name()?.to_str()
}

/// Lexical normalization: collapses `.` components and trailing separators.
fn normalize(entry: &str) -> String {
    let normalized: PathBuf = Path::new(entry)
        .components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect();
    if normalized.as_os_str().is_empty() {
        ".".to_string()
    } else {
        normalized.to_string_lossy().to_string()
    }
}
