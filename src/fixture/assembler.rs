//! Per-bug fixture assembly and batch loading.

use super::{
    benchmark_env, build_script, ensure_disjoint, fixture_dir_name, parse_all_tests,
    positive_tests, property_lines, write_build_script, BugFixture, ALL_TESTS_FILE,
    DESCRIPTOR_FILE,
};
use crate::catalog::{Catalog, ProjectInfo};
use crate::classpath::Canonicalizer;
use crate::config::Config;
use crate::error::{FixtureError, Result};
use crate::localize::spectrum::{self, SpectrumInput};
use crate::localize::{self, Strategy, SuspiciousLine};
use crate::toolchain::defects4j::{BugStatus, Defects4j};
use crate::toolchain::gzoltar::Gzoltar;
use crate::toolchain::ToolRunner;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::Instrument;

/// What a batch does when one bug fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    #[default]
    Abort,
    Continue,
}

/// Result of loading a single bug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Fixture written to this directory.
    Written(PathBuf),
    /// The benchmark no longer ships this bug; nothing was written.
    Deprecated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Start,
    SanityChecked,
    CheckedOut,
    PropertiesExported,
    ClasspathCanonicalized,
    BuildValidated,
    Localized,
    DescriptorWritten,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::SanityChecked => "sanity_checked",
            Self::CheckedOut => "checked_out",
            Self::PropertiesExported => "properties_exported",
            Self::ClasspathCanonicalized => "classpath_canonicalized",
            Self::BuildValidated => "build_validated",
            Self::Localized => "localized",
            Self::DescriptorWritten => "descriptor_written",
        };
        write!(f, "{}", name)
    }
}

/// Properties exported from a checked-out revision.
#[derive(Debug, Clone)]
struct ExportedProperties {
    src_dir: String,
    test_dir: String,
    src_build_dir: String,
    test_build_dir: String,
    compile_class_path: String,
    test_class_path: String,
    negative_tests: Vec<String>,
    relevant_classes: Vec<String>,
}

/// Parameters of a `load-many` run.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    /// Maximum number of bugs per project.
    pub limit: u32,
    /// Restrict to one project; all catalog projects otherwise.
    pub project: Option<String>,
    /// Reload bugs that already have a descriptor.
    pub force: bool,
    pub strategy: Strategy,
    pub policy: FailurePolicy,
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub written: Vec<PathBuf>,
    pub deprecated: Vec<(String, u32)>,
    pub skipped: usize,
    pub failed: Vec<(String, u32, FixtureError)>,
}

pub struct Assembler {
    config: Config,
    catalog: Catalog,
    runner: ToolRunner,
}

impl Assembler {
    pub fn new(config: Config, catalog: Catalog, runner: ToolRunner) -> Self {
        Self {
            config,
            catalog,
            runner,
        }
    }

    pub fn fixture_dir(&self, project: &str, bug_nr: u32, strategy: Strategy) -> PathBuf {
        self.config
            .bugs_dir()
            .join(fixture_dir_name(project, bug_nr, strategy))
    }

    fn defects4j(&self) -> Defects4j<'_> {
        Defects4j::new(&self.runner, self.config.toolchain.defects4j.clone())
    }

    /// Load a single bug, replacing any existing fixture for it.
    pub async fn load(&self, project: &str, bug_nr: u32, strategy: Strategy) -> Result<LoadOutcome> {
        let info = self.catalog.resolve(project)?;
        if info.is_blacklisted(bug_nr) {
            tracing::warn!("This bug is on the D4J bug blacklist");
        }
        self.load_bug(info, bug_nr, strategy).await
    }

    /// Load up to `limit` bugs per project, skipping disabled projects,
    /// blacklisted bugs and, unless forced, bugs that already have a fixture.
    pub async fn load_many(&self, request: &BatchRequest) -> Result<BatchSummary> {
        let projects: Vec<&ProjectInfo> = match request.project {
            Some(ref name) => vec![self.catalog.resolve(name)?],
            None => self.catalog.projects().iter().collect(),
        };
        tracing::info!(
            "Loading up to {} bugs for project(s) {}",
            request.limit,
            projects
                .iter()
                .map(|p| p.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let mut summary = BatchSummary::default();
        for info in projects {
            if info.disabled {
                tracing::info!("Skipping {} as it is disabled", info.name);
                continue;
            }

            for bug_nr in info.bug_numbers(request.limit) {
                if info.is_blacklisted(bug_nr) {
                    tracing::info!("Skipping blacklisted bug {} {}", info.name, bug_nr);
                    summary.skipped += 1;
                    continue;
                }

                let root = self.fixture_dir(&info.name, bug_nr, request.strategy);
                if !request.force && root.join(DESCRIPTOR_FILE).exists() {
                    tracing::info!("Skipping {} {} as it already exists", info.name, bug_nr);
                    summary.skipped += 1;
                    continue;
                }

                match self.load_bug(info, bug_nr, request.strategy).await {
                    Ok(LoadOutcome::Written(path)) => summary.written.push(path),
                    Ok(LoadOutcome::Deprecated) => {
                        summary.deprecated.push((info.name.clone(), bug_nr))
                    }
                    Err(e) if request.policy == FailurePolicy::Continue => {
                        tracing::error!(
                            kind = %e.kind(),
                            "Failed to load {} {}: {}",
                            info.name,
                            bug_nr,
                            e
                        );
                        summary.failed.push((info.name.clone(), bug_nr, e));
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        tracing::info!(
            "Batch finished: {} written, {} deprecated, {} skipped, {} failed",
            summary.written.len(),
            summary.deprecated.len(),
            summary.skipped,
            summary.failed.len()
        );
        Ok(summary)
    }

    async fn load_bug(&self, info: &ProjectInfo, bug_nr: u32, strategy: Strategy) -> Result<LoadOutcome> {
        let span = tracing::info_span!("bug", project = %info.name, bug = bug_nr);
        self.assemble(info, bug_nr, strategy).instrument(span).await
    }

    async fn assemble(&self, info: &ProjectInfo, bug_nr: u32, strategy: Strategy) -> Result<LoadOutcome> {
        let mut stage = Stage::Start;
        tracing::info!("Loading {} {}", info.name, bug_nr);
        let d4j = self.defects4j();

        tracing::debug!("Sanity checking Defects4J installation...");
        if d4j.info(&info.name, bug_nr).await? == BugStatus::Deprecated {
            tracing::info!("Bug {} {} is deprecated, skipping", info.name, bug_nr);
            return Ok(LoadOutcome::Deprecated);
        }
        advance(&mut stage, Stage::SanityChecked);

        let root = self.fixture_dir(&info.name, bug_nr, strategy);
        self.checkout(&d4j, info, bug_nr, &root).await?;
        advance(&mut stage, Stage::CheckedOut);

        let props = export_properties(&d4j, &root).await?;
        ensure_disjoint(&props.negative_tests, info)?;
        advance(&mut stage, Stage::PropertiesExported);

        let compile_class_path = self.canonicalize(&root, &props.compile_class_path).await?;
        let test_class_path = self.canonicalize(&root, &props.test_class_path).await?;
        advance(&mut stage, Stage::ClasspathCanonicalized);

        tracing::debug!("Compiling and testing project...");
        d4j.test(&root).await?;
        let all_tests_path = root.join(ALL_TESTS_FILE);
        let all_tests = parse_all_tests(
            &tokio::fs::read_to_string(&all_tests_path)
                .await
                .map_err(FixtureError::fs(&all_tests_path))?,
        )?;
        tracing::debug!("Project version has {} tests in total", all_tests.len());
        advance(&mut stage, Stage::BuildValidated);

        let lines = match strategy {
            Strategy::Perfect => {
                tracing::debug!("Obtaining buggy lines using perfect localization...");
                self.config
                    .oracle()
                    .localize(&self.runner, &info.name, bug_nr, &props.src_dir)
                    .await?
            }
            Strategy::Spectrum => {
                tracing::debug!("Obtaining buggy lines using GZoltar...");
                self.localize_spectrum(info, &root, &props, &test_class_path, &all_tests)
                    .await?
            }
        };
        let buggy_lines = localize::rank(lines)?;
        tracing::debug!("Found {} suspicious lines", buggy_lines.len());
        advance(&mut stage, Stage::Localized);

        let fixture = BugFixture {
            positive_tests: positive_tests(&all_tests, &props.negative_tests),
            src_dir: props.src_dir,
            test_dir: props.test_dir,
            source_build_dir: props.src_build_dir,
            test_build_dir: props.test_build_dir,
            compile_class_path,
            test_class_path,
            env: benchmark_env(),
            flaky_tests: info.flaky_tests.clone(),
            buggy_lines,
            negative_tests: props.negative_tests,
        };
        fixture.write(&root)?;
        write_build_script(
            &root,
            &build_script(self.runner.java_home().is_some(), &d4j.compile_command()),
        )?;
        advance(&mut stage, Stage::DescriptorWritten);

        tracing::info!("Done");
        Ok(LoadOutcome::Written(root))
    }

    async fn checkout(
        &self,
        d4j: &Defects4j<'_>,
        info: &ProjectInfo,
        bug_nr: u32,
        root: &Path,
    ) -> Result<()> {
        tracing::debug!("Checking out project...");
        if root.exists() {
            tokio::fs::remove_dir_all(root)
                .await
                .map_err(FixtureError::fs(root))?;
        }
        let bugs_dir = self.config.bugs_dir();
        tokio::fs::create_dir_all(&bugs_dir)
            .await
            .map_err(FixtureError::fs(&bugs_dir))?;
        d4j.checkout(&info.name, bug_nr, root).await
    }

    async fn canonicalize(&self, root: &Path, raw: &str) -> Result<Vec<String>> {
        let canonicalizer = Canonicalizer::new(root, self.config.classpath.clone());
        let entries: Vec<String> = raw.split(':').map(String::from).collect();

        // file copies are synchronous
        tokio::task::spawn_blocking(move || canonicalizer.canonicalize(&entries))
            .await
            .map_err(|e| FixtureError::Io(std::io::Error::other(e)))?
    }

    async fn localize_spectrum(
        &self,
        info: &ProjectInfo,
        root: &Path,
        props: &ExportedProperties,
        test_class_path: &[String],
        all_tests: &[String],
    ) -> Result<Vec<SuspiciousLine>> {
        let install = self.config.gzoltar_install();
        let gzoltar = Gzoltar::new(&self.runner, &install);
        let input = SpectrumInput {
            all_tests,
            negative_tests: &props.negative_tests,
            flaky_tests: &info.flaky_tests,
            test_classpath: test_class_path,
            relevant_classes: &props.relevant_classes,
            src_dir: &props.src_dir,
            src_build_dir: &props.src_build_dir,
        };
        spectrum::localize(
            &gzoltar,
            &self.config.work_dir(),
            root,
            &input,
            &info.class_resolver(),
        )
        .await
    }
}

fn advance(stage: &mut Stage, next: Stage) {
    tracing::debug!(from = %stage, to = %next, "stage complete");
    *stage = next;
}

async fn export_properties(d4j: &Defects4j<'_>, root: &Path) -> Result<ExportedProperties> {
    tracing::debug!("Exporting project properties...");
    Ok(ExportedProperties {
        src_dir: d4j.export(root, "dir.src.classes").await?,
        test_dir: d4j.export(root, "dir.src.tests").await?,
        src_build_dir: d4j.export(root, "dir.bin.classes").await?,
        test_build_dir: d4j.export(root, "dir.bin.tests").await?,
        compile_class_path: d4j.export(root, "cp.compile").await?,
        test_class_path: d4j.export(root, "cp.test").await?,
        negative_tests: property_lines(&d4j.export(root, "tests.trigger").await?),
        relevant_classes: property_lines(&d4j.export(root, "classes.relevant").await?),
    })
}
