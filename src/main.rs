mod catalog;
mod classpath;
mod config;
mod error;
mod fixture;
mod localize;
mod toolchain;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::fixture::assembler::{Assembler, BatchRequest, FailurePolicy, LoadOutcome};
use crate::localize::Strategy;
use crate::toolchain::ToolRunner;

#[derive(Parser)]
#[command(name = "apr-prep")]
#[command(version)]
#[command(about = "Prepare Defects4J bug fixtures for automated program repair")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Options shared by the loading commands.
#[derive(Args)]
struct LoadOptions {
    /// Directory fixtures are written to
    #[arg(long)]
    bugs_dir: Option<PathBuf>,

    /// Java 8 home to use when the default javac is not Java 8
    #[arg(long)]
    java8_home: Option<PathBuf>,

    /// Localize using the developer fix instead of coverage
    #[arg(long)]
    perfect: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Prepare a single bug
    Load {
        project: String,
        bug_nr: u32,

        #[command(flatten)]
        options: LoadOptions,
    },
    /// Prepare many bugs, one project or all of them
    LoadMany {
        /// Maximum number of bugs per project
        #[arg(short, default_value_t = 999)]
        n: u32,

        #[arg(long)]
        project: Option<String>,

        /// Reload bugs that already have a bug.json
        #[arg(long)]
        force: bool,

        /// Override the configured failure policy
        #[arg(long, value_enum)]
        on_failure: Option<FailurePolicy>,

        #[command(flatten)]
        options: LoadOptions,
    },
    /// Refresh flaky tests and remove newly blacklisted bugs
    Update {
        #[arg(long)]
        bugs_dir: Option<PathBuf>,
    },
    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn init_logging(config: &Config, verbose: bool) {
    let level = if verbose {
        "debug"
    } else {
        config.general.log_level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Apply command line overrides and build the assembler.
async fn assembler(mut config: Config, options: LoadOptions) -> anyhow::Result<(Assembler, Strategy)> {
    if let Some(bugs_dir) = options.bugs_dir {
        config.paths.bugs_dir = Some(bugs_dir);
    }
    if let Some(java8_home) = options.java8_home {
        config.toolchain.java8_home = Some(java8_home);
    }

    let runner = ToolRunner::new(config.timeout());
    let java_home = toolchain::java8_home_override(
        &runner,
        &config.toolchain.javac,
        config.toolchain.java8_home.as_deref(),
    )
    .await?;
    if let Some(ref home) = java_home {
        tracing::info!("Using Java 8 from {}", home.display());
    }

    let strategy = Strategy::from_perfect_flag(options.perfect);
    let runner = runner.with_java_home(java_home);
    Ok((Assembler::new(config, Catalog::builtin(), runner), strategy))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = cli.config.clone().or_else(Config::default_config_path);
    let config = Config::load(cli.config.as_deref())?;

    init_logging(&config, cli.verbose);
    tracing::debug!(
        "Config path: {}",
        config_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none, using defaults)".to_string())
    );

    match cli.command {
        Commands::Load {
            project,
            bug_nr,
            options,
        } => {
            let (assembler, strategy) = assembler(config, options).await?;
            match assembler
                .load(&project, bug_nr, strategy)
                .await
                .with_context(|| format!("Failed to load {} {}", project, bug_nr))?
            {
                LoadOutcome::Written(path) => {
                    tracing::info!("Fixture written to {}", path.display())
                }
                LoadOutcome::Deprecated => {}
            }
        }
        Commands::LoadMany {
            n,
            project,
            force,
            on_failure,
            options,
        } => {
            let policy = on_failure.unwrap_or(config.batch.on_failure);
            let (assembler, strategy) = assembler(config, options).await?;
            let summary = assembler
                .load_many(&BatchRequest {
                    limit: n,
                    project,
                    force,
                    strategy,
                    policy,
                })
                .await?;

            if !summary.failed.is_empty() {
                for (project, bug_nr, e) in &summary.failed {
                    tracing::error!("{} {}: {}", project, bug_nr, e);
                }
                anyhow::bail!("{} bug(s) failed to load", summary.failed.len());
            }
        }
        Commands::Update { bugs_dir } => {
            let bugs_dir = bugs_dir.unwrap_or_else(|| config.bugs_dir());
            let summary = fixture::update::update(&bugs_dir, &Catalog::builtin())
                .with_context(|| format!("Failed to update fixtures in {:?}", bugs_dir))?;
            tracing::info!(
                "Deleted {}, updated {}, unchanged {}",
                summary.deleted.len(),
                summary.updated.len(),
                summary.unchanged
            );
        }
        Commands::InitConfig { force } => {
            if let Some(ref path) = config_path {
                if path.exists() && !force {
                    anyhow::bail!("{:?} already exists, use --force to overwrite", path);
                }
            }
            let written = config.save(config_path.as_deref())?;
            tracing::info!("Wrote configuration to {}", written.display());
        }
    }

    Ok(())
}
