use crate::classpath::ClasspathSettings;
use crate::fixture::assembler::FailurePolicy;
use crate::localize::perfect::Oracle;
use crate::toolchain::gzoltar::GzoltarInstall;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// Output and scratch directories
    #[serde(default)]
    pub paths: PathsConfig,

    /// External executables and how they are run
    #[serde(default)]
    pub toolchain: ToolchainConfig,

    /// Coverage tool installation
    #[serde(default)]
    pub gzoltar: GzoltarConfig,

    /// Oracle line extraction
    #[serde(default)]
    pub oracle: OracleConfig,

    #[serde(default)]
    pub classpath: ClasspathSettings,

    #[serde(default)]
    pub batch: BatchConfig,

    /// Data directory (default root for every other path)
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Where fixtures are written
    #[serde(default)]
    pub bugs_dir: Option<PathBuf>,

    /// Scratch space for coverage runs and the oracle cache
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolchainConfig {
    #[serde(default = "default_defects4j")]
    pub defects4j: String,

    #[serde(default = "default_java")]
    pub java: String,

    #[serde(default = "default_javac")]
    pub javac: String,

    #[serde(default = "default_mvn")]
    pub mvn: String,

    #[serde(default = "default_sloccount")]
    pub sloccount: String,

    /// Java 8 home used when the default `javac` is not Java 8
    #[serde(default)]
    pub java8_home: Option<PathBuf>,

    /// Upper bound for every external command
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GzoltarConfig {
    /// GZoltar source checkout
    #[serde(default)]
    pub home: Option<PathBuf>,

    #[serde(default = "default_gzoltar_version")]
    pub version: String,

    #[serde(default)]
    pub hamcrest_jar: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OracleConfig {
    /// `get_buggy_lines.sh` from the fault localization data set
    #[serde(default)]
    pub script: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchConfig {
    /// What `load-many` does when a bug fails
    #[serde(default)]
    pub on_failure: FailurePolicy,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_defects4j() -> String {
    "defects4j".to_string()
}

fn default_java() -> String {
    "java".to_string()
}

fn default_javac() -> String {
    "javac".to_string()
}

fn default_mvn() -> String {
    "mvn".to_string()
}

fn default_sloccount() -> String {
    "sloccount".to_string()
}

fn default_timeout_seconds() -> u64 {
    3600 // one hour
}

fn default_gzoltar_version() -> String {
    "1.7.4-SNAPSHOT".to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            defects4j: default_defects4j(),
            java: default_java(),
            javac: default_javac(),
            mvn: default_mvn(),
            sloccount: default_sloccount(),
            java8_home: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Default for GzoltarConfig {
    fn default() -> Self {
        Self {
            home: None,
            version: default_gzoltar_version(),
            hamcrest_jar: None,
        }
    }
}

impl Config {
    /// Load configuration from file, or create default if not found
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(PathBuf::from).or_else(Self::default_config_path);

        let config = if let Some(ref path) = config_path {
            if path.exists() {
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config from {:?}", path))?;
                toml::from_str(&contents)
                    .with_context(|| format!("Failed to parse config from {:?}", path))?
            } else {
                Config::default()
            }
        } else {
            Config::default()
        };

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let config_path = path
            .map(PathBuf::from)
            .or_else(Self::default_config_path)
            .context("No config path available")?;

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config to {:?}", config_path))?;

        Ok(config_path)
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "apr-prep", "apr-prep")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            ProjectDirs::from("com", "apr-prep", "apr-prep")
                .map(|dirs| dirs.data_dir().to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".apr-prep"))
        })
    }

    /// Absolute, so fixture paths stay valid from any tool's working directory.
    pub fn bugs_dir(&self) -> PathBuf {
        absolute(
            self.paths
                .bugs_dir
                .clone()
                .unwrap_or_else(|| self.data_dir().join("bugs")),
        )
    }

    /// Absolute, like [`Config::bugs_dir`].
    pub fn work_dir(&self) -> PathBuf {
        absolute(
            self.paths
                .work_dir
                .clone()
                .unwrap_or_else(|| self.data_dir().join("temp")),
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.toolchain.timeout_seconds)
    }

    pub fn gzoltar_install(&self) -> GzoltarInstall {
        let data_dir = self.data_dir();
        GzoltarInstall {
            home: self
                .gzoltar
                .home
                .clone()
                .unwrap_or_else(|| data_dir.join("gzoltar")),
            version: self.gzoltar.version.clone(),
            hamcrest_jar: self
                .gzoltar
                .hamcrest_jar
                .clone()
                .unwrap_or_else(|| data_dir.join("lib").join("hamcrest-core-1.3.jar")),
            java: self.toolchain.java.clone(),
            mvn: self.toolchain.mvn.clone(),
        }
    }

    pub fn oracle(&self) -> Oracle {
        Oracle {
            script: self.oracle.script.clone().unwrap_or_else(|| {
                self.data_dir()
                    .join("fault-localization-data")
                    .join("d4j_integration")
                    .join("get_buggy_lines.sh")
            }),
            cache_dir: self.work_dir().join("buggy_lines"),
            defects4j: self.toolchain.defects4j.clone(),
            sloccount: self.toolchain.sloccount.clone(),
        }
    }
}

fn absolute(path: PathBuf) -> PathBuf {
    std::path::absolute(&path).unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_general_config() {
        let config = GeneralConfig::default();
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_default_toolchain_config() {
        let config = ToolchainConfig::default();
        assert_eq!(config.defects4j, "defects4j");
        assert_eq!(config.timeout_seconds, 3600);
        assert!(config.java8_home.is_none());
    }

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
[general]
log_level = "debug"

[toolchain]
timeout_seconds = 60
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.timeout(), Duration::from_secs(60));
        // Defaults should still apply
        assert_eq!(config.toolchain.javac, "javac");
        assert_eq!(config.gzoltar.version, "1.7.4-SNAPSHOT");
        assert_eq!(config.classpath.inline_prefix, "apr-inlined-");
        assert_eq!(config.batch.on_failure, FailurePolicy::Abort);
    }

    #[test]
    fn test_parse_batch_and_classpath() {
        let toml = r#"
[batch]
on_failure = "continue"

[classpath]
test_framework = "testng"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.batch.on_failure, FailurePolicy::Continue);
        assert_eq!(config.classpath.test_framework, "testng");
        assert_eq!(
            config.classpath.framework_lib_dir,
            "defects4j/framework/projects/lib"
        );
    }

    #[test]
    fn test_derived_paths() {
        let config = Config {
            data_dir: Some(PathBuf::from("/data")),
            ..Default::default()
        };
        assert_eq!(config.bugs_dir(), PathBuf::from("/data/bugs"));
        assert_eq!(config.work_dir(), PathBuf::from("/data/temp"));
        assert_eq!(
            config.oracle().cache_dir,
            PathBuf::from("/data/temp/buggy_lines")
        );
        assert_eq!(
            config.oracle().script,
            PathBuf::from("/data/fault-localization-data/d4j_integration/get_buggy_lines.sh")
        );

        let gzoltar = config.gzoltar_install();
        assert_eq!(gzoltar.home, PathBuf::from("/data/gzoltar"));
        assert_eq!(
            gzoltar.hamcrest_jar,
            PathBuf::from("/data/lib/hamcrest-core-1.3.jar")
        );
    }

    #[test]
    fn test_explicit_paths_win() {
        let toml = r#"
data_dir = "/data"

[paths]
bugs_dir = "/fixtures"
work_dir = "/scratch"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.bugs_dir(), PathBuf::from("/fixtures"));
        assert_eq!(config.oracle().cache_dir, PathBuf::from("/scratch/buggy_lines"));
    }

    #[test]
    fn test_relative_paths_are_made_absolute() {
        let toml = r#"
data_dir = ".apr-prep"

[paths]
bugs_dir = "bugs"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(config.bugs_dir(), cwd.join("bugs"));
        assert_eq!(config.work_dir(), cwd.join(".apr-prep").join("temp"));
        assert!(config.oracle().cache_dir.is_absolute());
    }

    #[test]
    fn test_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.toolchain.mvn, "mvn");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.toolchain.java8_home = Some(PathBuf::from("/opt/jdk8"));
        config.batch.on_failure = FailurePolicy::Continue;
        let written = config.save(Some(&path)).unwrap();
        assert_eq!(written, path);

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.toolchain.java8_home, Some(PathBuf::from("/opt/jdk8")));
        assert_eq!(loaded.batch.on_failure, FailurePolicy::Continue);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(&temp_dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.toolchain.timeout_seconds, 3600);
    }
}
