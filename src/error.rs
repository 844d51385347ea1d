//! Error types for fixture preparation.
//!
//! Every variant aborts the processing of the current bug. The batch driver
//! decides, based on the configured failure policy, whether that also aborts
//! the batch.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FixtureError>;

/// Coarse classification of a [`FixtureError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown project, missing executable, unusable JDK.
    Configuration,
    /// Non-zero exit, timeout or misbehaving external tool.
    ExternalTool,
    /// The localizer produced zero suspicious lines.
    LocalizationEmpty,
    /// Coverage run outcomes disagree with the declared oracle.
    SanityCheck,
    /// A fixture invariant was violated.
    Invariant,
    /// Filesystem or serialization failure.
    Io,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::ExternalTool => write!(f, "external_tool"),
            Self::LocalizationEmpty => write!(f, "localization_empty"),
            Self::SanityCheck => write!(f, "sanity_check"),
            Self::Invariant => write!(f, "invariant"),
            Self::Io => write!(f, "io"),
        }
    }
}

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("project \"{0}\" does not exist")]
    UnknownProject(String),

    #[error("could not find executable {0}")]
    MissingExecutable(String),

    #[error("could not find a valid Java 8 installation (tried {0}), try explicitly providing the Java 8 home")]
    NoJava8(PathBuf),

    #[error("command `{command}` failed with exit code {code:?}")]
    ToolFailed {
        command: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("command `{command}` timed out after {seconds} seconds")]
    ToolTimeout { command: String, seconds: u64 },

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("report generator wrote to stderr while generating the fault localization report:\n{0}")]
    ReportStderr(String),

    #[error("fault localization report file {0} is missing")]
    MissingReport(PathBuf),

    #[error("tests marked both as negative tests and flaky tests: {}", .0.join(", "))]
    NegativeTestsFlaky(Vec<String>),

    #[error("oracle output for {0} was empty, something went wrong while obtaining buggy lines")]
    EmptyOracle(String),

    #[error("localization returned zero suspicious lines")]
    EmptyLocalization,

    #[error("coverage sanity check failed:\n  {}", .0.join("\n  "))]
    SanityCheck(Vec<String>),

    #[error("could not find source file {path} for ranking entry {entry}")]
    UnresolvedSource { path: String, entry: String },

    #[error("malformed {what}: {line:?}")]
    Malformed { what: &'static str, line: String },

    #[error("failed to parse {path}: {source}")]
    Xml {
        path: PathBuf,
        #[source]
        source: quick_xml::Error,
    },

    #[error("failed to copy {from} to {to}: {reason}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },

    #[error("I/O error on {path}: {source}")]
    Fs {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl FixtureError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownProject(_) | Self::MissingExecutable(_) | Self::NoJava8(_) => {
                ErrorKind::Configuration
            }
            Self::ToolFailed { .. }
            | Self::ToolTimeout { .. }
            | Self::Spawn { .. }
            | Self::ReportStderr(_)
            | Self::MissingReport(_)
            | Self::EmptyOracle(_)
            | Self::Malformed { .. } => ErrorKind::ExternalTool,
            Self::EmptyLocalization => ErrorKind::LocalizationEmpty,
            Self::SanityCheck(_) => ErrorKind::SanityCheck,
            Self::NegativeTestsFlaky(_) | Self::UnresolvedSource { .. } => ErrorKind::Invariant,
            Self::Xml { .. } | Self::Copy { .. } | Self::Fs { .. } | Self::Io(_) | Self::Json(_) => {
                ErrorKind::Io
            }
        }
    }

    /// Attach a path to an I/O error.
    pub fn fs(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Fs { path, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            FixtureError::UnknownProject("Foo".into()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            FixtureError::ToolTimeout {
                command: "defects4j test".into(),
                seconds: 3600
            }
            .kind(),
            ErrorKind::ExternalTool
        );
        assert_eq!(
            FixtureError::EmptyLocalization.kind(),
            ErrorKind::LocalizationEmpty
        );
        assert_eq!(
            FixtureError::SanityCheck(vec![]).kind(),
            ErrorKind::SanityCheck
        );
        assert_eq!(
            FixtureError::NegativeTestsFlaky(vec!["a::b".into()]).kind(),
            ErrorKind::Invariant
        );
    }

    #[test]
    fn test_sanity_check_message_lists_failures() {
        let err = FixtureError::SanityCheck(vec![
            "unexpected PASS for test a.B::c".into(),
            "test a.B::d is missing in coverage report".into(),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("unexpected PASS for test a.B::c"));
        assert!(msg.contains("missing in coverage report"));
    }

    #[test]
    fn test_negative_flaky_message() {
        let err = FixtureError::NegativeTestsFlaky(vec!["a.B::c".into(), "a.B::d".into()]);
        assert_eq!(
            err.to_string(),
            "tests marked both as negative tests and flaky tests: a.B::c, a.B::d"
        );
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::SanityCheck.to_string(), "sanity_check");
        assert_eq!(ErrorKind::ExternalTool.to_string(), "external_tool");
    }
}
