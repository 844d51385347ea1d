//! Fault localization.
//!
//! Two strategies produce suspicious lines for a bug: [`perfect`] reads the
//! lines changed by the developer fix from an oracle, [`spectrum`] ranks lines
//! by the ochiai score of a coverage run. Both feed [`rank`], which enforces the
//! ordering and non-emptiness the fixture descriptor relies on.

pub mod perfect;
pub mod resolver;
pub mod spectrum;

use crate::error::{FixtureError, Result};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// A candidate faulty line, relative to the fixture root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspiciousLine {
    pub file: String,
    pub line_nr: u32,
    pub sus_score: f64,
}

impl SuspiciousLine {
    pub fn new(file: impl Into<String>, line_nr: u32, sus_score: f64) -> Self {
        Self {
            file: file.into(),
            line_nr,
            sus_score,
        }
    }
}

/// How suspicious lines are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Lines touched by the developer fix, all with score 1.0.
    Perfect,
    /// Coverage based ranking.
    #[default]
    Spectrum,
}

impl Strategy {
    pub fn from_perfect_flag(perfect: bool) -> Self {
        if perfect {
            Self::Perfect
        } else {
            Self::Spectrum
        }
    }

    /// Suffix appended to fixture directory names.
    pub fn dir_suffix(&self) -> &'static str {
        match self {
            Self::Perfect => "_perfect",
            Self::Spectrum => "",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Perfect => write!(f, "perfect"),
            Self::Spectrum => write!(f, "spectrum"),
        }
    }
}

/// Deduplicate and order suspicious lines, most suspicious first.
///
/// Lines with equal scores keep the order in which they were discovered.
pub fn rank(lines: impl IntoIterator<Item = SuspiciousLine>) -> Result<Vec<SuspiciousLine>> {
    let mut seen: IndexSet<(String, u32, u64)> = IndexSet::new();
    let mut ranked: Vec<SuspiciousLine> = lines
        .into_iter()
        .filter(|line| seen.insert((line.file.clone(), line.line_nr, line.sus_score.to_bits())))
        .collect();

    if ranked.is_empty() {
        tracing::error!("Localization returned zero suspicious lines");
        return Err(FixtureError::EmptyLocalization);
    }

    ranked.sort_by(|a, b| b.sus_score.total_cmp(&a.sus_score));
    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_orders_descending() {
        let ranked = rank(vec![
            SuspiciousLine::new("src/A.java", 3, 0.2),
            SuspiciousLine::new("src/A.java", 7, 0.9),
            SuspiciousLine::new("src/B.java", 1, 0.5),
        ])
        .unwrap();
        let scores: Vec<f64> = ranked.iter().map(|l| l.sus_score).collect();
        assert_eq!(scores, vec![0.9, 0.5, 0.2]);
    }

    #[test]
    fn test_rank_ties_keep_discovery_order() {
        let ranked = rank(vec![
            SuspiciousLine::new("src/B.java", 9, 1.0),
            SuspiciousLine::new("src/A.java", 2, 1.0),
            SuspiciousLine::new("src/C.java", 4, 1.0),
        ])
        .unwrap();
        let files: Vec<&str> = ranked.iter().map(|l| l.file.as_str()).collect();
        assert_eq!(files, vec!["src/B.java", "src/A.java", "src/C.java"]);
    }

    #[test]
    fn test_rank_deduplicates_full_triples() {
        let ranked = rank(vec![
            SuspiciousLine::new("src/A.java", 2, 0.5),
            SuspiciousLine::new("src/A.java", 2, 0.5),
            SuspiciousLine::new("src/A.java", 2, 0.4),
        ])
        .unwrap();
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn test_rank_empty_is_an_error() {
        let err = rank(Vec::new()).unwrap_err();
        assert!(matches!(err, FixtureError::EmptyLocalization));
    }

    #[test]
    fn test_suspicious_line_serialization() {
        let json = serde_json::to_value(SuspiciousLine::new("src/Bar.java", 42, 1.0)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"file": "src/Bar.java", "lineNr": 42, "susScore": 1.0})
        );
    }

    #[test]
    fn test_strategy_dir_suffix() {
        assert_eq!(Strategy::from_perfect_flag(true).dir_suffix(), "_perfect");
        assert_eq!(Strategy::from_perfect_flag(false).dir_suffix(), "");
    }
}
