//! Quality score computation.

use serde::{Deserialize, Serialize};

use crate::issue::{Issue, Severity, Source, Suppression};

/// Penalty weights for the 0..=100 quality score.
///
/// The penalty of an issue is `severity points × source factor`. Build,
/// type-check and syntax findings use `compiler_factor`; lint uses
/// `lint_factor`; dependency and config findings use `other_factor`. Each
/// flagged suppression costs `suppression`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoringWeights {
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
    pub compiler_factor: u32,
    pub lint_factor: u32,
    pub other_factor: u32,
    pub suppression: u32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            critical: 10,
            high: 5,
            medium: 2,
            low: 1,
            compiler_factor: 2,
            lint_factor: 1,
            other_factor: 1,
            suppression: 1,
        }
    }
}

impl ScoringWeights {
    /// Penalty for a single issue.
    pub fn weight(&self, source: Source, severity: Severity) -> u64 {
        let points = match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        };
        let factor = match source {
            Source::Build | Source::TypeCheck | Source::Syntax => self.compiler_factor,
            Source::Lint => self.lint_factor,
            Source::Dependency | Source::Config => self.other_factor,
        };
        u64::from(points) * u64::from(factor)
    }

    /// Computes `clamp(100 - Σ penalties, 0, 100)`.
    pub fn quality_score(&self, issues: &[Issue], suppressions: &[Suppression]) -> u8 {
        let issue_penalty: u64 = issues
            .iter()
            .map(|i| self.weight(i.source, i.severity))
            .sum();
        let flagged = suppressions.iter().filter(|s| s.should_flag).count() as u64;
        let penalty = issue_penalty.saturating_add(flagged * u64::from(self.suppression));
        100u64.saturating_sub(penalty.min(100)) as u8
    }
}
