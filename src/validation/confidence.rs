// Tue Jan 13 2026 - Alex

use crate::config::ScoringConfig;
use crate::signature::SignatureMatch;

/// Heuristic score: how much was transformed, not whether the result is
/// semantically equivalent to the original program.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceScorer {
    baseline: u32,
    per_change: u32,
    weight_signatures: bool,
}

impl ConfidenceScorer {
    pub fn new() -> Self {
        Self::from_config(&ScoringConfig::default())
    }

    pub fn from_config(config: &ScoringConfig) -> Self {
        Self {
            baseline: config.baseline,
            per_change: config.per_change,
            weight_signatures: config.weight_signatures,
        }
    }

    /// `min(100, changes * per_change + baseline)`, plus signature weights
    /// when enabled. Non-decreasing in `changes_made`.
    pub fn score(&self, matches: &[SignatureMatch], changes_made: usize) -> u8 {
        let changes = u64::try_from(changes_made).unwrap_or(u64::MAX);
        let mut total = changes.saturating_mul(u64::from(self.per_change)).saturating_add(u64::from(self.baseline));
        if self.weight_signatures {
            let weights: u64 = matches.iter().map(|m| u64::from(m.weight)).sum();
            total = total.saturating_add(weights);
        }
        total.min(100) as u8
    }
}

impl Default for ConfidenceScorer {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn from_score(score: u8) -> Self {
        if score >= 80 {
            ConfidenceLevel::High
        } else if score > 50 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::High => "High",
            ConfidenceLevel::Medium => "Medium",
            ConfidenceLevel::Low => "Low",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::Family;

    fn moonsec() -> SignatureMatch {
        SignatureMatch {
            id: "moonsec_banner".to_string(),
            family: Family::MoonSec,
            weight: 10,
        }
    }

    #[test]
    fn test_baseline_and_cap() {
        let scorer = ConfidenceScorer::new();
        assert_eq!(scorer.score(&[], 0), 50);
        assert_eq!(scorer.score(&[], 1), 55);
        assert_eq!(scorer.score(&[], 10), 100);
        assert_eq!(scorer.score(&[], usize::MAX), 100);
    }

    #[test]
    fn test_monotonic_in_changes() {
        let scorer = ConfidenceScorer::new();
        let scores: Vec<u8> = (0..30).map(|n| scorer.score(&[moonsec()], n)).collect();
        assert!(scores.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_signature_weights_opt_in() {
        let plain = ConfidenceScorer::new();
        assert_eq!(plain.score(&[moonsec()], 0), 50);

        let weighted = ConfidenceScorer::from_config(&ScoringConfig {
            weight_signatures: true,
            ..ScoringConfig::default()
        });
        assert_eq!(weighted.score(&[moonsec()], 0), 60);
    }

    #[test]
    fn test_levels() {
        assert_eq!(ConfidenceLevel::from_score(50), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::from_score(65), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_score(100).as_str(), "High");
    }
}
