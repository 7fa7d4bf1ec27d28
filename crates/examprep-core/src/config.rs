//! Tunable thresholds for the analysis pipeline.
//!
//! Every field has a default, so a config file only needs the values it
//! changes.

use serde::{Deserialize, Serialize};

/// Configuration for [`crate::analysis::analyze_with`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Answers faster than this are "fast".
    #[serde(default = "default_fast_threshold")]
    pub fast_threshold_ms: u64,
    /// Answers slower than this are "slow".
    #[serde(default = "default_slow_threshold")]
    pub slow_threshold_ms: u64,
    /// Weights for the time-efficiency score.
    #[serde(default)]
    pub weights: BucketWeights,
    /// Number of segments in the speed progression.
    #[serde(default = "default_segments")]
    pub progression_segments: usize,
    #[serde(default)]
    pub recommendations: RecommendationRules,
}

fn default_fast_threshold() -> u64 {
    30_000
}
fn default_slow_threshold() -> u64 {
    120_000
}
fn default_segments() -> usize {
    4
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            fast_threshold_ms: default_fast_threshold(),
            slow_threshold_ms: default_slow_threshold(),
            weights: BucketWeights::default(),
            progression_segments: default_segments(),
            recommendations: RecommendationRules::default(),
        }
    }
}

/// Per-bucket weights used by the time-efficiency score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BucketWeights {
    #[serde(default = "default_fast_weight")]
    pub fast: f64,
    #[serde(default = "default_moderate_weight")]
    pub moderate: f64,
    #[serde(default = "default_slow_weight")]
    pub slow: f64,
}

fn default_fast_weight() -> f64 {
    1.0
}
fn default_moderate_weight() -> f64 {
    0.7
}
fn default_slow_weight() -> f64 {
    0.3
}

impl Default for BucketWeights {
    fn default() -> Self {
        Self {
            fast: default_fast_weight(),
            moderate: default_moderate_weight(),
            slow: default_slow_weight(),
        }
    }
}

/// Thresholds for the recommendation rules. Accuracies are percentages,
/// time efficiency is the 0–100 score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRules {
    /// Subject accuracy at or above this is a strength.
    #[serde(default = "default_strong")]
    pub strong_accuracy: f64,
    /// Subject accuracy below this needs work.
    #[serde(default = "default_weak")]
    pub weak_accuracy: f64,
    /// Time efficiency at or above this is a strength.
    #[serde(default = "default_good_time")]
    pub good_time_efficiency: u32,
    /// Time efficiency below this needs work.
    #[serde(default = "default_poor_time")]
    pub poor_time_efficiency: u32,
}

fn default_strong() -> f64 {
    80.0
}
fn default_weak() -> f64 {
    60.0
}
fn default_good_time() -> u32 {
    70
}
fn default_poor_time() -> u32 {
    50
}

impl Default for RecommendationRules {
    fn default() -> Self {
        Self {
            strong_accuracy: default_strong(),
            weak_accuracy: default_weak(),
            good_time_efficiency: default_good_time(),
            poor_time_efficiency: default_poor_time(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_thresholds() {
        let config = AnalysisConfig::default();
        assert_eq!(config.fast_threshold_ms, 30_000);
        assert_eq!(config.slow_threshold_ms, 120_000);
        assert_eq!(config.progression_segments, 4);
        assert_eq!(config.weights.moderate, 0.7);
        assert_eq!(config.recommendations.strong_accuracy, 80.0);
        assert_eq!(config.recommendations.poor_time_efficiency, 50);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config: AnalysisConfig = toml::from_str(
            r#"
fast_threshold_ms = 20000

[recommendations]
weak_accuracy = 50.0
"#,
        )
        .unwrap();
        assert_eq!(config.fast_threshold_ms, 20_000);
        assert_eq!(config.slow_threshold_ms, 120_000);
        assert_eq!(config.recommendations.weak_accuracy, 50.0);
        assert_eq!(config.recommendations.strong_accuracy, 80.0);
    }
}
