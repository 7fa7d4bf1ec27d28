//! Numeric helpers for the analysis pipeline: percentages, time buckets,
//! the time-efficiency score, and progression trends.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{AnalysisConfig, BucketWeights};
use crate::results::Outcome;

/// `part / whole * 100`, or 0 when `whole` is 0.
pub fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

/// `total / count`, or 0 when `count` is 0.
pub fn average_ms(total: u64, count: usize) -> u64 {
    if count == 0 {
        return 0;
    }
    total / count as u64
}

/// Speed band for one answered question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeBucket {
    Fast,
    Moderate,
    Slow,
}

/// Classify `elapsed_ms`: fast below the fast threshold, slow above the
/// slow threshold, moderate in between (both ends inclusive).
pub fn classify_time(elapsed_ms: u64, config: &AnalysisConfig) -> TimeBucket {
    if elapsed_ms < config.fast_threshold_ms {
        TimeBucket::Fast
    } else if elapsed_ms > config.slow_threshold_ms {
        TimeBucket::Slow
    } else {
        TimeBucket::Moderate
    }
}

/// Number of answered questions in each speed band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketCounts {
    pub fast: usize,
    pub moderate: usize,
    pub slow: usize,
}

impl BucketCounts {
    pub fn record(&mut self, bucket: TimeBucket) {
        match bucket {
            TimeBucket::Fast => self.fast += 1,
            TimeBucket::Moderate => self.moderate += 1,
            TimeBucket::Slow => self.slow += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.fast + self.moderate + self.slow
    }
}

/// Weighted share of fast/moderate/slow answers as a 0–100 integer.
/// 0 when nothing was answered.
pub fn time_efficiency(counts: &BucketCounts, weights: &BucketWeights) -> u32 {
    let total = counts.total();
    if total == 0 {
        return 0;
    }
    let weighted = counts.fast as f64 * weights.fast
        + counts.moderate as f64 * weights.moderate
        + counts.slow as f64 * weights.slow;
    (weighted / total as f64 * 100.0).round().clamp(0.0, 100.0) as u32
}

/// Correct-so-far / attempted-so-far after each answered question.
pub fn cumulative_accuracy(outcomes: &[Outcome]) -> Vec<f64> {
    let mut correct = 0usize;
    let mut attempted = 0usize;
    let mut trend = Vec::new();
    for outcome in outcomes {
        if !outcome.is_attempted() {
            continue;
        }
        attempted += 1;
        if *outcome == Outcome::Correct {
            correct += 1;
        }
        trend.push(percentage(correct, attempted));
    }
    trend
}

/// Average time per question over one slice of the attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentSpeed {
    /// 1-based segment number.
    pub segment: usize,
    pub questions: usize,
    pub average_time_ms: u64,
}

/// Split `times` into up to `segments` contiguous, near-equal slices and
/// average each one.
pub fn segment_speeds(times: &[u64], segments: usize) -> Vec<SegmentSpeed> {
    let n = times.len();
    let k = segments.min(n);
    (0..k)
        .map(|i| {
            let slice = &times[i * n / k..(i + 1) * n / k];
            SegmentSpeed {
                segment: i + 1,
                questions: slice.len(),
                average_time_ms: average_ms(slice.iter().sum(), slice.len()),
            }
        })
        .collect()
}

/// Direction of speed over the attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedTrend {
    Faster,
    Slower,
    Steady,
}

impl fmt::Display for SpeedTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeedTrend::Faster => write!(f, "faster"),
            SpeedTrend::Slower => write!(f, "slower"),
            SpeedTrend::Steady => write!(f, "steady"),
        }
    }
}

/// Compare the last segment against the first with a ±10% dead band.
pub fn speed_trend(segments: &[SegmentSpeed]) -> SpeedTrend {
    let (Some(first), Some(last)) = (segments.first(), segments.last()) else {
        return SpeedTrend::Steady;
    };
    if segments.len() < 2 {
        return SpeedTrend::Steady;
    }
    let first = first.average_time_ms as f64;
    let last = last.average_time_ms as f64;
    if last > first * 1.1 {
        SpeedTrend::Slower
    } else if last < first * 0.9 {
        SpeedTrend::Faster
    } else {
        SpeedTrend::Steady
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_of_zero_is_zero() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(3, 4), 75.0);
        assert!(percentage(0, 0).is_finite());
    }

    #[test]
    fn bucket_boundaries() {
        let config = AnalysisConfig::default();
        assert_eq!(classify_time(25_000, &config), TimeBucket::Fast);
        assert_eq!(classify_time(29_999, &config), TimeBucket::Fast);
        assert_eq!(classify_time(30_000, &config), TimeBucket::Moderate);
        assert_eq!(classify_time(90_000, &config), TimeBucket::Moderate);
        assert_eq!(classify_time(120_000, &config), TimeBucket::Moderate);
        assert_eq!(classify_time(150_000, &config), TimeBucket::Slow);
    }

    #[test]
    fn efficiency_one_per_bucket_is_67() {
        let counts = BucketCounts {
            fast: 1,
            moderate: 1,
            slow: 1,
        };
        assert_eq!(time_efficiency(&counts, &BucketWeights::default()), 67);
    }

    #[test]
    fn efficiency_extremes() {
        let weights = BucketWeights::default();
        assert_eq!(time_efficiency(&BucketCounts::default(), &weights), 0);
        let all_fast = BucketCounts {
            fast: 5,
            ..Default::default()
        };
        assert_eq!(time_efficiency(&all_fast, &weights), 100);
        let all_slow = BucketCounts {
            slow: 2,
            ..Default::default()
        };
        assert_eq!(time_efficiency(&all_slow, &weights), 30);
    }

    #[test]
    fn cumulative_accuracy_skips_unattempted() {
        let trend = cumulative_accuracy(&[
            Outcome::Correct,
            Outcome::Incorrect,
            Outcome::Unattempted,
            Outcome::Correct,
        ]);
        assert_eq!(trend.len(), 3);
        assert_eq!(trend[0], 100.0);
        assert_eq!(trend[1], 50.0);
        assert!((trend[2] - 66.666).abs() < 0.01);
    }

    #[test]
    fn segments_cover_every_question() {
        let times = [10, 20, 30, 40, 50];
        let segments = segment_speeds(&times, 4);
        assert_eq!(segments.len(), 4);
        assert_eq!(segments.iter().map(|s| s.questions).sum::<usize>(), 5);
        assert_eq!(segments[0].average_time_ms, 10);
        assert_eq!(segments[3].average_time_ms, 45);

        let short = segment_speeds(&[100, 200], 4);
        assert_eq!(short.len(), 2);
        assert!(segment_speeds(&[], 4).is_empty());
    }

    #[test]
    fn speed_trend_uses_dead_band() {
        let seg = |segment, avg| SegmentSpeed {
            segment,
            questions: 1,
            average_time_ms: avg,
        };
        assert_eq!(speed_trend(&[seg(1, 100), seg(2, 150)]), SpeedTrend::Slower);
        assert_eq!(speed_trend(&[seg(1, 100), seg(2, 50)]), SpeedTrend::Faster);
        assert_eq!(speed_trend(&[seg(1, 100), seg(2, 105)]), SpeedTrend::Steady);
        assert_eq!(speed_trend(&[seg(1, 100)]), SpeedTrend::Steady);
        assert_eq!(speed_trend(&[]), SpeedTrend::Steady);
    }
}
