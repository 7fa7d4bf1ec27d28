//! Performance analysis: turns a scored attempt plus question metadata into
//! subject, time, difficulty, and progression analytics.
//!
//! Missing or unrecognized metadata never fails the report. The affected
//! question is left out of the aggregation that needs the field, and the
//! gap is recorded in [`AnalysisDiagnostics`].

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::config::AnalysisConfig;
use crate::error::{AnalysisIssue, MetadataField};
use crate::model::{Difficulty, QuestionMetadata};
use crate::recommendations::{recommend, Recommendations};
use crate::results::{AttemptResult, Outcome, QuestionOutcome};
use crate::statistics::{
    average_ms, classify_time, cumulative_accuracy, percentage, segment_speeds, speed_trend,
    time_efficiency, BucketCounts, SegmentSpeed, SpeedTrend,
};

/// Full analytics for one attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisData {
    pub test_id: String,
    pub attempt_id: Uuid,
    pub overall_score: f64,
    pub max_score: f64,
    pub total_questions: usize,
    pub correct_answers: usize,
    pub incorrect_answers: usize,
    pub unattempted: usize,
    /// Correct/attempted, in percent.
    pub accuracy: f64,
    pub time_taken_ms: u64,
    pub subject_performance: Vec<SubjectPerformance>,
    pub time_analysis: TimeAnalysis,
    pub difficulty_analysis: DifficultyAnalysis,
    /// Present only when the attempt recorded its answer order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progression_metrics: Option<ProgressionMetrics>,
    pub recommendations: Recommendations,
    #[serde(default)]
    pub diagnostics: AnalysisDiagnostics,
}

/// Aggregates for one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectPerformance {
    pub subject: String,
    pub total_questions: usize,
    pub attempted: usize,
    pub correct_answers: usize,
    pub incorrect_answers: usize,
    pub unattempted: usize,
    /// Correct/attempted, in percent; 0 when nothing was attempted.
    pub accuracy: f64,
    /// Time spent in the subject divided by attempted questions.
    pub average_time_ms: u64,
    /// Per-topic breakdown, in order of first appearance.
    #[serde(default)]
    pub topics: Vec<TopicPerformance>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicPerformance {
    pub topic: String,
    pub total_questions: usize,
    pub attempted: usize,
    pub correct_answers: usize,
    pub accuracy: f64,
}

/// Time spent, bucketed by speed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeAnalysis {
    pub total_time_ms: u64,
    /// Total time over all questions, attempted or not.
    pub average_time_per_question_ms: u64,
    /// Attempted questions only.
    pub buckets: BucketCounts,
    /// 0–100.
    pub time_efficiency: u32,
}

/// Per-tier attempted/correct counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DifficultyBucket {
    pub total_questions: usize,
    pub attempted: usize,
    pub correct: usize,
    pub accuracy: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DifficultyAnalysis {
    pub easy: DifficultyBucket,
    pub medium: DifficultyBucket,
    pub hard: DifficultyBucket,
}

impl DifficultyAnalysis {
    pub fn bucket(&self, difficulty: Difficulty) -> &DifficultyBucket {
        match difficulty {
            Difficulty::Easy => &self.easy,
            Difficulty::Medium => &self.medium,
            Difficulty::Hard => &self.hard,
        }
    }

    fn bucket_mut(&mut self, difficulty: Difficulty) -> &mut DifficultyBucket {
        match difficulty {
            Difficulty::Easy => &mut self.easy,
            Difficulty::Medium => &mut self.medium,
            Difficulty::Hard => &mut self.hard,
        }
    }

    pub fn total_attempted(&self) -> usize {
        self.easy.attempted + self.medium.attempted + self.hard.attempted
    }
}

/// Accuracy and speed as the attempt went on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionMetrics {
    /// Running accuracy after each answered question, in answer order.
    pub accuracy_trend: Vec<f64>,
    pub segment_speeds: Vec<SegmentSpeed>,
    pub speed_trend: SpeedTrend,
}

/// Questions left out of aggregations and why.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisDiagnostics {
    /// Distinct questions excluded from at least one aggregation.
    pub excluded_questions: usize,
    pub issues: Vec<AnalysisIssue>,
}

/// Analyze with the default thresholds.
pub fn analyze(result: &AttemptResult, metadata: &[QuestionMetadata]) -> AnalysisData {
    analyze_with(result, metadata, &AnalysisConfig::default())
}

/// Analyze an attempt. `metadata` may be in any order and may be incomplete.
#[instrument(skip_all, fields(test_id = %result.test_id, attempt_id = %result.attempt_id))]
pub fn analyze_with(
    result: &AttemptResult,
    metadata: &[QuestionMetadata],
    config: &AnalysisConfig,
) -> AnalysisData {
    let by_id: HashMap<&str, &QuestionMetadata> =
        metadata.iter().map(|m| (m.id.as_str(), m)).collect();

    let mut subjects = SubjectAccumulator::default();
    let mut difficulty = DifficultyAnalysis::default();
    let mut issues = Vec::new();

    for outcome in &result.outcomes {
        let Some(meta) = by_id.get(outcome.question_id.as_str()) else {
            issues.push(AnalysisIssue::MissingMetadata {
                question_id: outcome.question_id.clone(),
            });
            continue;
        };

        match meta.subject.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(subject) => subjects.record(subject, meta.topic.as_deref(), outcome),
            None => issues.push(AnalysisIssue::IncompleteMetadata {
                question_id: outcome.question_id.clone(),
                missing: MetadataField::Subject,
            }),
        }

        match meta.difficulty.as_deref().and_then(Difficulty::parse_lenient) {
            Some(tier) => {
                let bucket = difficulty.bucket_mut(tier);
                bucket.total_questions += 1;
                if outcome.outcome.is_attempted() {
                    bucket.attempted += 1;
                }
                if outcome.is_correct() {
                    bucket.correct += 1;
                }
            }
            None => issues.push(AnalysisIssue::IncompleteMetadata {
                question_id: outcome.question_id.clone(),
                missing: MetadataField::Difficulty,
            }),
        }
    }

    for tier in Difficulty::ALL {
        let bucket = difficulty.bucket_mut(tier);
        bucket.accuracy = percentage(bucket.correct, bucket.attempted);
    }

    let excluded_questions = issues
        .iter()
        .map(AnalysisIssue::question_id)
        .collect::<BTreeSet<_>>()
        .len();
    if !issues.is_empty() {
        warn!(
            excluded_questions,
            issues = issues.len(),
            "incomplete question metadata, some aggregations are partial"
        );
    }

    let mut data = AnalysisData {
        test_id: result.test_id.clone(),
        attempt_id: result.attempt_id,
        overall_score: result.score,
        max_score: result.max_score,
        total_questions: result.total_questions(),
        correct_answers: result.correct_count,
        incorrect_answers: result.incorrect_count,
        unattempted: result.unattempted_count,
        accuracy: result.accuracy(),
        time_taken_ms: result.total_time_taken_ms,
        subject_performance: subjects.finish(),
        time_analysis: time_analysis(result, config),
        difficulty_analysis: difficulty,
        progression_metrics: progression(result, config),
        recommendations: Recommendations::default(),
        diagnostics: AnalysisDiagnostics {
            excluded_questions,
            issues,
        },
    };
    data.recommendations = recommend(&data, &config.recommendations);
    data
}

fn time_analysis(result: &AttemptResult, config: &AnalysisConfig) -> TimeAnalysis {
    let mut buckets = BucketCounts::default();
    for outcome in result.outcomes.iter().filter(|o| o.outcome.is_attempted()) {
        buckets.record(classify_time(outcome.elapsed_ms, config));
    }

    TimeAnalysis {
        total_time_ms: result.total_time_taken_ms,
        average_time_per_question_ms: average_ms(
            result.total_time_taken_ms,
            result.total_questions(),
        ),
        time_efficiency: time_efficiency(&buckets, &config.weights),
        buckets,
    }
}

fn progression(result: &AttemptResult, config: &AnalysisConfig) -> Option<ProgressionMetrics> {
    let timeline = result.answer_timeline.as_ref()?;
    let by_id: HashMap<&str, &QuestionOutcome> = result
        .outcomes
        .iter()
        .map(|o| (o.question_id.as_str(), o))
        .collect();

    let ordered: Vec<&QuestionOutcome> = timeline
        .iter()
        .filter_map(|id| by_id.get(id.as_str()).copied())
        .filter(|o| o.outcome.is_attempted())
        .collect();
    if ordered.is_empty() {
        return None;
    }

    let outcomes: Vec<Outcome> = ordered.iter().map(|o| o.outcome).collect();
    let times: Vec<u64> = ordered.iter().map(|o| o.elapsed_ms).collect();
    let segments = segment_speeds(&times, config.progression_segments.max(1));

    Some(ProgressionMetrics {
        accuracy_trend: cumulative_accuracy(&outcomes),
        speed_trend: speed_trend(&segments),
        segment_speeds: segments,
    })
}

/// Groups outcomes by subject (and topic) in order of first appearance.
#[derive(Default)]
struct SubjectAccumulator {
    order: Vec<SubjectPerformance>,
    index: HashMap<String, usize>,
}

impl SubjectAccumulator {
    fn record(&mut self, subject: &str, topic: Option<&str>, outcome: &QuestionOutcome) {
        let slot = *self.index.entry(subject.to_string()).or_insert_with(|| {
            self.order.push(SubjectPerformance {
                subject: subject.to_string(),
                total_questions: 0,
                attempted: 0,
                correct_answers: 0,
                incorrect_answers: 0,
                unattempted: 0,
                accuracy: 0.0,
                average_time_ms: 0,
                topics: Vec::new(),
            });
            self.order.len() - 1
        });
        let perf = &mut self.order[slot];

        perf.total_questions += 1;
        // Sum of time for now; divided in `finish`.
        perf.average_time_ms += outcome.elapsed_ms;
        match outcome.outcome {
            Outcome::Correct => {
                perf.attempted += 1;
                perf.correct_answers += 1;
            }
            Outcome::Incorrect => {
                perf.attempted += 1;
                perf.incorrect_answers += 1;
            }
            Outcome::Unattempted => perf.unattempted += 1,
        }

        if let Some(topic) = topic.map(str::trim).filter(|t| !t.is_empty()) {
            let entry = match perf.topics.iter().position(|t| t.topic == topic) {
                Some(i) => &mut perf.topics[i],
                None => {
                    perf.topics.push(TopicPerformance {
                        topic: topic.to_string(),
                        total_questions: 0,
                        attempted: 0,
                        correct_answers: 0,
                        accuracy: 0.0,
                    });
                    let last = perf.topics.len() - 1;
                    &mut perf.topics[last]
                }
            };
            entry.total_questions += 1;
            if outcome.outcome.is_attempted() {
                entry.attempted += 1;
            }
            if outcome.is_correct() {
                entry.correct_answers += 1;
            }
        }
    }

    fn finish(mut self) -> Vec<SubjectPerformance> {
        for perf in &mut self.order {
            perf.accuracy = percentage(perf.correct_answers, perf.attempted);
            perf.average_time_ms = average_ms(perf.average_time_ms, perf.attempted);
            for topic in &mut perf.topics {
                topic.accuracy = percentage(topic.correct_answers, topic.attempted);
            }
        }
        self.order
    }
}
