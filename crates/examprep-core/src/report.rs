//! Attempt reports with JSON persistence, markdown rendering, and
//! attempt-to-attempt comparison.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::{analyze_with, AnalysisData};
use crate::config::AnalysisConfig;
use crate::model::{Difficulty, QuestionMetadata};
use crate::results::AttemptResult;

/// A scored attempt together with its analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    /// Display name of the test, if known.
    #[serde(default)]
    pub test_name: String,
    pub result: AttemptResult,
    pub analysis: AnalysisData,
}

impl AttemptReport {
    pub fn new(test_name: impl Into<String>, result: AttemptResult, analysis: AnalysisData) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            test_name: test_name.into(),
            result,
            analysis,
        }
    }

    /// Analyze `result` and wrap both in a report.
    pub fn build(
        test_name: impl Into<String>,
        result: AttemptResult,
        metadata: &[QuestionMetadata],
        config: &AnalysisConfig,
    ) -> Self {
        let analysis = analyze_with(&result, metadata, config);
        Self::new(test_name, result, analysis)
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: AttemptReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    fn title(&self) -> &str {
        if self.test_name.is_empty() {
            &self.result.test_id
        } else {
            &self.test_name
        }
    }

    /// Render a human-readable markdown summary.
    pub fn to_markdown(&self) -> String {
        let r = &self.result;
        let a = &self.analysis;
        let mut md = String::new();

        let _ = writeln!(md, "# {} attempt report\n", self.title());
        let _ = writeln!(md, "- Attempt: `{}`", r.attempt_id);
        let _ = writeln!(md, "- Submitted: {}", r.submitted_at.format("%Y-%m-%d %H:%M UTC"));
        let _ = writeln!(md, "- Score: {} / {}", r.score, r.max_score);
        let _ = writeln!(md, "- Accuracy: {:.1}%", a.accuracy);
        let _ = writeln!(
            md,
            "- Correct / incorrect / unattempted: {} / {} / {}",
            r.correct_count, r.incorrect_count, r.unattempted_count
        );
        let _ = writeln!(
            md,
            "- Time taken: {} of {}{}",
            format_duration(r.total_time_taken_ms),
            format_duration(r.duration_ms),
            if r.timed_out { " (timed out)" } else { "" }
        );

        if !a.subject_performance.is_empty() {
            md.push_str("\n## Subjects\n\n");
            md.push_str("| Subject | Questions | Attempted | Correct | Accuracy | Avg time |\n");
            md.push_str("|---|---:|---:|---:|---:|---:|\n");
            for s in &a.subject_performance {
                let _ = writeln!(
                    md,
                    "| {} | {} | {} | {} | {:.1}% | {} |",
                    s.subject,
                    s.total_questions,
                    s.attempted,
                    s.correct_answers,
                    s.accuracy,
                    format_duration(s.average_time_ms)
                );
            }
        }

        md.push_str("\n## Difficulty\n\n");
        md.push_str("| Difficulty | Questions | Attempted | Correct | Accuracy |\n");
        md.push_str("|---|---:|---:|---:|---:|\n");
        for difficulty in Difficulty::ALL {
            let b = a.difficulty_analysis.bucket(difficulty);
            let _ = writeln!(
                md,
                "| {} | {} | {} | {} | {:.1}% |",
                difficulty, b.total_questions, b.attempted, b.correct, b.accuracy
            );
        }

        let t = &a.time_analysis;
        md.push_str("\n## Time\n\n");
        let _ = writeln!(
            md,
            "- Average per question: {}",
            format_duration(t.average_time_per_question_ms)
        );
        let _ = writeln!(
            md,
            "- Fast / moderate / slow: {} / {} / {}",
            t.buckets.fast, t.buckets.moderate, t.buckets.slow
        );
        let _ = writeln!(md, "- Time efficiency: {}/100", t.time_efficiency);

        if let Some(p) = &a.progression_metrics {
            md.push_str("\n## Progression\n\n");
            let trend: Vec<String> = p.accuracy_trend.iter().map(|v| format!("{v:.0}%")).collect();
            let _ = writeln!(md, "- Accuracy trend: {}", trend.join(" → "));
            let speeds: Vec<String> = p
                .segment_speeds
                .iter()
                .map(|s| format_duration(s.average_time_ms))
                .collect();
            let _ = writeln!(md, "- Segment speeds: {}", speeds.join(", "));
            let _ = writeln!(md, "- Speed trend: {}", p.speed_trend);
        }

        let rec = &a.recommendations;
        md.push_str("\n## Recommendations\n");
        for (heading, items) in [
            ("Strengths", &rec.strengths),
            ("Areas to improve", &rec.improvements),
            ("Study plan", &rec.study_plan),
        ] {
            if items.is_empty() {
                continue;
            }
            let _ = writeln!(md, "\n### {heading}\n");
            for item in items {
                let _ = writeln!(md, "- {item}");
            }
        }

        let d = &a.diagnostics;
        if !d.issues.is_empty() {
            md.push_str("\n## Diagnostics\n\n");
            let _ = writeln!(
                md,
                "{} question(s) excluded from part of the analysis:\n",
                d.excluded_questions
            );
            for issue in &d.issues {
                let _ = writeln!(md, "- {issue}");
            }
        }

        md
    }

    /// Compare this attempt against an earlier one.
    ///
    /// Subjects whose accuracy moved by more than `threshold` percentage
    /// points are listed as improvements or regressions.
    pub fn compare(&self, baseline: &AttemptReport, threshold: f64) -> AttemptComparison {
        let accuracy_map = |report: &AttemptReport| -> HashMap<String, f64> {
            report
                .analysis
                .subject_performance
                .iter()
                .map(|s| (s.subject.clone(), s.accuracy))
                .collect()
        };

        let baseline_accuracy = accuracy_map(baseline);
        let current_accuracy = accuracy_map(self);

        let mut improvements = Vec::new();
        let mut regressions = Vec::new();
        let mut unchanged = 0usize;
        let mut new_subjects = 0usize;

        // Walk in report order so output is stable.
        for s in &self.analysis.subject_performance {
            let Some(&before) = baseline_accuracy.get(&s.subject) else {
                new_subjects += 1;
                continue;
            };
            let change = SubjectChange {
                subject: s.subject.clone(),
                baseline_accuracy: before,
                current_accuracy: s.accuracy,
                delta: s.accuracy - before,
            };
            if change.delta > threshold {
                improvements.push(change);
            } else if change.delta < -threshold {
                regressions.push(change);
            } else {
                unchanged += 1;
            }
        }

        let removed_subjects = baseline_accuracy
            .keys()
            .filter(|k| !current_accuracy.contains_key(*k))
            .count();

        AttemptComparison {
            score_delta: self.result.score - baseline.result.score,
            accuracy_delta: self.analysis.accuracy - baseline.analysis.accuracy,
            time_efficiency_delta: i64::from(self.analysis.time_analysis.time_efficiency)
                - i64::from(baseline.analysis.time_analysis.time_efficiency),
            improvements,
            regressions,
            unchanged,
            new_subjects,
            removed_subjects,
        }
    }
}

/// Result of comparing two attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptComparison {
    pub score_delta: f64,
    /// Percentage points.
    pub accuracy_delta: f64,
    pub time_efficiency_delta: i64,
    /// Subjects whose accuracy went up.
    pub improvements: Vec<SubjectChange>,
    /// Subjects whose accuracy went down.
    pub regressions: Vec<SubjectChange>,
    /// Subjects with no significant change.
    pub unchanged: usize,
    /// Subjects in the current attempt only.
    pub new_subjects: usize,
    /// Subjects in the baseline only.
    pub removed_subjects: usize,
}

impl AttemptComparison {
    pub fn has_regressions(&self) -> bool {
        !self.regressions.is_empty()
    }
}

/// Accuracy movement for one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectChange {
    pub subject: String,
    pub baseline_accuracy: f64,
    pub current_accuracy: f64,
    pub delta: f64,
}

/// `m:ss`, or `h:mm:ss` from one hour up.
pub fn format_duration(ms: u64) -> String {
    let secs = ms / 1000;
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}
