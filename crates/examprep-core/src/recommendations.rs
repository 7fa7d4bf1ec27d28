//! Rule-based study recommendations derived from [`AnalysisData`].

use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisData;
use crate::config::RecommendationRules;

/// Subject name used when an attempt carries no subject data at all.
pub const FALLBACK_SUBJECT: &str = "General";

/// Strengths, weak areas, and a study plan, in rule order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendations {
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub study_plan: Vec<String>,
}

/// Apply the threshold rules to an analysis.
///
/// With nothing attempted, strengths and improvements stay empty; the study
/// plan always ends with the two generic items.
pub fn recommend(data: &AnalysisData, rules: &RecommendationRules) -> Recommendations {
    let mut out = Recommendations::default();
    let attempted = data.correct_answers + data.incorrect_answers;

    if attempted > 0 {
        let subjects: Vec<(&str, f64)> = if data.subject_performance.is_empty() {
            vec![(FALLBACK_SUBJECT, data.accuracy)]
        } else {
            data.subject_performance
                .iter()
                .map(|s| (s.subject.as_str(), s.accuracy))
                .collect()
        };

        let mut weak_subjects = Vec::new();
        for (subject, accuracy) in subjects {
            if accuracy >= rules.strong_accuracy {
                out.strengths.push(format!("Strong performance in {subject}"));
            } else if accuracy < rules.weak_accuracy {
                out.improvements.push(format!("Focus more on {subject}"));
                weak_subjects.push(subject);
            }
        }

        let efficiency = data.time_analysis.time_efficiency;
        if efficiency >= rules.good_time_efficiency {
            out.strengths.push("Good time management".to_string());
        } else if efficiency < rules.poor_time_efficiency {
            out.improvements
                .push("Work on time management and speed".to_string());
        }

        out.study_plan.extend(
            weak_subjects
                .into_iter()
                .map(|subject| format!("Practice more questions in {subject}")),
        );
    }

    out.study_plan
        .push("Review incorrect answers and understand the concepts".to_string());
    out.study_plan
        .push("Take timed practice tests to improve speed".to_string());
    out
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::analysis::{
        AnalysisDiagnostics, DifficultyAnalysis, SubjectPerformance, TimeAnalysis,
    };
    use crate::statistics::BucketCounts;

    fn subject(name: &str, accuracy: f64) -> SubjectPerformance {
        SubjectPerformance {
            subject: name.into(),
            total_questions: 10,
            attempted: 10,
            correct_answers: (accuracy / 10.0) as usize,
            incorrect_answers: 10 - (accuracy / 10.0) as usize,
            unattempted: 0,
            accuracy,
            average_time_ms: 45_000,
            topics: vec![],
        }
    }

    fn data(subjects: Vec<SubjectPerformance>, efficiency: u32, attempted: usize) -> AnalysisData {
        AnalysisData {
            test_id: "t".into(),
            attempt_id: Uuid::nil(),
            overall_score: 0.0,
            max_score: 0.0,
            total_questions: attempted,
            correct_answers: attempted / 2,
            incorrect_answers: attempted - attempted / 2,
            unattempted: 0,
            accuracy: 50.0,
            time_taken_ms: 0,
            subject_performance: subjects,
            time_analysis: TimeAnalysis {
                total_time_ms: 0,
                average_time_per_question_ms: 0,
                buckets: BucketCounts::default(),
                time_efficiency: efficiency,
            },
            difficulty_analysis: DifficultyAnalysis::default(),
            progression_metrics: None,
            recommendations: Recommendations::default(),
            diagnostics: AnalysisDiagnostics::default(),
        }
    }

    #[test]
    fn strong_and_weak_subjects() {
        let d = data(
            vec![
                subject("Physics", 80.0),
                subject("Chemistry", 70.0),
                subject("Mathematics", 40.0),
            ],
            75,
            30,
        );
        let r = recommend(&d, &RecommendationRules::default());

        assert_eq!(
            r.strengths,
            vec!["Strong performance in Physics", "Good time management"]
        );
        assert_eq!(r.improvements, vec!["Focus more on Mathematics"]);
        assert_eq!(
            r.study_plan,
            vec![
                "Practice more questions in Mathematics",
                "Review incorrect answers and understand the concepts",
                "Take timed practice tests to improve speed",
            ]
        );
    }

    #[test]
    fn poor_time_efficiency() {
        let r = recommend(&data(vec![subject("Physics", 65.0)], 49, 10), &Default::default());
        assert!(r.strengths.is_empty());
        assert_eq!(r.improvements, vec!["Work on time management and speed"]);
        assert_eq!(r.study_plan.len(), 2);
    }

    #[test]
    fn middling_efficiency_triggers_nothing() {
        let r = recommend(&data(vec![subject("Physics", 65.0)], 60, 10), &Default::default());
        assert!(r.strengths.is_empty());
        assert!(r.improvements.is_empty());
    }

    #[test]
    fn nothing_attempted_yields_empty_lists() {
        let r = recommend(&data(vec![], 0, 0), &Default::default());
        assert!(r.strengths.is_empty());
        assert!(r.improvements.is_empty());
        assert_eq!(r.study_plan.len(), 2);
    }

    #[test]
    fn fallback_subject_when_no_subject_data() {
        let r = recommend(&data(vec![], 80, 10), &Default::default());
        assert_eq!(r.improvements, vec!["Focus more on General"]);
        assert_eq!(r.study_plan[0], "Practice more questions in General");
        assert_eq!(r.strengths, vec!["Good time management"]);
    }

    #[test]
    fn custom_thresholds() {
        let rules = RecommendationRules {
            strong_accuracy: 90.0,
            weak_accuracy: 85.0,
            ..Default::default()
        };
        let r = recommend(&data(vec![subject("Physics", 80.0)], 60, 10), &rules);
        assert_eq!(r.improvements, vec!["Focus more on Physics"]);
    }
}
