//! Attempt scoring.
//!
//! Correctness rules:
//! - single: the selected option is the keyed option
//! - multiple: the selected set equals the keyed set exactly (no partial credit)
//! - numerical: the value lies in `[min, max]` inclusive
//!
//! The score is `correct * scheme.correct + incorrect * scheme.incorrect +
//! unattempted * scheme.unattempted`, with no assumption about signs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SessionError;
use crate::model::{Answer, AnswerValue, MarkingScheme, Question, QuestionKind, TestDefinition};
use crate::results::{AttemptResult, Outcome, QuestionOutcome};

/// Counts and score for a set of answers, without timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub score: f64,
    pub max_score: f64,
    pub correct_count: usize,
    pub incorrect_count: usize,
    pub unattempted_count: usize,
    /// One outcome per question, in test order.
    pub outcomes: Vec<Outcome>,
}

/// Apply a marking scheme to outcome counts.
pub fn weighted_score(
    correct: usize,
    incorrect: usize,
    unattempted: usize,
    scheme: &MarkingScheme,
) -> f64 {
    correct as f64 * scheme.correct
        + incorrect as f64 * scheme.incorrect
        + unattempted as f64 * scheme.unattempted
}

/// Decide the outcome of a single response.
///
/// A response whose kind does not match the question is a caller bug and
/// is reported as [`SessionError::InvalidAnswer`].
pub fn evaluate(
    question: &Question,
    response: Option<&AnswerValue>,
) -> Result<Outcome, SessionError> {
    let Some(value) = response else {
        return Ok(Outcome::Unattempted);
    };

    let correct = match (&question.kind, value) {
        (QuestionKind::Single { correct, .. }, AnswerValue::Single(selected)) => selected == correct,
        (QuestionKind::Multiple { correct, .. }, AnswerValue::Multiple(selected)) => {
            if selected.is_empty() {
                return Ok(Outcome::Unattempted);
            }
            selected == correct
        }
        (QuestionKind::Numerical { min, max, .. }, AnswerValue::Numerical(v)) => {
            *min <= *v && *v <= *max
        }
        (kind, value) => {
            return Err(SessionError::InvalidAnswer {
                question_id: question.id.clone(),
                reason: format!(
                    "{} answer recorded for a {} question",
                    value.question_type(),
                    kind.question_type()
                ),
            })
        }
    };

    Ok(if correct {
        Outcome::Correct
    } else {
        Outcome::Incorrect
    })
}

/// Score `answers` (indexed like `questions`) under `scheme`.
///
/// Questions without an answer record count as unattempted.
pub fn score(
    questions: &[Question],
    answers: &[Answer],
    scheme: &MarkingScheme,
) -> Result<ScoreBreakdown, SessionError> {
    let mut outcomes = Vec::with_capacity(questions.len());
    let (mut correct, mut incorrect, mut unattempted) = (0usize, 0usize, 0usize);

    for (index, question) in questions.iter().enumerate() {
        let answer = answers.get(index);
        if let Some(answer) = answer {
            if answer.question_id != question.id {
                return Err(SessionError::InvalidAnswer {
                    question_id: question.id.clone(),
                    reason: format!(
                        "answer at position {index} belongs to question {}",
                        answer.question_id
                    ),
                });
            }
        }

        let outcome = evaluate(question, answer.and_then(|a| a.response.as_ref()))?;
        match outcome {
            Outcome::Correct => correct += 1,
            Outcome::Incorrect => incorrect += 1,
            Outcome::Unattempted => unattempted += 1,
        }
        outcomes.push(outcome);
    }

    Ok(ScoreBreakdown {
        score: weighted_score(correct, incorrect, unattempted, scheme),
        max_score: weighted_score(questions.len(), 0, 0, scheme),
        correct_count: correct,
        incorrect_count: incorrect,
        unattempted_count: unattempted,
        outcomes,
    })
}

/// Session state captured at the moment of submission.
#[derive(Debug, Clone)]
pub struct Submission<'a> {
    pub attempt_id: Uuid,
    pub answers: &'a [Answer],
    pub remaining_ms: u64,
    pub answer_timeline: Option<Vec<String>>,
    pub timed_out: bool,
    pub submitted_at: DateTime<Utc>,
}

/// Produce the final [`AttemptResult`] for a submission.
///
/// Total time is taken from the countdown (`duration - remaining`), not
/// from the per-question sum.
pub fn score_attempt(
    test: &TestDefinition,
    submission: Submission<'_>,
) -> Result<AttemptResult, SessionError> {
    let breakdown = score(&test.questions, submission.answers, &test.marking_scheme)?;
    let duration_ms = test.duration_ms();

    let outcomes = test
        .questions
        .iter()
        .zip(&breakdown.outcomes)
        .enumerate()
        .map(|(index, (question, &outcome))| {
            let answer = submission.answers.get(index);
            QuestionOutcome {
                question_id: question.id.clone(),
                outcome,
                elapsed_ms: answer.map(|a| a.elapsed_ms).unwrap_or(0),
                visited: answer.is_some_and(|a| a.visited),
                marked_for_review: answer.is_some_and(|a| a.marked_for_review),
            }
        })
        .collect();

    Ok(AttemptResult {
        attempt_id: submission.attempt_id,
        test_id: test.id.clone(),
        score: breakdown.score,
        max_score: breakdown.max_score,
        correct_count: breakdown.correct_count,
        incorrect_count: breakdown.incorrect_count,
        unattempted_count: breakdown.unattempted_count,
        total_time_taken_ms: duration_ms.saturating_sub(submission.remaining_ms),
        duration_ms,
        outcomes,
        answer_timeline: submission.answer_timeline,
        timed_out: submission.timed_out,
        submitted_at: submission.submitted_at,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn single(id: &str, correct: usize) -> Question {
        Question {
            id: id.into(),
            text: String::new(),
            subject: None,
            topic: None,
            difficulty: None,
            marks: 4.0,
            kind: QuestionKind::Single {
                options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                correct,
            },
        }
    }

    fn multiple(id: &str, correct: &[usize]) -> Question {
        Question {
            kind: QuestionKind::Multiple {
                options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                correct: correct.iter().copied().collect(),
            },
            ..single(id, 0)
        }
    }

    fn numerical(id: &str, exact: f64, min: f64, max: f64) -> Question {
        Question {
            kind: QuestionKind::Numerical {
                exact,
                min,
                max,
                unit: None,
            },
            ..single(id, 0)
        }
    }

    fn answered(id: &str, value: Option<AnswerValue>) -> Answer {
        Answer {
            response: value,
            ..Answer::new(id)
        }
    }

    #[test]
    fn three_question_scenario() {
        let questions = vec![single("q1", 0), single("q2", 1), single("q3", 2)];
        let answers = vec![
            answered("q1", Some(AnswerValue::Single(0))),
            answered("q2", Some(AnswerValue::Single(3))),
            answered("q3", None),
        ];
        let scheme = MarkingScheme {
            correct: 4.0,
            incorrect: -1.0,
            unattempted: 0.0,
        };

        let b = score(&questions, &answers, &scheme).unwrap();
        assert_eq!(b.score, 3.0);
        assert_eq!(b.correct_count, 1);
        assert_eq!(b.incorrect_count, 1);
        assert_eq!(b.unattempted_count, 1);
        assert_eq!(b.max_score, 12.0);
        assert_eq!(
            b.outcomes,
            vec![Outcome::Correct, Outcome::Incorrect, Outcome::Unattempted]
        );
    }

    #[test]
    fn multiple_choice_requires_exact_set() {
        let q = multiple("m1", &[0, 2]);
        let exact = AnswerValue::Multiple(BTreeSet::from([0, 2]));
        let partial = AnswerValue::Multiple(BTreeSet::from([0]));
        let superset = AnswerValue::Multiple(BTreeSet::from([0, 1, 2]));
        assert_eq!(evaluate(&q, Some(&exact)).unwrap(), Outcome::Correct);
        assert_eq!(evaluate(&q, Some(&partial)).unwrap(), Outcome::Incorrect);
        assert_eq!(evaluate(&q, Some(&superset)).unwrap(), Outcome::Incorrect);
    }

    #[test]
    fn empty_multiple_selection_is_unattempted() {
        let q = multiple("m1", &[1]);
        let empty = AnswerValue::Multiple(BTreeSet::new());
        assert_eq!(evaluate(&q, Some(&empty)).unwrap(), Outcome::Unattempted);
    }

    #[test]
    fn numerical_range_is_inclusive() {
        let q = numerical("n1", 9.8, 9.7, 9.9);
        let check = |v: f64| evaluate(&q, Some(&AnswerValue::Numerical(v))).unwrap();
        assert_eq!(check(9.75), Outcome::Correct);
        assert_eq!(check(9.65), Outcome::Incorrect);
        assert_eq!(check(9.7), Outcome::Correct);
        assert_eq!(check(9.9), Outcome::Correct);
        assert_eq!(check(9.9 + 1e-9), Outcome::Incorrect);
        assert_eq!(check(9.7 - 1e-9), Outcome::Incorrect);
    }

    #[test]
    fn mismatched_answer_kind_is_an_error() {
        let q = single("q1", 0);
        let err = evaluate(&q, Some(&AnswerValue::Numerical(1.0))).unwrap_err();
        assert!(matches!(err, SessionError::InvalidAnswer { .. }));
    }

    #[test]
    fn misaligned_answers_are_rejected() {
        let questions = vec![single("q1", 0), single("q2", 0)];
        let answers = vec![answered("q2", None), answered("q1", None)];
        let err = score(&questions, &answers, &MarkingScheme::default()).unwrap_err();
        assert!(err.to_string().contains("belongs to question q2"));
    }

    #[test]
    fn missing_answer_records_count_as_unattempted() {
        let questions = vec![single("q1", 0), single("q2", 0)];
        let answers = vec![answered("q1", Some(AnswerValue::Single(0)))];
        let b = score(&questions, &answers, &MarkingScheme::default()).unwrap();
        assert_eq!(b.correct_count, 1);
        assert_eq!(b.unattempted_count, 1);
    }

    #[test]
    fn score_matches_formula_for_any_scheme() {
        let questions: Vec<Question> = (0..7).map(|i| single(&format!("q{i}"), 0)).collect();
        let answers: Vec<Answer> = questions
            .iter()
            .enumerate()
            .map(|(i, q)| {
                let value = match i % 3 {
                    0 => Some(AnswerValue::Single(0)),
                    1 => Some(AnswerValue::Single(1)),
                    _ => None,
                };
                answered(&q.id, value)
            })
            .collect();

        for scheme in [
            MarkingScheme {
                correct: 4.0,
                incorrect: -1.0,
                unattempted: 0.0,
            },
            MarkingScheme {
                correct: 3.0,
                incorrect: -0.25,
                unattempted: -0.1,
            },
            MarkingScheme {
                correct: 1.0,
                incorrect: 0.5,
                unattempted: 0.0,
            },
        ] {
            let b = score(&questions, &answers, &scheme).unwrap();
            assert_eq!(b.correct_count + b.incorrect_count + b.unattempted_count, 7);
            let expected = b.correct_count as f64 * scheme.correct
                + b.incorrect_count as f64 * scheme.incorrect
                + b.unattempted_count as f64 * scheme.unattempted;
            assert_eq!(b.score, expected);
        }
    }

    #[test]
    fn score_attempt_uses_countdown_for_total_time() {
        let test = TestDefinition {
            id: "t1".into(),
            name: String::new(),
            duration_minutes: 10,
            marking_scheme: MarkingScheme::default(),
            questions: vec![single("q1", 0), single("q2", 1)],
        };
        let answers = vec![
            Answer {
                elapsed_ms: 40_000,
                visited: true,
                ..answered("q1", Some(AnswerValue::Single(0)))
            },
            Answer {
                elapsed_ms: 20_000,
                visited: true,
                ..answered("q2", None)
            },
        ];

        let result = score_attempt(
            &test,
            Submission {
                attempt_id: Uuid::nil(),
                answers: &answers,
                remaining_ms: 540_000,
                answer_timeline: Some(vec!["q1".into()]),
                timed_out: false,
                submitted_at: Utc::now(),
            },
        )
        .unwrap();

        assert_eq!(result.total_time_taken_ms, 60_000);
        assert_eq!(result.duration_ms, 600_000);
        assert!(result.outcomes[0].is_correct());
        assert_eq!(result.outcomes[1].elapsed_ms, 20_000);
        assert_eq!(result.visited_unattempted_count(), 1);
        assert_eq!(result.not_visited_count(), 0);
        assert_eq!(result.accuracy(), 100.0);
    }
}
