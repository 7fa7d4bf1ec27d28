//! Result types produced when an attempt is submitted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a single question was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Correct,
    Incorrect,
    Unattempted,
}

impl Outcome {
    pub fn is_attempted(self) -> bool {
        !matches!(self, Outcome::Unattempted)
    }
}

/// Per-question line of an [`AttemptResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOutcome {
    pub question_id: String,
    pub outcome: Outcome,
    /// Time the candidate spent on this question.
    pub elapsed_ms: u64,
    #[serde(default)]
    pub visited: bool,
    #[serde(default)]
    pub marked_for_review: bool,
}

impl QuestionOutcome {
    pub fn is_correct(&self) -> bool {
        self.outcome == Outcome::Correct
    }
}

/// The scored outcome of one attempt. Created once at submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptResult {
    /// Unique attempt identifier.
    pub attempt_id: Uuid,
    pub test_id: String,
    /// Score under the test's marking scheme; may be negative.
    pub score: f64,
    /// Score if every question were correct.
    pub max_score: f64,
    pub correct_count: usize,
    pub incorrect_count: usize,
    pub unattempted_count: usize,
    /// `duration - remaining` at submission.
    pub total_time_taken_ms: u64,
    /// Time allowed for the test.
    pub duration_ms: u64,
    /// One entry per question, in test order.
    pub outcomes: Vec<QuestionOutcome>,
    /// Question ids in the order they were first answered.
    /// Absent for attempts recorded without ordering data.
    #[serde(default)]
    pub answer_timeline: Option<Vec<String>>,
    /// Whether submission was forced by the countdown reaching zero.
    #[serde(default)]
    pub timed_out: bool,
    pub submitted_at: DateTime<Utc>,
}

impl AttemptResult {
    pub fn total_questions(&self) -> usize {
        self.outcomes.len()
    }

    pub fn attempted_count(&self) -> usize {
        self.correct_count + self.incorrect_count
    }

    /// Questions the candidate opened but left without an answer.
    pub fn visited_unattempted_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.visited && o.outcome == Outcome::Unattempted)
            .count()
    }

    /// Questions never opened at all.
    pub fn not_visited_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.visited).count()
    }

    /// Correct/attempted as a percentage; 0 when nothing was attempted.
    pub fn accuracy(&self) -> f64 {
        crate::statistics::percentage(self.correct_count, self.attempted_count())
    }
}
