//! Test-session state machine.
//!
//! A [`TestSession`] owns one in-progress attempt: the active question,
//! per-question visit/answer/review flags, per-question elapsed time, and
//! the global countdown. States move `NotStarted -> InProgress -> Completed`
//! and never leave `Completed`.
//!
//! Time enters in two ways. [`TestSession::tick`] carries countdown time
//! and charges it to the active question. Navigation and submission charge
//! the wall time since the last tick (read from a [`Clock`]) to the question
//! being left; the next tick only charges whatever part of its delta was not
//! already attributed that way.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::SessionError;
use crate::model::{Answer, AnswerValue, Question, TestDefinition};
use crate::results::AttemptResult;
use crate::scorer::{self, ScoreBreakdown, Submission};
use crate::traits::{Clock, SystemClock};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::NotStarted => write!(f, "not started"),
            SessionStatus::InProgress => write!(f, "in progress"),
            SessionStatus::Completed => write!(f, "completed"),
        }
    }
}

/// One mutation of a session. Serializable so attempts can be replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SessionEvent {
    Start,
    Navigate {
        index: usize,
    },
    /// `value: None` clears the answer.
    Answer {
        index: usize,
        #[serde(default)]
        value: Option<AnswerValue>,
    },
    ToggleReview {
        index: usize,
    },
    Tick {
        delta_ms: u64,
    },
    Submit,
}

/// What applying a [`SessionEvent`] produced.
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    Applied,
    /// The countdown reached zero; the attempt must now be submitted.
    TimeExpired,
    Submitted(AttemptResult),
}

/// Result of a countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Running { remaining_ms: u64 },
    Expired,
}

/// Question palette counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub total: usize,
    pub not_visited: usize,
    pub visited_unanswered: usize,
    pub answered: usize,
    pub marked_for_review: usize,
    pub answered_and_marked: usize,
}

/// An attempt in progress. Exclusively owned by whoever drives it.
pub struct TestSession {
    attempt_id: Uuid,
    test: TestDefinition,
    answers: Vec<Answer>,
    active_index: usize,
    remaining_ms: u64,
    status: SessionStatus,
    /// Question indices in the order they were first answered.
    timeline: Vec<usize>,
    clock: Arc<dyn Clock>,
    last_mark_ms: u64,
    /// Time charged by navigation that no tick has covered yet.
    in_flight_ms: u64,
    result: Option<AttemptResult>,
}

impl fmt::Debug for TestSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestSession")
            .field("attempt_id", &self.attempt_id)
            .field("test_id", &self.test.id)
            .field("status", &self.status)
            .field("active_index", &self.active_index)
            .field("remaining_ms", &self.remaining_ms)
            .finish_non_exhaustive()
    }
}

impl TestSession {
    /// Create a session driven by the system clock.
    pub fn new(test: TestDefinition) -> Self {
        Self::with_clock(test, Arc::new(SystemClock::new()))
    }

    pub fn with_clock(test: TestDefinition, clock: Arc<dyn Clock>) -> Self {
        let answers = test.questions.iter().map(|q| Answer::new(&q.id)).collect();
        let remaining_ms = test.duration_ms();
        Self {
            attempt_id: Uuid::new_v4(),
            test,
            answers,
            active_index: 0,
            remaining_ms,
            status: SessionStatus::NotStarted,
            timeline: Vec::new(),
            clock,
            last_mark_ms: 0,
            in_flight_ms: 0,
            result: None,
        }
    }

    // -- accessors ----------------------------------------------------------

    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    pub fn test(&self) -> &TestDefinition {
        &self.test
    }

    pub fn questions(&self) -> &[Question] {
        &self.test.questions
    }

    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }

    pub fn question_count(&self) -> usize {
        self.test.questions.len()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn active_index(&self) -> usize {
        self.active_index
    }

    pub fn active_question(&self) -> Option<&Question> {
        self.test.questions.get(self.active_index)
    }

    pub fn remaining_ms(&self) -> u64 {
        self.remaining_ms
    }

    pub fn duration_ms(&self) -> u64 {
        self.test.duration_ms()
    }

    pub fn is_expired(&self) -> bool {
        self.status == SessionStatus::InProgress && self.remaining_ms == 0
    }

    /// The submitted result, once the session is completed.
    pub fn result(&self) -> Option<&AttemptResult> {
        self.result.as_ref()
    }

    /// Ids of answered questions, in the order they were first answered.
    pub fn answer_timeline(&self) -> Vec<&str> {
        self.timeline
            .iter()
            .map(|&i| self.test.questions[i].id.as_str())
            .collect()
    }

    // -- operations ---------------------------------------------------------

    /// Begin the attempt: start the countdown and open question 0.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.status != SessionStatus::NotStarted {
            return Err(self.invalid_state("start the test"));
        }
        if self.test.questions.is_empty() {
            return Err(SessionError::NoQuestions);
        }

        self.status = SessionStatus::InProgress;
        self.remaining_ms = self.test.duration_ms();
        self.active_index = 0;
        self.answers[0].visited = true;
        self.last_mark_ms = self.clock.now_ms();
        self.in_flight_ms = 0;

        info!(
            test_id = %self.test.id,
            attempt_id = %self.attempt_id,
            questions = self.test.questions.len(),
            duration_ms = self.remaining_ms,
            "session started"
        );
        Ok(())
    }

    /// Move to question `index`, charging time spent so far to the current one.
    pub fn navigate_to(&mut self, index: usize) -> Result<(), SessionError> {
        self.ensure_running("navigate")?;
        self.check_index(index)?;

        if index == self.active_index {
            return Ok(());
        }

        self.charge_in_flight();
        self.answers[self.active_index].visited = true;
        self.active_index = index;
        self.answers[index].visited = true;
        debug!(index, "navigated");
        Ok(())
    }

    /// Go to the next question; stays on the last one.
    pub fn next(&mut self) -> Result<(), SessionError> {
        let last = self.question_count().saturating_sub(1);
        self.navigate_to((self.active_index + 1).min(last))
    }

    /// Go to the previous question; stays on the first one.
    pub fn previous(&mut self) -> Result<(), SessionError> {
        self.navigate_to(self.active_index.saturating_sub(1))
    }

    /// Record (or with `None`, clear) the answer to question `index`.
    ///
    /// Multiple-choice values replace the whole selection; an empty set
    /// clears it.
    pub fn answer_question(
        &mut self,
        index: usize,
        value: Option<AnswerValue>,
    ) -> Result<(), SessionError> {
        self.ensure_running("answer a question")?;
        self.check_index(index)?;

        let value = match value {
            Some(AnswerValue::Multiple(set)) if set.is_empty() => None,
            other => other,
        };

        if let Some(v) = &value {
            let question = &self.test.questions[index];
            question
                .check_answer(v)
                .map_err(|reason| SessionError::InvalidAnswer {
                    question_id: question.id.clone(),
                    reason,
                })?;
        }

        match value {
            Some(v) => {
                if !self.timeline.contains(&index) {
                    self.timeline.push(index);
                }
                self.answers[index].response = Some(v);
            }
            None => {
                self.timeline.retain(|&i| i != index);
                self.answers[index].response = None;
            }
        }
        debug!(index, answered = self.answers[index].is_answered(), "answer recorded");
        Ok(())
    }

    /// Flip the review flag on question `index`. Returns the new flag.
    pub fn toggle_mark_for_review(&mut self, index: usize) -> Result<bool, SessionError> {
        self.ensure_running("mark a question for review")?;
        self.check_index(index)?;

        let answer = &mut self.answers[index];
        answer.marked_for_review = !answer.marked_for_review;
        Ok(answer.marked_for_review)
    }

    /// Advance the countdown by `delta_ms` and charge it to the active question.
    ///
    /// Returns [`TickOutcome::Expired`] once the countdown is at zero; the
    /// caller must then submit.
    pub fn tick(&mut self, delta_ms: u64) -> Result<TickOutcome, SessionError> {
        if self.status != SessionStatus::InProgress {
            return Err(self.invalid_state("advance the timer"));
        }
        if self.remaining_ms == 0 {
            return Ok(TickOutcome::Expired);
        }

        let consumed = delta_ms.min(self.remaining_ms);
        self.remaining_ms -= consumed;
        let share = consumed.saturating_sub(self.in_flight_ms);
        self.answers[self.active_index].elapsed_ms += share;
        self.in_flight_ms = self.in_flight_ms.saturating_sub(consumed);
        self.last_mark_ms = self.clock.now_ms();

        if self.remaining_ms == 0 {
            info!(test_id = %self.test.id, attempt_id = %self.attempt_id, "time expired");
            return Ok(TickOutcome::Expired);
        }
        Ok(TickOutcome::Running {
            remaining_ms: self.remaining_ms,
        })
    }

    /// Finish the attempt and score it.
    ///
    /// Idempotent: once completed, every call returns the same result.
    pub fn submit(&mut self) -> Result<AttemptResult, SessionError> {
        match self.status {
            SessionStatus::Completed => {
                if let Some(result) = &self.result {
                    return Ok(result.clone());
                }
                return Err(self.invalid_state("submit"));
            }
            SessionStatus::NotStarted => return Err(self.invalid_state("submit")),
            SessionStatus::InProgress => {}
        }

        self.charge_in_flight();
        let timeline = self
            .timeline
            .iter()
            .map(|&i| self.test.questions[i].id.clone())
            .collect();

        let result = scorer::score_attempt(
            &self.test,
            Submission {
                attempt_id: self.attempt_id,
                answers: &self.answers,
                remaining_ms: self.remaining_ms,
                answer_timeline: Some(timeline),
                timed_out: self.remaining_ms == 0,
                submitted_at: Utc::now(),
            },
        )?;

        self.status = SessionStatus::Completed;
        self.result = Some(result.clone());
        info!(
            test_id = %self.test.id,
            attempt_id = %self.attempt_id,
            score = result.score,
            correct = result.correct_count,
            incorrect = result.incorrect_count,
            unattempted = result.unattempted_count,
            timed_out = result.timed_out,
            "session submitted"
        );
        Ok(result)
    }

    /// Apply one event. Used by the engine loop and by replays.
    pub fn apply(&mut self, event: SessionEvent) -> Result<EventOutcome, SessionError> {
        match event {
            SessionEvent::Start => self.start()?,
            SessionEvent::Navigate { index } => self.navigate_to(index)?,
            SessionEvent::Answer { index, value } => self.answer_question(index, value)?,
            SessionEvent::ToggleReview { index } => {
                self.toggle_mark_for_review(index)?;
            }
            SessionEvent::Tick { delta_ms } => {
                if self.tick(delta_ms)? == TickOutcome::Expired {
                    return Ok(EventOutcome::TimeExpired);
                }
            }
            SessionEvent::Submit => return Ok(EventOutcome::Submitted(self.submit()?)),
        }
        Ok(EventOutcome::Applied)
    }

    // -- derived views ------------------------------------------------------

    /// Score the current answers. Recomputed on every call.
    pub fn score_preview(&self) -> Result<ScoreBreakdown, SessionError> {
        scorer::score(&self.test.questions, &self.answers, &self.test.marking_scheme)
    }

    /// Palette counts for the current answers.
    pub fn summary(&self) -> SessionSummary {
        let mut summary = SessionSummary {
            total: self.answers.len(),
            ..Default::default()
        };
        for answer in &self.answers {
            match (answer.visited, answer.is_answered()) {
                (_, true) => summary.answered += 1,
                (true, false) => summary.visited_unanswered += 1,
                (false, false) => summary.not_visited += 1,
            }
            if answer.marked_for_review {
                summary.marked_for_review += 1;
                if answer.is_answered() {
                    summary.answered_and_marked += 1;
                }
            }
        }
        summary
    }

    // -- helpers ------------------------------------------------------------

    fn invalid_state(&self, operation: &'static str) -> SessionError {
        SessionError::InvalidState {
            operation,
            status: self.status,
        }
    }

    fn ensure_running(&self, operation: &'static str) -> Result<(), SessionError> {
        if self.status != SessionStatus::InProgress {
            return Err(self.invalid_state(operation));
        }
        if self.remaining_ms == 0 {
            return Err(SessionError::TimeExpired);
        }
        Ok(())
    }

    fn check_index(&self, index: usize) -> Result<(), SessionError> {
        let count = self.question_count();
        if index >= count {
            return Err(SessionError::InvalidIndex { index, count });
        }
        Ok(())
    }

    /// Charge wall time since the last tick/navigation to the active question,
    /// never beyond what the countdown still has left.
    fn charge_in_flight(&mut self) {
        let now = self.clock.now_ms();
        let budget = self.remaining_ms.saturating_sub(self.in_flight_ms);
        let portion = now.saturating_sub(self.last_mark_ms).min(budget);
        self.answers[self.active_index].elapsed_ms += portion;
        self.in_flight_ms += portion;
        self.last_mark_ms = now;
    }
}
