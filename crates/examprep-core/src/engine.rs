//! Single-writer session engine.
//!
//! [`SessionEngine::spawn`] moves a [`TestSession`] into a tokio task that
//! owns it exclusively. User actions arrive over an mpsc channel and the
//! countdown timer ticks inside the same loop, so no two mutations ever
//! run concurrently. When the countdown reaches zero the loop submits the
//! attempt itself; a user submit that arrives afterwards gets the cached
//! result. The first completed result is handed to the optional
//! [`AttemptSink`] exactly once, on a separate task so the loop keeps
//! answering commands while the upload runs. The engine task waits for
//! that upload before it finishes.
//!
//! Dropping every [`SessionHandle`] (or calling [`SessionHandle::abandon`])
//! before submission discards the attempt.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::error::{EngineError, SessionError};
use crate::model::{Answer, AnswerValue};
use crate::results::AttemptResult;
use crate::session::{EventOutcome, SessionEvent, SessionStatus, SessionSummary, TestSession};
use crate::traits::{AttemptSink, QuestionSource};

/// Configuration for the session engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Period of the built-in countdown timer. `None` disables it and the
    /// caller drives time with [`SessionHandle::tick`].
    pub tick_interval: Option<Duration>,
    /// Capacity of the command channel.
    pub channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: Some(Duration::from_secs(1)),
            channel_capacity: 64,
        }
    }
}

/// Read-only view of a running session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub active_index: usize,
    pub remaining_ms: u64,
    pub summary: SessionSummary,
    pub answers: Vec<Answer>,
}

enum Command {
    Event {
        event: SessionEvent,
        reply: oneshot::Sender<Result<EventOutcome, SessionError>>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Completion {
        reply: oneshot::Sender<AttemptResult>,
    },
    Abandon,
}

/// Cloneable handle for sending actions to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Command>,
}

impl SessionHandle {
    /// Send one event and wait for its outcome.
    pub async fn send(&self, event: SessionEvent) -> Result<EventOutcome, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Event { event, reply })
            .await
            .map_err(|_| EngineError::Closed)?;
        Ok(rx.await.map_err(|_| EngineError::Closed)??)
    }

    pub async fn start(&self) -> Result<(), EngineError> {
        self.send(SessionEvent::Start).await.map(|_| ())
    }

    pub async fn navigate_to(&self, index: usize) -> Result<(), EngineError> {
        self.send(SessionEvent::Navigate { index }).await.map(|_| ())
    }

    pub async fn answer(&self, index: usize, value: Option<AnswerValue>) -> Result<(), EngineError> {
        self.send(SessionEvent::Answer { index, value })
            .await
            .map(|_| ())
    }

    pub async fn toggle_review(&self, index: usize) -> Result<(), EngineError> {
        self.send(SessionEvent::ToggleReview { index })
            .await
            .map(|_| ())
    }

    /// Advance the countdown manually. Returns `Submitted` if this tick
    /// ran the clock out.
    pub async fn tick(&self, delta_ms: u64) -> Result<EventOutcome, EngineError> {
        self.send(SessionEvent::Tick { delta_ms }).await
    }

    /// Submit the attempt. Safe to call after the timer already submitted.
    pub async fn submit(&self) -> Result<AttemptResult, EngineError> {
        match self.send(SessionEvent::Submit).await? {
            EventOutcome::Submitted(result) => Ok(result),
            _ => Err(EngineError::Closed),
        }
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Snapshot { reply })
            .await
            .map_err(|_| EngineError::Closed)?;
        rx.await.map_err(|_| EngineError::Closed)
    }

    /// Wait until the attempt is submitted, by the user or by the timer.
    pub async fn completion(&self) -> Result<AttemptResult, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Completion { reply })
            .await
            .map_err(|_| EngineError::Closed)?;
        rx.await.map_err(|_| EngineError::Closed)
    }

    /// Stop the engine. An unsubmitted attempt is discarded.
    pub async fn abandon(self) {
        let _ = self.tx.send(Command::Abandon).await;
    }
}

/// Spawns and drives session tasks.
pub struct SessionEngine;

impl SessionEngine {
    /// Move `session` into a new task and return a handle to it.
    ///
    /// The join handle yields the submitted result, or `None` if the
    /// attempt was abandoned.
    pub fn spawn(
        session: TestSession,
        config: EngineConfig,
        sink: Option<Arc<dyn AttemptSink>>,
    ) -> (SessionHandle, JoinHandle<Option<AttemptResult>>) {
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        let task = tokio::spawn(run(session, rx, config, sink));
        (SessionHandle { tx }, task)
    }

    /// Fetch a test definition and build a fresh session for it.
    pub async fn open(source: &dyn QuestionSource, test_id: &str) -> anyhow::Result<TestSession> {
        let test = source
            .fetch_test(test_id)
            .await
            .with_context(|| format!("failed to load test {test_id}"))?;
        Ok(TestSession::new(test))
    }
}

struct Loop {
    session: TestSession,
    sink: Option<Arc<dyn AttemptSink>>,
    waiters: Vec<oneshot::Sender<AttemptResult>>,
    delivered: bool,
    upload: Option<JoinHandle<()>>,
}

async fn run(
    session: TestSession,
    mut rx: mpsc::Receiver<Command>,
    config: EngineConfig,
    sink: Option<Arc<dyn AttemptSink>>,
) -> Option<AttemptResult> {
    let mut state = Loop {
        session,
        sink,
        waiters: Vec::new(),
        delivered: false,
        upload: None,
    };
    let mut timer: Option<Interval> = None;

    loop {
        if timer.is_none() && state.session.status() == SessionStatus::InProgress {
            timer = config.tick_interval.map(countdown_timer);
        }
        let timer_live = timer.is_some() && state.session.status() == SessionStatus::InProgress;

        tokio::select! {
            command = rx.recv() => {
                let Some(command) = command else {
                    break;
                };
                match command {
                    Command::Event { event, reply } => {
                        let outcome = state.apply(event);
                        let _ = reply.send(outcome);
                    }
                    Command::Snapshot { reply } => {
                        let _ = reply.send(state.snapshot());
                    }
                    Command::Completion { reply } => match state.session.result() {
                        Some(result) => {
                            let _ = reply.send(result.clone());
                        }
                        None => state.waiters.push(reply),
                    },
                    Command::Abandon => break,
                }
            }
            _ = next_tick(&mut timer), if timer_live => {
                let delta_ms = config
                    .tick_interval
                    .map(|d| d.as_millis() as u64)
                    .unwrap_or(0);
                if let Err(e) = state.apply(SessionEvent::Tick { delta_ms }) {
                    error!("timer tick failed: {e}");
                }
            }
        }
    }

    if let Some(upload) = state.upload.take() {
        if let Err(e) = upload.await {
            error!("attempt upload task failed: {e}");
        }
    }

    let result = state.session.result().cloned();
    if result.is_none() {
        info!(
            test_id = %state.session.test().id,
            attempt_id = %state.session.attempt_id(),
            "session abandoned, attempt discarded"
        );
    }
    result
}

impl Loop {
    fn apply(&mut self, event: SessionEvent) -> Result<EventOutcome, SessionError> {
        debug!(?event, "applying session event");
        let mut outcome = self.session.apply(event)?;
        if outcome == EventOutcome::TimeExpired {
            outcome = EventOutcome::Submitted(self.session.submit()?);
        }
        self.deliver();
        Ok(outcome)
    }

    /// Hand the result to waiters and start the sink upload the first time
    /// it exists. Never waits on the sink.
    fn deliver(&mut self) {
        if self.delivered {
            return;
        }
        let Some(result) = self.session.result().cloned() else {
            return;
        };
        self.delivered = true;

        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(result.clone());
        }
        if let Some(sink) = self.sink.clone() {
            self.upload = Some(tokio::spawn(async move {
                match sink.submit_attempt(&result).await {
                    Ok(()) => info!(sink = sink.name(), "attempt delivered"),
                    Err(e) => error!(sink = sink.name(), "failed to deliver attempt: {e:#}"),
                }
            }));
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.session.status(),
            active_index: self.session.active_index(),
            remaining_ms: self.session.remaining_ms(),
            summary: self.session.summary(),
            answers: self.session.answers().to_vec(),
        }
    }
}

fn countdown_timer(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
    interval
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::model::{MarkingScheme, Question, QuestionKind, TestDefinition};
    use crate::traits::ManualClock;

    #[derive(Default)]
    struct RecordingSink {
        received: Mutex<Vec<AttemptResult>>,
    }

    #[async_trait]
    impl AttemptSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        async fn submit_attempt(&self, result: &AttemptResult) -> anyhow::Result<()> {
            self.received.lock().unwrap().push(result.clone());
            Ok(())
        }
    }

    struct HangingSink;

    #[async_trait]
    impl AttemptSink for HangingSink {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn submit_attempt(&self, _result: &AttemptResult) -> anyhow::Result<()> {
            std::future::pending().await
        }
    }

    struct StaticSource(TestDefinition);

    #[async_trait]
    impl QuestionSource for StaticSource {
        async fn fetch_test(&self, test_id: &str) -> anyhow::Result<TestDefinition> {
            anyhow::ensure!(test_id == self.0.id, "unknown test {test_id}");
            Ok(self.0.clone())
        }
    }

    fn test_def(minutes: u32) -> TestDefinition {
        TestDefinition {
            id: "engine-test".into(),
            name: "Engine".into(),
            duration_minutes: minutes,
            marking_scheme: MarkingScheme {
                correct: 4.0,
                incorrect: -1.0,
                unattempted: 0.0,
            },
            questions: (0..3)
                .map(|i| Question {
                    id: format!("q{i}"),
                    text: String::new(),
                    subject: Some("Math".into()),
                    topic: None,
                    difficulty: Some("medium".into()),
                    marks: 4.0,
                    kind: QuestionKind::Single {
                        options: vec!["a".into(), "b".into()],
                        correct: 0,
                    },
                })
                .collect(),
        }
    }

    fn manual_session(minutes: u32) -> TestSession {
        TestSession::with_clock(test_def(minutes), Arc::new(ManualClock::new()))
    }

    fn manual_config() -> EngineConfig {
        EngineConfig {
            tick_interval: None,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn events_flow_through_the_loop() {
        let sink = Arc::new(RecordingSink::default());
        let (handle, task) =
            SessionEngine::spawn(manual_session(1), manual_config(), Some(sink.clone()));

        handle.start().await.unwrap();
        handle.answer(0, Some(AnswerValue::Single(0))).await.unwrap();
        handle.navigate_to(1).await.unwrap();
        handle.answer(1, Some(AnswerValue::Single(1))).await.unwrap();
        handle.toggle_review(2).await.unwrap();

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.status, SessionStatus::InProgress);
        assert_eq!(snapshot.active_index, 1);
        assert_eq!(snapshot.summary.answered, 2);
        assert_eq!(snapshot.summary.marked_for_review, 1);

        let first = handle.submit().await.unwrap();
        let second = handle.submit().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.score, 3.0);

        drop(handle);
        let joined = task.await.unwrap();
        assert_eq!(joined, Some(first));
        assert_eq!(sink.received.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn contract_violations_come_back_as_session_errors() {
        let (handle, _task) = SessionEngine::spawn(manual_session(1), manual_config(), None);
        let err = handle
            .answer(0, Some(AnswerValue::Single(0)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Session(SessionError::InvalidState { .. })
        ));

        handle.start().await.unwrap();
        let err = handle.navigate_to(9).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Session(SessionError::InvalidIndex { index: 9, count: 3 })
        ));
    }

    #[tokio::test]
    async fn expiry_submits_once_and_later_submit_sees_cached_result() {
        let sink = Arc::new(RecordingSink::default());
        let (handle, task) =
            SessionEngine::spawn(manual_session(1), manual_config(), Some(sink.clone()));
        handle.start().await.unwrap();
        handle.answer(0, Some(AnswerValue::Single(0))).await.unwrap();

        let outcome = handle.tick(30_000).await.unwrap();
        assert_eq!(outcome, EventOutcome::Applied);

        let expired = match handle.tick(30_000).await.unwrap() {
            EventOutcome::Submitted(result) => result,
            other => panic!("expected auto-submit, got {other:?}"),
        };
        assert!(expired.timed_out);
        assert_eq!(expired.total_time_taken_ms, 60_000);

        let user = handle.submit().await.unwrap();
        assert_eq!(user, expired);
        assert_eq!(handle.completion().await.unwrap(), expired);

        let err = handle.tick(1_000).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Session(SessionError::InvalidState { .. })
        ));

        drop(handle);
        assert_eq!(task.await.unwrap(), Some(expired));
        assert_eq!(sink.received.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn built_in_timer_runs_the_clock_out() {
        let sink = Arc::new(RecordingSink::default());
        let config = EngineConfig {
            tick_interval: Some(Duration::from_secs(1)),
            ..Default::default()
        };
        let (handle, task) = SessionEngine::spawn(manual_session(1), config, Some(sink.clone()));

        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.completion().await })
        };
        handle.start().await.unwrap();
        handle.answer(2, Some(AnswerValue::Single(0))).await.unwrap();

        let result = waiter.await.unwrap().unwrap();
        assert!(result.timed_out);
        assert_eq!(result.total_time_taken_ms, 60_000);
        assert_eq!(result.correct_count, 1);
        assert_eq!(result.outcomes[0].elapsed_ms, 60_000);

        drop(handle);
        assert_eq!(task.await.unwrap(), Some(result));
        assert_eq!(sink.received.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn slow_sink_does_not_hold_up_commands() {
        let (handle, _task) = SessionEngine::spawn(
            manual_session(1),
            manual_config(),
            Some(Arc::new(HangingSink)),
        );
        handle.start().await.unwrap();
        handle.answer(0, Some(AnswerValue::Single(0))).await.unwrap();

        let limit = Duration::from_secs(2);
        let result = tokio::time::timeout(limit, handle.submit())
            .await
            .expect("submit waited on the sink")
            .unwrap();
        assert_eq!(result.score, 4.0);

        let snapshot = tokio::time::timeout(limit, handle.snapshot())
            .await
            .expect("snapshot waited on the sink")
            .unwrap();
        assert_eq!(snapshot.status, SessionStatus::Completed);

        let completion = tokio::time::timeout(limit, handle.completion())
            .await
            .expect("completion waited on the sink")
            .unwrap();
        assert_eq!(completion, result);
    }

    #[tokio::test]
    async fn dropping_handles_abandons_the_attempt() {
        let sink = Arc::new(RecordingSink::default());
        let (handle, task) =
            SessionEngine::spawn(manual_session(1), manual_config(), Some(sink.clone()));
        handle.start().await.unwrap();
        handle.answer(0, Some(AnswerValue::Single(0))).await.unwrap();
        drop(handle);

        assert_eq!(task.await.unwrap(), None);
        assert!(sink.received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn abandon_stops_the_engine() {
        let (handle, task) = SessionEngine::spawn(manual_session(1), manual_config(), None);
        let other = handle.clone();
        handle.start().await.unwrap();
        handle.abandon().await;

        assert_eq!(task.await.unwrap(), None);
        assert!(matches!(other.snapshot().await, Err(EngineError::Closed)));
    }

    #[tokio::test]
    async fn open_fetches_from_source() {
        let source = StaticSource(test_def(5));
        let session = SessionEngine::open(&source, "engine-test").await.unwrap();
        assert_eq!(session.question_count(), 3);
        assert_eq!(session.status(), SessionStatus::NotStarted);

        let err = SessionEngine::open(&source, "missing").await.unwrap_err();
        assert!(format!("{err:#}").contains("failed to load test missing"));
    }
}
