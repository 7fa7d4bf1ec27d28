//! Trait seams between the core and its collaborators.
//!
//! The clock feeds in-flight time into the session; the sink and source
//! are implemented by the `examprep-client` crate.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use async_trait::async_trait;

use crate::model::TestDefinition;
use crate::results::AttemptResult;

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Monotonic millisecond clock used for time spent between ticks.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Wall clock backed by [`Instant`].
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// A clock that only moves when told to. Used for deterministic replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::Relaxed);
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// I/O collaborators
// ---------------------------------------------------------------------------

/// Receives a finished attempt (e.g. a backend submission endpoint).
#[async_trait]
pub trait AttemptSink: Send + Sync {
    /// Human-readable sink name for logs.
    fn name(&self) -> &str;

    /// Deliver a completed attempt.
    async fn submit_attempt(&self, result: &AttemptResult) -> anyhow::Result<()>;
}

/// Supplies test definitions before a session starts.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Fetch the full definition of a test.
    async fn fetch_test(&self, test_id: &str) -> anyhow::Result<TestDefinition>;
}
