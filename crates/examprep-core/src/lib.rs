//! examprep-core: Timed exam session engine, scoring, and performance analysis.
//!
//! This crate defines the question/answer model, the test-session state
//! machine, the scorer, and the analysis pipeline that turns a completed
//! attempt into subject, time, difficulty, and progression analytics.

pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod parser;
pub mod recommendations;
pub mod report;
pub mod results;
pub mod scorer;
pub mod session;
pub mod statistics;
pub mod traits;

pub use error::{AnalysisIssue, EngineError, SessionError};
pub use model::{AnswerValue, Difficulty, MarkingScheme, Question, QuestionKind, TestDefinition};
pub use results::AttemptResult;
pub use session::{SessionStatus, TestSession};
