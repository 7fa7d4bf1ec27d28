//! Core data model types for examprep.
//!
//! Questions, recorded answers, marking schemes, and test definitions.
//! Everything here is plain data; behavior lives in the session, scorer,
//! and analysis modules.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A single exam question. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Unique identifier within a test.
    pub id: String,
    /// Question stem shown to the candidate.
    #[serde(default)]
    pub text: String,
    /// Subject (e.g. "Physics").
    #[serde(default)]
    pub subject: Option<String>,
    /// Topic or chapter within the subject.
    #[serde(default)]
    pub topic: Option<String>,
    /// Declared difficulty, kept verbatim; see [`Difficulty::parse_lenient`].
    #[serde(default)]
    pub difficulty: Option<String>,
    /// Marks this question is worth.
    #[serde(default = "default_marks")]
    pub marks: f64,
    /// Type-specific content and answer key.
    #[serde(flatten)]
    pub kind: QuestionKind,
}

fn default_marks() -> f64 {
    1.0
}

/// The three question kinds, each carrying only its own answer key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum QuestionKind {
    /// Exactly one correct option.
    Single { options: Vec<String>, correct: usize },
    /// One or more correct options; only the exact set scores.
    Multiple {
        options: Vec<String>,
        correct: BTreeSet<usize>,
    },
    /// A numeric answer accepted within `[min, max]` inclusive.
    Numerical {
        exact: f64,
        min: f64,
        max: f64,
        #[serde(default)]
        unit: Option<String>,
    },
}

/// Discriminant of [`QuestionKind`], handy for messages and filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Single,
    Multiple,
    Numerical,
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionType::Single => write!(f, "single"),
            QuestionType::Multiple => write!(f, "multiple"),
            QuestionType::Numerical => write!(f, "numerical"),
        }
    }
}

impl QuestionKind {
    pub fn question_type(&self) -> QuestionType {
        match self {
            QuestionKind::Single { .. } => QuestionType::Single,
            QuestionKind::Multiple { .. } => QuestionType::Multiple,
            QuestionKind::Numerical { .. } => QuestionType::Numerical,
        }
    }

    /// Number of options, or 0 for numerical questions.
    pub fn option_count(&self) -> usize {
        match self {
            QuestionKind::Single { options, .. } | QuestionKind::Multiple { options, .. } => {
                options.len()
            }
            QuestionKind::Numerical { .. } => 0,
        }
    }
}

impl Question {
    pub fn question_type(&self) -> QuestionType {
        self.kind.question_type()
    }

    /// Check that `value` has the right shape for this question.
    ///
    /// Returns a human-readable reason on mismatch.
    pub fn check_answer(&self, value: &AnswerValue) -> Result<(), String> {
        let option_count = self.kind.option_count();
        match (&self.kind, value) {
            (QuestionKind::Single { .. }, AnswerValue::Single(index)) => {
                if *index >= option_count {
                    return Err(format!(
                        "option {index} does not exist (question has {option_count} options)"
                    ));
                }
                Ok(())
            }
            (QuestionKind::Multiple { .. }, AnswerValue::Multiple(selected)) => {
                if let Some(bad) = selected.iter().find(|&&i| i >= option_count) {
                    return Err(format!(
                        "option {bad} does not exist (question has {option_count} options)"
                    ));
                }
                Ok(())
            }
            (QuestionKind::Numerical { .. }, AnswerValue::Numerical(v)) => {
                if !v.is_finite() {
                    return Err(format!("numerical answer must be finite, got {v}"));
                }
                Ok(())
            }
            (kind, value) => Err(format!(
                "{} answer given for a {} question",
                value.question_type(),
                kind.question_type()
            )),
        }
    }

    /// Metadata view used by the analysis pipeline.
    pub fn metadata(&self) -> QuestionMetadata {
        QuestionMetadata {
            id: self.id.clone(),
            subject: self.subject.clone(),
            topic: self.topic.clone(),
            difficulty: self.difficulty.clone(),
        }
    }
}

/// Difficulty tiers used for bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    /// Case-insensitive match against full names and single-letter
    /// abbreviations. Anything else yields `None`.
    pub fn parse_lenient(s: &str) -> Option<Self> {
        s.parse().ok()
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "easy"),
            Difficulty::Medium => write!(f, "medium"),
            Difficulty::Hard => write!(f, "hard"),
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" | "e" => Ok(Difficulty::Easy),
            "medium" | "m" => Ok(Difficulty::Medium),
            "hard" | "h" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

/// A candidate's response to one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerValue {
    /// Selected option index.
    Single(usize),
    /// Full set of selected option indices (replaces any prior selection).
    Multiple(BTreeSet<usize>),
    /// Entered number.
    Numerical(f64),
}

impl AnswerValue {
    pub fn question_type(&self) -> QuestionType {
        match self {
            AnswerValue::Single(_) => QuestionType::Single,
            AnswerValue::Multiple(_) => QuestionType::Multiple,
            AnswerValue::Numerical(_) => QuestionType::Numerical,
        }
    }
}

/// Per-question record kept by the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: String,
    /// `None` means unattempted.
    #[serde(default)]
    pub response: Option<AnswerValue>,
    /// Cumulative time spent on the question.
    #[serde(default)]
    pub elapsed_ms: u64,
    #[serde(default)]
    pub visited: bool,
    #[serde(default)]
    pub marked_for_review: bool,
}

impl Answer {
    pub fn new(question_id: impl Into<String>) -> Self {
        Self {
            question_id: question_id.into(),
            response: None,
            elapsed_ms: 0,
            visited: false,
            marked_for_review: false,
        }
    }

    pub fn is_answered(&self) -> bool {
        self.response.is_some()
    }
}

/// Points awarded per outcome. Weights are used as given, whatever their sign.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkingScheme {
    pub correct: f64,
    #[serde(default)]
    pub incorrect: f64,
    #[serde(default)]
    pub unattempted: f64,
}

impl Default for MarkingScheme {
    fn default() -> Self {
        Self {
            correct: 1.0,
            incorrect: 0.0,
            unattempted: 0.0,
        }
    }
}

/// Subject/topic/difficulty for one question, as consumed by analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionMetadata {
    pub id: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
}

/// A complete test as handed to the session engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestDefinition {
    /// Test identifier.
    #[serde(alias = "test_id")]
    pub id: String,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// Time allowed for the whole test.
    pub duration_minutes: u32,
    #[serde(default)]
    pub marking_scheme: MarkingScheme,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl TestDefinition {
    pub fn duration_ms(&self) -> u64 {
        u64::from(self.duration_minutes) * 60_000
    }

    pub fn total_marks(&self) -> f64 {
        self.questions.iter().map(|q| q.marks).sum()
    }

    /// Metadata for every question, in test order.
    pub fn metadata(&self) -> Vec<QuestionMetadata> {
        self.questions.iter().map(Question::metadata).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(options: usize, correct: usize) -> Question {
        Question {
            id: "q1".into(),
            text: String::new(),
            subject: Some("Physics".into()),
            topic: None,
            difficulty: Some("easy".into()),
            marks: 4.0,
            kind: QuestionKind::Single {
                options: (0..options).map(|i| format!("option {i}")).collect(),
                correct,
            },
        }
    }

    #[test]
    fn difficulty_parse_is_lenient() {
        assert_eq!(Difficulty::parse_lenient("Easy"), Some(Difficulty::Easy));
        assert_eq!(Difficulty::parse_lenient(" MEDIUM "), Some(Difficulty::Medium));
        assert_eq!(Difficulty::parse_lenient("h"), Some(Difficulty::Hard));
        assert_eq!(Difficulty::parse_lenient("E"), Some(Difficulty::Easy));
        assert_eq!(Difficulty::parse_lenient("expert"), None);
        assert_eq!(Difficulty::parse_lenient(""), None);
    }

    #[test]
    fn check_answer_rejects_type_mismatch() {
        let q = single(4, 1);
        let err = q.check_answer(&AnswerValue::Numerical(3.0)).unwrap_err();
        assert!(err.contains("numerical answer given for a single question"));
        assert!(q.check_answer(&AnswerValue::Single(3)).is_ok());
        assert!(q.check_answer(&AnswerValue::Single(4)).is_err());
    }

    #[test]
    fn check_answer_multiple_out_of_range() {
        let q = Question {
            kind: QuestionKind::Multiple {
                options: vec!["a".into(), "b".into(), "c".into()],
                correct: BTreeSet::from([0, 2]),
            },
            ..single(0, 0)
        };
        assert!(q.check_answer(&AnswerValue::Multiple(BTreeSet::from([0, 2]))).is_ok());
        assert!(q.check_answer(&AnswerValue::Multiple(BTreeSet::from([3]))).is_err());
    }

    #[test]
    fn check_answer_numerical_must_be_finite() {
        let q = Question {
            kind: QuestionKind::Numerical {
                exact: 9.8,
                min: 9.7,
                max: 9.9,
                unit: Some("m/s^2".into()),
            },
            ..single(0, 0)
        };
        assert!(q.check_answer(&AnswerValue::Numerical(9.8)).is_ok());
        assert!(q.check_answer(&AnswerValue::Numerical(f64::NAN)).is_err());
    }

    #[test]
    fn question_json_uses_type_tag() {
        let json = r#"{
            "id": "n1",
            "subject": "Physics",
            "difficulty": "m",
            "type": "numerical",
            "exact": 9.8,
            "min": 9.7,
            "max": 9.9
        }"#;
        let q: Question = serde_json::from_str(json).unwrap();
        assert_eq!(q.question_type(), QuestionType::Numerical);
        assert_eq!(q.marks, 1.0);
        assert!(matches!(q.kind, QuestionKind::Numerical { unit: None, .. }));
    }

    #[test]
    fn answer_value_json_shape() {
        let v: AnswerValue = serde_json::from_str(r#"{"multiple":[2,0]}"#).unwrap();
        assert_eq!(v, AnswerValue::Multiple(BTreeSet::from([0, 2])));
        let v: AnswerValue = serde_json::from_str(r#"{"single":1}"#).unwrap();
        assert_eq!(v, AnswerValue::Single(1));
    }

    #[test]
    fn test_definition_duration_and_metadata() {
        let def = TestDefinition {
            id: "t1".into(),
            name: "Mock".into(),
            duration_minutes: 3,
            marking_scheme: MarkingScheme::default(),
            questions: vec![single(4, 0)],
        };
        assert_eq!(def.duration_ms(), 180_000);
        assert_eq!(def.total_marks(), 4.0);
        let meta = def.metadata();
        assert_eq!(meta[0].subject.as_deref(), Some("Physics"));
    }
}
