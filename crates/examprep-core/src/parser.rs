//! Test definition loader.
//!
//! Loads tests from TOML or JSON files and directories, and validates them.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{Difficulty, MarkingScheme, Question, QuestionKind, TestDefinition};

/// Intermediate TOML structure: a `[test]` header followed by `[[questions]]`.
#[derive(Debug, Deserialize)]
struct TomlTestFile {
    test: TomlTestHeader,
    #[serde(default)]
    questions: Vec<Question>,
}

#[derive(Debug, Deserialize)]
struct TomlTestHeader {
    #[serde(alias = "test_id")]
    id: String,
    #[serde(default)]
    name: String,
    duration_minutes: u32,
    #[serde(default)]
    marking_scheme: MarkingScheme,
}

/// On-disk encodings, picked by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Toml,
    Json,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "toml" => Some(SourceFormat::Toml),
            "json" => Some(SourceFormat::Json),
            _ => None,
        }
    }
}

/// Parse a single TOML or JSON file into a `TestDefinition`.
pub fn parse_test_definition(path: &Path) -> Result<TestDefinition> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read test file: {}", path.display()))?;

    parse_test_definition_str(&content, path)
}

/// Parse file contents; the format follows `source_path`'s extension and
/// defaults to TOML.
pub fn parse_test_definition_str(content: &str, source_path: &Path) -> Result<TestDefinition> {
    match SourceFormat::from_path(source_path).unwrap_or(SourceFormat::Toml) {
        SourceFormat::Toml => {
            let parsed: TomlTestFile = toml::from_str(content)
                .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;
            Ok(TestDefinition {
                id: parsed.test.id,
                name: parsed.test.name,
                duration_minutes: parsed.test.duration_minutes,
                marking_scheme: parsed.test.marking_scheme,
                questions: parsed.questions,
            })
        }
        SourceFormat::Json => serde_json::from_str(content)
            .with_context(|| format!("failed to parse JSON: {}", source_path.display())),
    }
}

/// Recursively load every `.toml` and `.json` test file under `dir`.
///
/// Files that fail to parse are skipped with a warning.
pub fn load_test_directory(dir: &Path) -> Result<Vec<TestDefinition>> {
    let mut tests = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut paths = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    paths.sort();

    for path in paths {
        if path.is_dir() {
            tests.extend(load_test_directory(&path)?);
        } else if SourceFormat::from_path(&path).is_some() {
            match parse_test_definition(&path) {
                Ok(test) => tests.push(test),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(tests)
}

/// Load a single file, or every test file under a directory.
pub fn load_tests(path: &Path) -> Result<Vec<TestDefinition>> {
    if path.is_dir() {
        load_test_directory(path)
    } else {
        Ok(vec![parse_test_definition(path)?])
    }
}

/// A warning from test validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationWarning {
    /// The question ID (if applicable).
    pub question_id: Option<String>,
    /// Warning message.
    pub message: String,
}

impl ValidationWarning {
    fn test(message: impl Into<String>) -> Self {
        Self {
            question_id: None,
            message: message.into(),
        }
    }

    fn question(question: &Question, message: impl Into<String>) -> Self {
        Self {
            question_id: Some(question.id.clone()),
            message: message.into(),
        }
    }
}

/// Validate a test for common authoring mistakes.
///
/// None of these stop a session from running.
pub fn validate_test_definition(test: &TestDefinition) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if test.questions.is_empty() {
        warnings.push(ValidationWarning::test("test has no questions"));
    }
    if test.duration_minutes == 0 {
        warnings.push(ValidationWarning::test("duration_minutes is zero"));
    }

    let scheme = &test.marking_scheme;
    if scheme.correct <= 0.0 {
        warnings.push(ValidationWarning::test(format!(
            "marking_scheme.correct is {} (not positive)",
            scheme.correct
        )));
    }
    if scheme.incorrect > 0.0 {
        warnings.push(ValidationWarning::test(format!(
            "marking_scheme.incorrect is positive ({}); penalties are usually negative",
            scheme.incorrect
        )));
    }
    if scheme.unattempted > 0.0 {
        warnings.push(ValidationWarning::test(format!(
            "marking_scheme.unattempted is positive ({})",
            scheme.unattempted
        )));
    }

    let mut seen_ids = HashSet::new();
    for question in &test.questions {
        if !seen_ids.insert(question.id.as_str()) {
            warnings.push(ValidationWarning::question(
                question,
                format!("duplicate question ID: {}", question.id),
            ));
        }
        validate_question(question, &mut warnings);
    }

    warnings
}

fn validate_question(question: &Question, warnings: &mut Vec<ValidationWarning>) {
    if question.marks <= 0.0 {
        warnings.push(ValidationWarning::question(
            question,
            format!("marks is {} (not positive)", question.marks),
        ));
    }

    if question.subject.as_deref().is_none_or(|s| s.trim().is_empty()) {
        warnings.push(ValidationWarning::question(
            question,
            "no subject; analysis will exclude this question",
        ));
    }
    if let Some(d) = &question.difficulty {
        if Difficulty::parse_lenient(d).is_none() {
            warnings.push(ValidationWarning::question(
                question,
                format!("unrecognized difficulty '{d}'"),
            ));
        }
    }

    match &question.kind {
        QuestionKind::Single { options, correct } => {
            check_option_count(question, options.len(), warnings);
            if *correct >= options.len() {
                warnings.push(ValidationWarning::question(
                    question,
                    format!("correct option {correct} is out of range (0..{})", options.len()),
                ));
            }
        }
        QuestionKind::Multiple { options, correct } => {
            check_option_count(question, options.len(), warnings);
            if correct.is_empty() {
                warnings.push(ValidationWarning::question(
                    question,
                    "multiple-choice answer key is empty",
                ));
            }
            if let Some(bad) = correct.iter().find(|&&i| i >= options.len()) {
                warnings.push(ValidationWarning::question(
                    question,
                    format!("correct option {bad} is out of range (0..{})", options.len()),
                ));
            }
        }
        QuestionKind::Numerical { exact, min, max, .. } => {
            if min > max {
                warnings.push(ValidationWarning::question(
                    question,
                    format!("numerical range is inverted: min {min} > max {max}"),
                ));
            } else if exact < min || exact > max {
                warnings.push(ValidationWarning::question(
                    question,
                    format!("exact value {exact} lies outside [{min}, {max}]"),
                ));
            }
        }
    }
}

fn check_option_count(question: &Question, count: usize, warnings: &mut Vec<ValidationWarning>) {
    if count < 2 {
        warnings.push(ValidationWarning::question(
            question,
            format!("only {count} option(s); expected at least two"),
        ));
    }
}
