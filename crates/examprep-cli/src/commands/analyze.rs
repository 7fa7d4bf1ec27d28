//! The `examprep analyze` command, plus the report printer shared with `replay`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use examprep_client::config::load_config_from;
use examprep_core::parser;
use examprep_core::report::{format_duration, AttemptReport};
use examprep_core::results::AttemptResult;

pub fn execute(
    attempt_path: PathBuf,
    test_path: Option<PathBuf>,
    format: String,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let stored = load_attempt(&attempt_path)?;

    let report = match (stored, test_path) {
        (Stored::Report(report), None) => *report,
        (stored, Some(test_path)) => {
            let test = parser::parse_test_definition(&test_path)?;
            let result = stored.into_result();
            anyhow::ensure!(
                result.test_id == test.id,
                "attempt is for test '{}' but {} defines '{}'",
                result.test_id,
                test_path.display(),
                test.id
            );
            AttemptReport::build(test.name.clone(), result, &test.metadata(), &config.analysis)
        }
        (Stored::Result(_), None) => {
            anyhow::bail!("a bare attempt result has no question metadata; pass --test")
        }
    };

    print_report(&report, &format)
}

enum Stored {
    Report(Box<AttemptReport>),
    Result(Box<AttemptResult>),
}

impl Stored {
    fn into_result(self) -> AttemptResult {
        match self {
            Stored::Report(report) => report.result,
            Stored::Result(result) => *result,
        }
    }
}

/// Accept either a saved report or a bare result as posted to the backend.
fn load_attempt(path: &Path) -> Result<Stored> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read attempt from {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse JSON: {}", path.display()))?;

    if value.get("analysis").is_some() {
        let report = serde_json::from_value(value).context("failed to parse attempt report")?;
        Ok(Stored::Report(Box::new(report)))
    } else {
        let result = serde_json::from_value(value).context("failed to parse attempt result")?;
        Ok(Stored::Result(Box::new(result)))
    }
}

/// Print a report as text, JSON, or markdown.
pub fn print_report(report: &AttemptReport, format: &str) -> Result<()> {
    match format {
        "markdown" | "md" => print!("{}", report.to_markdown()),
        "json" => println!("{}", serde_json::to_string_pretty(report)?),
        "text" => print_text(report),
        other => anyhow::bail!("unknown format '{other}' (expected text, json, or markdown)"),
    }
    Ok(())
}

fn print_text(report: &AttemptReport) {
    let r = &report.result;
    let a = &report.analysis;

    println!(
        "{} (attempt {})",
        if report.test_name.is_empty() { &r.test_id } else { &report.test_name },
        r.attempt_id
    );
    println!("Score: {} / {}", r.score, r.max_score);
    println!(
        "Correct {} | Incorrect {} | Unattempted {} | Accuracy {:.1}%",
        r.correct_count, r.incorrect_count, r.unattempted_count, a.accuracy
    );
    println!(
        "Time: {} of {}{} | Efficiency {}/100",
        format_duration(r.total_time_taken_ms),
        format_duration(r.duration_ms),
        if r.timed_out { " (timed out)" } else { "" },
        a.time_analysis.time_efficiency
    );

    if !a.subject_performance.is_empty() {
        let mut table = Table::new();
        table.set_header(vec![
            "Subject",
            "Questions",
            "Attempted",
            "Correct",
            "Accuracy",
            "Avg time",
        ]);
        for s in &a.subject_performance {
            table.add_row(vec![
                Cell::new(&s.subject),
                Cell::new(s.total_questions),
                Cell::new(s.attempted),
                Cell::new(s.correct_answers),
                Cell::new(format!("{:.1}%", s.accuracy)),
                Cell::new(format_duration(s.average_time_ms)),
            ]);
        }
        println!("\n{table}");
    }

    if let Some(p) = &a.progression_metrics {
        println!("\nSpeed trend: {}", p.speed_trend);
    }

    let rec = &a.recommendations;
    for (heading, items) in [
        ("Strengths", &rec.strengths),
        ("Improvements", &rec.improvements),
        ("Study plan", &rec.study_plan),
    ] {
        if !items.is_empty() {
            println!("\n{heading}:");
            for item in items {
                println!("  - {item}");
            }
        }
    }

    if !a.diagnostics.issues.is_empty() {
        println!(
            "\n{} question(s) had incomplete metadata:",
            a.diagnostics.excluded_questions
        );
        for issue in &a.diagnostics.issues {
            println!("  - {issue}");
        }
    }
}
