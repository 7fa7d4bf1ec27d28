//! The `examprep compare` command.

use std::path::PathBuf;

use anyhow::Result;

use examprep_core::report::AttemptReport;

pub fn execute(
    baseline_path: PathBuf,
    current_path: PathBuf,
    threshold: f64,
    fail_on_regression: bool,
    format: String,
) -> Result<()> {
    anyhow::ensure!(threshold >= 0.0, "threshold must not be negative");

    let baseline = AttemptReport::load_json(&baseline_path)?;
    let current = AttemptReport::load_json(&current_path)?;

    let report = current.compare(&baseline, threshold);

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            println!(
                "Comparison: {} regressions, {} improvements, {} unchanged",
                report.regressions.len(),
                report.improvements.len(),
                report.unchanged
            );
            println!(
                "Score {:+} | Accuracy {:+.1} pts | Time efficiency {:+}",
                report.score_delta, report.accuracy_delta, report.time_efficiency_delta
            );

            if !report.regressions.is_empty() {
                println!("\nRegressions:");
                for r in &report.regressions {
                    println!(
                        "  {} {:.1}% -> {:.1}% ({:+.1})",
                        r.subject, r.baseline_accuracy, r.current_accuracy, r.delta
                    );
                }
            }

            if !report.improvements.is_empty() {
                println!("\nImprovements:");
                for i in &report.improvements {
                    println!(
                        "  {} {:.1}% -> {:.1}% ({:+.1})",
                        i.subject, i.baseline_accuracy, i.current_accuracy, i.delta
                    );
                }
            }

            if report.new_subjects > 0 {
                println!("\n{} new subject(s)", report.new_subjects);
            }
            if report.removed_subjects > 0 {
                println!("{} removed subject(s)", report.removed_subjects);
            }
        }
    }

    if fail_on_regression && report.has_regressions() {
        std::process::exit(1);
    }

    Ok(())
}
