//! The `examprep validate` command.

use std::path::PathBuf;

use anyhow::Result;

use examprep_core::parser;

pub fn execute(test_set_path: PathBuf) -> Result<()> {
    let tests = parser::load_tests(&test_set_path)?;
    anyhow::ensure!(
        !tests.is_empty(),
        "no test definitions found in {}",
        test_set_path.display()
    );

    let mut total_warnings = 0;

    for test in &tests {
        println!(
            "Test: {} ({} questions, {} min, {} marks)",
            if test.name.is_empty() { &test.id } else { &test.name },
            test.questions.len(),
            test.duration_minutes,
            test.total_marks()
        );

        let warnings = parser::validate_test_definition(test);
        for w in &warnings {
            let prefix = w
                .question_id
                .as_ref()
                .map(|id| format!("  [{id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All tests valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
