//! The `examprep fetch` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use examprep_client::config::load_config_from;
use examprep_client::HttpBackend;
use examprep_core::parser;
use examprep_core::traits::QuestionSource;

pub async fn execute(test_id: String, output: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let backend = HttpBackend::new(&config.backend)?;

    let test = backend.fetch_test(&test_id).await?;
    for w in parser::validate_test_definition(&test) {
        let id = w.question_id.as_deref().unwrap_or("-");
        eprintln!("  [{id}] WARNING: {}", w.message);
    }

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(&test)?;
    std::fs::write(&output, json)
        .with_context(|| format!("failed to write test to {}", output.display()))?;
    println!(
        "Saved {} ({} questions) to {}",
        test.id,
        test.questions.len(),
        output.display()
    );
    Ok(())
}
