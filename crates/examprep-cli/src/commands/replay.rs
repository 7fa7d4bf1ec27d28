//! The `examprep replay` command.
//!
//! Feeds a recorded event log through the session engine with a manual
//! clock, so the countdown only moves on `tick` events and the replay is
//! deterministic.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use examprep_client::config::load_config_from;
use examprep_client::HttpBackend;
use examprep_core::engine::{EngineConfig, SessionEngine};
use examprep_core::error::EngineError;
use examprep_core::parser;
use examprep_core::report::AttemptReport;
use examprep_core::session::{SessionEvent, TestSession};
use examprep_core::traits::{AttemptSink, ManualClock};

use super::analyze::print_report;

pub struct ReplayArgs {
    pub test_path: PathBuf,
    pub events_path: PathBuf,
    pub output: Option<PathBuf>,
    pub format: String,
    pub finish: bool,
    pub upload: bool,
    pub config_path: Option<PathBuf>,
}

pub async fn execute(args: ReplayArgs) -> Result<()> {
    let config = load_config_from(args.config_path.as_deref())?;
    let test = parser::parse_test_definition(&args.test_path)?;

    let content = std::fs::read_to_string(&args.events_path)
        .with_context(|| format!("failed to read events: {}", args.events_path.display()))?;
    let events: Vec<SessionEvent> = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse events: {}", args.events_path.display()))?;

    let sink: Option<Arc<dyn AttemptSink>> = if args.upload {
        Some(Arc::new(HttpBackend::new(&config.backend)?))
    } else {
        None
    };

    let session = TestSession::with_clock(test.clone(), Arc::new(ManualClock::new()));
    let engine_config = EngineConfig {
        tick_interval: None,
        ..Default::default()
    };
    let (handle, task) = SessionEngine::spawn(session, engine_config, sink);

    eprintln!(
        "Replaying {} event(s) against {} ({} questions)",
        events.len(),
        test.id,
        test.questions.len()
    );
    let mut rejected = 0usize;
    for (i, event) in events.into_iter().enumerate() {
        match handle.send(event).await {
            Ok(_) => {}
            Err(EngineError::Session(e)) => {
                rejected += 1;
                eprintln!("  event {} rejected: {e}", i + 1);
            }
            Err(e) => return Err(e.into()),
        }
    }
    if rejected > 0 {
        eprintln!("{rejected} event(s) rejected");
    }

    if args.finish {
        handle
            .submit()
            .await
            .context("could not submit at end of replay")?;
    }
    drop(handle);

    let result = task
        .await
        .context("session engine task failed")?
        .context("event log ends without a submission, attempt discarded (use --finish to submit)")?;

    let report = AttemptReport::build(
        test.name.clone(),
        result,
        &test.metadata(),
        &config.analysis,
    );

    let path = args.output.unwrap_or_else(|| {
        config
            .output_dir
            .join(format!("attempt-{}.json", report.result.attempt_id))
    });
    report.save_json(&path)?;
    tracing::info!(path = %path.display(), "attempt report saved");
    eprintln!("Report saved to: {}", path.display());

    print_report(&report, &args.format)
}
