//! examprep CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "examprep", version, about = "Timed exam sessions, scoring, and analysis")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate test definition files
    Validate {
        /// Path to a .toml/.json test or a directory of them
        #[arg(long)]
        test_set: PathBuf,
    },

    /// Replay a recorded event log through the session engine and score it
    Replay {
        /// Test definition file
        #[arg(long)]
        test: PathBuf,

        /// JSON array of session events
        #[arg(long)]
        events: PathBuf,

        /// Where to write the attempt report (default: <output_dir>/attempt-<id>.json)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,

        /// Submit at the end if the log did not
        #[arg(long)]
        finish: bool,

        /// Post the result to the configured backend
        #[arg(long)]
        upload: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Analyze a stored attempt
    Analyze {
        /// Attempt report or bare attempt result JSON
        #[arg(long)]
        attempt: PathBuf,

        /// Test definition, for re-analysis with current metadata
        #[arg(long)]
        test: Option<PathBuf>,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Compare two attempt reports
    Compare {
        /// Baseline report JSON
        #[arg(long)]
        baseline: PathBuf,

        /// Current report JSON
        #[arg(long)]
        current: PathBuf,

        /// Subject accuracy change (percentage points) that counts as movement
        #[arg(long, default_value = "5.0")]
        threshold: f64,

        /// Exit code 1 if any subject regressed
        #[arg(long)]
        fail_on_regression: bool,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Download a test definition from the backend
    Fetch {
        /// Test identifier
        #[arg(long)]
        test_id: String,

        /// Destination JSON file
        #[arg(long)]
        output: PathBuf,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create starter config and example test
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("examprep=info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { test_set } => commands::validate::execute(test_set),
        Commands::Replay {
            test,
            events,
            output,
            format,
            finish,
            upload,
            config,
        } => {
            commands::replay::execute(commands::replay::ReplayArgs {
                test_path: test,
                events_path: events,
                output,
                format,
                finish,
                upload,
                config_path: config,
            })
            .await
        }
        Commands::Analyze {
            attempt,
            test,
            format,
            config,
        } => commands::analyze::execute(attempt, test, format, config),
        Commands::Compare {
            baseline,
            current,
            threshold,
            fail_on_regression,
            format,
        } => commands::compare::execute(baseline, current, threshold, fail_on_regression, format),
        Commands::Fetch {
            test_id,
            output,
            config,
        } => commands::fetch::execute(test_id, output, config).await,
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
