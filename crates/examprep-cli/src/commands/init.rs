//! The `examprep init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("examprep.toml").exists() {
        println!("examprep.toml already exists, skipping.");
    } else {
        std::fs::write("examprep.toml", SAMPLE_CONFIG)?;
        println!("Created examprep.toml");
    }

    std::fs::create_dir_all("test-sets")?;
    let example_path = std::path::Path::new("test-sets/example.toml");
    if example_path.exists() {
        println!("test-sets/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_TEST)?;
        println!("Created test-sets/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Edit examprep.toml with your backend URL and token");
    println!("  2. Run: examprep validate --test-set test-sets/example.toml");
    println!("  3. Run: examprep replay --test test-sets/example.toml --events <events.json>");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# examprep configuration

output_dir = "./examprep-results"

[backend]
base_url = "${EXAMPREP_BASE_URL}"
api_token = "${EXAMPREP_API_TOKEN}"
timeout_secs = 30
max_retries = 3
retry_delay_ms = 1000

[analysis]
fast_threshold_ms = 30000
slow_threshold_ms = 120000
progression_segments = 4

[analysis.weights]
fast = 1.0
moderate = 0.7
slow = 0.3

[analysis.recommendations]
strong_accuracy = 80.0
weak_accuracy = 60.0
good_time_efficiency = 70
poor_time_efficiency = 50
"#;

const EXAMPLE_TEST: &str = r#"[test]
id = "example"
name = "Example Test"
duration_minutes = 10

[test.marking_scheme]
correct = 4.0
incorrect = -1.0
unattempted = 0.0

[[questions]]
id = "q1"
type = "single"
text = "What is the SI unit of force?"
subject = "Physics"
topic = "Units"
difficulty = "easy"
marks = 4.0
options = ["Joule", "Newton", "Watt", "Pascal"]
correct = 1

[[questions]]
id = "q2"
type = "multiple"
text = "Which of these are noble gases?"
subject = "Chemistry"
topic = "Periodic table"
difficulty = "medium"
marks = 4.0
options = ["Neon", "Nitrogen", "Argon", "Oxygen"]
correct = [0, 2]

[[questions]]
id = "q3"
type = "numerical"
text = "Acceleration due to gravity at the Earth's surface (m/s^2)?"
subject = "Physics"
topic = "Gravitation"
difficulty = "easy"
marks = 4.0
exact = 9.8
min = 9.7
max = 9.9
unit = "m/s^2"
"#;
