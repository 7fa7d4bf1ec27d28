//! File and environment configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use examprep_core::config::AnalysisConfig;

/// Connection settings for the examprep backend.
///
/// Note: Custom Debug impl masks the API token to prevent accidental exposure in logs.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL, e.g. `https://exams.example.com`. Unset means offline.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Bearer token sent with every request.
    #[serde(default)]
    pub api_token: Option<String>,
    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retries on transient errors.
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    /// Initial delay between retries in milliseconds; doubles each time.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "***"))
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .finish()
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_retries() -> u32 {
    3
}
fn default_retry_delay() -> u64 {
    1000
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./examprep-results")
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_token: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_retries(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

/// Top-level examprep configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamprepConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// Where attempt reports are written when no path is given.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for ExamprepConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            analysis: AnalysisConfig::default(),
            output_dir: default_output_dir(),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
///
/// Unset variables expand to the empty string. Substituted values are
/// inserted verbatim and never expanded again.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    let mut cursor = 0;
    while let Some(offset) = result[cursor..].find("${") {
        let start = cursor + offset;
        let Some(end) = result[start..].find('}') else {
            break;
        };
        let var_name = &result[start + 2..start + end];
        let value = std::env::var(var_name).unwrap_or_default();
        result = format!(
            "{}{}{}",
            &result[..start],
            value,
            &result[start + end + 1..]
        );
        cursor = start + value.len();
    }
    result
}

fn resolve_optional(value: &mut Option<String>) {
    if let Some(v) = value.take() {
        let resolved = resolve_env_vars(&v);
        *value = (!resolved.is_empty()).then_some(resolved);
    }
}

/// Apply `EXAMPREP_BASE_URL` / `EXAMPREP_API_TOKEN` style overrides.
fn apply_overrides(config: &mut ExamprepConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup("EXAMPREP_BASE_URL") {
        config.backend.base_url = Some(url);
    }
    if let Some(token) = lookup("EXAMPREP_API_TOKEN") {
        config.backend.api_token = Some(token);
    }
}

/// Load config from an explicit path, or search the well-known paths.
///
/// Search order when no path is given:
/// 1. `examprep.toml` in the current directory
/// 2. `~/.config/examprep/config.toml`
///
/// Environment variable overrides: `EXAMPREP_BASE_URL`, `EXAMPREP_API_TOKEN`.
pub fn load_config_from(path: Option<&Path>) -> Result<ExamprepConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("examprep.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            let config = parse_config(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?;
            tracing::debug!(path = %path.display(), "loaded config");
            config
        }
        None => ExamprepConfig::default(),
    };

    apply_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Parse a config document and expand `${VAR}` references in the backend section.
pub fn parse_config(content: &str) -> Result<ExamprepConfig> {
    let mut config: ExamprepConfig = toml::from_str(content)?;
    resolve_optional(&mut config.backend.base_url);
    resolve_optional(&mut config.backend.api_token);
    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("examprep"))
}
