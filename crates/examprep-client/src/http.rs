//! HTTP implementation of the question source and attempt sink.
//!
//! `GET {base}/api/tests/{id}` returns a test definition;
//! `POST {base}/api/tests/{id}/attempts` accepts a scored attempt.
//! Transient failures are retried with exponential backoff, honoring
//! `Retry-After` on 429 responses. No single wait exceeds one minute.

use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Url;
use tracing::{instrument, warn};

use examprep_core::model::TestDefinition;
use examprep_core::results::AttemptResult;
use examprep_core::traits::{AttemptSink, QuestionSource};

use crate::config::BackendConfig;
use crate::error::BackendError;

const DEFAULT_RETRY_AFTER_SECS: u64 = 5;
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Client for the examprep backend.
pub struct HttpBackend {
    base_url: Url,
    api_token: Option<String>,
    client: reqwest::Client,
    timeout_secs: u64,
    max_retries: u32,
    retry_delay: Duration,
}

impl HttpBackend {
    /// Build a client from config. Fails if no base URL is configured.
    pub fn new(config: &BackendConfig) -> anyhow::Result<Self> {
        let base_url = config
            .base_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .context("no backend base_url configured")?;
        let base_url =
            Url::parse(base_url).with_context(|| format!("invalid backend base_url {base_url}"))?;
        anyhow::ensure!(
            !base_url.cannot_be_a_base(),
            "backend base_url {base_url} cannot carry a path"
        );
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            base_url,
            api_token: config.api_token.clone(),
            client,
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Append `segments` to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: reqwest::Method, segments: &[&str]) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, self.endpoint(segments));
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Run `op` until it succeeds, fails permanently, or retries run out.
    async fn with_retries<T, F, Fut>(&self, op: F) -> Result<T, BackendError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let mut retry_delay = self.retry_delay;
        let mut attempt = 0u32;
        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            if err.is_permanent() || attempt >= self.max_retries {
                return Err(err);
            }
            attempt += 1;

            let delay = next_delay(&err, retry_delay);
            warn!(attempt, delay_ms = delay.as_millis() as u64, "retrying after error: {err}");
            tokio::time::sleep(delay).await;
            retry_delay = (retry_delay * 2).min(MAX_BACKOFF);
        }
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, BackendError> {
        builder.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout(self.timeout_secs)
            } else {
                BackendError::Network(e.to_string())
            }
        })
    }

    async fn fetch_once(&self, test_id: &str) -> Result<TestDefinition, BackendError> {
        let response = self
            .send(self.request(reqwest::Method::GET, &["api", "tests", test_id]))
            .await?;
        let response = check_status(response, test_id).await?;
        response.json().await.map_err(|e| BackendError::Api {
            status: 0,
            message: format!("failed to parse test definition: {e}"),
        })
    }

    async fn submit_once(&self, result: &AttemptResult) -> Result<(), BackendError> {
        let segments = ["api", "tests", result.test_id.as_str(), "attempts"];
        let response = self
            .send(self.request(reqwest::Method::POST, &segments).json(result))
            .await?;
        check_status(response, &result.test_id).await?;
        Ok(())
    }
}

/// Wait before the next retry: the server's `Retry-After` if it sent one,
/// otherwise the current backoff. Capped at [`MAX_BACKOFF`].
fn next_delay(err: &BackendError, backoff: Duration) -> Duration {
    err.retry_after_ms()
        .map(Duration::from_millis)
        .unwrap_or(backoff)
        .min(MAX_BACKOFF)
}

/// Map error statuses onto [`BackendError`].
async fn check_status(
    response: reqwest::Response,
    test_id: &str,
) -> Result<reqwest::Response, BackendError> {
    let status = response.status().as_u16();
    if status == 429 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
            .saturating_mul(1000);
        return Err(BackendError::RateLimited {
            retry_after_ms: retry_after,
        });
    }
    if status == 401 || status == 403 {
        let body = response.text().await.unwrap_or_default();
        return Err(BackendError::Unauthorized(body));
    }
    if status == 404 {
        return Err(BackendError::TestNotFound(test_id.to_string()));
    }
    if status >= 400 {
        let message = response.text().await.unwrap_or_default();
        return Err(BackendError::Api { status, message });
    }
    Ok(response)
}

#[async_trait]
impl QuestionSource for HttpBackend {
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn fetch_test(&self, test_id: &str) -> anyhow::Result<TestDefinition> {
        let test = self.with_retries(|| self.fetch_once(test_id)).await?;
        tracing::info!(questions = test.questions.len(), "fetched test");
        Ok(test)
    }
}

#[async_trait]
impl AttemptSink for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip_all, fields(test_id = %result.test_id, attempt_id = %result.attempt_id))]
    async fn submit_attempt(&self, result: &AttemptResult) -> anyhow::Result<()> {
        self.with_retries(|| self.submit_once(result)).await?;
        Ok(())
    }
}
