//! Knowledge engine client.
//!
//! Queries a computational knowledge API (WolframAlpha short-answers style)
//! for authoritative results and checks student answers against them. The
//! [`KnowledgeEngine`] trait hides the transport so the server can run without
//! a knowledge backend and tests can script results.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::error::{ClientError, ClientErrorKind, Result};

/// Default knowledge API base URL.
pub const DEFAULT_KNOWLEDGE_BASE_URL: &str = "https://api.wolframalpha.com";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Options for constructing an [`HttpKnowledgeEngine`].
#[derive(Debug, Clone)]
pub struct KnowledgeOptions {
    /// Base URL of the knowledge API.
    pub base_url: String,
    /// Application ID sent with each query.
    pub app_id: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl KnowledgeOptions {
    /// Creates options for the given application ID, with defaults for
    /// everything else.
    #[must_use]
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_KNOWLEDGE_BASE_URL.to_string(),
            app_id: app_id.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Overrides the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the request timeout.
    #[must_use]
    pub const fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// A computational engine that can answer math queries authoritatively.
#[async_trait]
pub trait KnowledgeEngine: Send + Sync {
    /// Computes a short plain-text answer for the query.
    async fn answer(&self, query: &str) -> Result<String>;

    /// Checks a proposed answer against the engine's own result.
    ///
    /// The comparison tolerates formatting differences: case, surrounding
    /// whitespace, thousands separators, and `1/2` versus `0.5`.
    async fn check(&self, query: &str, proposed: &str) -> Result<bool> {
        let expected = self.answer(query).await?;
        Ok(answers_match(&expected, proposed))
    }
}

/// HTTP client for a short-answers knowledge API.
#[derive(Debug, Clone)]
pub struct HttpKnowledgeEngine {
    client: reqwest::Client,
    options: KnowledgeOptions,
}

impl HttpKnowledgeEngine {
    /// Creates a client from the given options.
    ///
    /// # Errors
    ///
    /// Returns an error if the options fail validation or the underlying HTTP
    /// client cannot be built.
    pub fn new(options: KnowledgeOptions) -> Result<Self> {
        if options.app_id.trim().is_empty() {
            return Err(ClientError::invalid_options(
                "knowledge app ID is empty",
                "Provide a non-empty application ID for the knowledge API",
            ));
        }
        if options.base_url.trim().is_empty() {
            return Err(ClientError::invalid_options(
                "knowledge base URL is empty",
                "Provide the base URL of a short-answers API",
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(options.timeout_secs))
            .build()
            .map_err(|err| {
                ClientError::invalid_options(
                    err.to_string(),
                    "Check TLS and proxy settings on this host",
                )
            })?;
        Ok(Self { client, options })
    }
}

#[async_trait]
impl KnowledgeEngine for HttpKnowledgeEngine {
    #[instrument(skip(self, query), fields(query_chars = query.len()))]
    async fn answer(&self, query: &str) -> Result<String> {
        let url = format!("{}/v1/result", self.options.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .query(&[("appid", self.options.app_id.as_str()), ("i", query)])
            .send()
            .await
            .map_err(|err| ClientError::from_transport(&err))?;

        let status = response.status();
        // The short-answers API reports "I didn't understand that" as 501,
        // which must not be classified as a retryable server fault.
        if status.as_u16() == 501 {
            return Err(ClientError::api(
                ClientErrorKind::Other,
                "the knowledge engine could not interpret the query",
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::from_status(status.as_u16(), &body));
        }

        let answer = response
            .text()
            .await
            .map_err(|err| ClientError::from_transport(&err))?;
        debug!(answer_chars = answer.len(), "knowledge answer received");
        Ok(answer)
    }
}

/// Returns `true` when two answers agree after normalization.
///
/// Both answers are compared numerically when they parse as numbers (including
/// simple fractions), otherwise case-insensitively with collapsed whitespace.
///
/// # Examples
///
/// ```
/// use mathbuddy_clients::answers_match;
///
/// assert!(answers_match("4", "4.0"));
/// assert!(answers_match("1/2", "0.5"));
/// assert!(answers_match("x = 2", "X  =  2"));
/// assert!(!answers_match("4", "5"));
/// ```
#[must_use]
pub fn answers_match(expected: &str, proposed: &str) -> bool {
    if let (Some(a), Some(b)) = (parse_numeric(expected), parse_numeric(proposed)) {
        let tolerance = 1e-9 * a.abs().max(b.abs()).max(1.0);
        return (a - b).abs() <= tolerance;
    }
    normalize(expected) == normalize(proposed)
}

fn normalize(answer: &str) -> String {
    answer
        .trim()
        .trim_end_matches('.')
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_numeric(answer: &str) -> Option<f64> {
    let cleaned = answer.trim().replace(',', "");
    if let Some((numerator, denominator)) = cleaned.split_once('/') {
        let numerator: f64 = numerator.trim().parse().ok()?;
        let denominator: f64 = denominator.trim().parse().ok()?;
        if denominator.abs() < f64::EPSILON {
            return None;
        }
        return Some(numerator / denominator);
    }
    cleaned.parse().ok()
}
