//! Anthropic Messages API client
//!
//! Single-turn text completions: one user message in, the first text block
//! out. Retries transient failures with exponential backoff.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tat_common::{retry_with_backoff, RetryPolicy, Retryable};
use thiserror::Error;
use tracing::debug;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const TEMPERATURE: f64 = 0.3;

#[derive(Debug, Error)]
pub enum ClaudeError {
    #[error("Invalid Claude API key")]
    InvalidApiKey,

    #[error("Claude API rate limit exceeded")]
    RateLimited,

    #[error("Claude API server error")]
    ServerError(u16),

    #[error("Claude API rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Request timeout")]
    Timeout,

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Unexpected Claude API response: {0}")]
    InvalidResponse(String),
}

impl Retryable for ClaudeError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClaudeError::RateLimited
                | ClaudeError::ServerError(_)
                | ClaudeError::Timeout
                | ClaudeError::Connection(_)
        )
    }
}

pub fn map_status(status: StatusCode, message: String) -> ClaudeError {
    match status {
        StatusCode::UNAUTHORIZED => ClaudeError::InvalidApiKey,
        StatusCode::TOO_MANY_REQUESTS => ClaudeError::RateLimited,
        s if s.is_server_error() => ClaudeError::ServerError(s.as_u16()),
        s => ClaudeError::Rejected {
            status: s.as_u16(),
            message,
        },
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
}

/// Claude client
pub struct ClaudeClient {
    http_client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    retry: RetryPolicy,
}

impl ClaudeClient {
    pub fn new(
        api_key: String,
        base_url: &str,
        model: String,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, ClaudeError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClaudeError::Connection(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            retry: RetryPolicy::new(max_retries),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one prompt, return the reply text
    pub async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, ClaudeError> {
        retry_with_backoff("claude completion", self.retry, || {
            self.complete_once(prompt, max_tokens)
        })
        .await
    }

    async fn complete_once(&self, prompt: &str, max_tokens: u32) -> Result<String, ClaudeError> {
        let body = json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "temperature": TEMPERATURE,
            "messages": [
                {"role": "user", "content": prompt}
            ]
        });

        debug!(model = %self.model, prompt_chars = prompt.len(), "Calling Claude API");

        let response = self
            .http_client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClaudeError::Timeout
                } else {
                    ClaudeError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|b| b.error.message)
                .unwrap_or(text);
            return Err(map_status(status, message));
        }

        let parsed: MessagesResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ClaudeError::Timeout
            } else {
                ClaudeError::InvalidResponse(e.to_string())
            }
        })?;

        parsed
            .content
            .into_iter()
            .find_map(|block| block.text)
            .ok_or_else(|| ClaudeError::InvalidResponse("no text content".to_string()))
    }
}
