//! OpenAI Whisper API client
//!
//! Endpoint: `POST {base_url}/audio/transcriptions` (multipart), model
//! `whisper-1`, `verbose_json` response with segment and word timestamps.
//! Requests are retried with exponential backoff; 400/401/413 never are.

use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant};
use tat_common::{retry_with_backoff, RetryPolicy, Retryable};
use thiserror::Error;
use tracing::{debug, info};

use super::upload::size_mb;

pub const WHISPER_MODEL: &str = "whisper-1";
pub const RESPONSE_FORMAT: &str = "verbose_json";

/// Whisper client errors, messages are shown to users as-is
#[derive(Debug, Error)]
pub enum WhisperError {
    #[error("Invalid OpenAI API key")]
    InvalidApiKey,

    #[error("Audio file too large for OpenAI API")]
    FileTooLarge,

    #[error("Audio file format not supported by Whisper API. Please convert to MP3, WAV, or another supported format.")]
    UnsupportedFormat,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("OpenAI API rate limit exceeded. Please try again later.")]
    RateLimited,

    #[error("OpenAI API server error ({0}). Please try again later.")]
    ServerError(u16),

    #[error("Request timeout. The audio file ({size_mb}MB) may be too large or the connection is slow. Try a smaller file or check your internet connection.")]
    Timeout { size_mb: String },

    #[error("Connection error: Unable to reach OpenAI API while sending {size_mb}MB. Please check your internet connection, firewall settings, or VPN.")]
    Connection { size_mb: String },

    #[error("Transcription failed: OpenAI API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Transcription failed: {0}")]
    InvalidResponse(String),

    #[error("Transcription failed: {0}")]
    Client(String),

    #[error("Could not read audio file: {0}")]
    Io(#[from] std::io::Error),
}

impl Retryable for WhisperError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            WhisperError::RateLimited
                | WhisperError::ServerError(_)
                | WhisperError::Timeout { .. }
                | WhisperError::Connection { .. }
        )
    }
}

/// Map a non-success status and the vendor error message
pub fn map_status(status: StatusCode, message: String) -> WhisperError {
    match status {
        StatusCode::UNAUTHORIZED => WhisperError::InvalidApiKey,
        StatusCode::PAYLOAD_TOO_LARGE => WhisperError::FileTooLarge,
        StatusCode::BAD_REQUEST => {
            if message.to_lowercase().contains("file format") {
                WhisperError::UnsupportedFormat
            } else if message.is_empty() {
                WhisperError::BadRequest("Invalid file format or parameters".to_string())
            } else {
                WhisperError::BadRequest(message)
            }
        }
        StatusCode::TOO_MANY_REQUESTS => WhisperError::RateLimited,
        s if s.is_server_error() => WhisperError::ServerError(s.as_u16()),
        s => WhisperError::Api {
            status: s.as_u16(),
            message,
        },
    }
}

/// `verbose_json` transcription
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    pub text: String,
    #[serde(default)]
    pub language: Option<String>,
    /// Seconds
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub segments: Vec<TranscriptSegment>,
    #[serde(default)]
    pub words: Vec<TranscriptWord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    #[serde(default)]
    pub id: u32,
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscriptWord {
    pub word: String,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub confidence: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorBody {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    #[serde(default)]
    message: String,
}

/// Whisper API client
pub struct WhisperClient {
    http_client: reqwest::Client,
    api_key: String,
    base_url: String,
    retry: RetryPolicy,
}

impl WhisperClient {
    pub fn new(
        api_key: String,
        base_url: &str,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, WhisperError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WhisperError::Client(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::new(max_retries),
        })
    }

    /// Override the retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Transcribe one file (must be within the Whisper size limit)
    pub async fn transcribe(
        &self,
        path: &Path,
        language: Option<&str>,
    ) -> Result<Transcription, WhisperError> {
        let bytes = tokio::fs::read(path).await?;
        let size = size_mb(bytes.len() as u64);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio".to_string());

        info!("Starting transcription for file: {} ({}MB)", path.display(), size);

        retry_with_backoff("whisper transcription", self.retry, || {
            self.transcribe_once(bytes.clone(), &file_name, language, &size)
        })
        .await
    }

    async fn transcribe_once(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        language: Option<&str>,
        size: &str,
    ) -> Result<Transcription, WhisperError> {
        let part = Part::bytes(bytes).file_name(file_name.to_string());
        let mut form = Form::new()
            .part("file", part)
            .text("model", WHISPER_MODEL)
            .text("response_format", RESPONSE_FORMAT)
            .text("temperature", "0");

        if let Some(lang) = language.filter(|l| !l.trim().is_empty()) {
            form = form.text("language", lang.to_string());
        }

        debug!("Calling OpenAI Whisper API");
        let started = Instant::now();

        let response = self
            .http_client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    WhisperError::Timeout {
                        size_mb: size.to_string(),
                    }
                } else if e.is_connect() || e.is_request() {
                    WhisperError::Connection {
                        size_mb: size.to_string(),
                    }
                } else {
                    WhisperError::Client(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<OpenAiErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            return Err(map_status(status, message));
        }

        let transcription: Transcription = response.json().await.map_err(|e| {
            if e.is_timeout() {
                WhisperError::Timeout {
                    size_mb: size.to_string(),
                }
            } else {
                WhisperError::InvalidResponse(format!("Unreadable Whisper response: {}", e))
            }
        })?;

        info!(
            elapsed_s = format!("{:.2}", started.elapsed().as_secs_f64()),
            "OpenAI API call completed"
        );
        Ok(transcription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            map_status(StatusCode::UNAUTHORIZED, String::new()),
            WhisperError::InvalidApiKey
        ));
        assert!(matches!(
            map_status(StatusCode::PAYLOAD_TOO_LARGE, String::new()),
            WhisperError::FileTooLarge
        ));
        assert!(matches!(
            map_status(StatusCode::BAD_REQUEST, "Invalid file format.".into()),
            WhisperError::UnsupportedFormat
        ));
        assert_eq!(
            map_status(StatusCode::BAD_REQUEST, "bad language".into()).to_string(),
            "Bad request: bad language"
        );
        assert!(matches!(
            map_status(StatusCode::TOO_MANY_REQUESTS, String::new()),
            WhisperError::RateLimited
        ));
        assert!(matches!(
            map_status(StatusCode::BAD_GATEWAY, String::new()),
            WhisperError::ServerError(502)
        ));
    }

    #[test]
    fn test_retry_classification() {
        assert!(!WhisperError::InvalidApiKey.is_retryable());
        assert!(!WhisperError::FileTooLarge.is_retryable());
        assert!(!WhisperError::BadRequest("x".into()).is_retryable());
        assert!(WhisperError::RateLimited.is_retryable());
        assert!(WhisperError::ServerError(500).is_retryable());
        assert!(WhisperError::Timeout { size_mb: "1.00".into() }.is_retryable());
    }

    #[test]
    fn test_timeout_message_includes_size() {
        let err = WhisperError::Timeout {
            size_mb: "12.50".into(),
        };
        assert!(err.to_string().contains("12.50MB"));
    }

    #[test]
    fn test_verbose_json_parses() {
        let body = r#"{
            "task": "transcribe",
            "language": "spanish",
            "duration": 3.5,
            "text": "Vamos, uno a uno.",
            "segments": [{"id": 0, "seek": 0, "start": 0.0, "end": 3.5, "text": "Vamos, uno a uno.", "avg_logprob": -0.2}],
            "words": [{"word": "Vamos", "start": 0.0, "end": 0.6}]
        }"#;
        let t: Transcription = serde_json::from_str(body).unwrap();
        assert_eq!(t.duration, Some(3.5));
        assert_eq!(t.segments.len(), 1);
        assert_eq!(t.words[0].confidence, None);
    }
}
