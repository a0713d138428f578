//! Direct REST LLM agents.
//!
//! The planner talks to language models through the `CompletionAgent`
//! trait; the implementations here call the provider HTTP APIs directly,
//! with no CLI or SDK dependency. Each agent is one tier of the planner's
//! fallback chain; callers impose their own timeout policy on top of the
//! 30-second client timeout.

pub mod gemini_api_agent;
pub mod openai_api_agent;

pub use gemini_api_agent::GeminiApiAgent;
pub use openai_api_agent::OpenAiApiAgent;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::HeaderValue;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by an agent call.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Missing key or configuration; the tier should be skipped.
    #[error("agent not configured: {0}")]
    NotConfigured(String),

    /// The HTTP request failed or the provider returned an error status.
    #[error("agent request failed: {message}")]
    ProcessError {
        status_code: Option<u16>,
        message: String,
        is_retryable: bool,
        retry_after: Option<Duration>,
    },

    /// The provider answered but the response was unusable.
    #[error("agent execution failed: {0}")]
    ExecutionFailed(String),
}

/// An LLM backend that completes a system+user prompt pair into text.
#[async_trait]
pub trait CompletionAgent: Send + Sync {
    /// Short name used in fallback logging.
    fn name(&self) -> &str;

    /// Sends the prompt pair and returns the raw response text.
    async fn complete(&self, system: &str, user: &str) -> Result<String, AgentError>;
}

pub(crate) fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

pub(crate) fn parse_retry_after(header: Option<&HeaderValue>) -> Option<Duration> {
    let value = header?.to_str().ok()?;
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    // Retry-After HTTP-date parsing is omitted for simplicity
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
        assert!(!is_retryable_status(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn test_retry_after_seconds() {
        let header = HeaderValue::from_static("30");
        assert_eq!(
            parse_retry_after(Some(&header)),
            Some(Duration::from_secs(30))
        );
        let date = HeaderValue::from_static("Wed, 21 Oct 2026 07:28:00 GMT");
        assert_eq!(parse_retry_after(Some(&date)), None);
        assert_eq!(parse_retry_after(None), None);
    }
}
