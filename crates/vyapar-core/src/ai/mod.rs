//! Pluggable AI backend abstraction
//!
//! This module provides a backend-agnostic interface for the two language
//! model calls an analysis makes (factor discovery and explanation).
//!
//! # Architecture
//!
//! - `AIBackend` trait: a single chat-style completion plus health/identity
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `OllamaBackend`, `OpenAICompatibleBackend`, `MockBackend`
//! - `AIClient::complete_parsed`: deadline, retry and parse for mandatory calls
//!
//! # Configuration
//!
//! Environment variables:
//! - `AI_BACKEND`: Backend to use (openai_compatible, ollama, mock). Default: openai_compatible
//! - `OPENAI_COMPATIBLE_HOST`: Server URL (required for openai_compatible backend)
//! - `OPENAI_COMPATIBLE_MODEL`: Model name (default: gpt-4o-mini)
//! - `OPENAI_COMPATIBLE_API_KEY`: API key if required (optional)
//! - `OLLAMA_HOST`: Ollama server URL (required for ollama backend)
//! - `OLLAMA_MODEL`: Default model name (default: llama3.1)

mod mock;
mod ollama;
mod openai_compatible;
pub mod parsing;
pub mod types;

pub use mock::{MockBackend, MockReply, CANNED_DISCOVERY, CANNED_EXPLANATION};
pub use ollama::OllamaBackend;
pub use openai_compatible::OpenAICompatibleBackend;
pub use types::*;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Trait defining the interface for all AI backends
///
/// Backends should be Send + Sync to allow use across async tasks.
#[async_trait]
pub trait AIBackend: Send + Sync {
    /// Run one completion and return the raw assistant text
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Check if the backend is available
    async fn health_check(&self) -> bool;

    /// Get the model name (for logging)
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete AI client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum AIClient {
    /// OpenAI-compatible backend (hosted APIs, vLLM, LocalAI, llama-server, etc.)
    OpenAICompatible(OpenAICompatibleBackend),
    /// Ollama backend (HTTP API)
    Ollama(OllamaBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl AIClient {
    /// Create an AI client from environment variables
    ///
    /// Checks `AI_BACKEND` to determine which backend to use:
    /// - `openai_compatible` (default): Uses OPENAI_COMPATIBLE_HOST and OPENAI_COMPATIBLE_MODEL
    /// - `ollama`: Uses OLLAMA_HOST and OLLAMA_MODEL
    /// - `mock`: Creates a mock backend with canned responses
    ///
    /// Returns None if the required environment variables are not set.
    pub fn from_env() -> Option<Self> {
        let backend =
            std::env::var("AI_BACKEND").unwrap_or_else(|_| "openai_compatible".to_string());

        match backend.to_lowercase().as_str() {
            "openai_compatible" | "openai" | "vllm" | "localai" | "llamacpp" => {
                OpenAICompatibleBackend::from_env().map(AIClient::OpenAICompatible)
            }
            "ollama" => OllamaBackend::from_env().map(AIClient::Ollama),
            "mock" => Some(AIClient::Mock(MockBackend::new())),
            _ => {
                warn!(backend = %backend, "Unknown AI_BACKEND, falling back to openai_compatible");
                OpenAICompatibleBackend::from_env().map(AIClient::OpenAICompatible)
            }
        }
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }

    /// Backend name for logging and health output
    pub fn backend_name(&self) -> &'static str {
        match self {
            AIClient::OpenAICompatible(_) => "openai_compatible",
            AIClient::Ollama(_) => "ollama",
            AIClient::Mock(_) => "mock",
        }
    }

    /// Complete and parse with a deadline per attempt and bounded retries
    ///
    /// `parse` runs inside the retry loop, so a reply that cannot be parsed
    /// counts as a transient failure. Rate limits and quota errors end the
    /// loop immediately.
    pub async fn complete_parsed<T, F>(
        &self,
        request: &CompletionRequest,
        retry: RetryPolicy,
        parse: F,
    ) -> Result<T>
    where
        F: Fn(&str) -> Result<T>,
    {
        let mut attempt = 0u32;
        loop {
            let outcome = match tokio::time::timeout(request.timeout, self.complete(request)).await
            {
                Ok(Ok(text)) => parse(&text),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(Error::UpstreamTimeout(request.timeout.as_secs())),
            };

            match outcome {
                Ok(value) => {
                    debug!(task = %request.task, attempt, "AI call succeeded");
                    return Ok(value);
                }
                Err(e) if e.is_transient() && attempt < retry.max_retries => {
                    attempt += 1;
                    warn!(
                        task = %request.task,
                        attempt,
                        max_retries = retry.max_retries,
                        error = %e,
                        "AI call failed, retrying"
                    );
                    if !retry.delay.is_zero() {
                        tokio::time::sleep(retry.delay).await;
                    }
                }
                Err(e) => {
                    warn!(task = %request.task, attempt, error = %e, "AI call failed");
                    return Err(e);
                }
            }
        }
    }
}

// Implement AIBackend for AIClient by delegating to the inner backend
#[async_trait]
impl AIBackend for AIClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        match self {
            AIClient::OpenAICompatible(b) => b.complete(request).await,
            AIClient::Ollama(b) => b.complete(request).await,
            AIClient::Mock(b) => b.complete(request).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AIClient::OpenAICompatible(b) => b.health_check().await,
            AIClient::Ollama(b) => b.health_check().await,
            AIClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AIClient::OpenAICompatible(b) => b.model(),
            AIClient::Ollama(b) => b.model(),
            AIClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::OpenAICompatible(b) => b.host(),
            AIClient::Ollama(b) => b.host(),
            AIClient::Mock(b) => b.host(),
        }
    }
}

/// Map a non-success upstream status to a typed error
pub(crate) fn status_error(status: StatusCode, body: &str) -> Error {
    let detail = format!("{} {}", status.as_u16(), truncate(body, 300));
    let lower = body.to_lowercase();
    match status {
        StatusCode::PAYMENT_REQUIRED => Error::UpstreamQuotaExhausted(detail),
        StatusCode::TOO_MANY_REQUESTS
            if lower.contains("insufficient_quota") || lower.contains("quota") =>
        {
            Error::UpstreamQuotaExhausted(detail)
        }
        StatusCode::TOO_MANY_REQUESTS => Error::UpstreamRateLimited(detail),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Error::Configuration(format!("upstream rejected credentials ({})", detail))
        }
        s if s.is_server_error() => Error::UpstreamUnavailable(detail),
        _ => Error::UpstreamMalformed(format!("unexpected upstream status {}", detail)),
    }
}

/// Map a transport failure to a typed error
pub(crate) fn transport_error(err: reqwest::Error, request: &CompletionRequest) -> Error {
    if err.is_timeout() {
        Error::UpstreamTimeout(request.timeout.as_secs())
    } else if err.is_decode() {
        Error::UpstreamMalformed(err.to_string())
    } else {
        Error::UpstreamUnavailable(err.to_string())
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
