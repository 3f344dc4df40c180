//! OpenAI-compatible backend implementation
//!
//! Works with any server that speaks the `/v1/chat/completions` protocol:
//! hosted APIs, vLLM, LocalAI, llama-server, Docker Model Runner.
//!
//! # Configuration
//!
//! ```bash
//! export AI_BACKEND=openai_compatible
//! export OPENAI_COMPATIBLE_HOST=https://api.openai.com
//! export OPENAI_COMPATIBLE_MODEL=gpt-4o-mini
//! export OPENAI_COMPATIBLE_API_KEY=sk-...
//! ```

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

use super::types::CompletionRequest;
use super::{status_error, transport_error, AIBackend};

const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// OpenAI-compatible backend
#[derive(Clone)]
pub struct OpenAICompatibleBackend {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAICompatibleBackend {
    /// Create a new backend without authentication
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: None,
        }
    }

    /// Create a new backend with a bearer token
    pub fn with_api_key(base_url: &str, model: &str, api_key: &str) -> Self {
        Self {
            api_key: Some(api_key.to_string()),
            ..Self::new(base_url, model)
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("OPENAI_COMPATIBLE_HOST").ok()?;
        let model =
            std::env::var("OPENAI_COMPATIBLE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let backend = match std::env::var("OPENAI_COMPATIBLE_API_KEY") {
            Ok(key) if !key.trim().is_empty() => Self::with_api_key(&host, &model, key.trim()),
            _ => Self::new(&host, &model),
        };
        Some(backend)
    }

    /// Create a new instance with a different model
    pub fn with_model(&self, model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..self.clone()
        }
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.api_key {
            Some(ref api_key) => builder.header("Authorization", format!("Bearer {}", api_key)),
            None => builder,
        }
    }
}

/// Chat completion request body
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl AIBackend for OpenAICompatibleBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let model = request.model_or(&self.model);
        let body = ChatCompletionRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: request.temperature,
            response_format: request.json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
            stream: false,
        };

        debug!(
            task = %request.task,
            model = %model,
            host = %self.base_url,
            "OpenAI-compatible completion"
        );

        let response = self
            .authorize(
                self.http_client
                    .post(format!("{}/v1/chat/completions", self.base_url))
                    .timeout(request.timeout)
                    .json(&body),
            )
            .send()
            .await
            .map_err(|e| transport_error(e, request))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, &text));
        }

        let chat_response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::UpstreamMalformed(format!("unreadable completion body: {}", e)))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| Error::UpstreamMalformed("completion had no content".into()))
    }

    async fn health_check(&self) -> bool {
        // Try /v1/models first (standard OpenAI endpoint)
        let models = self
            .authorize(
                self.http_client
                    .get(format!("{}/v1/models", self.base_url))
                    .timeout(std::time::Duration::from_secs(5)),
            )
            .send()
            .await;
        if matches!(models, Ok(ref resp) if resp.status().is_success()) {
            return true;
        }

        // Try /health (common for LocalAI, llama-server)
        matches!(
            self.http_client
                .get(format!("{}/health", self.base_url))
                .timeout(std::time::Duration::from_secs(5))
                .send()
                .await,
            Ok(ref resp) if resp.status().is_success()
        )
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_new_trims_trailing_slash() {
        let backend = OpenAICompatibleBackend::new("http://localhost:12434/", "llama3.2");
        assert_eq!(backend.host(), "http://localhost:12434");
        assert_eq!(backend.model(), "llama3.2");
    }

    #[test]
    fn test_backend_with_api_key() {
        let backend =
            OpenAICompatibleBackend::with_api_key("http://localhost:12434", "gpt-4o", "sk-test123");
        assert_eq!(backend.api_key.as_deref(), Some("sk-test123"));
        assert_eq!(backend.with_model("other").api_key.as_deref(), Some("sk-test123"));
    }

    #[tokio::test]
    async fn test_health_check_unreachable() {
        let backend = OpenAICompatibleBackend::new("http://127.0.0.1:1", "llama3.2");
        assert!(!backend.health_check().await);
    }

    #[test]
    fn test_request_serialization() {
        let body = ChatCompletionRequest {
            model: "gpt-4o-mini",
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "Be terse",
                },
                ChatMessage {
                    role: "user",
                    content: "Hello",
                },
            ],
            temperature: 0.1,
            response_format: Some(ResponseFormat {
                kind: "json_object",
            }),
            stream: false,
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "Hello");
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_null_content_deserializes() {
        let response: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#)
                .unwrap();
        assert!(response.choices[0].message.content.is_none());
    }
}
