//! Test utilities for vyapar-core
//!
//! A mock HTTP server that speaks enough of each upstream protocol for
//! integration tests: OpenAI-compatible chat completions, Ollama chat, a
//! Tavily-style search endpoint and World Bank indicators.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Json, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::oneshot;

use crate::ai::{CANNED_DISCOVERY, CANNED_EXPLANATION};

/// How the chat endpoints answer
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Canned discovery or explanation JSON, chosen from the prompt
    Canned,
    /// Conversational text with no JSON in it
    Prose,
    /// A fixed status code and body
    Status(u16, String),
}

#[derive(Clone)]
struct MockState {
    behavior: MockBehavior,
    chat_calls: Arc<AtomicUsize>,
    last_authorization: Arc<Mutex<Option<String>>>,
}

/// Mock upstream server for testing and development
pub struct MockLlmServer {
    addr: SocketAddr,
    state: MockState,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockLlmServer {
    /// Start the mock server with canned replies on an available port
    pub async fn start() -> Self {
        Self::start_with(MockBehavior::Canned).await
    }

    /// Start the mock server with a specific chat behavior
    pub async fn start_with(behavior: MockBehavior) -> Self {
        let state = MockState {
            behavior,
            chat_calls: Arc::new(AtomicUsize::new(0)),
            last_authorization: Arc::new(Mutex::new(None)),
        };

        let app = Router::new()
            .route("/v1/models", get(handle_models))
            .route("/v1/chat/completions", post(handle_openai_chat))
            .route("/api/tags", get(handle_tags))
            .route("/api/chat", post(handle_ollama_chat))
            .route("/search", post(handle_search))
            .route("/country/IND/indicator/:id", get(handle_indicator))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Chat completions served so far (both protocols)
    pub fn chat_calls(&self) -> usize {
        self.state.chat_calls.load(Ordering::SeqCst)
    }

    /// Authorization header on the most recent chat request
    pub fn last_authorization(&self) -> Option<String> {
        self.state.last_authorization.lock().ok().and_then(|a| a.clone())
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockLlmServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug, Deserialize)]
struct ChatBody {
    #[serde(default)]
    model: String,
    #[serde(default)]
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

/// Pick the reply for a chat request, or an error response
fn chat_reply(state: &MockState, headers: &HeaderMap, body: &ChatBody) -> Result<String, Response> {
    state.chat_calls.fetch_add(1, Ordering::SeqCst);
    if let Ok(mut auth) = state.last_authorization.lock() {
        *auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
    }

    match state.behavior {
        MockBehavior::Status(code, ref text) => {
            let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            Err((status, text.clone()).into_response())
        }
        MockBehavior::Prose => {
            Ok("That sounds like a promising idea! Let me know if you want more detail.".into())
        }
        MockBehavior::Canned => {
            // Matches the "Computed results" block in prompts/explain_analysis.md
            let is_explanation = body
                .messages
                .iter()
                .any(|m| m.content.contains("Computed results (final)"));
            Ok(if is_explanation {
                CANNED_EXPLANATION.to_string()
            } else {
                CANNED_DISCOVERY.to_string()
            })
        }
    }
}

async fn handle_models() -> impl IntoResponse {
    Json(json!({"object": "list", "data": [{"id": "mock-model", "object": "model"}]}))
}

async fn handle_openai_chat(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<ChatBody>,
) -> Response {
    match chat_reply(&state, &headers, &body) {
        Ok(content) => Json(json!({
            "id": "chatcmpl-mock",
            "object": "chat.completion",
            "model": body.model,
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }]
        }))
        .into_response(),
        Err(response) => response,
    }
}

async fn handle_tags() -> impl IntoResponse {
    Json(json!({"models": [{"name": "llama3.1:latest", "size": 4_000_000_000u64}]}))
}

async fn handle_ollama_chat(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<ChatBody>,
) -> Response {
    match chat_reply(&state, &headers, &body) {
        Ok(content) => Json(json!({
            "model": body.model,
            "message": {"role": "assistant", "content": content},
            "done": true
        }))
        .into_response(),
        Err(response) => response,
    }
}

async fn handle_search(Json(body): Json<serde_json::Value>) -> impl IntoResponse {
    let query = body["query"].as_str().unwrap_or_default().to_string();
    Json(json!({
        "query": query,
        "results": [
            {
                "title": "Food delivery market in India",
                "content": "<b>Online food delivery</b> is growing about 20% a year in metro cities.",
                "url": "https://example.com/food-delivery"
            },
            {
                "title": "Cloud kitchen economics",
                "content": "Most cloud kitchens break even within 18 to 30 months.",
                "url": "https://example.com/cloud-kitchens"
            }
        ]
    }))
}

async fn handle_indicator(Path(id): Path<String>) -> impl IntoResponse {
    let value = match id.as_str() {
        "NY.GDP.MKTP.KD.ZG" => 6.5,
        "FP.CPI.TOTL.ZG" => 4.9,
        _ => return Json(json!([{"message": [{"key": "Invalid value"}]}])),
    };
    Json(json!([
        {"page": 1, "pages": 1, "per_page": 50, "total": 1},
        [{"indicator": {"id": id, "value": "indicator"}, "date": "2024", "value": value}]
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AIBackend, CompletionRequest, OllamaBackend, OpenAICompatibleBackend};
    use crate::error::Error;
    use crate::model_router::{TaskConfig, TaskType};

    fn request(task: TaskType, user: &str) -> CompletionRequest {
        CompletionRequest::new(task, "system".into(), user.into(), &TaskConfig::default())
    }

    #[tokio::test]
    async fn test_openai_compatible_round_trip() {
        let server = MockLlmServer::start().await;
        let backend = OpenAICompatibleBackend::with_api_key(&server.url(), "mock-model", "sk-test");

        assert!(backend.health_check().await);
        let text = backend
            .complete(&request(TaskType::FactorDiscovery, "cloud kitchen"))
            .await
            .unwrap();
        assert!(text.contains("marketEstimates"));
        assert_eq!(server.last_authorization().as_deref(), Some("Bearer sk-test"));

        let text = backend
            .complete(&request(TaskType::Explanation, "Computed results (final):"))
            .await
            .unwrap();
        assert!(text.contains("roadmap"));
        assert_eq!(server.chat_calls(), 2);
    }

    #[tokio::test]
    async fn test_ollama_round_trip() {
        let server = MockLlmServer::start().await;
        let backend = OllamaBackend::new(&server.url(), "llama3.1");

        assert!(backend.health_check().await);
        let text = backend
            .complete(&request(TaskType::FactorDiscovery, "bakery"))
            .await
            .unwrap();
        assert!(text.contains("factors"));
        assert!(server.last_authorization().is_none());
    }

    #[tokio::test]
    async fn test_status_codes_map_to_errors() {
        let cases = [
            (429, "slow down", "rate"),
            (429, r#"{"error":{"code":"insufficient_quota"}}"#, "quota"),
            (503, "overloaded", "unavailable"),
        ];
        for (code, body, expected) in cases {
            let server = MockLlmServer::start_with(MockBehavior::Status(code, body.into())).await;
            let backend = OpenAICompatibleBackend::new(&server.url(), "mock-model");
            let err = backend
                .complete(&request(TaskType::FactorDiscovery, "x"))
                .await
                .unwrap_err();
            let matched = match expected {
                "rate" => matches!(err, Error::UpstreamRateLimited(_)),
                "quota" => matches!(err, Error::UpstreamQuotaExhausted(_)),
                _ => matches!(err, Error::UpstreamUnavailable(_)),
            };
            assert!(matched, "{} {} -> {:?}", code, body, err);
        }
    }
}
