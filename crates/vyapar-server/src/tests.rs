//! Server API tests

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use tower::ServiceExt;
use vyapar_core::ai::{MockBackend, MockReply};
use vyapar_core::{AIClient, ReferenceData};

fn analyzer(mock: Option<MockBackend>) -> Arc<Analyzer> {
    let reference = Arc::new(ReferenceData::embedded().unwrap());
    let analyzer = Analyzer::new(reference).unwrap();
    Arc::new(match mock {
        Some(mock) => analyzer.with_client(AIClient::Mock(mock)),
        None => analyzer,
    })
}

fn setup_test_app() -> Router {
    create_router(
        analyzer(Some(MockBackend::new())),
        Some(Database::in_memory().unwrap()),
        None,
        ServerConfig::default(),
    )
}

fn app_with(mock: MockBackend) -> Router {
    create_router(analyzer(Some(mock)), None, None, ServerConfig::default())
}

async fn get_body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn kitchen_request() -> serde_json::Value {
    serde_json::json!({
        "businessIdea": "cloud kitchen for office lunches",
        "location": "Koramangala, Bangalore",
        "budget": "15 lakhs"
    })
}

// ========== Analyze ==========

#[tokio::test]
async fn test_analyze_returns_full_contract() {
    let app = setup_test_app();

    let response = app
        .oneshot(post_json("/api/analyze", kitchen_request()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert!(json["id"].as_i64().is_some());
    assert!(["GO", "CAUTION", "AVOID"].contains(&json["verdict"].as_str().unwrap()));
    assert_ne!(json["verdict"], "AVOID");
    assert!(json["score"].as_u64().unwrap() <= 100);
    assert_eq!(
        json["financialProjection"]["yearlyData"]
            .as_array()
            .unwrap()
            .len(),
        5
    );
    assert_eq!(json["roadmap"]["phases"].as_array().unwrap().len(), 3);
    assert_eq!(json["input"]["tier"], 1);
    assert_eq!(json["input"]["category"], "cloud_kitchen");
    assert!(json["generatedAt"].is_string());
}

#[tokio::test]
async fn test_analyze_validation_error_names_field() {
    let mock = MockBackend::new();
    let app = app_with(mock.clone());

    let response = app
        .oneshot(post_json(
            "/api/analyze",
            serde_json::json!({"businessIdea": "tea"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = get_body_json(response).await;
    assert_eq!(json["field"], "businessIdea");
    assert_eq!(mock.calls(), 0);
}

#[tokio::test]
async fn test_analyze_upstream_errors_map_to_status() {
    let cases = [
        (MockReply::RateLimited, StatusCode::TOO_MANY_REQUESTS),
        (MockReply::QuotaExhausted, StatusCode::SERVICE_UNAVAILABLE),
    ];
    for (reply, expected) in cases {
        let app = app_with(MockBackend::scripted(vec![reply]));
        let response = app
            .oneshot(post_json("/api/analyze", kitchen_request()))
            .await
            .unwrap();
        assert_eq!(response.status(), expected);

        let json = get_body_json(response).await;
        let message = json["error"].as_str().unwrap();
        assert!(!message.contains("429"), "internal detail leaked: {}", message);
    }
}

#[tokio::test]
async fn test_analyze_prose_is_bad_gateway() {
    let app = app_with(MockBackend::with_response("Sounds great, good luck!"));
    let response = app
        .oneshot(post_json("/api/analyze", kitchen_request()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_analyze_without_backend_is_unavailable() {
    let app = create_router(analyzer(None), None, None, ServerConfig::default());
    let response = app
        .oneshot(post_json("/api/analyze", kitchen_request()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

// ========== History ==========

#[tokio::test]
async fn test_history_round_trip_per_user() {
    let app = setup_test_app();

    let mut request = post_json("/api/analyze", kitchen_request());
    request
        .headers_mut()
        .insert(USER_ID_HEADER, HeaderValue::from_static("founder-1"));
    let response = app.clone().oneshot(request).await.unwrap();
    let id = get_body_json(response).await["id"].as_i64().unwrap();

    // Listed for the owner
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/analyses?limit=5")
                .header(USER_ID_HEADER, "founder-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let list = get_body_json(response).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["id"], id);

    // Invisible to everyone else
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/analyses/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/analyses/{}", id))
                .header(USER_ID_HEADER, "founder-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(get_body_json(response).await["id"], id);

    // Delete, then gone
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/analyses/{}", id))
                .header(USER_ID_HEADER, "founder-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/analyses/{}", id))
                .header(USER_ID_HEADER, "founder-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_history_without_store_is_empty() {
    let app = app_with(MockBackend::new());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/analyses")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(get_body_json(response).await.as_array().unwrap().is_empty());
}

// ========== Utilities ==========

#[tokio::test]
async fn test_parse_budget_endpoint() {
    let app = setup_test_app();
    let response = app
        .oneshot(post_json(
            "/api/budget/parse",
            serde_json::json!({"budget": "2.5 Cr"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["amount"], 25_000_000.0);
    assert_eq!(json["specified"], true);
}

#[tokio::test]
async fn test_classify_endpoint() {
    let app = setup_test_app();
    let response = app
        .oneshot(post_json(
            "/api/classify",
            serde_json::json!({
                "businessIdea": "cloud kitchen for office lunches",
                "location": "Koramangala, Bangalore"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["business"]["category"], "cloud_kitchen");
    assert_eq!(json["location"]["tier"], 1);
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = setup_test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["ai_backend"], "mock");
    assert_eq!(json["ai_healthy"], true);
}

#[tokio::test]
async fn test_security_headers() {
    let app = setup_test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert!(headers.get("content-security-policy").is_some());
}

// ========== Helpers ==========

#[test]
fn test_get_user_id() {
    let mut headers = HeaderMap::new();
    assert_eq!(get_user_id(&headers), ANONYMOUS_USER);

    headers.insert(USER_ID_HEADER, HeaderValue::from_static("asha@example.in"));
    assert_eq!(get_user_id(&headers), "asha@example.in");

    headers.insert(USER_ID_HEADER, HeaderValue::from_static("x' OR 1=1 --"));
    assert_eq!(get_user_id(&headers), ANONYMOUS_USER);
}

#[test]
fn test_error_mapping() {
    use vyapar_core::Error;
    let cases = [
        (Error::validation("budget", "too long"), StatusCode::BAD_REQUEST),
        (Error::UpstreamTimeout(90), StatusCode::GATEWAY_TIMEOUT),
        (Error::UpstreamUnavailable("503".into()), StatusCode::SERVICE_UNAVAILABLE),
        (Error::Configuration("no host".into()), StatusCode::SERVICE_UNAVAILABLE),
        (Error::InvalidData("bad row".into()), StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (err, status) in cases {
        assert_eq!(AppError::from(err).status(), status);
    }
}
