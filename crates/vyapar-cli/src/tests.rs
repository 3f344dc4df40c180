//! CLI command tests

use std::sync::Arc;

use vyapar_core::ai::{MockBackend, MockReply};
use vyapar_core::{AIClient, AnalysisRequest, Analyzer, Database, ReferenceData};

use crate::commands::{self, truncate};

fn mock_analyzer(mock: MockBackend) -> Analyzer {
    let reference = Arc::new(ReferenceData::embedded().unwrap());
    Analyzer::new(reference)
        .unwrap()
        .with_client(AIClient::Mock(mock))
}

fn kitchen_request(budget: &str) -> AnalysisRequest {
    AnalysisRequest::new(
        "cloud kitchen for office lunches",
        Some("Koramangala, Bangalore"),
        Some(budget),
    )
}

// ========== Analyze / History ==========

#[tokio::test]
async fn test_cmd_analyze_saves_to_history() {
    let db = Database::in_memory().unwrap();
    let analyzer = mock_analyzer(MockBackend::new());

    let id = commands::cmd_analyze(&analyzer, Some(&db), "cli-user", &kitchen_request("15 lakhs"), false)
        .await
        .unwrap()
        .expect("saved id");

    let stored = db.get_analysis("cli-user", id).unwrap().unwrap();
    assert_eq!(stored.input.category, "cloud_kitchen");
    assert_eq!(db.count_analyses("cli-user").unwrap(), 1);
    assert_eq!(db.count_analyses("anonymous").unwrap(), 0);

    assert!(commands::cmd_history(&db, "cli-user", 10).is_ok());
    assert!(commands::cmd_history_show(&db, "cli-user", id).is_ok());
    assert!(commands::cmd_history_show(&db, "someone-else", id).is_err());
}

#[tokio::test]
async fn test_cmd_analyze_without_save() {
    let analyzer = mock_analyzer(MockBackend::new());
    let id = commands::cmd_analyze(&analyzer, None, "anonymous", &kitchen_request("15 lakhs"), true)
        .await
        .unwrap();
    assert!(id.is_none());
}

#[tokio::test]
async fn test_cmd_analyze_reports_upstream_failure() {
    let db = Database::in_memory().unwrap();
    let analyzer = mock_analyzer(MockBackend::scripted(vec![MockReply::RateLimited]));

    let err = commands::cmd_analyze(&analyzer, Some(&db), "anonymous", &kitchen_request("5l"), false)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Too many analyses"));
    assert_eq!(db.count_analyses("anonymous").unwrap(), 0);
}

#[tokio::test]
async fn test_cmd_analyze_rejects_short_idea() {
    let mock = MockBackend::new();
    let analyzer = mock_analyzer(mock.clone());
    let request = AnalysisRequest::new("tea", None, None);

    assert!(commands::cmd_analyze(&analyzer, None, "anonymous", &request, false)
        .await
        .is_err());
    assert_eq!(mock.calls(), 0);
}

#[test]
fn test_cmd_history_empty() {
    let db = Database::in_memory().unwrap();
    assert!(commands::cmd_history(&db, "anonymous", 20).is_ok());
}

// ========== Offline Commands ==========

#[test]
fn test_cmd_budget() {
    assert!(commands::cmd_budget("2.5 Cr").is_ok());
    assert!(commands::cmd_budget("whatever").is_ok());
}

#[test]
fn test_cmd_classify() {
    let reference = ReferenceData::embedded().unwrap();
    assert!(commands::cmd_classify(&reference, "cloud kitchen", Some("Indore")).is_ok());
    assert!(commands::cmd_classify(&reference, "something new", None).is_ok());
}

#[test]
fn test_cmd_prompts_show_unknown_id() {
    assert!(commands::cmd_prompts_show("no_such_prompt").is_ok());
}

// ========== Utilities ==========

#[test]
fn test_build_analyzer_rejects_unknown_strategy() {
    assert!(commands::build_analyzer(Some("astrology")).is_err());
}

#[test]
fn test_open_db_unencrypted_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.db");
    let db = commands::open_db(&path, true).unwrap();
    assert_eq!(db.count_analyses("anonymous").unwrap(), 0);
    assert!(path.exists());
}

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("a long business idea", 10), "a long ...");
    assert_eq!(truncate("चाय की दुकान", 6), "चाय...");
}
