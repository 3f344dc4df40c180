//! Database tests

use super::*;
use crate::analysis::assemble;
use crate::discovery::parse_discovery;
use crate::explanation::parse_explanation;
use crate::models::{AnalysisInput, AnalysisResult, ScoringFeatures, ScoringResult, Verdict, YearRecord};

fn sample(idea: &str, verdict: Verdict, score: u8) -> AnalysisResult {
    let scoring = ScoringResult {
        score,
        verdict,
        budget_fit_percent: 100,
        break_even_months: 14,
        roi: 38,
        financial_projections: vec![YearRecord::new(1, 3_600_000, 3_000_000)],
        strategy: "ensemble".into(),
        confidence_multiplier: 0.95,
        setup_cost: 900_000,
        monthly_revenue: 380_000,
        monthly_expenses: 290_000,
        monthly_profit: 90_000,
        features: ScoringFeatures::default(),
    };
    let input = AnalysisInput {
        business_idea: idea.to_string(),
        location: "Koramangala, Bangalore".into(),
        budget: "15 lakhs".into(),
        budget_amount: 1_500_000.0,
        budget_specified: true,
        category: "cloud_kitchen".into(),
        category_label: "Cloud Kitchen".into(),
        tier: 1,
        city: Some("Bangalore".into()),
    };
    assemble(
        input,
        scoring,
        parse_discovery(crate::ai::CANNED_DISCOVERY).unwrap(),
        parse_explanation(crate::ai::CANNED_EXPLANATION).unwrap(),
        1,
    )
}

#[test]
fn test_schema_exists() {
    let db = Database::in_memory().unwrap();
    let conn = db.conn().unwrap();
    let columns: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM pragma_table_info('analyses') WHERE name IN ('id', 'user_id', 'created_at', 'business_idea', 'location', 'budget', 'verdict', 'score', 'result')",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(columns, 9, "analyses table should have 9 expected columns");
}

#[test]
fn test_save_and_get_round_trip() {
    let db = Database::in_memory().unwrap();
    let result = sample("cloud kitchen for office lunches", Verdict::Go, 74);

    let id = db.save_analysis("alice", &result).unwrap();
    assert!(id > 0);

    let stored = db.get_analysis("alice", id).unwrap().unwrap();
    assert_eq!(stored.id, Some(id));
    assert_eq!(stored.verdict, Verdict::Go);
    assert_eq!(stored.financial_projection, result.financial_projection);
    assert_eq!(stored.factors, result.factors);
}

#[test]
fn test_history_is_scoped_to_caller() {
    let db = Database::in_memory().unwrap();
    let id = db
        .save_analysis("alice", &sample("cloud kitchen for office lunches", Verdict::Go, 74))
        .unwrap();
    db.save_analysis("bob", &sample("a tea stall near the station", Verdict::Caution, 55))
        .unwrap();

    assert!(db.get_analysis("bob", id).unwrap().is_none());
    assert!(!db.delete_analysis("bob", id).unwrap());
    assert_eq!(db.count_analyses("alice").unwrap(), 1);

    let bob = db.list_analyses("bob", 10).unwrap();
    assert_eq!(bob.len(), 1);
    assert_eq!(bob[0].verdict, Verdict::Caution);
    assert_eq!(bob[0].score, 55);
}

#[test]
fn test_list_newest_first_with_limit() {
    let db = Database::in_memory().unwrap();
    for i in 0..5 {
        db.save_analysis(
            "alice",
            &sample(&format!("idea number {} for testing", i), Verdict::Caution, 50 + i),
        )
        .unwrap();
    }

    let listed = db.list_analyses("alice", 3).unwrap();
    assert_eq!(listed.len(), 3);
    assert_eq!(listed[0].business_idea, "idea number 4 for testing");
    assert!(listed[0].id > listed[1].id);

    // Zero is raised to one
    assert_eq!(db.list_analyses("alice", 0).unwrap().len(), 1);
}

#[test]
fn test_delete() {
    let db = Database::in_memory().unwrap();
    let id = db
        .save_analysis("alice", &sample("cloud kitchen for office lunches", Verdict::Avoid, 30))
        .unwrap();

    assert!(db.delete_analysis("alice", id).unwrap());
    assert!(db.get_analysis("alice", id).unwrap().is_none());
    assert!(!db.delete_analysis("alice", id).unwrap());
}

#[test]
fn test_encrypted_requires_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.db");
    let path = path.to_str().unwrap();

    let db = Database::new_with_key(path, Some("correct horse")).unwrap();
    db.save_analysis("alice", &sample("cloud kitchen for office lunches", Verdict::Go, 70))
        .unwrap();
    drop(db);

    assert!(Database::new_with_key(path, Some("correct horse")).is_ok());
    assert!(Database::new_unencrypted(path).is_err());
}

#[test]
fn test_key_pragma_is_stable() {
    assert_eq!(key_pragma("secret").unwrap(), key_pragma("secret").unwrap());
    assert_ne!(key_pragma("secret").unwrap(), key_pragma("other").unwrap());
}
