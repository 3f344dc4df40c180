//! Integration tests for vyapar-core
//!
//! These tests exercise the full validate → classify → discover → score →
//! explain → store workflow against the mock AI backend.

use std::sync::Arc;

use vyapar_core::{
    ai::{MockBackend, MockReply},
    AIClient, AnalysisRequest, Analyzer, Database, Error, ReferenceData, StrategyKind, Verdict,
};

fn analyzer_with(mock: MockBackend, strategy: StrategyKind) -> Analyzer {
    let reference = Arc::new(ReferenceData::embedded().expect("embedded reference data"));
    Analyzer::new(reference)
        .expect("analyzer")
        .with_strategy(strategy)
        .with_client(AIClient::Mock(mock))
}

fn kitchen(budget: &str) -> AnalysisRequest {
    AnalysisRequest::new(
        "cloud kitchen for office lunches",
        Some("Koramangala, Bangalore"),
        Some(budget),
    )
}

// =============================================================================
// Acceptance scenarios
// =============================================================================

#[tokio::test]
async fn test_funded_kitchen_in_tier_one_city() {
    for strategy in [StrategyKind::Ensemble, StrategyKind::Weighted] {
        let result = analyzer_with(MockBackend::new(), strategy)
            .analyze(&kitchen("15 lakhs"))
            .await
            .unwrap();

        assert_eq!(result.input.tier, 1);
        assert_eq!(result.input.city.as_deref(), Some("Bangalore"));
        assert_eq!(result.input.category, "cloud_kitchen");
        assert!(result.features.budget_ratio >= 1.0);
        assert_ne!(result.verdict, Verdict::Avoid, "{} strategy", strategy);
        assert_eq!(result.strategy, strategy.as_str());
    }
}

#[tokio::test]
async fn test_underfunded_kitchen_is_avoid() {
    let result = analyzer_with(MockBackend::new(), StrategyKind::Ensemble)
        .analyze(&kitchen("20000"))
        .await
        .unwrap();

    assert_eq!(result.verdict, Verdict::Avoid);
    assert!(result.budget_fit_percent < 30);
    assert!(result
        .risks
        .iter()
        .any(|r| r.severity == vyapar_core::models::Severity::High));
}

#[tokio::test]
async fn test_short_idea_rejected_before_any_ai_call() {
    let mock = MockBackend::new();
    let err = analyzer_with(mock.clone(), StrategyKind::Ensemble)
        .analyze(&AnalysisRequest::new("tea", Some("Pune"), Some("1 lakh")))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Validation { .. }));
    assert_eq!(mock.calls(), 0);
}

#[tokio::test]
async fn test_prose_discovery_is_malformed() {
    let mock = MockBackend::with_response("What a wonderful idea! I think it will do great.");
    let err = analyzer_with(mock.clone(), StrategyKind::Ensemble)
        .analyze(&kitchen("15 lakhs"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::UpstreamMalformed(_)));
    // Discovery used its retry budget (config/models.toml), explanation never ran
    assert_eq!(mock.calls(), 3);
}

// =============================================================================
// Pipeline properties
// =============================================================================

#[tokio::test]
async fn test_same_request_same_numbers() {
    let analyzer = analyzer_with(MockBackend::new(), StrategyKind::Ensemble);
    let first = analyzer.analyze(&kitchen("15 lakhs")).await.unwrap();
    let second = analyzer.analyze(&kitchen("15 lakhs")).await.unwrap();

    assert_eq!(first.score, second.score);
    assert_eq!(first.verdict, second.verdict);
    assert_eq!(first.financial_projection, second.financial_projection);
}

#[tokio::test]
async fn test_months_sum_to_year() {
    let result = analyzer_with(MockBackend::new(), StrategyKind::Ensemble)
        .analyze(&kitchen("15 lakhs"))
        .await
        .unwrap();

    for year in &result.financial_projection.yearly_data {
        assert_eq!(year.profit, year.revenue - year.expenses);
        assert_eq!(year.months.len(), 12);
        let month_revenue: i64 = year.months.iter().map(|m| m.revenue).sum();
        assert!((month_revenue - year.revenue).abs() <= 12);
        assert!(year.months.iter().all(|m| m.profit == m.revenue - m.expenses));
    }
}

#[tokio::test]
async fn test_unsafe_ai_content_never_reaches_result() {
    let discovery = r#"{"factors": [
        {"name": "<script>alert(1)</script>Demand", "weight": 1.5, "score": 150, "reasoning": "<a href=\"javascript:void(0)\">click</a>"},
        {"name": "Competition", "weight": 0.2, "score": 40},
        {"name": "Location", "weight": 0.2, "score": 70, "isLocationSpecific": true},
        {"name": "Costs", "weight": 0.2, "score": 60}
    ]}"#;
    let explanation = r#"{"summary": "<img src=x onerror=alert(1)>Fine plan.", "risks": []}"#;
    let mock = MockBackend::scripted(vec![
        MockReply::Text(discovery.into()),
        MockReply::Text(explanation.into()),
    ]);

    let result = analyzer_with(mock, StrategyKind::Ensemble)
        .analyze(&kitchen("15 lakhs"))
        .await
        .unwrap();

    let json = serde_json::to_string(&result).unwrap();
    assert!(!json.contains("<script"));
    assert!(!json.contains("javascript:"));
    assert!(!json.contains("onerror"));
    assert!(result.factors.iter().all(|f| f.score <= 100 && f.weight <= 1.0));
    assert_eq!(result.summary, "Fine plan.");
    assert!(result.risks.len() >= 3);
}

#[tokio::test]
async fn test_rate_limit_surfaces_without_retry() {
    let mock = MockBackend::scripted(vec![MockReply::RateLimited]);
    let err = analyzer_with(mock.clone(), StrategyKind::Ensemble)
        .analyze(&kitchen("15 lakhs"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::UpstreamRateLimited(_)));
    assert_eq!(mock.calls(), 1);
}

#[tokio::test]
async fn test_unspecified_fields_echoed() {
    let result = analyzer_with(MockBackend::new(), StrategyKind::Ensemble)
        .analyze(&AnalysisRequest::new(
            "cloud kitchen for office lunches",
            None,
            Some("   "),
        ))
        .await
        .unwrap();

    assert_eq!(result.input.location, "Not specified");
    assert_eq!(result.input.budget, "Not specified");
    assert!(!result.input.budget_specified);
    assert_eq!(result.input.budget_amount, 500_000.0);
    assert_eq!(result.input.tier, 3);
    assert!(result.input.city.is_none());
}

// =============================================================================
// History store
// =============================================================================

#[tokio::test]
async fn test_analyze_then_store() {
    let db = Database::in_memory().expect("Failed to create in-memory database");
    let result = analyzer_with(MockBackend::new(), StrategyKind::Ensemble)
        .analyze(&kitchen("15 lakhs"))
        .await
        .unwrap();

    let id = db.save_analysis("anonymous", &result).unwrap();
    let listed = db.list_analyses("anonymous", 10).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, id);
    assert_eq!(listed[0].verdict, result.verdict);

    let stored = db.get_analysis("anonymous", id).unwrap().unwrap();
    assert_eq!(stored.score, result.score);
    assert_eq!(stored.generated_at, result.generated_at);
}
