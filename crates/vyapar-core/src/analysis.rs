//! The analysis pipeline
//!
//! [`Analyzer`] owns everything that is loaded once at startup (reference
//! tables, scoring engine, prompts, model routing, the LLM client and the
//! optional signal gateway) and runs one request end to end:
//!
//! validate → classify → signals → discovery → score → months → explanation → assemble
//!
//! Only the two AI calls can fail after validation. Numbers in the result
//! always come from the scoring engine.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::ai::{AIBackend, AIClient};
use crate::business::BusinessProfile;
use crate::discovery::{Discovery, DiscoveryContext, FactorDiscoveryAdapter};
use crate::error::{Error, Result};
use crate::explanation::{ExplanationAdapter, ExplanationContext};
use crate::location::LocationProfile;
use crate::model_router::ModelRouter;
use crate::models::{
    AnalysisInput, AnalysisResult, CompetitionAnalysis, FinancialProjection, MarketAnalysis,
    Narrative, Roadmap, ScoringResult,
};
use crate::money::{parse_budget, BudgetAmount};
use crate::projection::attach_months;
use crate::prompts::PromptLibrary;
use crate::reference::ReferenceData;
use crate::request::AnalysisRequest;
use crate::scoring::{ScoringEngine, ScoringInput, StrategyKind};
use crate::signals::ExternalSignalGateway;

/// Classifier output for an idea and location, without any AI call
#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    pub business: BusinessProfile,
    pub location: LocationProfile,
}

pub struct Analyzer {
    reference: Arc<ReferenceData>,
    engine: ScoringEngine,
    client: Option<AIClient>,
    prompts: PromptLibrary,
    router: ModelRouter,
    signals: Option<ExternalSignalGateway>,
}

impl Analyzer {
    /// Analyzer with embedded prompts, default routing, no client and no signals
    pub fn new(reference: Arc<ReferenceData>) -> Result<Self> {
        let engine = ScoringEngine::new(reference.policy.clone());
        Ok(Self {
            reference,
            engine,
            client: None,
            prompts: PromptLibrary::embedded_only()?,
            router: ModelRouter::default(),
            signals: None,
        })
    }

    /// Build from the environment and the local override directories
    ///
    /// A missing AI backend is not an error here; requests fail with a
    /// configuration error instead, so `classify` and `budget` keep working.
    pub fn from_env() -> Result<Self> {
        let reference = Arc::new(ReferenceData::load()?);
        let mut analyzer = Self::new(reference)?
            .with_prompts(PromptLibrary::new()?)
            .with_router(ModelRouter::new()?);

        if let Ok(name) = std::env::var("SCORING_STRATEGY") {
            let kind: StrategyKind = name.parse().map_err(Error::Configuration)?;
            analyzer = analyzer.with_strategy(kind);
        }

        match AIClient::from_env() {
            Some(client) => analyzer = analyzer.with_client(client),
            None => warn!("No AI backend configured; analyses will be refused"),
        }

        if let Some(signals) = ExternalSignalGateway::from_env() {
            analyzer = analyzer.with_signals(signals);
        }

        info!(
            strategy = analyzer.strategy_name(),
            ai_backend = analyzer.backend_name(),
            signals = analyzer.signals.is_some(),
            "Analyzer ready"
        );
        Ok(analyzer)
    }

    pub fn with_client(mut self, client: AIClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Override the strategy named in the policy
    pub fn with_strategy(mut self, kind: StrategyKind) -> Self {
        self.engine = ScoringEngine::with_strategy(self.reference.policy.clone(), kind);
        self
    }

    pub fn with_signals(mut self, signals: ExternalSignalGateway) -> Self {
        self.signals = Some(signals);
        self
    }

    pub fn with_prompts(mut self, prompts: PromptLibrary) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_router(mut self, router: ModelRouter) -> Self {
        self.router = router;
        self
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    pub fn prompts(&self) -> &PromptLibrary {
        &self.prompts
    }

    pub fn router(&self) -> &ModelRouter {
        &self.router
    }

    pub fn strategy_name(&self) -> &'static str {
        self.engine.strategy_name()
    }

    /// Name of the configured AI backend, or "none"
    pub fn backend_name(&self) -> &'static str {
        self.client.as_ref().map_or("none", AIClient::backend_name)
    }

    /// Whether the AI backend answers its health probe
    pub async fn health_check(&self) -> bool {
        match self.client {
            Some(ref client) => client.health_check().await,
            None => false,
        }
    }

    pub fn classify(&self, business_idea: &str, location: &str) -> Classification {
        Classification {
            business: self.reference.classify_business(business_idea),
            location: self.reference.classify_location(location),
        }
    }

    pub fn parse_budget(&self, raw: &str) -> BudgetAmount {
        parse_budget(Some(raw))
    }

    /// Run the full pipeline for one request
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult> {
        let started = Instant::now();
        let req = request.validate()?;

        let client = self.client.as_ref().ok_or_else(|| {
            Error::Configuration("no AI backend configured (set AI_BACKEND and its host)".into())
        })?;

        let budget = parse_budget(req.budget_given.then_some(req.budget.as_str()));
        let business = self.reference.classify_business(&req.business_idea);
        let location = self.reference.classify_location(&req.location);
        info!(
            category = %business.category,
            tier = location.tier,
            city = location.city.as_deref().unwrap_or("unknown"),
            budget = budget.amount,
            budget_specified = budget.specified,
            "Request classified"
        );

        let signals = match self.signals {
            Some(ref gateway) => {
                let step = Instant::now();
                let digest = gateway
                    .gather(&req.business_idea, location.city.as_deref())
                    .await;
                debug!(
                    elapsed_ms = step.elapsed().as_millis() as u64,
                    empty = digest.is_empty(),
                    "Signals step done"
                );
                digest.to_prompt_context()
            }
            None => None,
        };

        let step = Instant::now();
        let discovery = FactorDiscoveryAdapter::new(client, &self.prompts, &self.router)
            .discover(&DiscoveryContext {
                business_idea: &req.business_idea,
                location: &req.location,
                budget: &req.budget,
                business: &business,
                location_profile: &location,
                signals,
            })
            .await?;
        debug!(elapsed_ms = step.elapsed().as_millis() as u64, "Discovery step done");

        let mut scoring = self.engine.score(&ScoringInput {
            factors: &discovery.factors,
            market: &discovery.market,
            business: &business,
            location: &location,
            budget,
        });
        attach_months(
            &mut scoring.financial_projections,
            &self.engine.policy().seasonality,
        );
        info!(
            score = scoring.score,
            verdict = %scoring.verdict,
            budget_fit = scoring.budget_fit_percent,
            strategy = %scoring.strategy,
            "Scored"
        );

        let step = Instant::now();
        let narrative = ExplanationAdapter::new(client, &self.prompts, &self.router)
            .explain(&ExplanationContext {
                business_idea: &req.business_idea,
                location: &req.location,
                budget: &req.budget,
                business: &business,
                location_profile: &location,
                scoring: &scoring,
                factors: &discovery.factors,
                market: &discovery.market,
            })
            .await?;
        debug!(elapsed_ms = step.elapsed().as_millis() as u64, "Explanation step done");

        let input = AnalysisInput {
            business_idea: req.business_idea,
            location: req.location,
            budget: req.budget,
            budget_amount: budget.amount,
            budget_specified: budget.specified,
            category: business.category.clone(),
            category_label: business.label.clone(),
            tier: location.tier,
            city: location.city.clone(),
        };
        let result = assemble(
            input,
            scoring,
            discovery,
            narrative,
            self.engine.policy().version,
        );

        info!(
            verdict = %result.verdict,
            score = result.score,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Analysis complete"
        );
        Ok(result)
    }
}

/// Merge the scoring result, narrative and echoed input into the response
pub fn assemble(
    input: AnalysisInput,
    scoring: ScoringResult,
    discovery: Discovery,
    narrative: Narrative,
    policy_version: u32,
) -> AnalysisResult {
    let Discovery { factors, market } = discovery;

    AnalysisResult {
        id: None,
        verdict: scoring.verdict,
        score: scoring.score,
        summary: narrative.summary,
        budget_fit_percent: scoring.budget_fit_percent,
        market_analysis: MarketAnalysis {
            size: or_unknown(market.market_size),
            growth: or_unknown(market.market_growth),
            competition: competition_label(scoring.features.competition_density).to_string(),
            explanation: narrative.market_explanation,
        },
        financial_projection: FinancialProjection {
            yearly_data: scoring.financial_projections,
            break_even_months: scoring.break_even_months,
            roi: scoring.roi,
            explanation: narrative.financial_explanation,
            setup_cost: scoring.setup_cost,
            monthly_revenue: scoring.monthly_revenue,
            monthly_expenses: scoring.monthly_expenses,
            monthly_profit: scoring.monthly_profit,
            confidence_multiplier: scoring.confidence_multiplier,
        },
        competition_analysis: CompetitionAnalysis {
            direct_competitors: market.direct_competitors,
            indirect_competitors: market.indirect_competitors,
            competitive_advantage: narrative.competitive_advantage,
            threats: narrative.threats,
            opportunities: narrative.opportunities,
            explanation: narrative.competition_explanation,
        },
        roadmap: Roadmap {
            phases: narrative.roadmap,
            explanation: narrative.roadmap_explanation,
        },
        risks: narrative.risks,
        recommendations: narrative.recommendations,
        expert_insights: narrative.expert_insights,
        factors,
        market_data: market.data_points,
        features: scoring.features,
        input,
        strategy: scoring.strategy,
        policy_version,
        generated_at: Utc::now(),
    }
}

/// Human label for a competition density in [0, 1]
pub fn competition_label(density: f64) -> &'static str {
    if density >= 0.7 {
        "High"
    } else if density >= 0.4 {
        "Moderate"
    } else {
        "Low"
    }
}

fn or_unknown(text: String) -> String {
    if text.trim().is_empty() {
        "Not estimated".to_string()
    } else {
        text
    }
}
