//! Deterministic scoring engine
//!
//! A pure function of (factors, market estimates, business profile, location
//! profile, budget). No language model output reaches this module without
//! having been sanitized first, and nothing downstream may change its numbers.
//!
//! # Architecture
//!
//! - `ScoringStrategy` trait: maps a feature vector to an unclamped score
//! - `WeightedStrategy`: weighted factor mean x budget multiplier
//! - `EnsembleStrategy`: additive decision-stump ensemble (the default)
//! - `ScoringEngine`: feature extraction, clamping, verdict, financials

mod ensemble;
mod policy;
mod weighted;

pub use ensemble::EnsembleStrategy;
pub(crate) use policy::DEFAULT_POLICY;
pub use policy::{
    BudgetStep, EnsemblePolicy, FinancialPolicy, Interaction, InteractionOp, ScoringPolicy,
    Seasonality, Stump, TierPolicy, VerdictPolicy, WeightedPolicy,
};
pub use weighted::WeightedStrategy;

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::business::BusinessProfile;
use crate::location::LocationProfile;
use crate::models::{Factor, MarketEstimates, ScoringFeatures, ScoringResult, YearRecord};
use crate::money::BudgetAmount;
use crate::sanitize::clamp_score;

/// Cap applied to budget and revenue/expense ratios
pub const RATIO_CAP: f64 = 5.0;

/// Competitor count at which competition density saturates
const COMPETITION_SATURATION: f64 = 50.0;

/// Market growth (percent) mapped to a growth feature of 1.0
const GROWTH_SATURATION_PERCENT: f64 = 30.0;

/// Maps a feature vector to an unclamped score
pub trait ScoringStrategy: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn raw_score(&self, features: &ScoringFeatures) -> f64;
}

/// Which strategy an engine runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Weighted,
    #[default]
    Ensemble,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weighted => "weighted",
            Self::Ensemble => "ensemble",
        }
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "weighted" | "weighted_average" | "a" => Ok(Self::Weighted),
            "ensemble" | "gbdt" | "b" => Ok(Self::Ensemble),
            _ => Err(format!("Unknown scoring strategy: {}", s)),
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything the engine reads for one request
#[derive(Debug, Clone, Copy)]
pub struct ScoringInput<'a> {
    pub factors: &'a [Factor],
    pub market: &'a MarketEstimates,
    pub business: &'a BusinessProfile,
    pub location: &'a LocationProfile,
    pub budget: BudgetAmount,
}

/// Money figures derived alongside the features
#[derive(Debug, Clone, Copy)]
struct Economics {
    setup_cost: f64,
    budget_fit_percent: u32,
    monthly_revenue: f64,
    monthly_expenses: f64,
    /// Annual growth used for projections, as a fraction
    growth_rate: f64,
}

/// Scoring engine with one strategy selected at construction
#[derive(Debug)]
pub struct ScoringEngine {
    policy: ScoringPolicy,
    strategy: Box<dyn ScoringStrategy>,
}

impl ScoringEngine {
    /// Engine using the strategy named in the policy
    pub fn new(policy: ScoringPolicy) -> Self {
        let kind = policy.engine.strategy;
        Self::with_strategy(policy, kind)
    }

    pub fn with_strategy(policy: ScoringPolicy, kind: StrategyKind) -> Self {
        let strategy: Box<dyn ScoringStrategy> = match kind {
            StrategyKind::Weighted => Box::new(WeightedStrategy::new(&policy.weighted)),
            StrategyKind::Ensemble => Box::new(EnsembleStrategy::new(&policy.ensemble)),
        };
        Self { policy, strategy }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    /// Feature vector for an input (exposed for interpretability and tests)
    pub fn features(&self, input: &ScoringInput<'_>) -> ScoringFeatures {
        self.derive(input).0
    }

    /// Score one request
    pub fn score(&self, input: &ScoringInput<'_>) -> ScoringResult {
        let (features, economics) = self.derive(input);

        let score = clamp_score(self.strategy.raw_score(&features));
        let verdict =
            self.policy
                .verdict
                .decide(score, economics.budget_fit_percent, features.min_factor);

        let fin = &self.policy.financials;
        let confidence_multiplier = fin.confidence_multiplier(score);

        let monthly_revenue = to_rupees(economics.monthly_revenue * confidence_multiplier);
        let monthly_expenses = to_rupees(economics.monthly_expenses);
        let monthly_profit = monthly_revenue - monthly_expenses;
        let setup_cost = to_rupees(economics.setup_cost);

        let horizon = fin.break_even_horizon_months;
        let break_even_months = if monthly_profit <= 0 {
            horizon
        } else {
            let months = (setup_cost as f64 / monthly_profit as f64).ceil();
            (months.max(0.0) as u32).min(horizon)
        };

        let roi_base = if input.budget.specified && input.budget.amount > 0.0 {
            input.budget.amount
        } else {
            economics.setup_cost
        };
        let roi = if roi_base > 0.0 {
            to_rupees(monthly_profit as f64 * 12.0 / roi_base * 100.0)
        } else {
            0
        };

        let financial_projections = self.project_years(
            monthly_revenue as f64,
            monthly_expenses as f64,
            economics.growth_rate,
        );

        debug!(
            strategy = self.strategy.name(),
            score,
            verdict = %verdict,
            budget_fit = economics.budget_fit_percent,
            break_even_months,
            roi,
            "Scored analysis"
        );

        ScoringResult {
            score,
            verdict,
            budget_fit_percent: economics.budget_fit_percent,
            break_even_months,
            roi,
            financial_projections,
            strategy: self.strategy.name().to_string(),
            confidence_multiplier,
            setup_cost,
            monthly_revenue,
            monthly_expenses,
            monthly_profit,
            features,
        }
    }

    /// Yearly projections: year 1 ramps up, later years grow from full run rate
    fn project_years(&self, monthly_revenue: f64, monthly_expenses: f64, growth: f64) -> Vec<YearRecord> {
        let fin = &self.policy.financials;
        let inflation = fin.expense_inflation_percent / 100.0;
        let annual_revenue = monthly_revenue.max(0.0) * 12.0;
        let annual_expenses = monthly_expenses.max(0.0) * 12.0;

        (1..=fin.projection_years)
            .map(|year| {
                let n = (year - 1) as i32;
                let ramp = if year == 1 { fin.year_one_ramp } else { 1.0 };
                let revenue = annual_revenue * (1.0 + growth).powi(n) * ramp;
                let expenses = annual_expenses * (1.0 + inflation).powi(n);
                YearRecord::new(year, to_rupees(revenue), to_rupees(expenses))
            })
            .collect()
    }

    fn derive(&self, input: &ScoringInput<'_>) -> (ScoringFeatures, Economics) {
        let tiers = &self.policy.tiers;
        let business = input.business;
        let market = input.market;

        let setup_cost = effective_setup_cost(market, business, input.location, tiers);
        let (budget_ratio, budget_fit_percent) = budget_fit(input.budget, setup_cost);

        let revenue = market.monthly_revenue_mid();
        let expenses = market.monthly_expense_mid();

        let parsed_growth = parse_growth_percent(&market.market_growth);
        let market_growth_percent = parsed_growth.unwrap_or(business.growth_rate_percent);
        let growth_cap = self.policy.financials.growth_cap_percent;
        let blended_growth = ((business.growth_rate_percent + market_growth_percent) / 2.0)
            .clamp(0.0, growth_cap)
            / 100.0;

        let profit_margin = if revenue > 0.0 {
            ((revenue - expenses) / revenue).clamp(-1.0, 1.0)
        } else {
            business.typical_margin
        };

        let revenue_expense_ratio = if expenses > 0.0 {
            (revenue / expenses).min(RATIO_CAP)
        } else if revenue > 0.0 {
            RATIO_CAP
        } else {
            1.0
        };

        let (max_factor, min_factor) = factor_extremes(input.factors);

        let features = ScoringFeatures {
            weighted_score: weighted_mean(input.factors),
            budget_ratio,
            competition_density: competition_density(market),
            market_growth: (market_growth_percent / GROWTH_SATURATION_PERCENT).clamp(0.0, 1.0),
            profit_margin,
            location_score: tiers.score(input.location.tier),
            revenue_expense_ratio,
            score_dispersion: score_dispersion(input.factors),
            max_factor,
            min_factor,
            competitive_intensity: business.competitive_intensity,
            complexity: f64::from(business.complexity_score) / 100.0,
            scalability: f64::from(business.scalability_score) / 100.0,
        };

        let economics = Economics {
            setup_cost,
            budget_fit_percent,
            monthly_revenue: revenue,
            monthly_expenses: expenses,
            growth_rate: blended_growth,
        };

        (features, economics)
    }
}

fn to_rupees(value: f64) -> i64 {
    if value.is_finite() {
        value.round() as i64
    } else {
        0
    }
}

/// Weighted mean of factor scores; 50 when there is no usable weight
pub fn weighted_mean(factors: &[Factor]) -> f64 {
    let total_weight: f64 = factors.iter().map(|f| f.weight.max(0.0)).sum();
    if total_weight <= f64::EPSILON {
        return 50.0;
    }
    let sum: f64 = factors
        .iter()
        .map(|f| f.weight.max(0.0) * f64::from(f.score.min(100)))
        .sum();
    (sum / total_weight).clamp(0.0, 100.0)
}

/// Larger of the AI setup-cost midpoint and the tier-adjusted benchmark floor
pub fn effective_setup_cost(
    market: &MarketEstimates,
    business: &BusinessProfile,
    location: &LocationProfile,
    tiers: &TierPolicy,
) -> f64 {
    let floor = business.minimum_setup_cost * tiers.cost_factor(location.tier);
    market.setup_cost_mid().max(floor).max(0.0)
}

/// Budget ratio (capped) and budget fit percent (0..=100)
///
/// An unspecified budget is neutral: ratio 1.0, fit 100.
pub fn budget_fit(budget: BudgetAmount, setup_cost: f64) -> (f64, u32) {
    if !budget.specified || setup_cost <= 0.0 {
        return (1.0, 100);
    }
    let ratio = budget.amount / setup_cost;
    let fit = (ratio.min(1.0) * 100.0).round() as u32;
    (ratio.clamp(0.0, RATIO_CAP), fit)
}

fn competition_density(market: &MarketEstimates) -> f64 {
    let weighted =
        f64::from(market.direct_competitors) + 0.5 * f64::from(market.indirect_competitors);
    (weighted / COMPETITION_SATURATION).min(1.0)
}

/// Population std-dev of factor scores, normalized by its maximum (50)
fn score_dispersion(factors: &[Factor]) -> f64 {
    if factors.is_empty() {
        return 0.0;
    }
    let n = factors.len() as f64;
    let mean = factors.iter().map(|f| f64::from(f.score)).sum::<f64>() / n;
    let variance = factors
        .iter()
        .map(|f| (f64::from(f.score) - mean).powi(2))
        .sum::<f64>()
        / n;
    (variance.sqrt() / 50.0).clamp(0.0, 1.0)
}

fn factor_extremes(factors: &[Factor]) -> (f64, f64) {
    let scores = factors.iter().map(|f| f64::from(f.score));
    let max = scores.clone().fold(None, |acc: Option<f64>, s| Some(acc.map_or(s, |a| a.max(s))));
    let min = scores.fold(None, |acc: Option<f64>, s| Some(acc.map_or(s, |a| a.min(s))));
    (max.unwrap_or(50.0), min.unwrap_or(50.0))
}

struct GrowthPatterns {
    range_percent: Regex,
    percent: Regex,
    number: Regex,
}

fn growth_patterns() -> &'static GrowthPatterns {
    static PATTERNS: OnceLock<GrowthPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| GrowthPatterns {
        range_percent: Regex::new(r"(-?\d+(?:\.\d+)?)\s*%?\s*(?:-|–|to)\s*(-?\d+(?:\.\d+)?)\s*%")
            .expect("valid regex"),
        percent: Regex::new(r"(-?\d+(?:\.\d+)?)\s*%").expect("valid regex"),
        number: Regex::new(r"-?\d+(?:\.\d+)?").expect("valid regex"),
    })
}

/// Extract an annual growth percentage from free text
///
/// "15-20% CAGR" gives 17.5, "growing at 12% a year" gives 12, a bare "18"
/// gives 18. Bare numbers above 100 (years, market sizes) are ignored.
pub fn parse_growth_percent(text: &str) -> Option<f64> {
    let p = growth_patterns();

    if let Some(caps) = p.range_percent.captures(text) {
        let low = caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok());
        let high = caps.get(2).and_then(|m| m.as_str().parse::<f64>().ok());
        if let (Some(low), Some(high)) = (low, high) {
            return Some((low + high) / 2.0);
        }
    }

    if let Some(value) = p
        .percent
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
    {
        return Some(value);
    }

    p.number
        .find(text)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.abs() <= 100.0)
}
