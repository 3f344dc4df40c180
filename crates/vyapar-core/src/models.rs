//! Domain models for Vyapar
//!
//! Records that cross the API boundary serialize as camelCase JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Confidence attached to an AI market estimate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    #[default]
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl std::str::FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" | "moderate" | "med" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(format!("Unknown confidence: {}", s)),
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Risk severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" | "critical" | "severe" => Ok(Self::High),
            "medium" | "moderate" | "med" => Ok(Self::Medium),
            "low" | "minor" => Ok(Self::Low),
            _ => Err(format!("Unknown severity: {}", s)),
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Final recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Go,
    Caution,
    Avoid,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Go => "GO",
            Self::Caution => "CAUTION",
            Self::Avoid => "AVOID",
        }
    }
}

impl std::str::FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "GO" => Ok(Self::Go),
            "CAUTION" => Ok(Self::Caution),
            "AVOID" => Ok(Self::Avoid),
            _ => Err(format!("Unknown verdict: {}", s)),
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A weighted, scored market factor from factor discovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Factor {
    pub name: String,
    /// 0..1, normalized at consumption time
    pub weight: f64,
    /// 0..100
    pub score: u8,
    pub reasoning: String,
    pub is_location_specific: bool,
}

/// A descriptive market estimate (never used for scoring)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketDataPoint {
    pub metric: String,
    pub min_value: f64,
    pub max_value: f64,
    pub estimated_value: f64,
    pub unit: String,
    pub source: String,
    pub confidence: Confidence,
}

/// Numeric market estimates returned alongside the factors
///
/// Money is in rupees; monthly figures are per month.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketEstimates {
    pub setup_cost_min: f64,
    pub setup_cost_max: f64,
    pub monthly_revenue_min: f64,
    pub monthly_revenue_max: f64,
    pub monthly_expense_min: f64,
    pub monthly_expense_max: f64,
    pub direct_competitors: u32,
    pub indirect_competitors: u32,
    pub market_size: String,
    pub market_growth: String,
    pub data_points: Vec<MarketDataPoint>,
}

impl MarketEstimates {
    pub fn setup_cost_mid(&self) -> f64 {
        midpoint(self.setup_cost_min, self.setup_cost_max)
    }

    pub fn monthly_revenue_mid(&self) -> f64 {
        midpoint(self.monthly_revenue_min, self.monthly_revenue_max)
    }

    pub fn monthly_expense_mid(&self) -> f64 {
        midpoint(self.monthly_expense_min, self.monthly_expense_max)
    }
}

/// Average of a range; a one-sided range uses the side that is present
fn midpoint(min: f64, max: f64) -> f64 {
    match (min > 0.0, max > 0.0) {
        (true, true) => (min + max) / 2.0,
        (true, false) => min,
        (false, true) => max,
        (false, false) => 0.0,
    }
}

/// Inputs to the scoring strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    WeightedScore,
    BudgetRatio,
    CompetitionDensity,
    MarketGrowth,
    ProfitMargin,
    LocationScore,
    RevenueExpenseRatio,
    ScoreDispersion,
    MaxFactor,
    MinFactor,
    CompetitiveIntensity,
    Complexity,
    Scalability,
}

impl Feature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WeightedScore => "weighted_score",
            Self::BudgetRatio => "budget_ratio",
            Self::CompetitionDensity => "competition_density",
            Self::MarketGrowth => "market_growth",
            Self::ProfitMargin => "profit_margin",
            Self::LocationScore => "location_score",
            Self::RevenueExpenseRatio => "revenue_expense_ratio",
            Self::ScoreDispersion => "score_dispersion",
            Self::MaxFactor => "max_factor",
            Self::MinFactor => "min_factor",
            Self::CompetitiveIntensity => "competitive_intensity",
            Self::Complexity => "complexity",
            Self::Scalability => "scalability",
        }
    }
}

/// Feature vector derived from one request
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringFeatures {
    /// Weighted mean factor score, 0..100
    pub weighted_score: f64,
    /// budget / setup cost, capped at 5
    pub budget_ratio: f64,
    pub competition_density: f64,
    pub market_growth: f64,
    pub profit_margin: f64,
    pub location_score: f64,
    /// revenue / expenses, capped at 5
    pub revenue_expense_ratio: f64,
    pub score_dispersion: f64,
    pub max_factor: f64,
    pub min_factor: f64,
    pub competitive_intensity: f64,
    pub complexity: f64,
    pub scalability: f64,
}

impl ScoringFeatures {
    pub fn get(&self, feature: Feature) -> f64 {
        match feature {
            Feature::WeightedScore => self.weighted_score,
            Feature::BudgetRatio => self.budget_ratio,
            Feature::CompetitionDensity => self.competition_density,
            Feature::MarketGrowth => self.market_growth,
            Feature::ProfitMargin => self.profit_margin,
            Feature::LocationScore => self.location_score,
            Feature::RevenueExpenseRatio => self.revenue_expense_ratio,
            Feature::ScoreDispersion => self.score_dispersion,
            Feature::MaxFactor => self.max_factor,
            Feature::MinFactor => self.min_factor,
            Feature::CompetitiveIntensity => self.competitive_intensity,
            Feature::Complexity => self.complexity,
            Feature::Scalability => self.scalability,
        }
    }
}

/// One month of a projected year
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthRecord {
    /// 1..=12
    pub month: u32,
    pub label: String,
    pub revenue: i64,
    pub expenses: i64,
    pub profit: i64,
}

/// One projected year (whole rupees)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearRecord {
    pub year: u32,
    pub revenue: i64,
    pub expenses: i64,
    pub profit: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub months: Vec<MonthRecord>,
}

impl YearRecord {
    /// Build a year; profit is always derived, never supplied
    pub fn new(year: u32, revenue: i64, expenses: i64) -> Self {
        Self {
            year,
            revenue,
            expenses,
            profit: revenue - expenses,
            months: Vec::new(),
        }
    }
}

/// Deterministic output of the scoring engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringResult {
    pub score: u8,
    pub verdict: Verdict,
    pub budget_fit_percent: u32,
    pub break_even_months: u32,
    /// Percent; negative when the business loses money
    pub roi: i64,
    pub financial_projections: Vec<YearRecord>,
    pub strategy: String,
    pub confidence_multiplier: f64,
    /// Effective setup cost used for budget fit and break-even
    pub setup_cost: i64,
    pub monthly_revenue: i64,
    pub monthly_expenses: i64,
    pub monthly_profit: i64,
    pub features: ScoringFeatures,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Risk {
    pub risk: String,
    pub severity: Severity,
    pub mitigation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapPhase {
    pub name: String,
    pub duration: String,
    pub tasks: Vec<String>,
    pub milestones: Vec<String>,
}

/// Prose produced by the explanation call (never authoritative for numbers)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Narrative {
    pub summary: String,
    pub market_explanation: String,
    pub competition_explanation: String,
    pub financial_explanation: String,
    pub competitive_advantage: String,
    pub threats: Vec<String>,
    pub opportunities: Vec<String>,
    pub risks: Vec<Risk>,
    pub recommendations: Vec<String>,
    pub roadmap: Vec<RoadmapPhase>,
    pub roadmap_explanation: String,
    pub expert_insights: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketAnalysis {
    pub size: String,
    pub growth: String,
    pub competition: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialProjection {
    pub yearly_data: Vec<YearRecord>,
    pub break_even_months: u32,
    pub roi: i64,
    pub explanation: String,
    pub setup_cost: i64,
    pub monthly_revenue: i64,
    pub monthly_expenses: i64,
    pub monthly_profit: i64,
    pub confidence_multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetitionAnalysis {
    pub direct_competitors: u32,
    pub indirect_competitors: u32,
    pub competitive_advantage: String,
    pub threats: Vec<String>,
    pub opportunities: Vec<String>,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Roadmap {
    pub phases: Vec<RoadmapPhase>,
    pub explanation: String,
}

/// Request metadata echoed back in every result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisInput {
    pub business_idea: String,
    pub location: String,
    pub budget: String,
    pub budget_amount: f64,
    pub budget_specified: bool,
    pub category: String,
    pub category_label: String,
    pub tier: u8,
    pub city: Option<String>,
}

/// The full response contract for one analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// History id, present once the result has been stored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub verdict: Verdict,
    pub score: u8,
    pub summary: String,
    pub budget_fit_percent: u32,
    pub market_analysis: MarketAnalysis,
    pub financial_projection: FinancialProjection,
    pub competition_analysis: CompetitionAnalysis,
    pub roadmap: Roadmap,
    pub risks: Vec<Risk>,
    pub recommendations: Vec<String>,
    pub expert_insights: String,
    pub factors: Vec<Factor>,
    pub market_data: Vec<MarketDataPoint>,
    pub features: ScoringFeatures,
    pub input: AnalysisInput,
    pub strategy: String,
    pub policy_version: u32,
    pub generated_at: DateTime<Utc>,
}

/// History list entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub business_idea: String,
    pub location: String,
    pub budget: String,
    pub verdict: Verdict,
    pub score: u8,
}
