//! Versioned scoring policy (`config/policy.toml`)

use serde::Deserialize;

use super::StrategyKind;
use crate::error::{Error, Result};
use crate::models::{Feature, Verdict};

/// Embedded default policy
pub(crate) const DEFAULT_POLICY: &str = include_str!("../../../../config/policy.toml");

/// Bounds on the weighted strategy's budget multipliers
pub const MIN_BUDGET_MULTIPLIER: f64 = 0.40;
pub const MAX_BUDGET_MULTIPLIER: f64 = 1.15;

/// Every number the scoring engine depends on
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringPolicy {
    pub version: u32,
    #[serde(default)]
    pub engine: EngineSection,
    pub verdict: VerdictPolicy,
    pub financials: FinancialPolicy,
    pub tiers: TierPolicy,
    pub seasonality: Seasonality,
    pub weighted: WeightedPolicy,
    pub ensemble: EnsemblePolicy,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineSection {
    #[serde(default)]
    pub strategy: StrategyKind,
}

/// Verdict thresholds with hysteresis bands
#[derive(Debug, Clone, Deserialize)]
pub struct VerdictPolicy {
    pub go_at: u8,
    pub go_min_budget_fit: u32,
    pub go_band_budget_fit: u32,
    pub avoid_below: u8,
    pub critical_budget_fit: u32,
    /// Width of the guarded zone above `avoid_below` and above `go_at`
    pub band: u8,
    /// Weakest-factor score that triggers the band guards
    pub risk_floor: f64,
}

impl VerdictPolicy {
    /// Map a score and its guard metrics to a verdict
    pub fn decide(&self, score: u8, budget_fit: u32, min_factor: f64) -> Verdict {
        let weak_factor = min_factor < self.risk_floor;

        if budget_fit < self.critical_budget_fit || score < self.avoid_below {
            return Verdict::Avoid;
        }
        if score < self.avoid_below.saturating_add(self.band) && weak_factor {
            return Verdict::Avoid;
        }

        let go_clear = self.go_at.saturating_add(self.band);
        if score >= go_clear && budget_fit >= self.go_min_budget_fit {
            return Verdict::Go;
        }
        if score >= self.go_at
            && score < go_clear
            && budget_fit >= self.go_band_budget_fit
            && !weak_factor
        {
            return Verdict::Go;
        }

        Verdict::Caution
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FinancialPolicy {
    pub confidence_min: f64,
    pub confidence_max: f64,
    pub break_even_horizon_months: u32,
    pub projection_years: u32,
    pub year_one_ramp: f64,
    pub growth_cap_percent: f64,
    pub expense_inflation_percent: f64,
}

impl FinancialPolicy {
    /// Linear map of score 0..100 onto the confidence range
    pub fn confidence_multiplier(&self, score: u8) -> f64 {
        let t = f64::from(score.min(100)) / 100.0;
        self.confidence_min + (self.confidence_max - self.confidence_min) * t
    }
}

/// Per-tier location score and setup-cost factor (index 0 = tier 1)
#[derive(Debug, Clone, Deserialize)]
pub struct TierPolicy {
    pub scores: [f64; 3],
    pub cost_factors: [f64; 3],
}

impl TierPolicy {
    fn index(tier: u8) -> usize {
        usize::from(tier.clamp(1, 3) - 1)
    }

    pub fn score(&self, tier: u8) -> f64 {
        self.scores[Self::index(tier)]
    }

    pub fn cost_factor(&self, tier: u8) -> f64 {
        self.cost_factors[Self::index(tier)]
    }
}

/// Share of annual revenue per calendar month (Jan..Dec)
#[derive(Debug, Clone, Deserialize)]
pub struct Seasonality {
    pub weights: [f64; 12],
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeightedPolicy {
    pub top_multiplier: f64,
    #[serde(default, rename = "step")]
    pub steps: Vec<BudgetStep>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BudgetStep {
    pub below: f64,
    pub multiplier: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnsemblePolicy {
    pub base: f64,
    #[serde(default, rename = "stump")]
    pub stumps: Vec<Stump>,
    #[serde(default, rename = "interaction")]
    pub interactions: Vec<Interaction>,
}

fn default_weight() -> f64 {
    1.0
}

/// Single-feature decision stump
#[derive(Debug, Clone, Deserialize)]
pub struct Stump {
    pub feature: Feature,
    pub threshold: f64,
    pub left: f64,
    pub right: f64,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

impl Stump {
    pub fn evaluate(&self, x: f64) -> f64 {
        self.weight * if x < self.threshold { self.left } else { self.right }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionOp {
    Multiply,
    Divide,
    Min,
    Max,
}

impl InteractionOp {
    pub fn apply(&self, a: f64, b: f64) -> f64 {
        match self {
            Self::Multiply => a * b,
            Self::Divide => {
                if b.abs() < f64::EPSILON {
                    if a > 0.0 {
                        f64::MAX
                    } else {
                        0.0
                    }
                } else {
                    a / b
                }
            }
            Self::Min => a.min(b),
            Self::Max => a.max(b),
        }
    }
}

/// Stump over a combination of two features
#[derive(Debug, Clone, Deserialize)]
pub struct Interaction {
    pub op: InteractionOp,
    pub features: [Feature; 2],
    pub threshold: f64,
    pub left: f64,
    pub right: f64,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

impl Interaction {
    pub fn evaluate(&self, a: f64, b: f64) -> f64 {
        let x = self.op.apply(a, b);
        self.weight * if x < self.threshold { self.left } else { self.right }
    }
}

impl ScoringPolicy {
    /// The policy compiled into the binary
    pub fn embedded() -> Result<Self> {
        Self::from_toml(DEFAULT_POLICY)
    }

    /// Parse and validate a policy document
    pub fn from_toml(content: &str) -> Result<Self> {
        let policy: ScoringPolicy = toml::from_str(content)
            .map_err(|e| Error::Configuration(format!("Invalid policy TOML: {}", e)))?;
        policy.validate()?;
        Ok(policy)
    }

    fn validate(&self) -> Result<()> {
        let v = &self.verdict;
        if u16::from(v.avoid_below) + u16::from(v.band) > u16::from(v.go_at) || v.go_at > 100 {
            return Err(invalid(format!(
                "verdict bands overlap (avoid_below {} + band {} > go_at {})",
                v.avoid_below, v.band, v.go_at
            )));
        }

        let f = &self.financials;
        if f.confidence_min > f.confidence_max || f.confidence_min < 0.0 {
            return Err(invalid("confidence range is inverted or negative".into()));
        }
        if f.projection_years == 0 || f.break_even_horizon_months == 0 {
            return Err(invalid(
                "projection_years and break_even_horizon_months must be positive".into(),
            ));
        }

        let weights = &self.seasonality.weights;
        let sum: f64 = weights.iter().sum();
        if weights.iter().any(|w| *w < 0.0) || (sum - 1.0).abs() > 1e-3 {
            return Err(invalid(format!(
                "seasonal weights must be non-negative and sum to 1.0 (sum {:.4})",
                sum
            )));
        }

        if self
            .weighted
            .steps
            .windows(2)
            .any(|pair| pair[0].below >= pair[1].below)
        {
            return Err(invalid("weighted.step entries must have ascending `below`".into()));
        }

        let w = &self.weighted;
        let multipliers: Vec<f64> = w
            .steps
            .iter()
            .map(|step| step.multiplier)
            .chain(std::iter::once(w.top_multiplier))
            .collect();
        if multipliers
            .iter()
            .any(|m| !(MIN_BUDGET_MULTIPLIER..=MAX_BUDGET_MULTIPLIER).contains(m))
        {
            return Err(invalid(format!(
                "weighted multipliers must lie in [{:.2}, {:.2}]",
                MIN_BUDGET_MULTIPLIER, MAX_BUDGET_MULTIPLIER
            )));
        }
        if multipliers.windows(2).any(|pair| pair[0] > pair[1]) {
            return Err(invalid(
                "weighted multipliers must not decrease as the budget ratio grows".into(),
            ));
        }

        if self
            .tiers
            .scores
            .iter()
            .chain(self.tiers.cost_factors.iter())
            .any(|v| *v < 0.0)
        {
            return Err(invalid("tier scores and cost factors must be non-negative".into()));
        }

        Ok(())
    }
}

fn invalid(message: String) -> Error {
    Error::Configuration(format!("Invalid policy: {}", message))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict_policy() -> VerdictPolicy {
        ScoringPolicy::embedded().unwrap().verdict
    }

    #[test]
    fn test_embedded_policy_valid() {
        let policy = ScoringPolicy::embedded().unwrap();
        assert_eq!(policy.engine.strategy, StrategyKind::Ensemble);
        assert!(!policy.ensemble.stumps.is_empty());
        assert_eq!(policy.ensemble.interactions.len(), 4);
        assert_eq!(policy.tiers.cost_factor(1), 1.3);
    }

    #[test]
    fn test_critical_budget_fit_forces_avoid() {
        let v = verdict_policy();
        assert_eq!(v.decide(95, 29, 90.0), Verdict::Avoid);
    }

    #[test]
    fn test_clear_go() {
        let v = verdict_policy();
        assert_eq!(v.decide(75, 80, 10.0), Verdict::Go);
        assert_eq!(v.decide(75, 79, 90.0), Verdict::Caution);
    }

    #[test]
    fn test_go_band_needs_full_budget_and_no_weak_factor() {
        let v = verdict_policy();
        assert_eq!(v.decide(67, 100, 50.0), Verdict::Go);
        assert_eq!(v.decide(67, 95, 50.0), Verdict::Caution);
        assert_eq!(v.decide(67, 100, 20.0), Verdict::Caution);
    }

    #[test]
    fn test_avoid_band_with_weak_factor() {
        let v = verdict_policy();
        assert_eq!(v.decide(39, 100, 90.0), Verdict::Avoid);
        assert_eq!(v.decide(42, 100, 20.0), Verdict::Avoid);
        assert_eq!(v.decide(42, 100, 50.0), Verdict::Caution);
        assert_eq!(v.decide(45, 100, 20.0), Verdict::Caution);
    }

    #[test]
    fn test_confidence_multiplier_range() {
        let f = ScoringPolicy::embedded().unwrap().financials;
        assert!((f.confidence_multiplier(0) - 0.6).abs() < 1e-9);
        assert!((f.confidence_multiplier(50) - 1.0).abs() < 1e-9);
        assert!((f.confidence_multiplier(100) - 1.4).abs() < 1e-9);
    }

    #[test]
    fn test_interaction_ops() {
        assert_eq!(InteractionOp::Divide.apply(1.0, 0.0), f64::MAX);
        assert_eq!(InteractionOp::Divide.apply(0.0, 0.0), 0.0);
        assert_eq!(InteractionOp::Min.apply(0.3, 0.7), 0.3);
        assert_eq!(InteractionOp::Multiply.apply(0.5, 0.5), 0.25);
    }

    #[test]
    fn test_inverted_budget_multiplier_rejected() {
        let broken = DEFAULT_POLICY.replace("multiplier = 0.75", "multiplier = 0.50");
        let err = ScoringPolicy::from_toml(&broken).unwrap_err();
        assert!(err.to_string().contains("must not decrease"));
    }

    #[test]
    fn test_out_of_range_budget_multiplier_rejected() {
        let low = DEFAULT_POLICY.replace("multiplier = 0.40", "multiplier = 0.10");
        assert!(ScoringPolicy::from_toml(&low).is_err());

        let high = DEFAULT_POLICY.replace("top_multiplier = 1.15", "top_multiplier = 1.50");
        let err = ScoringPolicy::from_toml(&high).unwrap_err();
        assert!(err.to_string().contains("[0.40, 1.15]"));
    }

    #[test]
    fn test_bad_seasonality_rejected() {
        let broken = DEFAULT_POLICY.replace("0.110, 0.095]", "0.110, 0.500]");
        let err = ScoringPolicy::from_toml(&broken).unwrap_err();
        assert!(err.to_string().contains("seasonal"));
    }
}
