//! Weighted-average strategy: factor mean scaled by a budget multiplier

use super::policy::{BudgetStep, WeightedPolicy};
use super::ScoringStrategy;
use crate::models::ScoringFeatures;

#[derive(Debug, Clone)]
pub struct WeightedStrategy {
    steps: Vec<BudgetStep>,
    top_multiplier: f64,
}

impl WeightedStrategy {
    pub fn new(policy: &WeightedPolicy) -> Self {
        Self {
            steps: policy.steps.clone(),
            top_multiplier: policy.top_multiplier,
        }
    }

    /// Monotonic step map of budget ratio to a multiplier
    pub fn budget_multiplier(&self, budget_ratio: f64) -> f64 {
        self.steps
            .iter()
            .find(|step| budget_ratio < step.below)
            .map(|step| step.multiplier)
            .unwrap_or(self.top_multiplier)
    }
}

impl ScoringStrategy for WeightedStrategy {
    fn name(&self) -> &'static str {
        "weighted"
    }

    fn raw_score(&self, features: &ScoringFeatures) -> f64 {
        features.weighted_score * self.budget_multiplier(features.budget_ratio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::ScoringPolicy;

    fn strategy() -> WeightedStrategy {
        WeightedStrategy::new(&ScoringPolicy::embedded().unwrap().weighted)
    }

    #[test]
    fn test_multiplier_steps() {
        let s = strategy();
        assert_eq!(s.budget_multiplier(0.1), 0.40);
        assert_eq!(s.budget_multiplier(0.3), 0.55);
        assert_eq!(s.budget_multiplier(0.99), 0.90);
        assert_eq!(s.budget_multiplier(1.0), 1.0);
        assert_eq!(s.budget_multiplier(2.0), 1.08);
        assert_eq!(s.budget_multiplier(5.0), 1.15);
    }

    #[test]
    fn test_multiplier_monotonic() {
        let s = strategy();
        let mut previous = 0.0;
        for i in 0..=50 {
            let m = s.budget_multiplier(f64::from(i) * 0.1);
            assert!(m >= previous);
            assert!((0.40..=1.15).contains(&m));
            previous = m;
        }
    }

    #[test]
    fn test_raw_score() {
        let features = ScoringFeatures {
            weighted_score: 80.0,
            budget_ratio: 0.4,
            ..Default::default()
        };
        assert!((strategy().raw_score(&features) - 44.0).abs() < 1e-9);
    }
}
