//! Stump-ensemble strategy
//!
//! score = base + sum of single-feature stumps + sum of interaction stumps.
//! The stump table is static configuration, so two runs over the same
//! features always agree.

use super::policy::{EnsemblePolicy, Interaction, Stump};
use super::ScoringStrategy;
use crate::models::{Feature, ScoringFeatures};

#[derive(Debug, Clone)]
pub struct EnsembleStrategy {
    base: f64,
    stumps: Vec<Stump>,
    interactions: Vec<Interaction>,
}

impl EnsembleStrategy {
    pub fn new(policy: &EnsemblePolicy) -> Self {
        Self {
            base: policy.base,
            stumps: policy.stumps.clone(),
            interactions: policy.interactions.clone(),
        }
    }

    /// Per-feature contribution, summed over every stump that reads it
    pub fn contributions(&self, features: &ScoringFeatures) -> Vec<(Feature, f64)> {
        let mut totals: Vec<(Feature, f64)> = Vec::new();
        let mut add = |feature: Feature, value: f64| {
            match totals.iter_mut().find(|(f, _)| *f == feature) {
                Some((_, total)) => *total += value,
                None => totals.push((feature, value)),
            }
        };

        for stump in &self.stumps {
            add(stump.feature, stump.evaluate(features.get(stump.feature)));
        }
        for interaction in &self.interactions {
            let [a, b] = interaction.features;
            // interactions are attributed to their first feature
            add(a, interaction.evaluate(features.get(a), features.get(b)));
        }
        totals
    }
}

impl ScoringStrategy for EnsembleStrategy {
    fn name(&self) -> &'static str {
        "ensemble"
    }

    fn raw_score(&self, features: &ScoringFeatures) -> f64 {
        let singles: f64 = self
            .stumps
            .iter()
            .map(|s| s.evaluate(features.get(s.feature)))
            .sum();
        let pairs: f64 = self
            .interactions
            .iter()
            .map(|i| {
                let [a, b] = i.features;
                i.evaluate(features.get(a), features.get(b))
            })
            .sum();
        self.base + singles + pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{InteractionOp, ScoringPolicy};

    fn strategy() -> EnsembleStrategy {
        EnsembleStrategy::new(&ScoringPolicy::embedded().unwrap().ensemble)
    }

    #[test]
    fn test_severe_underfunding_drags_score() {
        let healthy = ScoringFeatures {
            weighted_score: 80.0,
            budget_ratio: 1.5,
            market_growth: 0.6,
            profit_margin: 0.25,
            location_score: 1.0,
            revenue_expense_ratio: 1.4,
            min_factor: 60.0,
            max_factor: 90.0,
            ..Default::default()
        };
        let broke = ScoringFeatures {
            budget_ratio: 0.05,
            ..healthy
        };
        let s = strategy();
        assert!(s.raw_score(&broke) < s.raw_score(&healthy) - 40.0);
    }

    #[test]
    fn test_contributions_sum_to_score() {
        let features = ScoringFeatures {
            weighted_score: 62.0,
            budget_ratio: 0.8,
            competition_density: 0.5,
            ..Default::default()
        };
        let s = strategy();
        let total: f64 = s.contributions(&features).iter().map(|(_, v)| v).sum();
        assert!((s.base + total - s.raw_score(&features)).abs() < 1e-9);
    }

    #[test]
    fn test_custom_ensemble() {
        let policy = EnsemblePolicy {
            base: 10.0,
            stumps: vec![Stump {
                feature: Feature::WeightedScore,
                threshold: 50.0,
                left: -1.0,
                right: 1.0,
                weight: 2.0,
            }],
            interactions: vec![Interaction {
                op: InteractionOp::Max,
                features: [Feature::Complexity, Feature::Scalability],
                threshold: 0.5,
                left: 0.0,
                right: 5.0,
                weight: 1.0,
            }],
        };
        let s = EnsembleStrategy::new(&policy);
        let features = ScoringFeatures {
            weighted_score: 70.0,
            scalability: 0.9,
            ..Default::default()
        };
        assert_eq!(s.raw_score(&features), 17.0);
    }
}
