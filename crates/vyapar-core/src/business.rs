//! Business-type classification and benchmark economics
//!
//! Categories are ordered keyword rules; the first category whose keyword
//! appears in the idea wins, so narrow categories (cloud kitchen) must be
//! listed before broad ones (restaurant). `general` catches everything else.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Embedded default benchmark table
pub(crate) const DEFAULT_BENCHMARKS: &str = include_str!("../../../config/benchmarks.toml");

/// Benchmark economics for one business category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessProfile {
    pub category: String,
    pub label: String,
    /// Rupees, before the city-tier cost factor
    pub minimum_setup_cost: f64,
    /// Typical net margin (0..1)
    pub typical_margin: f64,
    pub growth_rate_percent: f64,
    /// 0..1
    pub competitive_intensity: f64,
    /// 0..100
    pub complexity_score: u8,
    /// 0..100
    pub scalability_score: u8,
}

#[derive(Debug, Clone, Deserialize)]
struct RawBenchmarks {
    version: u32,
    #[serde(default, rename = "category")]
    categories: Vec<RawCategory>,
    fallback: RawCategory,
}

#[derive(Debug, Clone, Deserialize)]
struct RawCategory {
    id: String,
    label: String,
    #[serde(default)]
    keywords: Vec<String>,
    minimum_setup_cost: f64,
    typical_margin: f64,
    growth_rate_percent: f64,
    competitive_intensity: f64,
    complexity_score: u8,
    scalability_score: u8,
}

impl RawCategory {
    fn into_rule(self) -> Result<CategoryRule> {
        if self.minimum_setup_cost < 0.0 {
            return Err(Error::Configuration(format!(
                "Category {} has a negative setup cost",
                self.id
            )));
        }
        for (name, value) in [
            ("typical_margin", self.typical_margin),
            ("competitive_intensity", self.competitive_intensity),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Configuration(format!(
                    "Category {}: {} must be within 0..1 (got {})",
                    self.id, name, value
                )));
            }
        }

        Ok(CategoryRule {
            keywords: self.keywords.iter().map(|k| k.to_lowercase()).collect(),
            profile: BusinessProfile {
                category: self.id,
                label: self.label,
                minimum_setup_cost: self.minimum_setup_cost,
                typical_margin: self.typical_margin,
                growth_rate_percent: self.growth_rate_percent,
                competitive_intensity: self.competitive_intensity,
                complexity_score: self.complexity_score.min(100),
                scalability_score: self.scalability_score.min(100),
            },
        })
    }
}

#[derive(Debug, Clone)]
struct CategoryRule {
    keywords: Vec<String>,
    profile: BusinessProfile,
}

/// Ordered category rules plus the `general` fallback
#[derive(Debug, Clone)]
pub struct BenchmarkTable {
    version: u32,
    rules: Vec<CategoryRule>,
    fallback: BusinessProfile,
}

impl BenchmarkTable {
    pub fn embedded() -> Result<Self> {
        Self::from_toml(DEFAULT_BENCHMARKS)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let raw: RawBenchmarks = toml::from_str(content)
            .map_err(|e| Error::Configuration(format!("Invalid benchmarks TOML: {}", e)))?;

        let rules = raw
            .categories
            .into_iter()
            .map(RawCategory::into_rule)
            .collect::<Result<Vec<_>>>()?;
        let fallback = raw.fallback.into_rule()?.profile;

        Ok(Self {
            version: raw.version,
            rules,
            fallback,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Number of keyword categories (excluding the fallback)
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Classify a business idea; always returns exactly one profile
    pub fn classify(&self, idea: &str) -> BusinessProfile {
        let idea = idea.to_lowercase();

        for rule in &self.rules {
            if let Some(keyword) = rule.keywords.iter().find(|k| idea.contains(k.as_str())) {
                debug!(category = %rule.profile.category, keyword = %keyword, "Business classified");
                return rule.profile.clone();
            }
        }

        debug!(category = %self.fallback.category, "No category keyword matched");
        self.fallback.clone()
    }

    /// Look up a profile by category id
    pub fn get(&self, category: &str) -> Option<&BusinessProfile> {
        self.rules
            .iter()
            .map(|r| &r.profile)
            .chain(std::iter::once(&self.fallback))
            .find(|p| p.category == category)
    }

    /// All categories in match order, fallback last
    pub fn profiles(&self) -> impl Iterator<Item = &BusinessProfile> {
        self.rules
            .iter()
            .map(|r| &r.profile)
            .chain(std::iter::once(&self.fallback))
    }
}
