//! Location classification against an in-memory gazetteer
//!
//! Lookup order for a raw location string:
//! 1. The whole normalized string ("navi mumbai")
//! 2. Each comma-delimited segment ("koramangala, bangalore")
//! 3. Each whitespace token ("shop near andheri station")
//!
//! Aliases and neighborhoods fold to their canonical city. Anything that
//! matches nothing is tier 3 with no demographics.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Embedded default gazetteer
pub(crate) const DEFAULT_GAZETTEER: &str = include_str!("../../../config/gazetteer.toml");

/// Tier assigned to locations the gazetteer does not know
pub const UNKNOWN_TIER: u8 = 3;

/// Classified location with optional demographics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationProfile {
    /// City tier: 1 (metro), 2, or 3
    pub tier: u8,
    /// Canonical city name, `None` when unknown
    pub city: Option<String>,
    /// The gazetteer key that matched (alias, neighborhood or city)
    pub matched_on: Option<String>,
    pub population: Option<u64>,
    pub literacy_rate: Option<f64>,
    pub average_income: Option<f64>,
    pub growth_rate: Option<f64>,
}

impl LocationProfile {
    /// The fallback for unrecognized locations
    pub fn unknown() -> Self {
        Self {
            tier: UNKNOWN_TIER,
            city: None,
            matched_on: None,
            population: None,
            literacy_rate: None,
            average_income: None,
            growth_rate: None,
        }
    }

    pub fn is_known(&self) -> bool {
        self.city.is_some()
    }

    /// Short description for prompts ("Bangalore (tier 1)")
    pub fn describe(&self) -> String {
        match &self.city {
            Some(city) => format!("{} (tier {})", city, self.tier),
            None => format!("unrecognized location (treated as tier {})", self.tier),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawGazetteer {
    version: u32,
    #[serde(default, rename = "city")]
    cities: Vec<CityRecord>,
}

#[derive(Debug, Clone, Deserialize)]
struct CityRecord {
    name: String,
    tier: u8,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    neighborhoods: Vec<String>,
    population: Option<u64>,
    literacy_rate: Option<f64>,
    average_income: Option<f64>,
    growth_rate: Option<f64>,
}

/// City lookup table, indexed once at load
#[derive(Debug, Clone)]
pub struct Gazetteer {
    version: u32,
    cities: Vec<CityRecord>,
    /// normalized key -> index into `cities`
    index: HashMap<String, usize>,
}

impl Gazetteer {
    /// The gazetteer compiled into the binary
    pub fn embedded() -> Result<Self> {
        Self::from_toml(DEFAULT_GAZETTEER)
    }

    /// Parse and index a gazetteer document
    pub fn from_toml(content: &str) -> Result<Self> {
        let raw: RawGazetteer = toml::from_str(content)
            .map_err(|e| Error::Configuration(format!("Invalid gazetteer TOML: {}", e)))?;

        let mut index: HashMap<String, usize> = HashMap::new();
        for (i, city) in raw.cities.iter().enumerate() {
            if !(1..=3).contains(&city.tier) {
                return Err(Error::Configuration(format!(
                    "Gazetteer city {} has tier {} (expected 1-3)",
                    city.name, city.tier
                )));
            }

            let keys = std::iter::once(&city.name)
                .chain(city.aliases.iter())
                .chain(city.neighborhoods.iter());
            for key in keys {
                let key = normalize(key);
                if key.is_empty() {
                    continue;
                }
                if let Some(&existing) = index.get(&key) {
                    if existing != i {
                        warn!(
                            key = %key,
                            kept = %raw.cities[existing].name,
                            ignored = %city.name,
                            "Duplicate gazetteer key"
                        );
                    }
                    continue;
                }
                index.insert(key, i);
            }
        }

        Ok(Self {
            version: raw.version,
            cities: raw.cities,
            index,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn city_count(&self) -> usize {
        self.cities.len()
    }

    /// Classify a free-text location
    pub fn classify(&self, raw: &str) -> LocationProfile {
        let normalized = normalize(raw);
        if normalized.is_empty() {
            return LocationProfile::unknown();
        }

        let whole = normalized.replace(',', " ");
        let whole = collapse_spaces(&whole);

        let candidates = std::iter::once(whole.clone())
            .chain(normalized.split(',').map(|s| s.trim().to_string()))
            .chain(whole.split(' ').map(str::to_string));

        for candidate in candidates {
            if candidate.is_empty() {
                continue;
            }
            if let Some(&i) = self.index.get(&candidate) {
                let city = &self.cities[i];
                debug!(input = %raw, matched = %candidate, city = %city.name, tier = city.tier, "Location matched");
                return LocationProfile {
                    tier: city.tier,
                    city: Some(city.name.clone()),
                    matched_on: Some(candidate),
                    population: city.population,
                    literacy_rate: city.literacy_rate,
                    average_income: city.average_income,
                    growth_rate: city.growth_rate,
                };
            }
        }

        debug!(input = %raw, "Location not in gazetteer");
        LocationProfile::unknown()
    }
}

/// Lower-case, trim, and collapse separators to single spaces (commas kept)
fn normalize(raw: &str) -> String {
    let mapped: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            '-' | '_' | '.' | '/' | '|' | ';' => ' ',
            c => c,
        })
        .collect();
    collapse_spaces(&mapped)
}

fn collapse_spaces(s: &str) -> String {
    s.split(',')
        .map(|segment| segment.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join(",")
        .trim_matches(|c: char| c == ',' || c.is_whitespace())
        .to_string()
}
