//! Optional external signals for the discovery prompt
//!
//! Two collaborators, both best-effort:
//! - a Tavily-style web search endpoint (`SEARCH_API_URL`, `SEARCH_API_KEY`)
//! - World Bank indicators for India (`WORLD_BANK_API_URL`)
//!
//! They are fetched concurrently with a short per-call timeout. Any failure
//! degrades to an empty contribution and never fails the analysis.

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::sanitize::{clean_short, clean_text};

pub const DEFAULT_WORLD_BANK_URL: &str = "https://api.worldbank.org/v2";
pub const SIGNAL_TIMEOUT: Duration = Duration::from_secs(5);

const MAX_SNIPPETS: usize = 5;
const SNIPPET_CHARS: usize = 300;

/// World Bank indicators folded into the prompt
const INDICATORS: &[(&str, &str)] = &[
    ("NY.GDP.MKTP.KD.ZG", "India GDP growth (annual %)"),
    ("FP.CPI.TOTL.ZG", "India consumer price inflation (annual %)"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSnippet {
    pub title: String,
    pub content: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroStat {
    pub label: String,
    pub value: f64,
    pub year: String,
}

/// Whatever the collaborators returned for one request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalDigest {
    pub search_snippets: Vec<SearchSnippet>,
    pub macro_stats: Vec<MacroStat>,
}

impl SignalDigest {
    pub fn is_empty(&self) -> bool {
        self.search_snippets.is_empty() && self.macro_stats.is_empty()
    }

    /// Plain-text block for the discovery prompt, `None` when empty
    pub fn to_prompt_context(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        let mut lines = Vec::new();
        for stat in &self.macro_stats {
            lines.push(format!("- {}: {:.1} ({})", stat.label, stat.value, stat.year));
        }
        for snippet in &self.search_snippets {
            lines.push(format!("- {}: {}", snippet.title, snippet.content));
        }
        Some(lines.join("\n"))
    }
}

#[derive(Debug, Clone)]
struct SearchConfig {
    url: String,
    api_key: String,
}

/// Web search and statistics client
#[derive(Debug, Clone)]
pub struct ExternalSignalGateway {
    http_client: Client,
    search: Option<SearchConfig>,
    world_bank_url: Option<String>,
    timeout: Duration,
}

impl ExternalSignalGateway {
    /// Create from environment variables
    ///
    /// Returns None when `VYAPAR_SIGNALS=off`. Web search is enabled only when
    /// both `SEARCH_API_URL` and `SEARCH_API_KEY` are set.
    pub fn from_env() -> Option<Self> {
        if std::env::var("VYAPAR_SIGNALS")
            .map(|v| matches!(v.to_lowercase().as_str(), "off" | "0" | "false"))
            .unwrap_or(false)
        {
            return None;
        }

        let search = match (
            std::env::var("SEARCH_API_URL"),
            std::env::var("SEARCH_API_KEY"),
        ) {
            (Ok(url), Ok(key)) if !url.trim().is_empty() && !key.trim().is_empty() => {
                Some((url, key))
            }
            _ => None,
        };
        let world_bank = std::env::var("WORLD_BANK_API_URL")
            .unwrap_or_else(|_| DEFAULT_WORLD_BANK_URL.to_string());

        let gateway = Self::new(Some(&world_bank));
        Some(match search {
            Some((url, key)) => gateway.with_search(&url, &key),
            None => gateway,
        })
    }

    /// Gateway with statistics only (pass `None` to disable those too)
    pub fn new(world_bank_url: Option<&str>) -> Self {
        Self {
            http_client: Client::new(),
            search: None,
            world_bank_url: world_bank_url.map(|u| u.trim_end_matches('/').to_string()),
            timeout: SIGNAL_TIMEOUT,
        }
    }

    pub fn with_search(mut self, url: &str, api_key: &str) -> Self {
        self.search = Some(SearchConfig {
            url: url.to_string(),
            api_key: api_key.to_string(),
        });
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn search_enabled(&self) -> bool {
        self.search.is_some()
    }

    /// Fetch everything concurrently; failures become empty contributions
    pub async fn gather(&self, business_idea: &str, city: Option<&str>) -> SignalDigest {
        let started = Instant::now();
        let query = search_query(business_idea, city);

        let (snippets, stats) = tokio::join!(self.search_snippets(&query), self.macro_stats());

        let digest = SignalDigest {
            search_snippets: snippets.unwrap_or_else(|e| {
                warn!(error = %e, "Web search unavailable, continuing without it");
                Vec::new()
            }),
            macro_stats: stats,
        };
        debug!(
            snippets = digest.search_snippets.len(),
            stats = digest.macro_stats.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "External signals gathered"
        );
        digest
    }

    async fn search_snippets(&self, query: &str) -> Result<Vec<SearchSnippet>> {
        let Some(ref search) = self.search else {
            return Ok(Vec::new());
        };

        let body = serde_json::json!({
            "api_key": search.api_key,
            "query": query,
            "max_results": MAX_SNIPPETS,
            "search_depth": "basic",
        });

        let response = self
            .http_client
            .post(&search.url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::UpstreamUnavailable(format!(
                "search returned {}",
                response.status()
            )));
        }

        let parsed: SearchResponse = response.json().await?;
        Ok(parsed
            .results
            .into_iter()
            .map(|r| SearchSnippet {
                title: clean_short(&r.title),
                content: clean_text(&r.content, SNIPPET_CHARS),
                url: clean_short(&r.url),
            })
            .filter(|s| !s.content.is_empty())
            .take(MAX_SNIPPETS)
            .collect())
    }

    async fn macro_stats(&self) -> Vec<MacroStat> {
        let Some(ref base) = self.world_bank_url else {
            return Vec::new();
        };

        let (gdp, cpi) = tokio::join!(
            self.indicator(base, INDICATORS[0]),
            self.indicator(base, INDICATORS[1])
        );

        [gdp, cpi]
            .into_iter()
            .filter_map(|r| match r {
                Ok(stat) => stat,
                Err(e) => {
                    warn!(error = %e, "World Bank indicator unavailable");
                    None
                }
            })
            .collect()
    }

    async fn indicator(&self, base: &str, (id, label): (&str, &str)) -> Result<Option<MacroStat>> {
        let url = format!("{}/country/IND/indicator/{}", base, id);
        let response = self
            .http_client
            .get(&url)
            .query(&[("format", "json"), ("mrnev", "1")])
            .timeout(self.timeout)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::UpstreamUnavailable(format!(
                "indicator {} returned {}",
                id,
                response.status()
            )));
        }
        let body: Value = response.json().await?;
        Ok(parse_indicator(&body, label))
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    url: String,
}

fn search_query(business_idea: &str, city: Option<&str>) -> String {
    let idea: String = business_idea.chars().take(120).collect();
    match city {
        Some(city) => format!("{} market size competition {} India", idea, city),
        None => format!("{} market size competition India", idea),
    }
}

/// World Bank replies `[meta, [ {value, date, ...} ]]`; take the first non-null value
fn parse_indicator(body: &Value, label: &str) -> Option<MacroStat> {
    body.get(1)?
        .as_array()?
        .iter()
        .find_map(|entry| {
            let value = entry.get("value")?.as_f64()?;
            let year = entry
                .get("date")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Some(MacroStat {
                label: label.to_string(),
                value,
                year,
            })
        })
}
