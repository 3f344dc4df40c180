//! Factor discovery: the first, mandatory AI call
//!
//! Asks the model for weighted, scored factors plus market estimates and turns
//! the reply into sanitized typed records. Any failure here is fatal for the
//! request; factors are never fabricated.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, info};

use crate::ai::{parsing, AIClient, CompletionRequest, RetryPolicy};
use crate::business::BusinessProfile;
use crate::error::{Error, Result};
use crate::location::LocationProfile;
use crate::model_router::{ModelRouter, TaskType};
use crate::models::{Factor, MarketEstimates};
use crate::money::format_inr;
use crate::prompts::{PromptId, PromptLibrary};
use crate::sanitize::{coerce_factors, coerce_market_estimates, field};

/// Fewest usable factors an analysis may be scored on
pub const MIN_FACTORS: usize = 4;

/// Sanitized discovery payload
#[derive(Debug, Clone, PartialEq)]
pub struct Discovery {
    pub factors: Vec<Factor>,
    pub market: MarketEstimates,
}

/// Everything the discovery prompt is rendered from
#[derive(Debug, Clone)]
pub struct DiscoveryContext<'a> {
    pub business_idea: &'a str,
    pub location: &'a str,
    pub budget: &'a str,
    pub business: &'a BusinessProfile,
    pub location_profile: &'a LocationProfile,
    /// Digest from the external signal gateway, if any
    pub signals: Option<String>,
}

pub struct FactorDiscoveryAdapter<'a> {
    client: &'a AIClient,
    prompts: &'a PromptLibrary,
    router: &'a ModelRouter,
}

impl<'a> FactorDiscoveryAdapter<'a> {
    pub fn new(client: &'a AIClient, prompts: &'a PromptLibrary, router: &'a ModelRouter) -> Self {
        Self {
            client,
            prompts,
            router,
        }
    }

    /// Build the completion request for a context
    pub fn request(&self, ctx: &DiscoveryContext<'_>) -> Result<CompletionRequest> {
        let prompt = self.prompts.get(PromptId::DiscoverFactors)?;
        let vars = prompt_vars(ctx);
        Ok(CompletionRequest::new(
            TaskType::FactorDiscovery,
            prompt.render_system(&vars),
            prompt.render_user(&vars),
            &self.router.config_for_task(TaskType::FactorDiscovery),
        ))
    }

    /// Call the model and return sanitized factors and market estimates
    pub async fn discover(&self, ctx: &DiscoveryContext<'_>) -> Result<Discovery> {
        let request = self.request(ctx)?;
        let retry = RetryPolicy::from(&self.router.config_for_task(TaskType::FactorDiscovery));

        let discovery = self
            .client
            .complete_parsed(&request, retry, parse_discovery)
            .await?;

        info!(
            category = %ctx.business.category,
            factors = discovery.factors.len(),
            data_points = discovery.market.data_points.len(),
            "Factor discovery complete"
        );
        Ok(discovery)
    }
}

fn prompt_vars(ctx: &DiscoveryContext<'_>) -> HashMap<&'static str, String> {
    let mut vars = HashMap::new();
    vars.insert("business_idea", ctx.business_idea.to_string());
    vars.insert("location", ctx.location.to_string());
    vars.insert("location_context", ctx.location_profile.describe());
    vars.insert("budget", ctx.budget.to_string());
    vars.insert("category", ctx.business.category.clone());
    vars.insert("category_label", ctx.business.label.clone());
    vars.insert("tier", ctx.location_profile.tier.to_string());
    vars.insert(
        "benchmark_setup_cost",
        format_inr(ctx.business.minimum_setup_cost),
    );
    vars.insert(
        "benchmark_margin",
        format!("{:.0}%", ctx.business.typical_margin * 100.0),
    );
    if let Some(ref signals) = ctx.signals {
        vars.insert("signals", signals.clone());
    }
    vars
}

/// Parse a discovery completion into sanitized records
///
/// Fewer than [`MIN_FACTORS`] usable factors is a malformed reply; more than
/// the cap are truncated by the sanitizer.
pub fn parse_discovery(text: &str) -> Result<Discovery> {
    let root = parsing::extract_json(text)?;

    let raw_factors: &[Value] = match field(&root, &["factors", "marketFactors"]) {
        Some(Value::Array(items)) => items,
        _ => &[],
    };
    let factors = coerce_factors(raw_factors);
    if factors.len() < MIN_FACTORS {
        return Err(Error::UpstreamMalformed(format!(
            "expected at least {} usable factors, got {}",
            MIN_FACTORS,
            factors.len()
        )));
    }

    let market = coerce_market_estimates(&root);
    debug!(
        factors = factors.len(),
        setup_cost_mid = market.setup_cost_mid(),
        "Parsed discovery payload"
    );

    Ok(Discovery { factors, market })
}
