//! Sanitization of untrusted AI output
//!
//! Everything the language model returns passes through here before it is
//! scored, stored or rendered. Two layers:
//!
//! - `coerce_*` turn a raw `serde_json::Value` into typed records, accepting
//!   numeric strings, money shorthand ("8 lakh") and either snake_case or
//!   camelCase keys. Missing fields become empty/zero.
//! - [`Sanitize`] re-applies the bounds to typed records.
//!
//! All functions are pure and idempotent: sanitizing twice changes nothing.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::models::{
    Confidence, Factor, MarketDataPoint, MarketEstimates, Narrative, Risk, RoadmapPhase, Severity,
};
use crate::money;

/// Cap for names, titles and list items
pub const SHORT_TEXT: usize = 200;
/// Cap for explanations and summaries
pub const LONG_TEXT: usize = 5000;

pub const MAX_FACTORS: usize = 8;
pub const MAX_LIST_ITEMS: usize = 10;
pub const MAX_DATA_POINTS: usize = 20;
pub const MAX_RECOMMENDATIONS: usize = 5;
pub const MAX_PHASES: usize = 5;

struct Patterns {
    blocks: Regex,
    tags: Regex,
    uri_handlers: Regex,
    data_uri: Regex,
    event_handlers: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        blocks: Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>")
            .expect("valid regex"),
        tags: Regex::new(r"(?s)</?[a-zA-Z!][^>]*>").expect("valid regex"),
        uri_handlers: Regex::new(r"(?i)\b(javascript|vbscript)\s*:").expect("valid regex"),
        data_uri: Regex::new(r"(?i)\bdata\s*:\s*[\w.+-]+/[\w.+-]+(;base64)?,?")
            .expect("valid regex"),
        event_handlers: Regex::new(r#"(?i)\bon[a-z]+\s*=\s*("[^"]*"|'[^']*'|[^\s>]*)"#)
            .expect("valid regex"),
    })
}

/// Remove markup and script vectors, repeating until nothing changes
///
/// Repetition matters: removing `<scr<script>ipt>` once leaves `<script>`.
pub fn strip_unsafe(input: &str) -> String {
    let p = patterns();
    let mut current: String = input.chars().filter(|c| !is_unsafe_control(*c)).collect();

    loop {
        let next = p.blocks.replace_all(&current, "");
        let next = p.tags.replace_all(&next, "");
        let next = p.uri_handlers.replace_all(&next, "");
        let next = p.data_uri.replace_all(&next, "");
        let next = p.event_handlers.replace_all(&next, "").into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Control characters other than newline and tab
fn is_unsafe_control(c: char) -> bool {
    c.is_control() && c != '\n' && c != '\t'
}

/// Strip, truncate to `max_chars`, and trim
pub fn clean_text(input: &str, max_chars: usize) -> String {
    let stripped = strip_unsafe(input);
    let truncated: String = stripped.chars().take(max_chars).collect();
    truncated.trim().to_string()
}

pub fn clean_short(input: &str) -> String {
    clean_text(input, SHORT_TEXT)
}

pub fn clean_long(input: &str) -> String {
    clean_text(input, LONG_TEXT)
}

/// Clean every item, drop empties, cap the list length
pub fn clean_list(items: &[String], max_items: usize) -> Vec<String> {
    items
        .iter()
        .map(|s| clean_short(s))
        .filter(|s| !s.is_empty())
        .take(max_items)
        .collect()
}

/// Round and clamp to an integer score in 0..=100 (NaN becomes 0)
pub fn clamp_score(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}

/// Clamp a weight or ratio to 0..=1 (NaN becomes 0)
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// Largest rupee amount accepted from a model (one lakh crore)
pub const MAX_AMOUNT: f64 = 1e12;

/// Finite amount in 0..=[`MAX_AMOUNT`]
fn clamp_amount(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, MAX_AMOUNT)
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Raw JSON coercion
// ---------------------------------------------------------------------------

/// First present, non-null field among `keys`
pub fn field<'a>(obj: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

/// A number, or a string containing one ("72", "72%", " 0.4 ")
pub fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim().trim_end_matches('%').trim();
            trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
        }
        Value::Bool(_) | Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// A rupee amount from a number or Indian shorthand ("8 lakh", "₹1.2 Cr")
pub fn coerce_money(value: &Value) -> f64 {
    match value {
        Value::Number(n) => clamp_amount(n.as_f64().unwrap_or(0.0)),
        Value::String(s) => {
            let parsed = money::parse_budget(Some(s));
            if parsed.specified {
                clamp_amount(parsed.amount)
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

fn coerce_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes" | "1"),
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        _ => false,
    }
}

fn raw_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// String field, cleaned and capped
pub fn coerce_string(obj: &Value, keys: &[&str], max_chars: usize) -> String {
    field(obj, keys)
        .map(|v| clean_text(&raw_string(v), max_chars))
        .unwrap_or_default()
}

/// Array of strings (or a single string), cleaned and capped
pub fn coerce_string_list(obj: &Value, keys: &[&str], max_items: usize) -> Vec<String> {
    let items: Vec<String> = match field(obj, keys) {
        Some(Value::Array(values)) => values
            .iter()
            .map(|v| match v {
                Value::Object(_) => field(v, &["text", "title", "name", "description"])
                    .map(raw_string)
                    .unwrap_or_default(),
                other => raw_string(other),
            })
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    };
    clean_list(&items, max_items)
}

fn array<'a>(obj: &'a Value, keys: &[&str]) -> &'a [Value] {
    match field(obj, keys) {
        Some(Value::Array(values)) => values.as_slice(),
        _ => &[],
    }
}

fn money_field(obj: &Value, keys: &[&str]) -> f64 {
    field(obj, keys).map(coerce_money).unwrap_or(0.0)
}

fn count_field(obj: &Value, keys: &[&str]) -> u32 {
    field(obj, keys)
        .and_then(coerce_f64)
        .map(|v| v.round().clamp(0.0, u32::MAX as f64) as u32)
        .unwrap_or(0)
}

/// Coerce one factor; `None` when it has no name or no numeric score
pub fn coerce_factor(value: &Value) -> Option<Factor> {
    if !value.is_object() {
        return None;
    }
    let name = coerce_string(value, &["name", "factor", "title"], SHORT_TEXT);
    let score = field(value, &["score", "rating"]).and_then(coerce_f64)?;
    if name.is_empty() {
        return None;
    }

    Some(Factor {
        name,
        weight: clamp_unit(
            field(value, &["weight", "importance"])
                .and_then(coerce_f64)
                .unwrap_or(0.0),
        ),
        score: clamp_score(score),
        reasoning: coerce_string(value, &["reasoning", "reason", "explanation"], LONG_TEXT),
        is_location_specific: field(value, &["isLocationSpecific", "is_location_specific"])
            .map(coerce_bool)
            .unwrap_or(false),
    })
}

/// Usable factors, first `MAX_FACTORS` kept
pub fn coerce_factors(values: &[Value]) -> Vec<Factor> {
    values
        .iter()
        .filter_map(coerce_factor)
        .take(MAX_FACTORS)
        .collect()
}

pub fn coerce_data_point(value: &Value) -> Option<MarketDataPoint> {
    if !value.is_object() {
        return None;
    }
    let metric = coerce_string(value, &["metric", "name"], SHORT_TEXT);
    if metric.is_empty() {
        return None;
    }
    let number = |keys: &[&str]| {
        field(value, keys)
            .and_then(coerce_f64)
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    };

    Some(MarketDataPoint {
        metric,
        min_value: number(&["minValue", "min_value", "min"]),
        max_value: number(&["maxValue", "max_value", "max"]),
        estimated_value: number(&["estimatedValue", "estimated_value", "value"]),
        unit: coerce_string(value, &["unit"], SHORT_TEXT),
        source: coerce_string(value, &["source"], SHORT_TEXT),
        confidence: field(value, &["confidence"])
            .map(raw_string)
            .and_then(|s| s.parse().ok())
            .unwrap_or_default(),
    })
}

/// Market estimates from the discovery payload (root or `marketData`/`market` object)
pub fn coerce_market_estimates(root: &Value) -> MarketEstimates {
    let market = field(root, &["marketEstimates", "market_estimates", "market"])
        .filter(|v| v.is_object())
        .unwrap_or(root);

    const POINT_KEYS: &[&str] = &["dataPoints", "data_points", "marketData", "market_data"];
    let mut raw_points: Vec<&Value> = array(market, POINT_KEYS).iter().collect();
    if !std::ptr::eq(market, root) {
        // data points are sometimes left at the root
        raw_points.extend(array(root, POINT_KEYS));
    }
    let data_points = raw_points
        .into_iter()
        .filter_map(coerce_data_point)
        .take(MAX_DATA_POINTS)
        .collect();

    MarketEstimates {
        setup_cost_min: money_field(market, &["setupCostMin", "setup_cost_min"]),
        setup_cost_max: money_field(market, &["setupCostMax", "setup_cost_max"]),
        monthly_revenue_min: money_field(market, &["monthlyRevenueMin", "monthly_revenue_min"]),
        monthly_revenue_max: money_field(market, &["monthlyRevenueMax", "monthly_revenue_max"]),
        monthly_expense_min: money_field(
            market,
            &["monthlyExpenseMin", "monthly_expense_min", "monthlyExpensesMin"],
        ),
        monthly_expense_max: money_field(
            market,
            &["monthlyExpenseMax", "monthly_expense_max", "monthlyExpensesMax"],
        ),
        direct_competitors: count_field(market, &["directCompetitors", "direct_competitors"]),
        indirect_competitors: count_field(market, &["indirectCompetitors", "indirect_competitors"]),
        market_size: coerce_string(market, &["marketSize", "market_size"], SHORT_TEXT),
        market_growth: coerce_string(market, &["marketGrowth", "market_growth"], SHORT_TEXT),
        data_points,
    }
    .sanitize()
}

fn coerce_risk(value: &Value) -> Option<Risk> {
    let risk = match value {
        Value::String(s) => Risk {
            risk: clean_short(s),
            ..Default::default()
        },
        Value::Object(_) => Risk {
            risk: coerce_string(value, &["risk", "title", "name", "description"], SHORT_TEXT),
            severity: field(value, &["severity", "level", "impact"])
                .map(raw_string)
                .and_then(|s| s.parse::<Severity>().ok())
                .unwrap_or_default(),
            mitigation: coerce_string(value, &["mitigation", "mitigationStrategy"], LONG_TEXT),
        },
        _ => return None,
    };
    (!risk.risk.is_empty()).then_some(risk)
}

fn coerce_phase(value: &Value) -> Option<RoadmapPhase> {
    if !value.is_object() {
        return None;
    }
    let phase = RoadmapPhase {
        name: coerce_string(value, &["name", "phase", "title"], SHORT_TEXT),
        duration: coerce_string(value, &["duration", "timeline"], SHORT_TEXT),
        tasks: coerce_string_list(value, &["tasks", "activities"], MAX_LIST_ITEMS),
        milestones: coerce_string_list(value, &["milestones"], MAX_LIST_ITEMS),
    };
    (!phase.name.is_empty()).then_some(phase)
}

/// Narrative sections from the explanation payload
///
/// Accepts both the flat shape and the nested response-contract shape
/// (`marketAnalysis.explanation`, `roadmap.phases`, ...). Numbers and
/// verdicts in the payload are ignored.
pub fn coerce_narrative(root: &Value) -> Narrative {
    let nested = |section: &[&str], keys: &[&str]| -> String {
        field(root, section)
            .map(|s| coerce_string(s, keys, LONG_TEXT))
            .unwrap_or_default()
    };
    let prefer = |flat: String, fallback: String| if flat.is_empty() { fallback } else { flat };

    let competition = field(root, &["competitionAnalysis", "competition_analysis"]);
    let roadmap = field(root, &["roadmap"]);

    let roadmap_phases: Vec<RoadmapPhase> = match roadmap {
        Some(Value::Array(phases)) => phases.iter().filter_map(coerce_phase).collect(),
        Some(obj @ Value::Object(_)) => array(obj, &["phases"])
            .iter()
            .filter_map(coerce_phase)
            .collect(),
        _ => Vec::new(),
    };

    let list_from = |keys: &[&str], max: usize| -> Vec<String> {
        let flat = coerce_string_list(root, keys, max);
        if !flat.is_empty() {
            return flat;
        }
        competition
            .map(|c| coerce_string_list(c, keys, max))
            .unwrap_or_default()
    };

    Narrative {
        summary: coerce_string(root, &["summary", "executiveSummary"], LONG_TEXT),
        market_explanation: prefer(
            coerce_string(root, &["marketExplanation", "market_explanation"], LONG_TEXT),
            nested(&["marketAnalysis", "market_analysis"], &["explanation"]),
        ),
        competition_explanation: prefer(
            coerce_string(
                root,
                &["competitionExplanation", "competition_explanation"],
                LONG_TEXT,
            ),
            nested(&["competitionAnalysis", "competition_analysis"], &["explanation"]),
        ),
        financial_explanation: prefer(
            coerce_string(root, &["financialExplanation", "financial_explanation"], LONG_TEXT),
            nested(
                &["financialProjection", "financial_projection"],
                &["explanation"],
            ),
        ),
        competitive_advantage: prefer(
            coerce_string(root, &["competitiveAdvantage", "competitive_advantage"], LONG_TEXT),
            nested(
                &["competitionAnalysis", "competition_analysis"],
                &["competitiveAdvantage", "competitive_advantage"],
            ),
        ),
        threats: list_from(&["threats"], MAX_LIST_ITEMS),
        opportunities: list_from(&["opportunities"], MAX_LIST_ITEMS),
        risks: array(root, &["risks"])
            .iter()
            .filter_map(coerce_risk)
            .take(MAX_LIST_ITEMS)
            .collect(),
        recommendations: coerce_string_list(root, &["recommendations"], MAX_RECOMMENDATIONS),
        roadmap: roadmap_phases.into_iter().take(MAX_PHASES).collect(),
        roadmap_explanation: prefer(
            coerce_string(root, &["roadmapExplanation", "roadmap_explanation"], LONG_TEXT),
            roadmap
                .filter(|r| r.is_object())
                .map(|r| coerce_string(r, &["explanation"], LONG_TEXT))
                .unwrap_or_default(),
        ),
        expert_insights: match field(root, &["expertInsights", "expert_insights"]) {
            Some(Value::Array(items)) => clean_long(
                &items
                    .iter()
                    .map(raw_string)
                    .filter(|s| !s.trim().is_empty())
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            Some(other) => clean_long(&raw_string(other)),
            None => String::new(),
        },
    }
}

// ---------------------------------------------------------------------------
// Typed re-sanitization
// ---------------------------------------------------------------------------

/// Re-apply sanitizer bounds to an already-typed record
pub trait Sanitize {
    fn sanitize(self) -> Self;
}

impl Sanitize for Factor {
    fn sanitize(self) -> Self {
        Factor {
            name: clean_short(&self.name),
            weight: clamp_unit(self.weight),
            score: self.score.min(100),
            reasoning: clean_long(&self.reasoning),
            is_location_specific: self.is_location_specific,
        }
    }
}

impl Sanitize for Vec<Factor> {
    fn sanitize(self) -> Self {
        self.into_iter()
            .map(Sanitize::sanitize)
            .filter(|f| !f.name.is_empty())
            .take(MAX_FACTORS)
            .collect()
    }
}

impl Sanitize for MarketDataPoint {
    fn sanitize(self) -> Self {
        let finite = |v: f64| if v.is_finite() { v } else { 0.0 };
        MarketDataPoint {
            metric: clean_short(&self.metric),
            min_value: finite(self.min_value),
            max_value: finite(self.max_value),
            estimated_value: finite(self.estimated_value),
            unit: clean_short(&self.unit),
            source: clean_short(&self.source),
            confidence: self.confidence,
        }
    }
}

impl Sanitize for MarketEstimates {
    fn sanitize(self) -> Self {
        MarketEstimates {
            setup_cost_min: clamp_amount(self.setup_cost_min),
            setup_cost_max: clamp_amount(self.setup_cost_max),
            monthly_revenue_min: clamp_amount(self.monthly_revenue_min),
            monthly_revenue_max: clamp_amount(self.monthly_revenue_max),
            monthly_expense_min: clamp_amount(self.monthly_expense_min),
            monthly_expense_max: clamp_amount(self.monthly_expense_max),
            direct_competitors: self.direct_competitors,
            indirect_competitors: self.indirect_competitors,
            market_size: clean_short(&self.market_size),
            market_growth: clean_short(&self.market_growth),
            data_points: self
                .data_points
                .into_iter()
                .map(Sanitize::sanitize)
                .filter(|p| !p.metric.is_empty())
                .take(MAX_DATA_POINTS)
                .collect(),
        }
    }
}

impl Sanitize for Risk {
    fn sanitize(self) -> Self {
        Risk {
            risk: clean_short(&self.risk),
            severity: self.severity,
            mitigation: clean_long(&self.mitigation),
        }
    }
}

impl Sanitize for RoadmapPhase {
    fn sanitize(self) -> Self {
        RoadmapPhase {
            name: clean_short(&self.name),
            duration: clean_short(&self.duration),
            tasks: clean_list(&self.tasks, MAX_LIST_ITEMS),
            milestones: clean_list(&self.milestones, MAX_LIST_ITEMS),
        }
    }
}

impl Sanitize for Narrative {
    fn sanitize(self) -> Self {
        Narrative {
            summary: clean_long(&self.summary),
            market_explanation: clean_long(&self.market_explanation),
            competition_explanation: clean_long(&self.competition_explanation),
            financial_explanation: clean_long(&self.financial_explanation),
            competitive_advantage: clean_long(&self.competitive_advantage),
            threats: clean_list(&self.threats, MAX_LIST_ITEMS),
            opportunities: clean_list(&self.opportunities, MAX_LIST_ITEMS),
            risks: self
                .risks
                .into_iter()
                .map(Sanitize::sanitize)
                .filter(|r| !r.risk.is_empty())
                .take(MAX_LIST_ITEMS)
                .collect(),
            recommendations: clean_list(&self.recommendations, MAX_RECOMMENDATIONS),
            roadmap: self
                .roadmap
                .into_iter()
                .map(Sanitize::sanitize)
                .filter(|p| !p.name.is_empty())
                .take(MAX_PHASES)
                .collect(),
            roadmap_explanation: clean_long(&self.roadmap_explanation),
            expert_insights: clean_long(&self.expert_insights),
        }
    }
}
