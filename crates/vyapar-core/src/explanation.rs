//! Explanation: the second, mandatory AI call
//!
//! The model receives the finalized numbers and returns prose only. Numbers
//! and verdicts it echoes back are ignored; a verdict word in the summary that
//! disagrees with the computed verdict is logged. Missing risks, roadmap
//! phases and recommendations are filled in from the scoring result.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{info, warn};

use crate::ai::{parsing, AIClient, CompletionRequest, RetryPolicy};
use crate::business::BusinessProfile;
use crate::error::{Error, Result};
use crate::location::LocationProfile;
use crate::model_router::{ModelRouter, TaskType};
use crate::models::{
    Factor, MarketEstimates, Narrative, Risk, RoadmapPhase, ScoringResult, Severity, Verdict,
};
use crate::money::format_inr;
use crate::prompts::{PromptId, PromptLibrary};
use crate::sanitize::{coerce_narrative, Sanitize, MAX_RECOMMENDATIONS};

pub const MIN_RISKS: usize = 3;
pub const MIN_RECOMMENDATIONS: usize = 3;
pub const ROADMAP_PHASES: usize = 3;

/// Scores below this always carry at least one high-severity risk
pub const HIGH_RISK_SCORE: u8 = 50;
/// Scores below this raise derived risks to at least medium
pub const MEDIUM_RISK_SCORE: u8 = 65;

/// Everything the explanation prompt is rendered from
#[derive(Debug, Clone)]
pub struct ExplanationContext<'a> {
    pub business_idea: &'a str,
    pub location: &'a str,
    pub budget: &'a str,
    pub business: &'a BusinessProfile,
    pub location_profile: &'a LocationProfile,
    pub scoring: &'a ScoringResult,
    pub factors: &'a [Factor],
    pub market: &'a MarketEstimates,
}

pub struct ExplanationAdapter<'a> {
    client: &'a AIClient,
    prompts: &'a PromptLibrary,
    router: &'a ModelRouter,
}

impl<'a> ExplanationAdapter<'a> {
    pub fn new(client: &'a AIClient, prompts: &'a PromptLibrary, router: &'a ModelRouter) -> Self {
        Self {
            client,
            prompts,
            router,
        }
    }

    /// Build the completion request for a context
    pub fn request(&self, ctx: &ExplanationContext<'_>) -> Result<CompletionRequest> {
        let prompt = self.prompts.get(PromptId::ExplainAnalysis)?;
        let vars = prompt_vars(ctx);
        Ok(CompletionRequest::new(
            TaskType::Explanation,
            prompt.render_system(&vars),
            prompt.render_user(&vars),
            &self.router.config_for_task(TaskType::Explanation),
        ))
    }

    /// Ask for the narrative and complete it against the scoring result
    pub async fn explain(&self, ctx: &ExplanationContext<'_>) -> Result<Narrative> {
        let request = self.request(ctx)?;
        let retry = RetryPolicy::from(&self.router.config_for_task(TaskType::Explanation));

        let narrative = self
            .client
            .complete_parsed(&request, retry, parse_explanation)
            .await?;

        let narrative = finalize_narrative(narrative, ctx.scoring);
        info!(
            verdict = %ctx.scoring.verdict,
            risks = narrative.risks.len(),
            phases = narrative.roadmap.len(),
            "Explanation complete"
        );
        Ok(narrative)
    }
}

/// Parse an explanation completion; a reply without a summary is malformed
pub fn parse_explanation(text: &str) -> Result<Narrative> {
    let root = parsing::extract_json(text)?;
    let narrative = coerce_narrative(&root);
    if narrative.summary.is_empty() {
        return Err(Error::UpstreamMalformed(
            "explanation has no summary".into(),
        ));
    }
    Ok(narrative)
}

/// Bring a sanitized narrative in line with the computed result
///
/// Pads risks to [`MIN_RISKS`] and recommendations to [`MIN_RECOMMENDATIONS`]
/// with deterministic entries, fixes the roadmap at [`ROADMAP_PHASES`], and
/// guarantees a high-severity risk for AVOID or a score below
/// [`HIGH_RISK_SCORE`].
pub fn finalize_narrative(mut narrative: Narrative, scoring: &ScoringResult) -> Narrative {
    check_verdict_consistency(&narrative.summary, scoring.verdict);

    for candidate in derived_risks(scoring) {
        if narrative.risks.len() >= MIN_RISKS {
            break;
        }
        if !narrative
            .risks
            .iter()
            .any(|r| r.risk.eq_ignore_ascii_case(&candidate.risk))
        {
            narrative.risks.push(candidate);
        }
    }

    if (scoring.verdict == Verdict::Avoid || scoring.score < HIGH_RISK_SCORE)
        && !narrative.risks.iter().any(|r| r.severity == Severity::High)
    {
        if let Some(first) = narrative.risks.first_mut() {
            first.severity = Severity::High;
        }
    }

    narrative.roadmap = complete_roadmap(std::mem::take(&mut narrative.roadmap), scoring);

    for rec in FALLBACK_RECOMMENDATIONS {
        if narrative.recommendations.len() >= MIN_RECOMMENDATIONS {
            break;
        }
        if !narrative.recommendations.iter().any(|r| r == rec) {
            narrative.recommendations.push(rec.to_string());
        }
    }
    narrative.recommendations.truncate(MAX_RECOMMENDATIONS);

    narrative.sanitize()
}

const FALLBACK_RECOMMENDATIONS: &[&str] = &[
    "Validate demand with a small pilot before committing the full budget",
    "Track monthly revenue and expenses against the projection",
    "Keep a cash reserve covering at least three months of expenses",
];

/// Model phases in order, gaps filled from the derived plan, exactly
/// [`ROADMAP_PHASES`] long
fn complete_roadmap(phases: Vec<RoadmapPhase>, scoring: &ScoringResult) -> Vec<RoadmapPhase> {
    let mut derived = derived_phases(scoring).into_iter();
    let mut roadmap: Vec<RoadmapPhase> = phases
        .into_iter()
        .filter(|p| !p.name.trim().is_empty())
        .take(ROADMAP_PHASES)
        .map(|mut phase| {
            let fallback = derived.next().unwrap_or_default();
            if phase.duration.trim().is_empty() {
                phase.duration = fallback.duration;
            }
            if phase.tasks.is_empty() {
                phase.tasks = fallback.tasks;
            }
            if phase.milestones.is_empty() {
                phase.milestones = fallback.milestones;
            }
            phase
        })
        .collect();
    roadmap.extend(derived.take(ROADMAP_PHASES - roadmap.len()));
    roadmap
}

/// Setup, launch and growth phases sized from the computed numbers
fn derived_phases(scoring: &ScoringResult) -> Vec<RoadmapPhase> {
    let growth_end = scoring.break_even_months.max(12);
    let break_even = if scoring.monthly_profit > 0 {
        format!("Break-even around month {}", scoring.break_even_months)
    } else {
        "Monthly revenue covers monthly expenses".to_string()
    };

    vec![
        RoadmapPhase {
            name: "Setup".into(),
            duration: "Months 1-3".into(),
            tasks: vec![
                "Secure premises, licences and registrations".into(),
                format!(
                    "Commit the {} setup budget in stages",
                    format_inr(scoring.setup_cost as f64)
                ),
            ],
            milestones: vec!["Ready to serve the first customers".into()],
        },
        RoadmapPhase {
            name: "Launch".into(),
            duration: "Months 4-6".into(),
            tasks: vec![
                "Open to a first set of customers".into(),
                "Track monthly revenue and expenses against the projection".into(),
            ],
            milestones: vec![format!(
                "Monthly revenue approaching {}",
                format_inr(scoring.monthly_revenue as f64)
            )],
        },
        RoadmapPhase {
            name: "Growth".into(),
            duration: format!("Months 7-{}", growth_end),
            tasks: vec![
                "Expand the offerings that sell best".into(),
                "Reinvest surplus once expenses are covered".into(),
            ],
            milestones: vec![break_even],
        },
    ]
}

/// Floor severity for derived risks at this score
fn score_band_severity(score: u8) -> Severity {
    if score < HIGH_RISK_SCORE {
        Severity::High
    } else if score < MEDIUM_RISK_SCORE {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Risks implied by the numbers, most pressing first
fn derived_risks(scoring: &ScoringResult) -> Vec<Risk> {
    let mut risks = Vec::with_capacity(3);
    let floor = score_band_severity(scoring.score);

    let fit = scoring.budget_fit_percent;
    risks.push(if fit < 100 {
        Risk {
            risk: format!(
                "Underfunding: the budget covers {}% of the estimated setup cost of {}",
                fit,
                format_inr(scoring.setup_cost as f64)
            ),
            severity: if fit < 80 { Severity::High } else { Severity::Medium },
            mitigation: "Phase the launch, lease equipment, or raise additional capital before starting."
                .into(),
        }
    } else {
        Risk {
            risk: "Cash flow strain during the ramp-up period".into(),
            severity: floor,
            mitigation: "Hold back working capital for the first months of operation.".into(),
        }
    });

    let density = scoring.features.competition_density;
    risks.push(Risk {
        risk: "Competition from established players".into(),
        severity: floor.max(if density >= 0.7 {
            Severity::High
        } else if density >= 0.4 {
            Severity::Medium
        } else {
            Severity::Low
        }),
        mitigation: "Differentiate on a narrow offering and build repeat customers early.".into(),
    });

    let margin = scoring.features.profit_margin;
    risks.push(if scoring.monthly_profit <= 0 {
        Risk {
            risk: "Projected monthly expenses exceed revenue".into(),
            severity: Severity::High,
            mitigation: "Rework pricing and fixed costs before launch.".into(),
        }
    } else {
        Risk {
            risk: format!("Thin operating margin ({:.0}%)", margin * 100.0),
            severity: floor.max(if margin < 0.15 {
                Severity::Medium
            } else {
                Severity::Low
            }),
            mitigation: "Negotiate supplier terms and review pricing quarterly.".into(),
        }
    });

    risks
}

fn verdict_word() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(GO|CAUTION|AVOID)\b").expect("valid regex"))
}

/// Log verdict words in the narrative that disagree with the computed verdict
///
/// Returns the contradicting words (for tests).
fn check_verdict_consistency(summary: &str, verdict: Verdict) -> Vec<Verdict> {
    let contradictions: Vec<Verdict> = verdict_word()
        .find_iter(summary)
        .filter_map(|m| m.as_str().parse::<Verdict>().ok())
        .filter(|v| *v != verdict)
        .collect();
    if !contradictions.is_empty() {
        warn!(
            verdict = %verdict,
            narrative = ?contradictions,
            "Narrative verdict disagrees with computed verdict; keeping computed verdict"
        );
    }
    contradictions
}

fn prompt_vars(ctx: &ExplanationContext<'_>) -> HashMap<&'static str, String> {
    let s = ctx.scoring;
    let mut vars = HashMap::new();
    vars.insert("business_idea", ctx.business_idea.to_string());
    vars.insert("location", ctx.location.to_string());
    vars.insert("location_context", ctx.location_profile.describe());
    vars.insert("budget", ctx.budget.to_string());
    vars.insert("category_label", ctx.business.label.clone());
    vars.insert("verdict", s.verdict.to_string());
    vars.insert("score", s.score.to_string());
    vars.insert("budget_fit", s.budget_fit_percent.to_string());
    vars.insert("setup_cost", format_inr(s.setup_cost as f64));
    vars.insert("monthly_revenue", format_inr(s.monthly_revenue as f64));
    vars.insert("monthly_expenses", format_inr(s.monthly_expenses as f64));
    vars.insert("monthly_profit", format_inr(s.monthly_profit as f64));
    vars.insert("break_even_months", s.break_even_months.to_string());
    vars.insert("roi", s.roi.to_string());
    vars.insert(
        "projection_table",
        s.financial_projections
            .iter()
            .map(|y| {
                format!(
                    "Year {}: revenue {}, expenses {}, profit {}",
                    y.year,
                    format_inr(y.revenue as f64),
                    format_inr(y.expenses as f64),
                    format_inr(y.profit as f64)
                )
            })
            .collect::<Vec<_>>()
            .join("\n"),
    );
    vars.insert(
        "factor_list",
        ctx.factors
            .iter()
            .map(|f| format!("- {} (weight {:.2}): {}/100", f.name, f.weight, f.score))
            .collect::<Vec<_>>()
            .join("\n"),
    );
    vars.insert(
        "market_summary",
        match (ctx.market.market_size.is_empty(), ctx.market.market_growth.is_empty()) {
            (false, false) => format!("{}, growing {}", ctx.market.market_size, ctx.market.market_growth),
            (false, true) => ctx.market.market_size.clone(),
            (true, false) => format!("growing {}", ctx.market.market_growth),
            (true, true) => "no estimate".to_string(),
        },
    );
    vars.insert("direct_competitors", ctx.market.direct_competitors.to_string());
    vars.insert(
        "indirect_competitors",
        ctx.market.indirect_competitors.to_string(),
    );
    vars
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScoringFeatures;

    fn scoring(verdict: Verdict, fit: u32, monthly_profit: i64) -> ScoringResult {
        ScoringResult {
            score: 50,
            verdict,
            budget_fit_percent: fit,
            break_even_months: 36,
            roi: 0,
            financial_projections: Vec::new(),
            strategy: "ensemble".into(),
            confidence_multiplier: 1.0,
            setup_cost: 800_000,
            monthly_revenue: 100_000,
            monthly_expenses: 100_000 - monthly_profit,
            monthly_profit,
            features: ScoringFeatures {
                competition_density: 0.9,
                profit_margin: 0.1,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_parse_canned_explanation() {
        let narrative = parse_explanation(crate::ai::CANNED_EXPLANATION).unwrap();
        assert_eq!(narrative.risks.len(), 3);
        assert_eq!(narrative.roadmap.len(), 3);
        assert!(narrative.expert_insights.contains('\n'));
    }

    #[test]
    fn test_missing_summary_is_malformed() {
        let err = parse_explanation(r#"{"risks": []}"#).unwrap_err();
        assert!(matches!(err, Error::UpstreamMalformed(_)));
    }

    #[test]
    fn test_risks_padded_to_minimum() {
        let narrative = Narrative {
            summary: "Fine.".into(),
            risks: vec![Risk {
                risk: "Seasonal demand".into(),
                severity: Severity::Low,
                mitigation: String::new(),
            }],
            ..Default::default()
        };
        let done = finalize_narrative(narrative, &scoring(Verdict::Caution, 60, 10_000));
        assert_eq!(done.risks.len(), MIN_RISKS);
        assert_eq!(done.risks[0].risk, "Seasonal demand");
        assert!(done.risks[1].risk.starts_with("Underfunding"));
        assert_eq!(done.risks[1].severity, Severity::High);
        assert_eq!(done.recommendations.len(), MIN_RECOMMENDATIONS);
    }

    #[test]
    fn test_avoid_forces_high_severity() {
        let narrative = Narrative {
            summary: "Risky.".into(),
            risks: vec![
                Risk {
                    risk: "A".into(),
                    severity: Severity::Low,
                    mitigation: String::new(),
                },
                Risk {
                    risk: "B".into(),
                    severity: Severity::Medium,
                    mitigation: String::new(),
                },
                Risk {
                    risk: "C".into(),
                    severity: Severity::Low,
                    mitigation: String::new(),
                },
            ],
            ..Default::default()
        };
        let done = finalize_narrative(narrative, &scoring(Verdict::Avoid, 100, 5_000));
        assert_eq!(done.risks.len(), 3);
        assert!(done.risks.iter().any(|r| r.severity == Severity::High));
    }

    #[test]
    fn test_loss_making_margin_risk() {
        let risks = derived_risks(&scoring(Verdict::Avoid, 100, -20_000));
        assert_eq!(risks.len(), 3);
        assert!(risks[2].risk.contains("exceed revenue"));
        assert_eq!(risks[2].severity, Severity::High);
        // score 50 sits in the medium band
        assert_eq!(risks[0].severity, Severity::Medium);
    }

    #[test]
    fn test_derived_severity_follows_score_band() {
        let mut strong = scoring(Verdict::Go, 100, 30_000);
        strong.score = 80;
        strong.features.competition_density = 0.1;
        strong.features.profit_margin = 0.3;
        assert!(derived_risks(&strong).iter().all(|r| r.severity == Severity::Low));

        let mut weak = strong.clone();
        weak.score = 30;
        assert!(derived_risks(&weak).iter().all(|r| r.severity == Severity::High));
    }

    #[test]
    fn test_low_score_caution_gets_high_risk() {
        let mut s = scoring(Verdict::Caution, 100, 20_000);
        s.score = 42;
        s.features.competition_density = 0.1;
        s.features.profit_margin = 0.3;
        let narrative = parse_explanation(r#"{"summary": "Proceed carefully."}"#).unwrap();
        let done = finalize_narrative(narrative, &s);
        assert_eq!(done.risks.len(), MIN_RISKS);
        assert!(done.risks.iter().any(|r| r.severity == Severity::High));
    }

    #[test]
    fn test_model_risks_raised_when_score_low() {
        let narrative = Narrative {
            summary: "Mixed.".into(),
            risks: (0..3)
                .map(|i| Risk {
                    risk: format!("Risk {}", i),
                    severity: Severity::Low,
                    mitigation: String::new(),
                })
                .collect(),
            ..Default::default()
        };
        let mut s = scoring(Verdict::Caution, 100, 20_000);
        s.score = 45;
        let done = finalize_narrative(narrative, &s);
        assert_eq!(done.risks[0].severity, Severity::High);
    }

    #[test]
    fn test_empty_roadmap_gets_three_phases() {
        let narrative = parse_explanation(r#"{"summary": "ok", "roadmap": []}"#).unwrap();
        let done = finalize_narrative(narrative, &scoring(Verdict::Caution, 100, 20_000));
        assert_eq!(done.roadmap.len(), ROADMAP_PHASES);
        let names: Vec<&str> = done.roadmap.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Setup", "Launch", "Growth"]);
        for phase in &done.roadmap {
            assert!(!phase.duration.is_empty());
            assert!(!phase.tasks.is_empty());
            assert!(!phase.milestones.is_empty());
        }
        assert!(done.roadmap[0].tasks[1].contains("₹8.00 L"));
        assert_eq!(done.roadmap[2].duration, "Months 7-36");
        assert_eq!(done.roadmap[2].milestones[0], "Break-even around month 36");
    }

    #[test]
    fn test_partial_roadmap_filled_and_long_roadmap_cut() {
        let partial = parse_explanation(
            r#"{"summary": "ok", "roadmap": [{"name": "Pilot kitchen", "duration": "6 weeks"}]}"#,
        )
        .unwrap();
        let done = finalize_narrative(partial, &scoring(Verdict::Go, 100, 20_000));
        assert_eq!(done.roadmap.len(), ROADMAP_PHASES);
        assert_eq!(done.roadmap[0].name, "Pilot kitchen");
        assert_eq!(done.roadmap[0].duration, "6 weeks");
        assert!(!done.roadmap[0].tasks.is_empty());
        assert_eq!(done.roadmap[1].name, "Launch");
        assert_eq!(done.roadmap[2].name, "Growth");

        let long = Narrative {
            summary: "ok".into(),
            roadmap: (1..=5)
                .map(|i| RoadmapPhase {
                    name: format!("Phase {}", i),
                    duration: "1 month".into(),
                    tasks: vec!["Work".into()],
                    milestones: vec!["Done".into()],
                })
                .collect(),
            ..Default::default()
        };
        let done = finalize_narrative(long, &scoring(Verdict::Go, 100, 20_000));
        assert_eq!(done.roadmap.len(), ROADMAP_PHASES);
        assert_eq!(done.roadmap[2].name, "Phase 3");
    }

    #[test]
    fn test_verdict_contradiction_detected() {
        assert_eq!(
            check_verdict_consistency("Our verdict: GO for it.", Verdict::Avoid),
            vec![Verdict::Go]
        );
        assert!(check_verdict_consistency("Proceed with CAUTION.", Verdict::Caution).is_empty());
        // lowercase prose is not a verdict
        assert!(check_verdict_consistency("Ready to go to market.", Verdict::Avoid).is_empty());
    }

    #[test]
    fn test_recommendations_capped() {
        let narrative = Narrative {
            summary: "x".into(),
            recommendations: (0..9).map(|i| format!("Step {}", i)).collect(),
            ..Default::default()
        };
        let done = finalize_narrative(narrative, &scoring(Verdict::Go, 100, 50_000));
        assert_eq!(done.recommendations.len(), MAX_RECOMMENDATIONS);
    }
}
