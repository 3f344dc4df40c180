//! Analysis and history command implementations

use anyhow::{Context, Result};
use vyapar_core::{format_inr, AnalysisRequest, AnalysisResult, Analyzer, Database, Verdict};

use super::truncate;

/// Run one analysis, print it, and save it unless `db` is `None`
///
/// Returns the stored id when the result was saved.
pub async fn cmd_analyze(
    analyzer: &Analyzer,
    db: Option<&Database>,
    user: &str,
    request: &AnalysisRequest,
    json: bool,
) -> Result<Option<i64>> {
    if !json {
        println!(
            "🔍 Analyzing with {} backend ({} scoring)...",
            analyzer.backend_name(),
            analyzer.strategy_name()
        );
    }

    let mut result = analyzer
        .analyze(request)
        .await
        .map_err(|e| anyhow::anyhow!("{} ({})", e.user_message(), e))?;

    if let Some(db) = db {
        let id = db
            .save_analysis(user, &result)
            .context("Failed to save analysis")?;
        result.id = Some(id);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }

    Ok(result.id)
}

fn verdict_badge(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Go => "✅ GO",
        Verdict::Caution => "⚠️  CAUTION",
        Verdict::Avoid => "❌ AVOID",
    }
}

fn print_result(result: &AnalysisResult) {
    let input = &result.input;
    let money = &result.financial_projection;

    println!();
    println!("{}  Score {}/100", verdict_badge(result.verdict), result.score);
    println!(
        "   {} in {} (tier {}), budget {}",
        input.category_label,
        input.city.as_deref().unwrap_or(&input.location),
        input.tier,
        format_inr(input.budget_amount)
    );
    println!();
    println!("{}", result.summary);

    println!();
    println!("💰 Financials");
    println!("   Setup cost:       {}", format_inr(money.setup_cost as f64));
    println!(
        "   Monthly revenue:  {}",
        format_inr(money.monthly_revenue as f64)
    );
    println!(
        "   Monthly expenses: {}",
        format_inr(money.monthly_expenses as f64)
    );
    println!("   Budget fit:       {}%", result.budget_fit_percent);
    println!("   Break-even:       {} months", money.break_even_months);
    println!("   5-year ROI:       {}%", money.roi);

    println!();
    println!("   {:<6} {:>14} {:>14} {:>14}", "YEAR", "REVENUE", "EXPENSES", "PROFIT");
    for year in &money.yearly_data {
        println!(
            "   {:<6} {:>14} {:>14} {:>14}",
            year.year,
            format_inr(year.revenue as f64),
            format_inr(year.expenses as f64),
            format_inr(year.profit as f64)
        );
    }

    if !result.factors.is_empty() {
        println!();
        println!("📊 Factors");
        for factor in &result.factors {
            println!(
                "   {:<30} {:>3}  (weight {:.2})",
                truncate(&factor.name, 30),
                factor.score,
                factor.weight
            );
        }
    }

    if !result.risks.is_empty() {
        println!();
        println!("🚧 Risks");
        for risk in &result.risks {
            println!("   [{}] {}", risk.severity, risk.risk);
        }
    }

    if !result.recommendations.is_empty() {
        println!();
        println!("💡 Recommendations");
        for rec in &result.recommendations {
            println!("   - {}", rec);
        }
    }

    if let Some(id) = result.id {
        println!();
        println!("Saved as #{} (vyapar history --id {})", id, id);
    }
}

/// List recent analyses for a user
pub fn cmd_history(db: &Database, user: &str, limit: u32) -> Result<()> {
    let entries = db.list_analyses(user, limit)?;
    if entries.is_empty() {
        println!("No analyses yet. Run: vyapar analyze --idea \"...\"");
        return Ok(());
    }

    println!(
        "{:>5}  {:<16}  {:<10} {:>5}  {}",
        "ID", "DATE", "VERDICT", "SCORE", "IDEA"
    );
    println!("{}", "-".repeat(80));
    for entry in entries {
        println!(
            "{:>5}  {:<16}  {:<10} {:>5}  {}",
            entry.id,
            entry.created_at.format("%Y-%m-%d %H:%M"),
            entry.verdict.as_str(),
            entry.score,
            truncate(&entry.business_idea, 36)
        );
    }

    Ok(())
}

/// Print one stored analysis
pub fn cmd_history_show(db: &Database, user: &str, id: i64) -> Result<()> {
    let result = db
        .get_analysis(user, id)?
        .with_context(|| format!("Analysis #{} not found", id))?;
    print_result(&result);
    Ok(())
}
