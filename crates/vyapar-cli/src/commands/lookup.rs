//! Offline command implementations (no AI backend needed)

use anyhow::Result;
use vyapar_core::model_router::default_config_path;
use vyapar_core::prompts::default_prompts_dir;
use vyapar_core::reference::default_config_dir;
use vyapar_core::request::NOT_SPECIFIED;
use vyapar_core::{format_inr, parse_budget, ModelRouter, ReferenceData, TaskType};

/// Parse a budget string and show how it was read
pub fn cmd_budget(text: &str) -> Result<()> {
    let budget = parse_budget(Some(text));
    if budget.specified {
        println!("{} = {} ({:.0} rupees)", text, format_inr(budget.amount), budget.amount);
    } else {
        println!(
            "Could not read \"{}\"; the default of {} would be used",
            text,
            format_inr(budget.amount)
        );
    }
    Ok(())
}

/// Show the business category and city tier for an idea
pub fn cmd_classify(reference: &ReferenceData, idea: &str, location: Option<&str>) -> Result<()> {
    let location = location
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or(NOT_SPECIFIED);
    let business = reference.classify_business(idea);
    let place = reference.classify_location(location);

    println!("Business:");
    println!("   Category:       {} ({})", business.label, business.category);
    println!(
        "   Minimum setup:  {}",
        format_inr(business.minimum_setup_cost)
    );
    println!(
        "   Typical margin: {:.0}%",
        business.typical_margin * 100.0
    );
    println!();
    println!("Location:");
    println!("   City:           {}", place.city.as_deref().unwrap_or("Unknown"));
    println!("   Tier:           {}", place.tier);
    if let Some(ref key) = place.matched_on {
        println!("   Matched on:     {}", key);
    }
    if let Some(population) = place.population {
        println!("   Population:     {}", population);
    }

    Ok(())
}

/// Show loaded reference documents, model routing and override locations
pub fn cmd_config_show() -> Result<()> {
    let reference = ReferenceData::load()?;
    let router = ModelRouter::new()?;

    println!("Reference documents:\n");
    println!("{:<18} {:>7}  {}", "FILE", "VERSION", "SOURCE");
    println!("{}", "-".repeat(60));
    for doc in reference.documents() {
        println!("{:<18} {:>7}  {}", doc.file, doc.version, doc.source);
    }

    println!();
    println!("Model routing (models.toml from {}):\n", router.source());
    println!(
        "{:<18} {:<24} {:>8} {:>8} {:>6}",
        "TASK", "MODEL", "TIMEOUT", "RETRIES", "TEMP"
    );
    println!("{}", "-".repeat(68));
    for task in TaskType::all() {
        let config = router.config_for_task(*task);
        println!(
            "{:<18} {:<24} {:>7}s {:>8} {:>6.2}",
            task.as_str(),
            config.model.as_deref().unwrap_or("(backend default)"),
            config.timeout.as_secs(),
            config.max_retries,
            config.temperature
        );
    }

    println!();
    println!("Scoring strategy: {}", reference.policy.engine.strategy);
    println!("Policy version:   {}", reference.policy.version);

    let show = |p: Option<std::path::PathBuf>| {
        p.map(|p| p.display().to_string())
            .unwrap_or_else(|| "(not available)".to_string())
    };
    println!();
    println!("Override locations:");
    println!("   Config:  {}", show(default_config_dir()));
    println!("   Models:  {}", show(default_config_path()));
    println!("   Prompts: {}", show(default_prompts_dir()));

    Ok(())
}
