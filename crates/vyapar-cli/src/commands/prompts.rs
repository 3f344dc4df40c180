//! Prompt template commands

use anyhow::{bail, Result};
use vyapar_core::prompts::{default_prompts_dir, PromptId, PromptLibrary};

fn overrides_dir_label() -> String {
    default_prompts_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(no data directory on this system)".to_string())
}

/// Table of prompts with version, task and where each was loaded from
pub fn cmd_prompts_list() -> Result<()> {
    let library = PromptLibrary::new()?;

    println!("{:<20} {:>4}  {:<18}  {}", "PROMPT", "VER", "TASK", "SOURCE");
    println!("{}", "-".repeat(64));
    for info in library.list() {
        let source = match info.override_path {
            Some(ref path) if info.has_override => path.display().to_string(),
            _ => "built-in".to_string(),
        };
        println!(
            "{:<20} {:>4}  {:<18}  {}",
            info.id, info.version, info.task_type, source
        );
    }

    println!();
    println!("Overrides are read from {}", overrides_dir_label());
    println!("Copy a built-in prompt there as <id>.md and keep its frontmatter,");
    println!("`# System` and `# User` headings. Changes apply on restart.");

    Ok(())
}

/// Print one prompt, section by section
pub fn cmd_prompts_show(prompt_id: &str) -> Result<()> {
    let Ok(id) = prompt_id.parse::<PromptId>() else {
        let known: Vec<&str> = PromptId::all().iter().map(PromptId::as_str).collect();
        eprintln!("Unknown prompt \"{}\". Known prompts: {}", prompt_id, known.join(", "));
        return Ok(());
    };

    let library = PromptLibrary::new()?;
    let prompt = library.get(id)?;

    println!(
        "{} v{} ({}), {}",
        prompt.metadata.id,
        prompt.metadata.version,
        prompt.metadata.task_type,
        match prompt.override_path {
            Some(ref path) => format!("override at {}", path.display()),
            None => "built-in".to_string(),
        }
    );

    let (Some(system), Some(user)) = (prompt.system_section(), prompt.user_section()) else {
        bail!("Prompt {} is missing its System or User section", prompt_id);
    };
    println!();
    println!("=== System ===");
    println!("{}", system.trim());
    println!();
    println!("=== User ===");
    println!("{}", user.trim());

    Ok(())
}

/// Print the override directory, noting when it does not exist yet
pub fn cmd_prompts_path() -> Result<()> {
    let Some(path) = default_prompts_dir() else {
        bail!("No data directory is available on this system");
    };
    println!("{}", path.display());
    if !path.exists() {
        eprintln!("(directory does not exist yet; create it to add overrides)");
    }
    Ok(())
}
