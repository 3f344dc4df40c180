//! Vyapar CLI - Small-business feasibility scorer
//!
//! Usage:
//!   vyapar analyze --idea "..." --location "..." --budget "15 lakhs"
//!   vyapar history --limit 10
//!   vyapar budget "2.5 Cr"
//!   vyapar serve --port 3000

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Serve {
            port,
            host,
            static_dir,
            origins,
            no_history,
        } => {
            let db_path = (!no_history).then_some(cli.db.as_path());
            commands::cmd_serve(
                db_path,
                &host,
                port,
                cli.no_encrypt,
                static_dir.as_deref(),
                origins,
            )
            .await
        }
        Commands::Analyze {
            idea,
            location,
            budget,
            strategy,
            json,
            no_save,
            user,
        } => {
            let analyzer = commands::build_analyzer(strategy.as_deref())?;
            let db = if no_save {
                None
            } else {
                Some(commands::open_db(&cli.db, cli.no_encrypt)?)
            };
            let request = vyapar_core::AnalysisRequest::new(
                &idea,
                location.as_deref(),
                budget.as_deref(),
            );
            commands::cmd_analyze(&analyzer, db.as_ref(), &user, &request, json)
                .await
                .map(|_| ())
        }
        Commands::History { limit, id, user } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match id {
                Some(id) => commands::cmd_history_show(&db, &user, id),
                None => commands::cmd_history(&db, &user, limit),
            }
        }
        Commands::Budget { text } => commands::cmd_budget(&text),
        Commands::Classify { idea, location } => {
            let reference = vyapar_core::ReferenceData::load()?;
            commands::cmd_classify(&reference, &idea, location.as_deref())
        }
        Commands::Prompts { action } => match action {
            PromptsAction::List => commands::cmd_prompts_list(),
            PromptsAction::Show { id } => commands::cmd_prompts_show(&id),
            PromptsAction::Path => commands::cmd_prompts_path(),
        },
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::cmd_config_show(),
        },
    }
}
