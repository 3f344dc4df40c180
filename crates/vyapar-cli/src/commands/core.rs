//! Shared command utilities
//!
//! - `open_db` - Open the history database
//! - `build_analyzer` - Analyzer from the environment plus CLI overrides

use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;
use vyapar_core::{Analyzer, Database, StrategyKind};

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path must be valid UTF-8")?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// Analyzer configured from the environment, with an optional strategy override
pub fn build_analyzer(strategy: Option<&str>) -> Result<Analyzer> {
    let mut analyzer = Analyzer::from_env().context("Failed to configure analyzer")?;
    if let Some(name) = strategy {
        let kind: StrategyKind = name.parse().map_err(anyhow::Error::msg)?;
        analyzer = analyzer.with_strategy(kind);
        debug!(strategy = %kind, "Scoring strategy overridden");
    }
    Ok(analyzer)
}
