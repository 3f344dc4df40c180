//! Server command implementation

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use super::{build_analyzer, open_db};

pub async fn cmd_serve(
    db_path: Option<&Path>,
    host: &str,
    port: u16,
    no_encrypt: bool,
    static_dir: Option<&Path>,
    origins: Vec<String>,
) -> Result<()> {
    println!("🚀 Starting Vyapar web server...");
    match db_path {
        Some(path) => println!("   History: {}", path.display()),
        None => println!("   History: disabled (--no-history)"),
    }
    println!("   Listening: http://{}:{}", host, port);
    if let Some(dir) = static_dir {
        println!("   Static files: {}", dir.display());
    }
    if !origins.is_empty() {
        println!("   CORS origins: {}", origins.join(", "));
    }
    if no_encrypt && db_path.is_some() {
        println!("   ⚠️  Encryption DISABLED (--no-encrypt)");
    }
    println!();
    println!("   Press Ctrl+C to stop");

    let analyzer = Arc::new(build_analyzer(None)?);
    let db = db_path
        .map(|path| open_db(path, no_encrypt))
        .transpose()?;

    let config = vyapar_server::ServerConfig {
        allowed_origins: origins,
    };

    let static_dir_str = static_dir
        .map(|p| p.to_str().context("static_dir path must be valid UTF-8"))
        .transpose()?;
    vyapar_server::serve(analyzer, db, host, port, static_dir_str, config).await?;

    Ok(())
}
