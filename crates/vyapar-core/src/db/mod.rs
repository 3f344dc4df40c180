//! Analysis history store with connection pooling and migrations
//!
//! - `analyses` - saved analysis results, keyed by caller id
//!
//! Storage is a SQLite file, optionally encrypted with SQLCipher.

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::error::{Error, Result};

mod analyses;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Environment variable for database encryption key
pub const DB_KEY_ENV: &str = "VYAPAR_DB_KEY";

/// Default number of history entries returned by a listing
pub const DEFAULT_HISTORY_LIMIT: u32 = 20;

/// Largest listing a caller may request
pub const MAX_HISTORY_LIMIT: u32 = 100;

/// Connections kept per pool; history traffic is light
const POOL_SIZE: u32 = 4;

/// SQLCipher key pragma for a passphrase
///
/// Argon2 with a fixed application salt: the key depends only on the
/// passphrase, so a history file keeps opening after it is moved.
fn key_pragma(passphrase: &str) -> Result<String> {
    use argon2::{password_hash::SaltString, Argon2, PasswordHasher};

    // Changing this invalidates every existing encrypted database
    const APP_SALT: &[u8; 16] = b"vyapar-salt-v1-x";

    let salt = SaltString::encode_b64(APP_SALT)
        .map_err(|e| Error::Encryption(format!("salt: {}", e)))?;
    let output = Argon2::default()
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| Error::Encryption(format!("key derivation: {}", e)))?
        .hash
        .ok_or_else(|| Error::Encryption("key derivation produced no output".to_string()))?;

    Ok(format!("PRAGMA key = 'x\"{}\"';", hex::encode(output.as_bytes())))
}

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // SQLite stores as "YYYY-MM-DD HH:MM:SS" format
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl Database {
    /// Create a new database connection pool with encryption
    ///
    /// Requires `VYAPAR_DB_KEY` to be set. The key is derived from the
    /// passphrase via Argon2 and handed to SQLCipher.
    ///
    /// Returns an error if `VYAPAR_DB_KEY` is not set. Use `new_unencrypted()`
    /// for development/testing without encryption.
    pub fn new(path: &str) -> Result<Self> {
        match std::env::var(DB_KEY_ENV).ok() {
            Some(key) => Self::new_with_key(path, Some(&key)),
            None => Err(Error::Encryption(format!(
                "Database encryption required. Set {} with your passphrase, \
                or use --no-encrypt for an unencrypted history database.",
                DB_KEY_ENV
            ))),
        }
    }

    /// Create a new unencrypted database connection pool
    ///
    /// WARNING: Only use for development or testing.
    pub fn new_unencrypted(path: &str) -> Result<Self> {
        Self::new_with_key(path, None)
    }

    /// Create a new database with an explicit encryption key
    pub fn new_with_key(path: &str, passphrase: Option<&str>) -> Result<Self> {
        let mut manager = SqliteConnectionManager::file(path);
        if let Some(pass) = passphrase {
            let pragma = key_pragma(pass)?;
            // Every pooled connection needs the key before first use
            manager = manager.with_init(move |conn| conn.execute_batch(&pragma));
        }
        let pool = Pool::builder().max_size(POOL_SIZE).build(manager)?;

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Throwaway unencrypted store in the temp dir (for testing)
    ///
    /// A pooled `:memory:` database would give every connection its own
    /// empty schema, hence the file.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static NEXT: AtomicU64 = AtomicU64::new(0);

        let file = format!(
            "vyapar_history_{}_{}.db",
            std::process::id(),
            NEXT.fetch_add(1, Ordering::Relaxed)
        );
        let path = std::env::temp_dir().join(file);
        // Leftover from an earlier process with the same pid
        let _ = std::fs::remove_file(&path);

        Self::new_unencrypted(&path.to_string_lossy())
    }

    /// Pooled connection, keyed if the store is encrypted
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- WAL mode: readers don't block writers
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            -- Saved analyses; `result` holds the full response JSON
            CREATE TABLE IF NOT EXISTS analyses (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                business_idea TEXT NOT NULL,
                location TEXT NOT NULL,
                budget TEXT NOT NULL,
                verdict TEXT NOT NULL,              -- GO, CAUTION, AVOID
                score INTEGER NOT NULL,
                result TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_analyses_user ON analyses(user_id, created_at);
            "#,
        )?;

        info!(path = %self.db_path, "Database schema initialized");
        Ok(())
    }
}

#[cfg(test)]
mod tests;
