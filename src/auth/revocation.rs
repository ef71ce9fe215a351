//! Refresh Token Revocation List
//! Mission: Remember logged-out refresh tokens until they would have expired anyway
//!
//! Two backends share one trait: an in-process map for single-node and test use,
//! and a SQLite table living next to the user directory.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use tracing::debug;

/// A revoked refresh token, keyed by its `jti`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationEntry {
    pub unique_id: String,
    pub revoked_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Storage for revoked refresh token ids.
///
/// `insert` is idempotent: a second insert for the same id succeeds and keeps
/// the first entry. A lookup issued after an insert returns must observe it.
pub trait RevocationStore: Send + Sync {
    fn insert(&self, entry: RevocationEntry) -> Result<()>;

    fn is_revoked(&self, unique_id: &str) -> Result<bool>;

    /// Drop entries whose token expired before `now`. Returns how many were removed.
    fn prune_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}

/// In-memory revocation list
#[derive(Default)]
pub struct MemoryRevocationStore {
    entries: RwLock<HashMap<String, RevocationEntry>>,
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl RevocationStore for MemoryRevocationStore {
    fn insert(&self, entry: RevocationEntry) -> Result<()> {
        self.entries
            .write()
            .entry(entry.unique_id.clone())
            .or_insert(entry);
        Ok(())
    }

    fn is_revoked(&self, unique_id: &str) -> Result<bool> {
        Ok(self.entries.read().contains_key(unique_id))
    }

    fn prune_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| e.expires_at >= now);
        Ok(before - entries.len())
    }
}

const REVOCATION_SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;

CREATE TABLE IF NOT EXISTS revoked_refresh_tokens (
    jti TEXT PRIMARY KEY,
    revoked_at INTEGER NOT NULL,
    expires_at INTEGER NOT NULL
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_revoked_refresh_tokens_expires
    ON revoked_refresh_tokens(expires_at);
"#;

/// SQLite-backed revocation list
pub struct SqliteRevocationStore {
    conn: Mutex<Connection>,
}

impl SqliteRevocationStore {
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open revocation database at {db_path}"))?;
        conn.execute_batch(REVOCATION_SCHEMA_SQL)
            .context("Failed to initialize revocation schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl RevocationStore for SqliteRevocationStore {
    fn insert(&self, entry: RevocationEntry) -> Result<()> {
        let conn = self.conn.lock();
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO revoked_refresh_tokens (jti, revoked_at, expires_at)
                 VALUES (?1, ?2, ?3)",
                params![
                    entry.unique_id,
                    entry.revoked_at.timestamp(),
                    entry.expires_at.timestamp(),
                ],
            )
            .context("Failed to insert revocation entry")?;

        if inserted == 0 {
            debug!(jti = %entry.unique_id, "Refresh token already revoked");
        }
        Ok(())
    }

    fn is_revoked(&self, unique_id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM revoked_refresh_tokens WHERE jti = ?1",
                params![unique_id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query revocation list")?;
        Ok(found.is_some())
    }

    fn prune_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn.lock();
        let removed = conn
            .execute(
                "DELETE FROM revoked_refresh_tokens WHERE expires_at < ?1",
                params![now.timestamp()],
            )
            .context("Failed to prune revocation list")?;
        Ok(removed)
    }
}
