//! PostgreSQL-backed seen-key store
//!
//! One row per key, no sort key:
//!
//! ```sql
//! CREATE TABLE <table> (
//!     event_key  TEXT PRIMARY KEY,
//!     created_at TIMESTAMPTZ NOT NULL
//! )
//! ```
//!
//! Keys are kept forever; `created_at` exists for operational visibility only.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courtside_core::EventKey;
use std::collections::HashSet;
use tracing::{debug, instrument};

use crate::{Result, SeenKeyStore, StoreError, StorePool};

pub struct PgSeenKeyStore {
    pool: StorePool,
    table: String,
}

impl PgSeenKeyStore {
    /// `table` is interpolated into SQL, so it must be a plain identifier
    pub fn new(pool: StorePool, table: &str) -> Result<Self> {
        validate_table_name(table)?;
        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }

    /// Create the table if it does not exist yet
    pub async fn ensure_schema(&self) -> Result<()> {
        let conn = self.pool.get().await?;
        conn.batch_execute(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                event_key  TEXT PRIMARY KEY,
                created_at TIMESTAMPTZ NOT NULL
            )",
            self.table
        ))
        .await?;
        debug!(table = %self.table, "Seen-key table ready");
        Ok(())
    }
}

#[async_trait]
impl SeenKeyStore for PgSeenKeyStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    #[instrument(skip(self, keys), fields(table = %self.table, keys = keys.len()))]
    async fn existing(&self, keys: &[EventKey]) -> Result<HashSet<EventKey>> {
        if keys.is_empty() {
            return Ok(HashSet::new());
        }

        let wanted: Vec<String> = keys.iter().map(|k| k.as_str().to_string()).collect();
        let conn = self.pool.get().await?;
        let rows = conn
            .query(
                &format!(
                    "SELECT event_key FROM {} WHERE event_key = ANY($1)",
                    self.table
                ),
                &[&wanted],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| EventKey::new(row.get::<_, String>(0)))
            .collect())
    }

    #[instrument(skip(self), fields(table = %self.table))]
    async fn record(&self, key: &EventKey, seen_at: DateTime<Utc>) -> Result<()> {
        let conn = self.pool.get().await?;
        conn.execute(
            &format!(
                "INSERT INTO {} (event_key, created_at) VALUES ($1, $2)
                 ON CONFLICT (event_key) DO NOTHING",
                self.table
            ),
            &[&key.as_str(), &seen_at],
        )
        .await?;
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        self.pool.is_healthy().await
    }
}

fn validate_table_name(table: &str) -> Result<()> {
    let mut chars = table.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid_start && valid_rest && table.len() <= 63 {
        Ok(())
    } else {
        Err(StoreError::Configuration(format!(
            "Invalid table name: {:?}",
            table
        )))
    }
}
