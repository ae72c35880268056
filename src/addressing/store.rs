//! SQLite-backed origin mapping store.
//!
//! Rows in `domains` pair a serialized origin (`original`) with its short
//! label (`target`). Rows are only ever inserted.
//!
//! `lookup_or_create` is read-then-insert with no transaction around it. Two
//! concurrent first uses of the same origin can both miss and both insert,
//! leaving duplicate rows with identical content. The label is a pure function
//! of the origin, so lookups stay correct.
//!
//! Hash collisions are not detected: a second origin whose label collides with
//! an earlier one is stored under the same `target`, and `lookup_original`
//! then returns the oldest row.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use super::shorten::shorten;
use super::{AddressError, AddressingStrategy, Label, Origin};
use crate::observability::metrics;

/// One persisted origin/label pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginMappingRecord {
    pub id: i64,
    pub original: String,
    pub target: String,
}

#[derive(Debug, Clone)]
pub struct MappingStore {
    pool: SqlitePool,
}

impl MappingStore {
    /// Open (creating if missing) the database at `database_url` and ensure
    /// the table exists.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let store = Self::from_pool(pool).await?;
        tracing::info!(database_url = %database_url, "Mapping store opened");
        Ok(store)
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS domains (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                original TEXT,
                target TEXT
            )",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    /// Original URL stored for `label`.
    pub async fn lookup_original(&self, label: &str) -> Result<String, AddressError> {
        let original: Option<String> = sqlx::query_scalar(
            "SELECT original FROM domains WHERE target = ? ORDER BY id LIMIT 1",
        )
        .bind(label)
        .fetch_optional(&self.pool)
        .await?;

        original.ok_or_else(|| AddressError::NotFound(label.to_string()))
    }

    /// Label for `original`, inserting a new row on first use.
    pub async fn lookup_or_create(&self, original: &str) -> Result<Label, AddressError> {
        let existing: Option<String> = sqlx::query_scalar(
            "SELECT target FROM domains WHERE original = ? ORDER BY id LIMIT 1",
        )
        .bind(original)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(target) = existing {
            return Ok(Label::new(target));
        }

        let target = shorten(original);
        sqlx::query("INSERT INTO domains (original, target) VALUES (?, ?)")
            .bind(original)
            .bind(&target)
            .execute(&self.pool)
            .await?;

        metrics::record_mapping_created();
        tracing::info!(original = %original, target = %target, "Registered origin mapping");
        Ok(Label::new(target))
    }

    /// Every row, oldest first.
    pub async fn records(&self) -> Result<Vec<OriginMappingRecord>, sqlx::Error> {
        let rows = sqlx::query("SELECT id, original, target FROM domains ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<OriginMappingRecord, sqlx::Error> {
                Ok(OriginMappingRecord {
                    id: row.try_get("id")?,
                    original: row.try_get("original")?,
                    target: row.try_get("target")?,
                })
            })
            .collect()
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl AddressingStrategy for MappingStore {
    fn name(&self) -> &'static str {
        "store"
    }

    async fn encode(&self, origin: &Origin) -> Result<Label, AddressError> {
        self.lookup_or_create(&origin.to_string()).await
    }

    async fn decode(&self, label: &str) -> Result<Origin, AddressError> {
        let original = self.lookup_original(&label.to_ascii_lowercase()).await?;
        Ok(original.parse()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_store(dir: &TempDir) -> MappingStore {
        let url = format!("sqlite://{}", dir.path().join("mappings.db").display());
        MappingStore::connect(&url, 4).await.unwrap()
    }

    #[tokio::test]
    async fn lookup_or_create_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let first = store.lookup_or_create("https://example.com").await.unwrap();
        let second = store.lookup_or_create("https://example.com").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.as_str(), "prqjfqgt");

        let records = store.records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].original, "https://example.com");
        assert_eq!(records[0].target, "prqjfqgt");
    }

    #[tokio::test]
    async fn lookup_original_finds_registered_label() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let label = store.lookup_or_create("https://auth.example.com").await.unwrap();
        assert_eq!(
            store.lookup_original(label.as_str()).await.unwrap(),
            "https://auth.example.com"
        );
    }

    #[tokio::test]
    async fn unknown_label_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        match store.lookup_original("zzzzzzzz").await {
            Err(AddressError::NotFound(label)) => assert_eq!(label, "zzzzzzzz"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn strategy_decode_ignores_case() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let origin = Origin::new("https", "example.com");
        let label = store.encode(&origin).await.unwrap();
        let upper = label.as_str().to_ascii_uppercase();

        assert_eq!(store.decode(&upper).await.unwrap(), origin);
    }

    #[tokio::test]
    async fn rows_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        let label = store.lookup_or_create("https://example.com").await.unwrap();
        store.close().await;

        let reopened = open_store(&dir).await;
        assert_eq!(
            reopened.lookup_original(label.as_str()).await.unwrap(),
            "https://example.com"
        );
    }

    #[tokio::test]
    async fn concurrent_first_use_agrees_on_label() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let (a, b) = tokio::join!(
            store.lookup_or_create("https://registry-1.docker.io"),
            store.lookup_or_create("https://registry-1.docker.io"),
        );
        assert_eq!(a.unwrap(), b.unwrap());

        // Duplicates are possible, but they always carry the same content.
        let records = store.records().await.unwrap();
        assert!(!records.is_empty() && records.len() <= 2);
        assert!(records.iter().all(|r| r.target == records[0].target));
    }

    #[tokio::test]
    async fn colliding_label_resolves_to_oldest_row() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        for original in ["https://first.example", "https://second.example"] {
            sqlx::query("INSERT INTO domains (original, target) VALUES (?, ?)")
                .bind(original)
                .bind("samelbl0")
                .execute(&store.pool)
                .await
                .unwrap();
        }

        assert_eq!(
            store.lookup_original("samelbl0").await.unwrap(),
            "https://first.example"
        );

        let records = store.records().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].original, "https://first.example");
        assert_eq!(records[1].original, "https://second.example");
        assert!(records.iter().all(|r| r.target == "samelbl0"));
    }

    #[tokio::test]
    async fn corrupt_original_is_a_decode_error() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        sqlx::query("INSERT INTO domains (original, target) VALUES (?, ?)")
            .bind("not an origin")
            .bind("broken00")
            .execute(&store.pool)
            .await
            .unwrap();

        assert!(matches!(
            store.decode("broken00").await,
            Err(AddressError::Decode(_))
        ));
    }
}
