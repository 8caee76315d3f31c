//! SQLite persistence for chunk vectors.
//!
//! ## Database Schema
//!
//! ```sql
//! -- One row per embedded chunk; text and vector live in the same row
//! CREATE TABLE chunks (
//!     id INTEGER PRIMARY KEY AUTOINCREMENT,
//!     source TEXT NOT NULL,            -- path of the PDF
//!     page INTEGER NOT NULL,           -- 1-based page number
//!     position INTEGER NOT NULL,       -- 0-based chunk position within the page
//!     start_offset INTEGER NOT NULL,   -- byte offset in the trimmed page text
//!     content TEXT NOT NULL,           -- sanitized chunk text
//!     embedding BLOB NOT NULL,         -- f16 vector
//!     created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
//! );
//!
//! -- Key/value description of the build (model, dimension, timestamp, ...)
//! CREATE TABLE index_metadata (
//!     key TEXT PRIMARY KEY,
//!     value TEXT NOT NULL
//! );
//! ```
//!
//! The database is opened in WAL mode with a 64KB page size, which suits
//! rows dominated by embedding blobs.

use anyhow::{Context, Result};
use half::f16;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;

/// File name of the index database inside the index directory.
pub const INDEX_DB_NAME: &str = "index.db";

/// A chunk row as stored in the database.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    pub id: Option<i64>,
    pub source: String,
    pub page: usize,
    pub position: usize,
    pub start_offset: usize,
    pub content: String,
    pub embedding: Vec<f16>,
}

/// Description of how the stored index was built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexMetadata {
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub corpus_fingerprint: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub repository: String,
    pub built_at: String,
}

impl IndexMetadata {
    fn to_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("embedding_model", self.embedding_model.clone()),
            ("embedding_dimension", self.embedding_dimension.to_string()),
            ("corpus_fingerprint", self.corpus_fingerprint.clone()),
            ("chunk_size", self.chunk_size.to_string()),
            ("chunk_overlap", self.chunk_overlap.to_string()),
            ("repository", self.repository.clone()),
            ("built_at", self.built_at.clone()),
        ]
    }
}

#[derive(Clone, Debug)]
pub struct VectorIndex {
    pool: SqlitePool,
}

impl VectorIndex {
    /// Opens (creating if needed) `<base>/index.db`.
    pub async fn open(base: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(base)
            .await
            .with_context(|| format!("creating index directory {}", base.display()))?;
        let db_path = base.join(INDEX_DB_NAME);

        let pool = SqlitePool::connect_with(
            SqliteConnectOptions::new()
                .filename(&db_path)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .busy_timeout(std::time::Duration::from_secs(5))
                .foreign_keys(true)
                .create_if_missing(true)
                .auto_vacuum(sqlx::sqlite::SqliteAutoVacuum::Full)
                .page_size(1 << 16)
                .optimize_on_close(true, 1 << 10),
        )
        .await
        .with_context(|| format!("opening {}", db_path.display()))?;
        Self::new_with_pool(pool).await
    }

    /// Opens an in-memory index for tests.
    pub async fn open_memory() -> Result<Self> {
        // A memory database exists per connection, so the pool holds exactly one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?)
            .await?;
        Self::new_with_pool(pool).await
    }

    async fn new_with_pool(pool: SqlitePool) -> Result<Self> {
        Self::create_tables(&pool).await?;
        Ok(Self { pool })
    }

    async fn create_tables(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source TEXT NOT NULL,
                page INTEGER NOT NULL,
                position INTEGER NOT NULL,
                start_offset INTEGER NOT NULL,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS index_metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source)")
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Inserts chunks in one transaction and returns their IDs in order.
    pub async fn insert_chunks(&self, chunks: &[ChunkRecord]) -> Result<Vec<i64>> {
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            let embedding_bytes: &[u8] = bytemuck::cast_slice(&chunk.embedding);
            let result = sqlx::query(
                r#"
                INSERT INTO chunks (source, page, position, start_offset, content, embedding)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(&chunk.source)
            .bind(chunk.page as i64)
            .bind(chunk.position as i64)
            .bind(chunk.start_offset as i64)
            .bind(&chunk.content)
            .bind(embedding_bytes)
            .execute(&mut *tx)
            .await?;
            ids.push(result.last_insert_rowid());
        }

        tx.commit().await?;
        Ok(ids)
    }

    /// Every stored chunk in insertion order.
    pub async fn get_all_chunks(&self) -> Result<Vec<ChunkRecord>> {
        let rows = sqlx::query(
            "SELECT id, source, page, position, start_offset, content, embedding FROM chunks ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    pub async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    /// Number of distinct source documents with at least one chunk.
    pub async fn source_count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT source) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    /// Deletes all chunks and build metadata.
    pub async fn clear(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chunks").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM index_metadata")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO index_metadata (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let value = sqlx::query_scalar("SELECT value FROM index_metadata WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    pub async fn write_index_metadata(&self, metadata: &IndexMetadata) -> Result<()> {
        for (key, value) in metadata.to_pairs() {
            self.set_metadata(key, &value).await?;
        }
        Ok(())
    }

    /// Build metadata, or `None` if the index has never been completed.
    pub async fn read_index_metadata(&self) -> Result<Option<IndexMetadata>> {
        let Some(embedding_model) = self.get_metadata("embedding_model").await? else {
            return Ok(None);
        };

        let number = |value: Option<String>, key: &str| -> Result<usize> {
            value
                .unwrap_or_default()
                .parse()
                .with_context(|| format!("index metadata {key} is not a number"))
        };

        Ok(Some(IndexMetadata {
            embedding_model,
            embedding_dimension: number(
                self.get_metadata("embedding_dimension").await?,
                "embedding_dimension",
            )?,
            corpus_fingerprint: self
                .get_metadata("corpus_fingerprint")
                .await?
                .unwrap_or_default(),
            chunk_size: number(self.get_metadata("chunk_size").await?, "chunk_size")?,
            chunk_overlap: number(self.get_metadata("chunk_overlap").await?, "chunk_overlap")?,
            repository: self.get_metadata("repository").await?.unwrap_or_default(),
            built_at: self.get_metadata("built_at").await?.unwrap_or_default(),
        }))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<ChunkRecord> {
    let id: i64 = row.get("id");
    let page: i64 = row.get("page");
    let position: i64 = row.get("position");
    let start_offset: i64 = row.get("start_offset");
    let embedding_bytes: Vec<u8> = row.get("embedding");

    Ok(ChunkRecord {
        id: Some(id),
        source: row.get("source"),
        page: page as usize,
        position: position as usize,
        start_offset: start_offset as usize,
        content: row.get("content"),
        embedding: decode_embedding(&embedding_bytes)
            .with_context(|| format!("chunk {id} has a corrupt embedding"))?,
    })
}

fn decode_embedding(bytes: &[u8]) -> Result<Vec<f16>> {
    if bytes.len() % std::mem::size_of::<f16>() != 0 {
        anyhow::bail!("embedding blob has odd length {}", bytes.len());
    }
    // Blob buffers carry no alignment guarantee, so read element by element.
    Ok(bytes
        .chunks_exact(std::mem::size_of::<f16>())
        .map(bytemuck::pod_read_unaligned::<f16>)
        .collect())
}
