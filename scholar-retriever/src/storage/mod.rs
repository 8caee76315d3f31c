//! Storage abstraction for chunk vectors.
//!
//! [`VectorStore`] is the seam between indexing/querying and persistence.
//! The SQLite implementation lives in [`sqlite_store`]; tests and callers
//! only depend on the trait.
//!
//! ```text
//! IndexingEngine ─ add ─┐
//!                       ├─ VectorStore ── SqliteStore ── VectorIndex (index.db)
//! QaPipeline ─ query ───┘
//! ```

use anyhow::Result;
use async_trait::async_trait;
use half::f16;
use serde::Serialize;

pub mod sqlite_store;

/// Database ID for a stored chunk.
pub type ChunkId = i64;

/// A sanitized piece of one page, ready to be embedded and stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentChunk {
    /// Path of the PDF the chunk came from
    pub source: String,
    /// 1-based page number
    pub page: usize,
    /// 0-based position of the chunk within its page
    pub position: usize,
    /// Byte offset of the chunk start in the trimmed page text
    pub start_offset: usize,
    /// Sanitized chunk text
    pub text: String,
}

/// A stored chunk returned by a similarity query.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub id: ChunkId,
    pub chunk: DocumentChunk,
    /// Cosine similarity to the query vector
    pub score: f32,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Persist chunks with their vectors (one vector per chunk) and return the new IDs.
    async fn add(&self, chunks: Vec<DocumentChunk>, vectors: Vec<Vec<f16>>) -> Result<Vec<ChunkId>>;

    /// The `k` stored chunks most similar to `vector`, best first.
    async fn query(&self, vector: &[f16], k: usize) -> Result<Vec<ScoredChunk>>;

    /// Number of stored chunks.
    async fn count(&self) -> Result<usize>;

    /// Remove every stored chunk.
    async fn clear(&self) -> Result<()>;
}
