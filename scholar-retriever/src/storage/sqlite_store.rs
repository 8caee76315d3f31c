//! SQLite implementation of [`VectorStore`].
//!
//! Adapts [`VectorIndex`] to the storage trait. Similarity search is an exact
//! scan: every stored vector is scored against the query with cosine
//! similarity in process, which is plenty for a folder of papers.

use super::{ChunkId, DocumentChunk, ScoredChunk, VectorStore};
use crate::retrieval::vector_index::{ChunkRecord, VectorIndex};
use anyhow::Result;
use async_trait::async_trait;
use half::f16;

pub struct SqliteStore {
    index: VectorIndex,
}

impl SqliteStore {
    pub fn new(index: VectorIndex) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Stored chunks in insertion order, without scores.
    pub async fn list(&self, limit: usize) -> Result<Vec<(ChunkId, DocumentChunk)>> {
        let records = self.index.get_all_chunks().await?;
        Ok(records
            .into_iter()
            .take(limit)
            .filter_map(|record| record.id.map(|id| (id, Self::record_to_chunk(record))))
            .collect())
    }

    fn record_to_chunk(record: ChunkRecord) -> DocumentChunk {
        DocumentChunk {
            source: record.source,
            page: record.page,
            position: record.position,
            start_offset: record.start_offset,
            text: record.content,
        }
    }

    fn chunk_to_record(chunk: DocumentChunk, embedding: Vec<f16>) -> ChunkRecord {
        ChunkRecord {
            id: None,
            source: chunk.source,
            page: chunk.page,
            position: chunk.position,
            start_offset: chunk.start_offset,
            content: chunk.text,
            embedding,
        }
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn add(&self, chunks: Vec<DocumentChunk>, vectors: Vec<Vec<f16>>) -> Result<Vec<ChunkId>> {
        if chunks.len() != vectors.len() {
            return Err(anyhow::anyhow!(
                "Chunk and vector count mismatch: {} chunks, {} vectors",
                chunks.len(),
                vectors.len()
            ));
        }
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let records: Vec<ChunkRecord> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| Self::chunk_to_record(chunk, vector))
            .collect();
        self.index.insert_chunks(&records).await
    }

    async fn query(&self, vector: &[f16], k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let records = self.index.get_all_chunks().await?;

        let mut scored: Vec<ScoredChunk> = records
            .into_iter()
            .filter_map(|record| {
                let id = record.id?;
                let score = cosine_similarity(vector, &record.embedding);
                Some(ScoredChunk {
                    id,
                    chunk: Self::record_to_chunk(record),
                    score,
                })
            })
            .collect();

        // Best first; equal scores keep insertion order
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
        scored.truncate(k);

        Ok(scored)
    }

    async fn count(&self) -> Result<usize> {
        self.index.count().await
    }

    async fn clear(&self) -> Result<()> {
        self.index.clear().await
    }
}

// Helper function for cosine similarity calculation
fn cosine_similarity(a: &[f16], b: &[f16]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot_product = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        let x = x.to_f32();
        let y = y.to_f32();
        dot_product += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let norm_a = norm_a.sqrt();
    let norm_b = norm_b.sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}
