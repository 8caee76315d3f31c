//! High-level indexing engine that builds the vector index from a folder of PDFs.
//!
//! ## Pipeline Flow
//!
//! ```text
//! *.pdf → DocumentLoader → ChunkingStrategy → sanitize → EmbeddingProvider → VectorStore
//!            (pages)        (overlapping windows)        (per-chunk skip)     (index.db)
//! ```
//!
//! A full rebuild clears the store, loads every PDF, chunks and sanitizes
//! each page, embeds the chunks in batches and stores them, then records
//! build metadata (model, dimension, corpus fingerprint, timestamp).
//!
//! Embedding is fault tolerant per chunk: when a batch fails, each text in
//! it is retried alone and the ones that still fail are skipped with a
//! warning. Texts that are not clean printable ASCII, and vectors with the
//! wrong dimension or non-finite values, are rejected the same way.
//!
//! ## Reuse
//!
//! By default [`IndexingEngine::prepare`] rebuilds on every call. With
//! `reuse_index` set, a non-empty index whose recorded model, dimension,
//! chunking and corpus fingerprint match the current configuration is used
//! as is.

use anyhow::{Context, Result};
use half::f16;
use scholar_context::sanitize::is_clean;
use scholar_embed::{EmbedConfig, EmbeddingProvider, FastEmbedProvider};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::chunking_strategy::{ChunkingConfig, ChunkingStrategy};
use super::document_loader::{Document, DocumentLoader};
use super::vector_index::{IndexMetadata, VectorIndex};
use crate::storage::sqlite_store::SqliteStore;
use crate::storage::{DocumentChunk, VectorStore};

/// Configuration for the indexing engine
#[derive(Debug, Clone)]
pub struct IndexingEngineConfig {
    /// Directory scanned (non-recursively) for `*.pdf`
    pub papers_dir: PathBuf,
    /// Directory holding `index.db`
    pub index_dir: PathBuf,
    pub chunking_config: ChunkingConfig,
    pub embedding_config: EmbedConfig,
    /// Number of chunks sent to the embedder at once
    pub embed_batch_size: usize,
    /// Reuse a matching persisted index instead of rebuilding
    pub reuse_index: bool,
}

impl IndexingEngineConfig {
    pub fn new(papers_dir: PathBuf, index_dir: PathBuf) -> Self {
        Self {
            papers_dir,
            index_dir,
            chunking_config: ChunkingConfig::default(),
            embedding_config: EmbedConfig::default(),
            embed_batch_size: 32,
            reuse_index: false,
        }
    }

    pub fn with_chunking_config(mut self, config: ChunkingConfig) -> Self {
        self.chunking_config = config;
        self
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunking_config = self.chunking_config.with_chunk_size(size);
        self
    }

    pub fn with_chunk_overlap(mut self, overlap: usize) -> Self {
        self.chunking_config = self.chunking_config.with_chunk_overlap(overlap);
        self
    }

    pub fn with_embedding_config(mut self, config: EmbedConfig) -> Self {
        self.embedding_config = config;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.embed_batch_size = batch_size.max(1);
        self
    }

    pub fn with_reuse_index(mut self, reuse_index: bool) -> Self {
        self.reuse_index = reuse_index;
        self
    }
}

/// Summary of one indexing run
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexingReport {
    pub documents: usize,
    pub pages: usize,
    /// Sanitized chunks produced by chunking
    pub chunks: usize,
    /// Chunks embedded and stored
    pub embedded: usize,
    pub skipped_chunks: usize,
    pub skipped_files: usize,
    /// The persisted index was reused without re-embedding
    pub reused: bool,
    pub elapsed: Duration,
}

/// Vectors for the chunks that survived embedding, plus the skip count.
struct EmbeddedBatch {
    chunks: Vec<DocumentChunk>,
    vectors: Vec<Vec<f16>>,
    skipped: usize,
}

pub struct IndexingEngine {
    config: IndexingEngineConfig,
    loader: DocumentLoader,
    chunking_strategy: ChunkingStrategy,
    store: Arc<SqliteStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl std::fmt::Debug for IndexingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexingEngine")
            .field("config", &self.config)
            .field("embedder", &self.embedder.provider_name())
            .finish()
    }
}

impl IndexingEngine {
    /// Opens the persistent index and loads the configured FastEmbed model.
    pub async fn new(config: IndexingEngineConfig) -> Result<Self> {
        info!(
            "Initializing embedding provider: {}",
            config.embedding_config.model_name
        );
        let embedder = FastEmbedProvider::create(config.embedding_config.clone())
            .await
            .context("loading embedding model")?;
        let index = VectorIndex::open(&config.index_dir).await?;
        Self::with_parts(config, index, Arc::new(embedder))
    }

    /// Builds an engine from an existing index and embedder.
    pub fn with_parts(
        config: IndexingEngineConfig,
        index: VectorIndex,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let chunking_strategy = ChunkingStrategy::new(config.chunking_config.clone())?;
        Ok(Self {
            loader: DocumentLoader::new(config.papers_dir.clone()),
            chunking_strategy,
            store: Arc::new(SqliteStore::new(index)),
            embedder,
            config,
        })
    }

    pub fn config(&self) -> &IndexingEngineConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<SqliteStore> {
        Arc::clone(&self.store)
    }

    pub fn embedder(&self) -> Arc<dyn EmbeddingProvider> {
        Arc::clone(&self.embedder)
    }

    /// Make the index ready for queries, reusing it only when configured to
    /// and the stored build matches.
    pub async fn prepare(&self) -> Result<IndexingReport> {
        if self.config.reuse_index {
            let start = Instant::now();
            if self.is_reusable().await? {
                let count = self.store.count().await?;
                info!("Reusing persisted index with {} chunks", count);
                return Ok(IndexingReport {
                    documents: self.store.index().source_count().await?,
                    chunks: count,
                    embedded: count,
                    reused: true,
                    elapsed: start.elapsed(),
                    ..IndexingReport::default()
                });
            }
            info!("Persisted index is missing or stale, rebuilding");
        }
        self.rebuild().await
    }

    /// Whether the persisted index can serve queries for the current configuration.
    pub async fn is_reusable(&self) -> Result<bool> {
        if self.store.count().await? == 0 {
            debug!("Index is empty");
            return Ok(false);
        }
        let Some(metadata) = self.store.index().read_index_metadata().await? else {
            debug!("Index has no build metadata");
            return Ok(false);
        };

        let chunking = self.chunking_strategy.config();
        if metadata.embedding_model != self.config.embedding_config.model_name
            || metadata.embedding_dimension != self.embedder.embedding_dimension()
        {
            info!(
                "Index was built with {} ({} dims), configured {} ({} dims)",
                metadata.embedding_model,
                metadata.embedding_dimension,
                self.config.embedding_config.model_name,
                self.embedder.embedding_dimension()
            );
            return Ok(false);
        }
        if metadata.chunk_size != chunking.chunk_size
            || metadata.chunk_overlap != chunking.chunk_overlap
        {
            info!("Index was built with different chunking settings");
            return Ok(false);
        }
        if metadata.corpus_fingerprint != self.loader.fingerprint().await? {
            info!("Papers directory changed since the index was built");
            return Ok(false);
        }
        Ok(true)
    }

    /// Clear the index and rebuild it from every PDF in the papers directory.
    pub async fn rebuild(&self) -> Result<IndexingReport> {
        let start = Instant::now();
        info!(
            "Rebuilding index from {} into {}",
            self.config.papers_dir.display(),
            self.config.index_dir.display()
        );

        self.store.clear().await?;

        let load_report = self
            .loader
            .load()
            .await
            .with_context(|| format!("loading papers from {}", self.config.papers_dir.display()))?;

        let mut report = self.index_documents(&load_report.documents).await?;
        report.skipped_files = load_report.skipped.len();

        self.record_metadata(&load_report.fingerprint).await?;

        report.elapsed = start.elapsed();
        info!(
            "Index complete: {} documents, {} pages, {}/{} chunks embedded, {} chunks skipped, {} files skipped in {:.2}s",
            report.documents,
            report.pages,
            report.embedded,
            report.chunks,
            report.skipped_chunks,
            report.skipped_files,
            report.elapsed.as_secs_f64()
        );
        Ok(report)
    }

    /// Chunk, embed and store already loaded documents, appending to the index.
    pub async fn index_documents(&self, documents: &[Document]) -> Result<IndexingReport> {
        let start = Instant::now();
        let pages: usize = documents.iter().map(|d| d.pages.len()).sum();
        info!("Loaded {} pages from {} documents", pages, documents.len());

        let chunks: Vec<DocumentChunk> = documents
            .iter()
            .flat_map(|doc| self.chunking_strategy.chunk_document(doc))
            .collect();
        let total = chunks.len();
        info!("Created {} sanitized chunks", total);

        let mut embedded = 0;
        let mut skipped = 0;
        let batch_size = self.config.embed_batch_size.max(1);

        let mut remaining = chunks.into_iter().enumerate().peekable();
        while remaining.peek().is_some() {
            let batch: Vec<(usize, DocumentChunk)> = remaining.by_ref().take(batch_size).collect();
            let result = self.embed_batch(batch).await;
            skipped += result.skipped;

            if !result.chunks.is_empty() {
                let ids = self.store.add(result.chunks, result.vectors).await?;
                embedded += ids.len();
            }
        }

        info!("{} of {} chunks are safe to embed", embedded, total);
        info!("Vector store populated with {} chunks", embedded);

        Ok(IndexingReport {
            documents: documents.len(),
            pages,
            chunks: total,
            embedded,
            skipped_chunks: skipped,
            skipped_files: 0,
            reused: false,
            elapsed: start.elapsed(),
        })
    }

    /// Embed one batch, falling back to one text at a time if the batch fails.
    async fn embed_batch(&self, batch: Vec<(usize, DocumentChunk)>) -> EmbeddedBatch {
        let mut out = EmbeddedBatch {
            chunks: Vec::with_capacity(batch.len()),
            vectors: Vec::with_capacity(batch.len()),
            skipped: 0,
        };

        let mut candidates = Vec::with_capacity(batch.len());
        for (index, chunk) in batch {
            if is_clean(&chunk.text) {
                candidates.push((index, chunk));
            } else {
                warn!(
                    "Skipping chunk {} (length {}): text is not clean printable ASCII",
                    index,
                    chunk.text.len()
                );
                out.skipped += 1;
            }
        }
        if candidates.is_empty() {
            return out;
        }

        let texts: Vec<String> = candidates.iter().map(|(_, c)| c.text.clone()).collect();
        let batch_vectors = match self.embedder.embed_texts(&texts).await {
            Ok(result) if result.len() == texts.len() => Some(result.embeddings),
            Ok(result) => {
                warn!(
                    "Embedder returned {} vectors for {} texts, retrying one by one",
                    result.len(),
                    texts.len()
                );
                None
            }
            Err(e) => {
                warn!("Batch embedding failed ({}), retrying one by one", e);
                None
            }
        };

        let dimension = self.embedder.embedding_dimension();
        match batch_vectors {
            Some(vectors) => {
                for ((index, chunk), vector) in candidates.into_iter().zip(vectors) {
                    self.accept(&mut out, index, chunk, vector, dimension);
                }
            }
            None => {
                for (index, chunk) in candidates {
                    match self.embedder.embed_text(&chunk.text).await {
                        Ok(vector) => self.accept(&mut out, index, chunk, vector, dimension),
                        Err(e) => {
                            warn!(
                                "Skipping chunk {} (length {}): {}",
                                index,
                                chunk.text.len(),
                                e
                            );
                            out.skipped += 1;
                        }
                    }
                }
            }
        }
        out
    }

    fn accept(
        &self,
        out: &mut EmbeddedBatch,
        index: usize,
        chunk: DocumentChunk,
        vector: Vec<f16>,
        dimension: usize,
    ) {
        if let Err(reason) = check_vector(&vector, dimension) {
            warn!(
                "Skipping chunk {} (length {}): {}",
                index,
                chunk.text.len(),
                reason
            );
            out.skipped += 1;
            return;
        }
        out.chunks.push(chunk);
        out.vectors.push(vector);
    }

    async fn record_metadata(&self, fingerprint: &str) -> Result<()> {
        let chunking = self.chunking_strategy.config();
        let metadata = IndexMetadata {
            embedding_model: self.config.embedding_config.model_name.clone(),
            embedding_dimension: self.embedder.embedding_dimension(),
            corpus_fingerprint: fingerprint.to_string(),
            chunk_size: chunking.chunk_size,
            chunk_overlap: chunking.chunk_overlap,
            repository: chunking.repo_name.clone(),
            built_at: chrono::Utc::now().to_rfc3339(),
        };
        self.store.index().write_index_metadata(&metadata).await
    }
}

fn check_vector(vector: &[f16], dimension: usize) -> std::result::Result<(), String> {
    if vector.len() != dimension {
        return Err(format!(
            "embedding has dimension {}, expected {}",
            vector.len(),
            dimension
        ));
    }
    if vector.iter().any(|v| !v.to_f32().is_finite()) {
        return Err("embedding contains non-finite values".to_string());
    }
    Ok(())
}
