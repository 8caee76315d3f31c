//! scholar-retriever: PDF ingestion and semantic retrieval
//!
//! Turns a folder of research papers into a persistent vector index and
//! answers nearest-neighbour queries against it.
//!
//! ## Key Modules
//!
//! - **[`retrieval`]**: PDF loading, page chunking, the SQLite index and the indexing engine
//! - **[`storage`]**: the [`VectorStore`](storage::VectorStore) trait and its SQLite implementation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scholar_retriever::retrieval::indexing_engine::{IndexingEngine, IndexingEngineConfig};
//! use scholar_retriever::storage::VectorStore;
//! use scholar_embed::EmbeddingProvider;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = IndexingEngineConfig::new("data/papers".into(), "data/vector_store".into());
//! let engine = IndexingEngine::new(config).await?;
//! let report = engine.rebuild().await?;
//! println!("{} chunks indexed", report.embedded);
//!
//! let query = engine.embedder().embed_text("What do neural networks do?").await?;
//! for hit in engine.store().query(&query, 8).await? {
//!     println!("{:.3} {} p.{}", hit.score, hit.chunk.source, hit.chunk.page);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! PDFs → DocumentLoader → ChunkingStrategy → EmbeddingProvider → SqliteStore (index.db)
//!                                                                     ↓
//!                                                           VectorStore::query
//! ```

pub mod retrieval;
pub mod storage;
