//! # scholar-embed
//!
//! Sentence embeddings for the scholar retrieval pipeline, computed locally
//! with ONNX models through FastEmbed.
//!
//! ```no_run
//! use scholar_embed::{EmbedConfig, EmbeddingProvider, FastEmbedProvider};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let provider = FastEmbedProvider::create(
//!     EmbedConfig::default().with_cache_dir("/tmp/models"),
//! ).await?;
//!
//! let texts = vec!["Neural networks approximate functions.".to_string()];
//! let result = provider.embed_texts(&texts).await?;
//! println!("{} embeddings of dimension {}", result.len(), result.dimension);
//! # Ok(())
//! # }
//! ```
//!
//! Vectors are returned as L2-normalized `f16`, so a dot product is a cosine
//! similarity. Loaded models are cached process-wide, keyed by a hash of the
//! serialized [`EmbedConfig`].
//!
//! - [`config`]: model selection and batching options
//! - [`provider`]: the [`EmbeddingProvider`] trait and its FastEmbed implementation
//! - [`error`]: [`EmbedError`] and the crate [`Result`] alias

pub mod config;
pub mod error;
pub mod provider;

pub use config::{EmbedConfig, EmbedConfigBuilder};
pub use error::{EmbedError, Result};
pub use provider::{EmbeddingProvider, EmbeddingResult, FastEmbedProvider};
