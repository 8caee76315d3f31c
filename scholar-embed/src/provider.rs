//! Embedding provider implementations

use crate::config::EmbedConfig;
use crate::error::{EmbedError, Result};
use async_trait::async_trait;
use fastembed::{InitOptions, TextEmbedding};
use fnv::FnvHasher;
use half::f16;
use std::collections::HashMap;
use std::hash::Hasher;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

/// Result of embedding generation
#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    /// The generated embeddings, one per input text
    pub embeddings: Vec<Vec<f16>>,
    /// The dimension of each embedding vector
    pub dimension: usize,
}

impl EmbeddingResult {
    /// The dimension is taken from the first vector, or 0 when there is none.
    pub fn new(embeddings: Vec<Vec<f16>>) -> Self {
        let dimension = embeddings.first().map(|e| e.len()).unwrap_or(0);
        Self {
            embeddings,
            dimension,
        }
    }

    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

/// Type alias for cached model entries (model, dimension)
type ModelCacheEntry = (Arc<Mutex<TextEmbedding>>, usize);

/// Global cache for initialized embedding models to avoid reloading
static MODEL_CACHE: OnceLock<Mutex<HashMap<String, ModelCacheEntry>>> = OnceLock::new();

fn model_cache() -> MutexGuard<'static, HashMap<String, ModelCacheEntry>> {
    MODEL_CACHE
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Trait for embedding providers that can generate embeddings from text
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for a single text
    async fn embed_text(&self, text: &str) -> Result<Vec<f16>>;

    /// Generate embeddings for multiple texts (batch processing)
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult>;

    /// Get the dimension of embeddings produced by this provider
    fn embedding_dimension(&self) -> usize;

    /// Get the name/identifier of this provider
    fn provider_name(&self) -> &str;
}

/// FastEmbed-based embedding provider running ONNX models locally
#[derive(Clone)]
pub struct FastEmbedProvider {
    config: EmbedConfig,
    model: Option<Arc<Mutex<TextEmbedding>>>,
    dimension: usize,
}

impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("config", &self.config)
            .field("model", &self.model.is_some())
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl FastEmbedProvider {
    /// Creates a provider without loading the model. Call
    /// [`initialize`](Self::initialize) before embedding anything.
    pub fn new(config: EmbedConfig) -> Self {
        let dimension = config.expected_dimension().unwrap_or(0);
        Self {
            config,
            model: None,
            dimension,
        }
    }

    /// Creates and initializes a provider in one step.
    pub async fn create(config: EmbedConfig) -> Result<Self> {
        let mut provider = Self::new(config);
        provider.initialize().await?;
        Ok(provider)
    }

    pub fn config(&self) -> &EmbedConfig {
        &self.config
    }

    /// Loads the model, downloading it into the cache directory on first use.
    ///
    /// Loaded models are shared process-wide: a second provider with an
    /// identical configuration reuses the first one's session.
    pub async fn initialize(&mut self) -> Result<()> {
        self.config.validate()?;
        tracing::info!(
            "Initializing FastEmbed provider for model: {}",
            self.config.model_name
        );

        let cache_key = self.create_cache_key()?;

        let cached = model_cache()
            .get(&cache_key)
            .map(|(model, dim)| (Arc::clone(model), *dim));

        if let Some((cached_model, cached_dimension)) = cached {
            tracing::info!("Using cached model for: {}", self.config.model_name);
            self.model = Some(cached_model);
            self.dimension = cached_dimension;
            return self.validate_model().await;
        }

        tokio::fs::create_dir_all(&self.config.cache_dir).await?;

        let config = self.config.clone();
        let (model, dimension) =
            tokio::task::spawn_blocking(move || -> Result<(TextEmbedding, usize)> {
                tracing::info!(
                    "Loading embedding model {} (cache: {})",
                    config.model_name,
                    config.cache_dir.display()
                );

                let init_options = InitOptions::new(config.fastembed_model()?)
                    .with_cache_dir(config.cache_dir.clone())
                    .with_show_download_progress(config.show_download_progress);

                let mut model =
                    TextEmbedding::try_new(init_options).map_err(EmbedError::model_init)?;

                // Probe the dimension with a throwaway embedding
                let probe = model
                    .embed(vec!["test".to_string()], None)
                    .map_err(EmbedError::model_init)?;
                let dimension = probe.first().map(|emb| emb.len()).unwrap_or(0);

                tracing::info!("Model loaded successfully. Dimension: {}", dimension);
                Ok((model, dimension))
            })
            .await??;

        let model_arc = Arc::new(Mutex::new(model));
        model_cache().insert(cache_key, (Arc::clone(&model_arc), dimension));

        self.model = Some(model_arc);
        self.dimension = dimension;

        self.validate_model().await
    }

    /// Deterministic cache key: FNV hash of the serialized config.
    fn create_cache_key(&self) -> Result<String> {
        let config_json = serde_json::to_string(&self.config)
            .map_err(|e| EmbedError::invalid_config(format!("unserializable config: {e}")))?;

        let mut hasher = FnvHasher::default();
        hasher.write(b"v1:");
        hasher.write(config_json.as_bytes());

        Ok(format!("v1:{:x}", hasher.finish()))
    }

    /// Embed a probe sentence and check the output is usable.
    async fn validate_model(&self) -> Result<()> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| EmbedError::invalid_config("Model not initialized"))?;

        let model_clone = Arc::clone(model);
        let validation_result = tokio::task::spawn_blocking(move || -> Result<Vec<Vec<f32>>> {
            let mut model_guard = model_clone.lock().unwrap_or_else(PoisonError::into_inner);
            model_guard
                .embed(vec!["validation test".to_string()], None)
                .map_err(EmbedError::model_init)
        })
        .await??;

        let embedding = validation_result.first().ok_or_else(|| {
            EmbedError::invalid_config("Model validation failed: no embeddings generated")
        })?;
        check_vector(embedding, self.dimension)
            .map_err(|reason| EmbedError::invalid_config(format!("Model validation failed: {reason}")))?;

        if let Some(expected) = self.config.expected_dimension() {
            if expected != self.dimension {
                return Err(EmbedError::invalid_config(format!(
                    "Model validation failed: {} advertises dimension {}, got {}",
                    self.config.model_name, expected, self.dimension
                )));
            }
        }

        tracing::debug!("Model validation passed for: {}", self.config.model_name);
        Ok(())
    }

    /// Clears the global model cache.
    pub fn clear_cache() {
        model_cache().clear();
        tracing::info!("Model cache cleared");
    }

    /// Number of models held in the global cache.
    pub fn cache_size() -> usize {
        model_cache().len()
    }
}

/// Reject empty, wrongly sized or non-finite vectors.
fn check_vector(embedding: &[f32], dimension: usize) -> std::result::Result<(), String> {
    if embedding.is_empty() {
        return Err("empty embedding".to_string());
    }
    if embedding.len() != dimension {
        return Err(format!(
            "expected dimension {}, got {}",
            dimension,
            embedding.len()
        ));
    }
    if embedding.iter().any(|v| !v.is_finite()) {
        return Err("non-finite values in embedding".to_string());
    }
    Ok(())
}

/// Convert to f16, optionally scaling to unit length first.
pub fn to_f16(embedding: &[f32], normalize: bool) -> Vec<f16> {
    let norm = if normalize {
        embedding.iter().map(|x| x * x).sum::<f32>().sqrt()
    } else {
        0.0
    };

    if norm > 0.0 {
        embedding.iter().map(|&x| f16::from_f32(x / norm)).collect()
    } else {
        embedding.iter().map(|&x| f16::from_f32(x)).collect()
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f16>> {
        let texts = vec![text.to_string()];
        let result = self.embed_texts(&texts).await?;
        result
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::invalid_config("No embedding generated for text"))
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        if texts.is_empty() {
            return Ok(EmbeddingResult::new(vec![]));
        }

        let model = self.model.as_ref().ok_or_else(|| {
            EmbedError::invalid_config("Model not initialized. Call initialize() first.")
        })?;

        tracing::debug!("Generating embeddings for {} texts", texts.len());

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(self.config.batch_size.max(1)) {
            let chunk = chunk.to_vec();
            let model_clone = Arc::clone(model);

            let batch_embeddings = tokio::task::spawn_blocking(move || -> Result<Vec<Vec<f32>>> {
                tracing::debug!("Processing batch of {} texts", chunk.len());

                let mut model_guard = model_clone.lock().unwrap_or_else(PoisonError::into_inner);
                model_guard
                    .embed(chunk, None)
                    .map_err(EmbedError::embedding_gen)
            })
            .await??;

            all_embeddings.extend(
                batch_embeddings
                    .iter()
                    .map(|embedding| to_f16(embedding, self.config.normalize)),
            );
        }

        if all_embeddings.len() != texts.len() {
            return Err(EmbedError::invalid_config(format!(
                "model returned {} embeddings for {} texts",
                all_embeddings.len(),
                texts.len()
            )));
        }

        tracing::debug!("Generated {} embeddings", all_embeddings.len());
        Ok(EmbeddingResult::new(all_embeddings))
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "fastembed"
    }
}
