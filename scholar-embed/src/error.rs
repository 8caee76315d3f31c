//! Error types for the embedding system

/// Result type for embedding operations.
pub type Result<T> = std::result::Result<T, EmbedError>;

/// Everything that can go wrong while loading a model or embedding text.
///
/// Configuration problems surface before any model is touched. fastembed
/// reports failures as `anyhow` errors, which the initialization and
/// generation variants keep as their source.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// The configured model name does not map to a known model
    #[error("Unsupported embedding model: {name}")]
    UnsupportedModel { name: String },

    /// Error when model configuration is invalid
    #[error("Invalid model configuration: {message}")]
    InvalidConfig { message: String },

    /// Error during model initialization
    #[error("Model initialization failed: {source}")]
    ModelInitialization {
        #[source]
        source: anyhow::Error,
    },

    /// Error during embedding generation
    #[error("Embedding generation failed: {source}")]
    EmbeddingGeneration {
        #[source]
        source: anyhow::Error,
    },

    /// IO errors when preparing the model cache directory
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Async task join errors
    #[error("Async task failed: {source}")]
    AsyncTask {
        #[from]
        source: tokio::task::JoinError,
    },
}

impl EmbedError {
    /// Wrap an error raised while loading a model.
    pub fn model_init(source: impl Into<anyhow::Error>) -> Self {
        Self::ModelInitialization {
            source: source.into(),
        }
    }

    /// Wrap an error raised while running inference.
    pub fn embedding_gen(source: impl Into<anyhow::Error>) -> Self {
        Self::EmbeddingGeneration {
            source: source.into(),
        }
    }

    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
