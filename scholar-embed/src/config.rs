//! Configuration for embedding models

use crate::error::{EmbedError, Result};
use derive_builder::Builder;
use fastembed::EmbeddingModel;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Model used when nothing else is configured.
pub const DEFAULT_MODEL_NAME: &str = "all-MiniLM-L6-v2";

/// Directory fastembed downloads model files into by default.
pub const DEFAULT_CACHE_DIR: &str = ".fastembed_cache";

/// Built-in models: accepted name, fastembed variant, output dimension.
const KNOWN_MODELS: &[(&str, KnownModel, usize)] = &[
    ("all-minilm-l6-v2", KnownModel::AllMiniLmL6V2, 384),
    ("bge-small-en-v1.5", KnownModel::BgeSmallEnV15, 384),
    ("snowflake-arctic-embed-xs", KnownModel::SnowflakeArcticEmbedXs, 384),
];

#[derive(Debug, Clone, Copy)]
enum KnownModel {
    AllMiniLmL6V2,
    BgeSmallEnV15,
    SnowflakeArcticEmbedXs,
}

impl KnownModel {
    fn to_fastembed(self) -> EmbeddingModel {
        match self {
            KnownModel::AllMiniLmL6V2 => EmbeddingModel::AllMiniLML6V2,
            KnownModel::BgeSmallEnV15 => EmbeddingModel::BGESmallENV15,
            KnownModel::SnowflakeArcticEmbedXs => EmbeddingModel::SnowflakeArcticEmbedXS,
        }
    }
}

/// Strip an organisation prefix (`sentence-transformers/`, `BAAI/`, ...) and lowercase.
fn canonical_name(name: &str) -> String {
    let base = name.rsplit('/').next().unwrap_or(name);
    base.trim().to_ascii_lowercase()
}

fn lookup(name: &str) -> Option<(KnownModel, usize)> {
    let canonical = canonical_name(name);
    KNOWN_MODELS
        .iter()
        .find(|(known, _, _)| *known == canonical)
        .map(|(_, model, dim)| (*model, *dim))
}

/// Configuration for embedding models
#[derive(Debug, Clone, Builder, Serialize, Deserialize, PartialEq)]
#[builder(setter(into))]
pub struct EmbedConfig {
    /// Name of the embedding model, e.g. `all-MiniLM-L6-v2` or
    /// `sentence-transformers/all-MiniLM-L6-v2`
    #[builder(default = r#"DEFAULT_MODEL_NAME.to_string()"#)]
    pub model_name: String,
    /// Directory where fastembed stores downloaded model files
    #[builder(default = r#"PathBuf::from(DEFAULT_CACHE_DIR)"#)]
    pub cache_dir: PathBuf,
    /// Maximum batch size handed to the model in one inference call
    #[builder(default = "32")]
    pub batch_size: usize,
    /// Whether to L2-normalize embeddings
    #[builder(default = "true")]
    pub normalize: bool,
    /// Print a progress bar while model files download
    #[builder(default = "false")]
    pub show_download_progress: bool,
}

impl EmbedConfig {
    pub fn builder() -> EmbedConfigBuilder {
        EmbedConfigBuilder::default()
    }

    /// Configuration for a named model with default settings otherwise.
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            ..Self::default()
        }
    }

    pub fn with_cache_dir<P: AsRef<Path>>(self, cache_dir: P) -> Self {
        Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
            ..self
        }
    }

    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self { batch_size, ..self }
    }

    pub fn with_normalize(self, normalize: bool) -> Self {
        Self { normalize, ..self }
    }

    pub fn with_download_progress(self, show_download_progress: bool) -> Self {
        Self {
            show_download_progress,
            ..self
        }
    }

    /// Whether the model name maps to a built-in fastembed model.
    pub fn is_supported(&self) -> bool {
        lookup(&self.model_name).is_some()
    }

    /// The fastembed model variant for this configuration.
    pub fn fastembed_model(&self) -> Result<EmbeddingModel> {
        lookup(&self.model_name)
            .map(|(model, _)| model.to_fastembed())
            .ok_or_else(|| EmbedError::UnsupportedModel {
                name: self.model_name.clone(),
            })
    }

    /// Output dimension advertised for the model, checked against the
    /// loaded model during initialization.
    pub fn expected_dimension(&self) -> Option<usize> {
        lookup(&self.model_name).map(|(_, dim)| dim)
    }

    /// Check the configuration without loading anything.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(EmbedError::invalid_config("batch_size must be at least 1"));
        }
        self.fastembed_model()?;
        Ok(())
    }
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL_NAME.to_string(),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            batch_size: 32,
            normalize: true,
            show_download_progress: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = EmbedConfig::default();

        assert_eq!(config.model_name, "all-MiniLM-L6-v2");
        assert_eq!(config.cache_dir, PathBuf::from(".fastembed_cache"));
        assert_eq!(config.batch_size, 32);
        assert!(config.normalize);
        assert!(!config.show_download_progress);
        assert_eq!(config.expected_dimension(), Some(384));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_defaults_match_default() {
        let built = EmbedConfig::builder().build().unwrap();
        assert_eq!(built, EmbedConfig::default());
    }

    #[test]
    fn test_derive_builder_pattern() {
        let temp_dir = tempdir().unwrap();

        let config = EmbedConfig::builder()
            .model_name("BAAI/bge-small-en-v1.5")
            .cache_dir(temp_dir.path())
            .batch_size(8usize)
            .normalize(false)
            .build()
            .unwrap();

        assert_eq!(config.model_name, "BAAI/bge-small-en-v1.5");
        assert_eq!(config.cache_dir, temp_dir.path());
        assert_eq!(config.batch_size, 8);
        assert!(!config.normalize);
        assert!(matches!(
            config.fastembed_model().unwrap(),
            EmbeddingModel::BGESmallENV15
        ));
    }

    #[test]
    fn test_config_builder_methods() {
        let temp_dir = tempdir().unwrap();
        let config = EmbedConfig::new("snowflake-arctic-embed-xs")
            .with_cache_dir(temp_dir.path())
            .with_batch_size(64)
            .with_normalize(false)
            .with_download_progress(true);

        assert_eq!(config.batch_size, 64);
        assert!(!config.normalize);
        assert!(config.show_download_progress);
        assert_eq!(config.cache_dir, temp_dir.path());
    }

    #[test]
    fn test_model_name_resolution() {
        for name in [
            "all-MiniLM-L6-v2",
            "sentence-transformers/all-MiniLM-L6-v2",
            "ALL-MINILM-L6-V2",
        ] {
            let config = EmbedConfig::new(name);
            assert!(config.is_supported(), "{name} should resolve");
            assert!(matches!(
                config.fastembed_model().unwrap(),
                EmbeddingModel::AllMiniLML6V2
            ));
        }
    }

    #[test]
    fn test_invalid_configs() {
        let unknown = EmbedConfig::new("text-embedding-3-large");
        assert!(!unknown.is_supported());
        assert_eq!(unknown.expected_dimension(), None);
        assert!(matches!(
            unknown.validate(),
            Err(EmbedError::UnsupportedModel { .. })
        ));

        let zero_batch = EmbedConfig::default().with_batch_size(0);
        assert!(matches!(
            zero_batch.validate(),
            Err(EmbedError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_config_serializes_deterministically() {
        let a = serde_json::to_string(&EmbedConfig::default()).unwrap();
        let b = serde_json::to_string(&EmbedConfig::default()).unwrap();
        assert_eq!(a, b);

        let parsed: EmbedConfig = serde_json::from_str(&a).unwrap();
        assert_eq!(parsed, EmbedConfig::default());
    }
}
