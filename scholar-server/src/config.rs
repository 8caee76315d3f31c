use clap::Parser;
use scholar_embed::EmbedConfig;
use scholar_embed::config::{DEFAULT_CACHE_DIR, DEFAULT_MODEL_NAME};
use scholar_retriever::retrieval::chunking_strategy::ChunkingConfig;
use scholar_retriever::retrieval::indexing_engine::IndexingEngineConfig;
use std::path::PathBuf;

use crate::llm::{DEFAULT_LLM_MODEL, DEFAULT_OLLAMA_URL};
use crate::pipeline::DEFAULT_TOP_K;

/// Configuration for the question answering server.
///
/// Every option can also be set through the environment variable named in
/// its help text.
#[derive(Parser, Debug, Clone)]
#[command(name = "scholar-server", version, about = "Answer questions about a folder of research papers")]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, env = "SCHOLAR_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "SCHOLAR_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Directory scanned for *.pdf files
    #[arg(long, env = "SCHOLAR_PAPERS_DIR", default_value = "data/papers")]
    pub papers_dir: PathBuf,

    /// Directory holding index.db
    #[arg(long, env = "SCHOLAR_INDEX_DIR", default_value = "data/vector_store")]
    pub index_dir: PathBuf,

    /// Sentence embedding model
    #[arg(long, env = "SCHOLAR_EMBED_MODEL", default_value = DEFAULT_MODEL_NAME)]
    pub embedding_model: String,

    /// Directory for downloaded model files
    #[arg(long, env = "SCHOLAR_MODEL_CACHE", default_value = DEFAULT_CACHE_DIR)]
    pub model_cache_dir: PathBuf,

    /// Base URL of the Ollama daemon
    #[arg(long, env = "OLLAMA_URL", default_value = DEFAULT_OLLAMA_URL)]
    pub ollama_url: String,

    /// Ollama model used to generate answers
    #[arg(long, env = "SCHOLAR_LLM_MODEL", default_value = DEFAULT_LLM_MODEL)]
    pub llm_model: String,

    /// Chunks retrieved per question
    #[arg(long, env = "SCHOLAR_TOP_K", default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,

    /// Maximum chunk length in characters
    #[arg(long, env = "SCHOLAR_CHUNK_SIZE", default_value_t = 1000)]
    pub chunk_size: usize,

    /// Characters shared between neighbouring chunks
    #[arg(long, env = "SCHOLAR_CHUNK_OVERLAP", default_value_t = 200)]
    pub chunk_overlap: usize,

    /// Serve an existing index when it matches the papers and model
    #[arg(long, env = "SCHOLAR_REUSE_INDEX")]
    pub reuse_index: bool,
}

impl ServerConfig {
    pub fn embed_config(&self) -> EmbedConfig {
        EmbedConfig::new(self.embedding_model.clone())
            .with_cache_dir(self.model_cache_dir.clone())
            .with_download_progress(false)
    }

    pub fn indexing_config(&self) -> IndexingEngineConfig {
        IndexingEngineConfig::new(self.papers_dir.clone(), self.index_dir.clone())
            .with_chunking_config(
                ChunkingConfig::default()
                    .with_chunk_size(self.chunk_size)
                    .with_chunk_overlap(self.chunk_overlap),
            )
            .with_embedding_config(self.embed_config())
            .with_reuse_index(self.reuse_index)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::try_parse_from(["scholar-server"]).unwrap();

        assert_eq!(config.bind_address(), "127.0.0.1:8000");
        assert_eq!(config.papers_dir, PathBuf::from("data/papers"));
        assert_eq!(config.index_dir, PathBuf::from("data/vector_store"));
        assert_eq!(config.embedding_model, "all-MiniLM-L6-v2");
        assert_eq!(config.ollama_url, "http://localhost:11434");
        assert_eq!(config.llm_model, "mistral");
        assert_eq!(config.top_k, 8);
        assert!(!config.reuse_index);

        let indexing = config.indexing_config();
        assert_eq!(indexing.chunking_config.chunk_size, 1000);
        assert_eq!(indexing.chunking_config.chunk_overlap, 200);
        assert_eq!(indexing.embedding_config.model_name, "all-MiniLM-L6-v2");
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = ServerConfig::try_parse_from([
            "scholar-server",
            "--port",
            "9100",
            "--papers-dir",
            "/srv/papers",
            "--llm-model",
            "llama3",
            "--top-k",
            "4",
            "--chunk-size",
            "500",
            "--chunk-overlap",
            "50",
            "--reuse-index",
        ])
        .unwrap();

        assert_eq!(config.port, 9100);
        assert_eq!(config.llm_model, "llama3");
        assert_eq!(config.top_k, 4);

        let indexing = config.indexing_config();
        assert_eq!(indexing.papers_dir, PathBuf::from("/srv/papers"));
        assert_eq!(indexing.chunking_config.chunk_size, 500);
        assert_eq!(indexing.chunking_config.chunk_overlap, 50);
        assert!(indexing.reuse_index);
    }
}
