//! Retrieval-augmented question answering.
//!
//! A question is embedded, the `top_k` nearest chunks are fetched from the
//! vector store, and all of them are "stuffed" into one prompt ahead of the
//! question for a single language model call.

use anyhow::{Context, Result};
use scholar_embed::EmbeddingProvider;
use scholar_retriever::storage::{ScoredChunk, VectorStore};
use std::sync::Arc;
use tracing::{debug, info};

use crate::llm::LlmProvider;

/// Number of chunks retrieved per question.
pub const DEFAULT_TOP_K: usize = 8;

const STUFF_INSTRUCTION: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

/// Build the single prompt sent to the language model.
pub fn compose_prompt(question: &str, chunks: &[ScoredChunk]) -> String {
    let context = chunks
        .iter()
        .map(|hit| hit.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("{STUFF_INSTRUCTION}\n\n{context}\n\nQuestion: {question}\nHelpful Answer:")
}

pub struct QaPipeline {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LlmProvider>,
    top_k: usize,
}

impl std::fmt::Debug for QaPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QaPipeline")
            .field("embedder", &self.embedder.provider_name())
            .field("llm", &self.llm.model_name())
            .field("top_k", &self.top_k)
            .finish()
    }
}

impl QaPipeline {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
    ) -> Self {
        Self {
            store,
            embedder,
            llm,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// The stored chunks nearest to the question, best first.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<ScoredChunk>> {
        let vector = self
            .embedder
            .embed_text(question)
            .await
            .context("embedding question")?;
        self.store
            .query(&vector, self.top_k)
            .await
            .context("querying vector store")
    }

    /// Answer a question from the indexed papers. Language model errors
    /// are returned as is; nothing is retried.
    pub async fn ask(&self, question: &str) -> Result<String> {
        let chunks = self.retrieve(question).await?;
        debug!(
            "Retrieved {} chunks for question ({} chars)",
            chunks.len(),
            question.len()
        );

        let prompt = compose_prompt(question, &chunks);
        let answer = self
            .llm
            .complete(&prompt)
            .await
            .with_context(|| format!("language model {} failed", self.llm.model_name()))?;

        info!("Answered question with {} context chunks", chunks.len());
        Ok(answer.trim().to_string())
    }
}
