//! Drives the HTTP routes in process through every lifecycle phase.

use anyhow::Result;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use half::f16;
use scholar_embed::{EmbeddingProvider, EmbeddingResult};
use scholar_retriever::retrieval::document_loader::Document;
use scholar_retriever::retrieval::indexing_engine::{IndexingEngine, IndexingEngineConfig};
use scholar_retriever::retrieval::vector_index::VectorIndex;
use scholar_server::llm::{LlmError, LlmProvider};
use scholar_server::pipeline::QaPipeline;
use scholar_server::routes::{self, AskResponse, ErrorResponse, HealthResponse};
use scholar_server::spawn_indexing;
use scholar_server::state::{INITIALIZING_MESSAGE, ServiceState};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tower::ServiceExt;

const DIMENSION: usize = 64;

/// Bag-of-words embedder keyed on word length and first letter.
struct WordEmbedder;

impl WordEmbedder {
    fn vector(text: &str) -> Vec<f16> {
        let mut buckets = vec![0f32; DIMENSION];
        for word in text.split(|c: char| !c.is_ascii_alphabetic()).filter(|w| !w.is_empty()) {
            let first = word.as_bytes()[0].to_ascii_lowercase() as usize;
            buckets[(first * 7 + word.len()) % DIMENSION] += 1.0;
        }
        buckets.into_iter().map(f16::from_f32).collect()
    }
}

#[async_trait]
impl EmbeddingProvider for WordEmbedder {
    async fn embed_text(&self, text: &str) -> scholar_embed::Result<Vec<f16>> {
        Ok(Self::vector(text))
    }

    async fn embed_texts(&self, texts: &[String]) -> scholar_embed::Result<EmbeddingResult> {
        Ok(EmbeddingResult::new(
            texts.iter().map(|t| Self::vector(t)).collect(),
        ))
    }

    fn embedding_dimension(&self) -> usize {
        DIMENSION
    }

    fn provider_name(&self) -> &str {
        "words"
    }
}

/// Answers with the prompt it was given, or always fails.
struct EchoLlm {
    fail: bool,
}

#[async_trait]
impl LlmProvider for EchoLlm {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        if self.fail {
            return Err(LlmError::ApiError {
                status: 500,
                body: "out of memory".to_string(),
            });
        }
        Ok(prompt.to_string())
    }

    fn model_name(&self) -> &str {
        "echo"
    }
}

async fn build(fail_llm: bool) -> Result<QaPipeline> {
    let engine = IndexingEngine::with_parts(
        IndexingEngineConfig::new("unused".into(), "unused".into()),
        VectorIndex::open_memory().await?,
        Arc::new(WordEmbedder),
    )?;
    engine
        .index_documents(&[
            Document::from_text("papers/nn.pdf", "Neural networks approximate functions."),
            Document::from_text("papers/bake.pdf", "Bake the loaf until golden brown."),
        ])
        .await?;

    Ok(QaPipeline::new(
        engine.store(),
        engine.embedder(),
        Arc::new(EchoLlm { fail: fail_llm }),
    ))
}

async fn post_ask(state: &Arc<ServiceState>, body: &str) -> Result<(StatusCode, Vec<u8>)> {
    let request = Request::builder()
        .method("POST")
        .uri("/ask")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))?;
    let response = routes::router(Arc::clone(state)).oneshot(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, bytes.to_vec()))
}

async fn get_health(state: &Arc<ServiceState>) -> Result<HealthResponse> {
    let request = Request::builder().uri("/health").body(Body::empty())?;
    let response = routes::router(Arc::clone(state)).oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

const QUESTION: &str = r#"{"question": "What do neural networks do?"}"#;

#[tokio::test]
async fn test_ask_before_ready_returns_initializing_message() -> Result<()> {
    let state = Arc::new(ServiceState::new());
    assert_eq!(get_health(&state).await?.status, "uninitialized");

    let (status, body) = post_ask(&state, QUESTION).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json::<AskResponse>(&body)?.answer, INITIALIZING_MESSAGE);

    // Still answers immediately while a build is running
    let task = spawn_indexing(Arc::clone(&state), std::future::pending())?;
    assert_eq!(get_health(&state).await?.status, "indexing");
    let (status, body) = post_ask(&state, QUESTION).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json::<AskResponse>(&body)?.answer,
        "System still initializing. Try again in a few seconds."
    );
    task.abort();
    Ok(())
}

#[tokio::test]
async fn test_ask_after_indexing_answers_from_retrieved_chunks() -> Result<()> {
    let state = Arc::new(ServiceState::new());
    spawn_indexing(Arc::clone(&state), build(false))?.wait().await;

    let health = get_health(&state).await?;
    assert_eq!(health.status, "ready");
    assert_eq!(health.detail, None);

    let (status, body) = post_ask(&state, QUESTION).await?;
    assert_eq!(status, StatusCode::OK);
    let answer = json::<AskResponse>(&body)?.answer;
    assert!(answer.contains("Neural networks approximate functions."));
    assert!(answer.contains("Question: What do neural networks do?"));
    Ok(())
}

#[tokio::test]
async fn test_llm_failure_returns_500() -> Result<()> {
    let state = Arc::new(ServiceState::new());
    spawn_indexing(Arc::clone(&state), build(true))?.wait().await;

    let (status, body) = post_ask(&state, QUESTION).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let error = json::<ErrorResponse>(&body)?.error;
    assert!(error.contains("language model echo failed"), "error: {error}");
    assert!(error.contains("out of memory"));
    Ok(())
}

#[tokio::test]
async fn test_failed_indexing_returns_503() -> Result<()> {
    let state = Arc::new(ServiceState::new());
    spawn_indexing(Arc::clone(&state), async {
        Err(anyhow::anyhow!("papers directory data/papers does not exist"))
    })?
    .wait()
    .await;

    let health = get_health(&state).await?;
    assert_eq!(health.status, "failed");
    assert_eq!(
        health.detail.as_deref(),
        Some("papers directory data/papers does not exist")
    );

    let (status, body) = post_ask(&state, QUESTION).await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(json::<ErrorResponse>(&body)?.error.contains("does not exist"));
    Ok(())
}

#[tokio::test]
async fn test_malformed_request_is_rejected() -> Result<()> {
    let state = Arc::new(ServiceState::new());
    let (status, _) = post_ask(&state, r#"{"query": "wrong field"}"#).await?;
    assert!(status.is_client_error());
    Ok(())
}
