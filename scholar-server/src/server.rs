use anyhow::{Context, Result};
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::llm::OllamaProvider;
use crate::pipeline::QaPipeline;
use crate::routes;
use crate::state::ServiceState;
use scholar_retriever::retrieval::indexing_engine::IndexingEngine;

/// Handle to the background indexing task and the watcher supervising it.
pub struct IndexingTask {
    task: AbortHandle,
    watcher: JoinHandle<()>,
}

impl IndexingTask {
    /// Cancel indexing. The watcher records the cancellation as a failure.
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Wait until the watcher has recorded the outcome in the state.
    pub async fn wait(self) {
        if let Err(e) = self.watcher.await {
            error!("Indexing watcher stopped abnormally: {}", e);
        }
    }
}

/// Spawn `build` once and publish its pipeline when it finishes.
///
/// Errors, panics and cancellation of the build move the state to
/// `Failed` instead of being lost with the task.
pub fn spawn_indexing<F>(state: Arc<ServiceState>, build: F) -> Result<IndexingTask>
where
    F: Future<Output = Result<QaPipeline>> + Send + 'static,
{
    if !state.begin_indexing() {
        anyhow::bail!("indexing was already started");
    }

    let task = tokio::spawn(build);
    let abort = task.abort_handle();

    let watcher = tokio::spawn(async move {
        match task.await {
            Ok(Ok(pipeline)) => {
                if let Err(e) = state.publish(pipeline) {
                    error!("Discarding built pipeline: {:#}", e);
                }
            }
            Ok(Err(e)) => state.fail(format!("{e:#}")),
            Err(e) if e.is_panic() => state.fail(format!(
                "indexing task panicked: {}",
                panic_message(e.into_panic())
            )),
            Err(_) => state.fail("indexing was cancelled"),
        }
    });

    Ok(IndexingTask {
        task: abort,
        watcher,
    })
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Build (or reuse) the index and assemble the question answering pipeline.
pub async fn build_pipeline(config: ServerConfig) -> Result<QaPipeline> {
    let engine = IndexingEngine::new(config.indexing_config()).await?;
    let report = engine.prepare().await?;
    info!(
        "Index ready: {} chunks from {} documents (reused: {})",
        report.embedded, report.documents, report.reused
    );

    let llm = OllamaProvider::new(config.ollama_url.clone(), config.llm_model.clone());
    info!("Answering with {} at {}", config.llm_model, llm.url());

    Ok(QaPipeline::new(engine.store(), engine.embedder(), Arc::new(llm)).with_top_k(config.top_k))
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!("Cannot listen for Ctrl-C ({}), running until killed", e);
            std::future::pending::<()>().await;
        }
    }
}

/// Bind the listener, start indexing in the background and serve until Ctrl-C.
pub async fn run_server(config: ServerConfig) -> Result<()> {
    let address = config.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;

    let state = Arc::new(ServiceState::new());
    let indexing = spawn_indexing(Arc::clone(&state), build_pipeline(config))?;

    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, routes::router(Arc::clone(&state)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    indexing.abort();
    indexing.wait().await;
    info!("Server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Phase;
    use tracing_test::traced_test;

    #[tokio::test]
    async fn test_build_error_moves_state_to_failed() -> Result<()> {
        let state = Arc::new(ServiceState::new());
        let task = spawn_indexing(Arc::clone(&state), async {
            Err(anyhow::anyhow!("no such directory").context("loading papers"))
        })?;
        task.wait().await;

        assert_eq!(state.phase(), Phase::Failed);
        assert_eq!(state.failure(), Some("loading papers: no such directory"));
        Ok(())
    }

    #[tokio::test]
    #[traced_test]
    async fn test_build_panic_moves_state_to_failed() -> Result<()> {
        let state = Arc::new(ServiceState::new());
        let task = spawn_indexing(Arc::clone(&state), async { panic!("corrupt model file") })?;
        task.wait().await;

        assert_eq!(state.phase(), Phase::Failed);
        assert_eq!(
            state.failure(),
            Some("indexing task panicked: corrupt model file")
        );
        assert!(logs_contain(
            "Indexing failed: indexing task panicked: corrupt model file"
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_abort_moves_state_to_failed() -> Result<()> {
        let state = Arc::new(ServiceState::new());
        let task = spawn_indexing(Arc::clone(&state), async {
            std::future::pending::<()>().await;
            Err(anyhow::anyhow!("never finishes"))
        })?;
        assert_eq!(state.phase(), Phase::Indexing);

        task.abort();
        task.wait().await;
        assert_eq!(state.phase(), Phase::Failed);
        assert_eq!(state.failure(), Some("indexing was cancelled"));
        Ok(())
    }

    #[tokio::test]
    async fn test_indexing_starts_only_once() -> Result<()> {
        let state = Arc::new(ServiceState::new());
        let first = spawn_indexing(Arc::clone(&state), std::future::pending())?;
        assert!(spawn_indexing(Arc::clone(&state), std::future::pending()).is_err());
        first.abort();
        Ok(())
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_message(Box::new(42)), "unknown panic");
    }
}
