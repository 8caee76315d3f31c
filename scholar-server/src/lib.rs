//! # scholar-server
//!
//! HTTP question answering over a folder of research papers.
//!
//! On startup the server binds its listener immediately and builds the
//! vector index in a supervised background task. Until the index is ready,
//! `POST /ask` answers with a fixed "still initializing" message; after
//! that, each question is embedded, the nearest chunks are retrieved and a
//! local Ollama model writes the answer.
//!
//! ## Architecture
//!
//! - [`state`]: lifecycle phase and the write-once pipeline handle
//! - [`pipeline`]: retrieval and prompt composition
//! - [`llm`]: language model client
//! - [`routes`]: axum handlers and error mapping
//!
//! ```bash
//! scholar-server --papers-dir data/papers --index-dir data/vector_store
//! curl -s localhost:8000/ask -H 'content-type: application/json' \
//!      -d '{"question": "What do neural networks do?"}'
//! ```

pub mod config;
pub mod llm;
pub mod pipeline;
pub mod routes;
mod server;
pub mod state;

pub use config::ServerConfig;
pub use server::{IndexingTask, build_pipeline, run_server, spawn_indexing};
