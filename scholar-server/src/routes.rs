//! HTTP routes.
//!
//! - `POST /ask` - answer a question from the indexed papers
//! - `GET /health` - lifecycle phase of the service

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::state::{AskOutcome, ServiceState};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub detail: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Retrieval or the language model failed for this request
    #[error("{0:#}")]
    Pipeline(#[from] anyhow::Error),
    /// Indexing failed; the service cannot answer until restarted
    #[error("Service unavailable: indexing failed: {0}")]
    Unavailable(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        error!("Request failed with {}: {}", status, self);
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

pub fn router(state: Arc<ServiceState>) -> Router {
    Router::new()
        .route("/ask", post(ask))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn ask(
    State(state): State<Arc<ServiceState>>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    match state.ask(&request.question).await? {
        AskOutcome::Answered(answer) => Ok(Json(AskResponse { answer })),
        AskOutcome::Initializing => Ok(Json(AskResponse {
            answer: crate::state::INITIALIZING_MESSAGE.to_string(),
        })),
        AskOutcome::Unavailable(reason) => Err(ApiError::Unavailable(reason)),
    }
}

async fn health(State(state): State<Arc<ServiceState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: state.phase().as_str().to_string(),
        detail: state.failure().map(str::to_string),
    })
}
