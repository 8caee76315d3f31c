//! Language model client.
//!
//! [`LlmProvider`] is the seam between the query pipeline and the model
//! runtime. [`OllamaProvider`] talks to a local Ollama daemon through its
//! non-streaming `/api/generate` endpoint.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_LLM_MODEL: &str = "mistral";

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error {status}: {body}")]
    ApiError { status: u16, body: String },
    #[error("failed to parse response: {0}")]
    ParseError(String),
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a completion for a single prompt.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    fn model_name(&self) -> &str;
}

pub struct OllamaProvider {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(url: impl Into<String>, model: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            client: reqwest::Client::new(),
            url: url.trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.url);
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        debug!("Ollama request to {} ({} prompt chars)", url, prompt.len());

        let response = self.client.post(&url).json(&body).send().await?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError { status, body });
        }

        let resp: serde_json::Value = response.json().await?;
        let text = resp["response"]
            .as_str()
            .ok_or_else(|| LlmError::ParseError("missing response field".into()))?
            .to_string();

        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_complete_posts_non_streaming_generate() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/generate")
            .match_body(Matcher::Json(json!({
                "model": "mistral",
                "prompt": "Say hi",
                "stream": false,
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"model":"mistral","response":"Hi there.","done":true}"#)
            .create_async()
            .await;

        // Trailing slash is tolerated
        let provider = OllamaProvider::new(format!("{}/", server.url()), DEFAULT_LLM_MODEL);
        let answer = provider.complete("Say hi").await.unwrap();

        assert_eq!(answer, "Hi there.");
        assert_eq!(provider.model_name(), "mistral");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_200_is_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/generate")
            .with_status(404)
            .with_body(r#"{"error":"model 'mistral' not found"}"#)
            .create_async()
            .await;

        let provider = OllamaProvider::new(server.url(), "mistral");
        match provider.complete("anything").await {
            Err(LlmError::ApiError { status, body }) => {
                assert_eq!(status, 404);
                assert!(body.contains("not found"));
            }
            other => panic!("expected ApiError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_response_field_is_parse_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/generate")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"done":true}"#)
            .create_async()
            .await;

        let provider = OllamaProvider::new(server.url(), "mistral");
        let err = provider.complete("anything").await.unwrap_err();
        assert!(matches!(err, LlmError::ParseError(_)));
        assert!(err.to_string().contains("missing response field"));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_http_error() {
        // Nothing listens on port 9 locally
        let provider = OllamaProvider::new("http://127.0.0.1:9", "mistral");
        let err = provider.complete("anything").await.unwrap_err();
        assert!(matches!(err, LlmError::HttpError(_)));
    }
}
