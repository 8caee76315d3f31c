//! HTTP client for the `/ask` endpoint.

use reqwest::StatusCode;
use serde::Serialize;
use tracing::debug;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/ask";

/// What the server said about one question.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// 200 response; `None` when the body had no `answer` string
    Answer(Option<String>),
    /// Any other status, with the raw body
    Error { status: u16, body: String },
}

#[derive(Serialize)]
struct AskBody<'a> {
    question: &'a str,
}

pub struct AskClient {
    url: String,
    http: reqwest::Client,
}

impl AskClient {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST one question. Only transport and decoding failures are errors;
    /// non-200 statuses come back as [`Reply::Error`].
    pub async fn ask(&self, question: &str) -> Result<Reply, reqwest::Error> {
        debug!("POST {} ({} chars)", self.url, question.len());
        let response = self
            .http
            .post(&self.url)
            .json(&AskBody { question })
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Ok(Reply::Error {
                status: status.as_u16(),
                body,
            });
        }

        let value: serde_json::Value = response.json().await?;
        Ok(Reply::Answer(
            value
                .get("answer")
                .and_then(|answer| answer.as_str())
                .map(str::to_string),
        ))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::Json;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::post;
    use axum::Router;
    use serde_json::{Value, json};

    /// Serve a small fake API on an ephemeral port and return its base URL.
    pub(crate) async fn fake_api() -> String {
        let app = Router::new()
            .route(
                "/ask",
                post(|Json(body): Json<Value>| async move {
                    let question = body["question"].as_str().unwrap_or_default().to_string();
                    Json(json!({ "answer": format!("You asked: {question}") }))
                }),
            )
            .route("/silent", post(|| async { Json(json!({ "sources": [] })) }))
            .route(
                "/down",
                post(|| async {
                    (
                        AxumStatus::SERVICE_UNAVAILABLE,
                        r#"{"error":"indexing failed"}"#,
                    )
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_answer() {
        let base = fake_api().await;
        let client = AskClient::new(&format!("{base}/ask"));

        let reply = client.ask("What do neural networks do?").await.unwrap();
        assert_eq!(
            reply,
            Reply::Answer(Some("You asked: What do neural networks do?".to_string()))
        );
    }

    #[tokio::test]
    async fn test_missing_answer_field() {
        let base = fake_api().await;
        let reply = AskClient::new(&format!("{base}/silent")).ask("q").await.unwrap();
        assert_eq!(reply, Reply::Answer(None));
    }

    #[tokio::test]
    async fn test_error_status_keeps_body() {
        let base = fake_api().await;
        let reply = AskClient::new(&format!("{base}/down")).ask("q").await.unwrap();
        assert_eq!(
            reply,
            Reply::Error {
                status: 503,
                body: r#"{"error":"indexing failed"}"#.to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_unreachable_server_is_error() {
        let client = AskClient::new("http://127.0.0.1:9/ask");
        assert!(client.ask("q").await.is_err());
    }
}
