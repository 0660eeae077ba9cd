//! Test utilities for larder-core
//!
//! This module provides a mock Ollama server that answers vision requests
//! with a canned receipt, for development and integration tests.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Model reply for the stock receipt, fenced the way vision models often answer
pub const MARTX_REPLY: &str = r#"Here is the receipt:
```json
{"store": "MartX", "date": "2024-03-01", "total": 12.75,
 "items": [
   {"name": "Milk", "price": 5.00, "quantity": 1},
   {"name": "milk ", "price": "5.00", "quantity": "1"},
   {"name": "Service Charge", "price": 1.50, "quantity": 1},
   {"name": "Store Discount", "price": -0.75, "quantity": 1},
   {"name": "Sourdough", "price": 2.00}
 ]}
```"#;

/// Mock Ollama server for testing and development
pub struct MockOllamaServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

#[derive(Clone)]
struct MockState {
    /// Text placed in the `response` field; None makes /api/generate fail
    reply: Option<Arc<String>>,
}

impl MockOllamaServer {
    /// Start the mock server on an available port, replying with the stock receipt
    pub async fn start() -> Self {
        Self::start_with_reply(MARTX_REPLY).await
    }

    /// Start a server whose model always answers with `reply`
    pub async fn start_with_reply(reply: &str) -> Self {
        Self::start_with_state(MockState {
            reply: Some(Arc::new(reply.to_string())),
        })
        .await
    }

    /// Start a server whose generate endpoint returns HTTP 500
    pub async fn start_failing() -> Self {
        Self::start_with_state(MockState { reply: None }).await
    }

    async fn start_with_state(state: MockState) -> Self {
        let app = Router::new()
            .route("/api/tags", get(handle_tags))
            .route("/api/generate", post(handle_generate))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockOllamaServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Ollama tags endpoint response (health check)
async fn handle_tags() -> Json<TagsResponse> {
    Json(TagsResponse {
        models: vec![ModelInfo {
            name: "llama3.2-vision:latest".to_string(),
            modified_at: "2024-01-01T00:00:00Z".to_string(),
            size: 7_900_000_000,
        }],
    })
}

/// Ollama generate endpoint
async fn handle_generate(
    State(state): State<MockState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, (StatusCode, String)> {
    let Some(reply) = state.reply else {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            "model runner crashed".to_string(),
        ));
    };

    // Vision requests must carry the image and both parts of the extraction prompt
    let has_system = request
        .system
        .as_deref()
        .is_some_and(|s| s.contains("grocery receipts"));
    if request.images.is_empty() || !has_system || !request.prompt.contains("JSON ONLY") {
        return Err((
            StatusCode::BAD_REQUEST,
            "expected an image and the receipt prompt".to_string(),
        ));
    }

    Ok(Json(GenerateResponse {
        model: request.model,
        response: reply.to_string(),
        done: true,
    }))
}

#[derive(Debug, Serialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Debug, Serialize)]
struct ModelInfo {
    name: String,
    modified_at: String,
    size: u64,
}

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    model: String,
    #[serde(default)]
    system: Option<String>,
    prompt: String,
    #[serde(default)]
    images: Vec<String>,
    #[allow(dead_code)]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct GenerateResponse {
    model: String,
    response: String,
    done: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AIBackend, OllamaBackend};
    use crate::prompts::PromptLibrary;

    fn client(server: &MockOllamaServer) -> OllamaBackend {
        OllamaBackend::new(&server.url(), "test-model").with_prompts(PromptLibrary::embedded_only())
    }

    #[tokio::test]
    async fn test_mock_server_health_check() {
        let server = MockOllamaServer::start().await;
        assert!(client(&server).health_check().await);
    }

    #[tokio::test]
    async fn test_extract_fenced_receipt() {
        let server = MockOllamaServer::start().await;

        let draft = client(&server)
            .extract_receipt(b"fake-jpeg", "image/jpeg")
            .await
            .unwrap();

        assert_eq!(draft.store.as_deref(), Some("MartX"));
        assert_eq!(draft.total, Some(12.75));
        assert_eq!(draft.items.len(), 5);
        // Names trimmed, string numbers coerced, missing quantity defaults to 1
        assert_eq!(draft.items[1].name, "milk");
        assert_eq!(draft.items[1].price, 5.0);
        assert_eq!(draft.items[4].quantity, 1.0);
    }

    #[tokio::test]
    async fn test_extract_invalid_json() {
        let server = MockOllamaServer::start_with_reply("I can't read this receipt, sorry").await;

        let err = client(&server)
            .extract_receipt(b"blurry", "image/jpeg")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Extraction);
    }

    #[tokio::test]
    async fn test_extract_server_error() {
        let server = MockOllamaServer::start_failing().await;

        let err = client(&server)
            .extract_receipt(b"img", "image/png")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Extraction);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_extraction_error() {
        // Nothing listens on the discard port
        let backend = OllamaBackend::new("http://127.0.0.1:9", "test-model")
            .with_prompts(PromptLibrary::embedded_only());

        let err = backend
            .extract_receipt(b"img", "image/png")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Extraction);
    }
}
