//! Pluggable vision backend abstraction (the extraction adapter)
//!
//! This module provides a backend-agnostic interface for reading receipt
//! images. Backends send the image with the extraction prompt to a vision
//! model and normalize the reply into a `DraftReceipt`.
//!
//! # Architecture
//!
//! - `AIBackend` trait: defines the interface for all backends
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `OllamaBackend`, `OpenAICompatibleBackend`, `MockBackend`
//!
//! # Usage
//!
//! ```rust,ignore
//! let ai = AIClient::from_env().expect("OLLAMA_HOST not set");
//! let draft = ai.extract_receipt(&image_bytes, "image/jpeg").await?;
//! println!("{} items from {:?}", draft.items.len(), draft.store);
//! ```
//!
//! # Configuration
//!
//! Environment variables:
//! - `AI_BACKEND`: Backend to use (ollama, openai_compatible, mock). Default: ollama
//! - `OLLAMA_HOST`: Ollama server URL (required for ollama backend)
//! - `OLLAMA_MODEL`: Model name (default: llama3.2-vision)
//! - `OPENAI_COMPATIBLE_HOST`: Server URL (required for openai_compatible backend)
//! - `OPENAI_COMPATIBLE_MODEL`: Model name (default: gpt-4o-mini)
//! - `OPENAI_COMPATIBLE_API_KEY`: API key if required (optional)
//!
//! A single attempt is made per call. Dropping the returned future cancels
//! the request; nothing is persisted by this module.

mod mock;
mod ollama;
mod openai_compatible;
pub mod parsing;
pub mod types;

pub use mock::MockBackend;
pub use ollama::OllamaBackend;
pub use openai_compatible::OpenAICompatibleBackend;
pub use types::*;

use async_trait::async_trait;

use crate::config::ExtractionConfig;
use crate::error::Result;

/// Trait defining the interface for all extraction backends
///
/// Backends should be Send + Sync to allow use across async tasks.
#[async_trait]
pub trait AIBackend: Send + Sync {
    /// Read a receipt image and return the normalized draft
    ///
    /// Fails with `Error::Extraction` when the service cannot be reached or
    /// its output is not a JSON object.
    async fn extract_receipt(&self, image_data: &[u8], mime_type: &str) -> Result<DraftReceipt>;

    /// Check if the backend is available
    async fn health_check(&self) -> bool;

    /// Get the model name (for logging)
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete AI client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum AIClient {
    /// Ollama backend (HTTP API)
    Ollama(OllamaBackend),
    /// OpenAI-compatible backend (vLLM, LocalAI, llama-server, hosted APIs)
    OpenAICompatible(OpenAICompatibleBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl AIClient {
    /// Create an AI client from environment variables
    ///
    /// Returns None if the required environment variables are not set.
    pub fn from_env() -> Option<Self> {
        let backend = std::env::var("AI_BACKEND").unwrap_or_else(|_| "ollama".to_string());

        match backend.to_lowercase().as_str() {
            "ollama" => OllamaBackend::from_env().map(AIClient::Ollama),
            "openai_compatible" | "openai" | "vllm" | "localai" | "llamacpp" => {
                OpenAICompatibleBackend::from_env().map(AIClient::OpenAICompatible)
            }
            "mock" => Some(AIClient::Mock(MockBackend::new())),
            _ => {
                tracing::warn!(backend = %backend, "Unknown AI_BACKEND, falling back to ollama");
                OllamaBackend::from_env().map(AIClient::Ollama)
            }
        }
    }

    /// Create from the environment, then apply the extraction settings
    ///
    /// The configured vision model replaces the environment model for Ollama.
    pub fn from_config(config: &ExtractionConfig) -> Option<Self> {
        Self::from_env().map(|client| client.with_settings(config))
    }

    /// Apply timeout and vision model settings
    pub fn with_settings(self, config: &ExtractionConfig) -> Self {
        match self {
            AIClient::Ollama(b) => {
                let b = match config.vision_model.as_deref() {
                    Some(model) => b.with_model(model),
                    None => b,
                };
                AIClient::Ollama(b.with_timeout(config.timeout))
            }
            AIClient::OpenAICompatible(b) => {
                AIClient::OpenAICompatible(b.with_timeout(config.timeout))
            }
            AIClient::Mock(b) => AIClient::Mock(b),
        }
    }

    /// Create an Ollama backend directly
    pub fn ollama(host: &str, model: &str) -> Self {
        AIClient::Ollama(OllamaBackend::new(host, model))
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }

    /// Name of the backend variant (for status output)
    pub fn backend_name(&self) -> &'static str {
        match self {
            AIClient::Ollama(_) => "ollama",
            AIClient::OpenAICompatible(_) => "openai_compatible",
            AIClient::Mock(_) => "mock",
        }
    }
}

#[async_trait]
impl AIBackend for AIClient {
    async fn extract_receipt(&self, image_data: &[u8], mime_type: &str) -> Result<DraftReceipt> {
        match self {
            AIClient::Ollama(b) => b.extract_receipt(image_data, mime_type).await,
            AIClient::OpenAICompatible(b) => b.extract_receipt(image_data, mime_type).await,
            AIClient::Mock(b) => b.extract_receipt(image_data, mime_type).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AIClient::Ollama(b) => b.health_check().await,
            AIClient::OpenAICompatible(b) => b.health_check().await,
            AIClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AIClient::Ollama(b) => b.model(),
            AIClient::OpenAICompatible(b) => b.model(),
            AIClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::Ollama(b) => b.host(),
            AIClient::OpenAICompatible(b) => b.host(),
            AIClient::Mock(b) => b.host(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_mock_client_dispatch() {
        let client = AIClient::mock();
        assert!(client.health_check().await);
        assert_eq!(client.backend_name(), "mock");

        let draft = client.extract_receipt(b"img", "image/png").await.unwrap();
        assert!(!draft.items.is_empty());
    }

    #[test]
    fn test_with_settings_overrides_ollama_model() {
        let config = ExtractionConfig {
            vision_model: Some("llava:13b".to_string()),
            timeout: Duration::from_secs(5),
        };
        let client = AIClient::ollama("http://localhost:11434", "llama3.2").with_settings(&config);
        assert_eq!(client.model(), "llava:13b");
        assert_eq!(client.host(), "http://localhost:11434");
    }
}
