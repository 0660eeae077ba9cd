//! Ollama backend implementation
//!
//! HTTP client for the Ollama `/api/generate` endpoint with image input.
//! Uses the prompt library for the extraction instruction.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::prompts::{PromptId, PromptLibrary};

use super::parsing::parse_receipt_response;
use super::types::DraftReceipt;
use super::AIBackend;

/// Default vision model when neither config nor environment names one
const DEFAULT_VISION_MODEL: &str = "llama3.2-vision";

/// Default request timeout for vision calls
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Ollama backend for receipt extraction
///
/// # Configuration
///
/// ```bash
/// export OLLAMA_HOST="http://localhost:11434"
/// export OLLAMA_MODEL="llama3.2-vision:11b"
/// ```
#[derive(Clone)]
pub struct OllamaBackend {
    http_client: Client,
    base_url: String,
    model: String,
    timeout: Duration,
    prompts: Arc<RwLock<PromptLibrary>>,
}

impl OllamaBackend {
    /// Create a new Ollama backend
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            timeout: DEFAULT_TIMEOUT,
            prompts: Arc::new(RwLock::new(PromptLibrary::new())),
        }
    }

    /// Create a new instance with a different model
    pub fn with_model(&self, model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..self.clone()
        }
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Use a specific prompt library (for tests and custom prompt dirs)
    pub fn with_prompts(mut self, prompts: PromptLibrary) -> Self {
        self.prompts = Arc::new(RwLock::new(prompts));
        self
    }

    /// Create from environment variables
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("OLLAMA_HOST").ok()?;
        let model =
            std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| DEFAULT_VISION_MODEL.to_string());
        Some(Self::new(&host, &model))
    }

    /// System and user text of the extraction prompt
    fn extraction_prompt(&self) -> Result<(Option<String>, String)> {
        let mut prompts = self
            .prompts
            .write()
            .map_err(|_| Error::InvalidData("Failed to acquire prompt library lock".into()))?;
        let template = prompts.get(PromptId::ExtractReceipt)?;
        Ok((
            template.system_section().map(str::to_string),
            template.render_user(&HashMap::new()),
        ))
    }
}

/// Request to Ollama API with images (for vision models)
#[derive(Debug, Serialize)]
struct OllamaVisionRequest {
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    prompt: String,
    images: Vec<String>,
    stream: bool,
}

/// Response from Ollama API
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

#[async_trait]
impl AIBackend for OllamaBackend {
    async fn extract_receipt(&self, image_data: &[u8], mime_type: &str) -> Result<DraftReceipt> {
        let (system, prompt) = self.extraction_prompt()?;
        let base64_image = base64::engine::general_purpose::STANDARD.encode(image_data);

        debug!(
            model = %self.model,
            mime_type,
            bytes = image_data.len(),
            "Sending receipt to Ollama"
        );

        let request = OllamaVisionRequest {
            model: self.model.clone(),
            system,
            prompt,
            images: vec![base64_image],
            stream: false,
        };

        let response = self
            .http_client
            .post(format!("{}/api/generate", self.base_url))
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Extraction(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let ollama_response: OllamaResponse = response.json().await?;
        debug!(
            "Ollama receipt extraction response: {}",
            ollama_response.response
        );

        parse_receipt_response(&ollama_response.response)
    }

    async fn health_check(&self) -> bool {
        match self
            .http_client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}
