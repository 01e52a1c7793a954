//! Inference client for OpenAI-compatible chat completions.
//!
//! Talks to a locally hosted text-generation server. Both vLLM and Ollama
//! serve `/v1/chat/completions`, so one client covers either backend.
//! The [`InferenceBackend`] trait is the seam the agent depends on; tests
//! substitute a scripted backend for the HTTP one.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors talking to the inference server.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// Base URL or HTTP client settings are unusable.
    #[error("Invalid inference client configuration: {0}")]
    Config(String),

    /// Connection refused, DNS failure, or timeout.
    #[error("Inference backend unreachable at {url}: {message}")]
    Unreachable { url: String, message: String },

    /// Server answered with a non-success status.
    #[error("Inference request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body was not a chat completion.
    #[error("Failed to decode inference response: {0}")]
    Decode(String),

    /// Completion had no choices.
    #[error("No choices in inference response")]
    EmptyResponse,
}

/// One generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A text-generation service.
pub trait InferenceBackend: Send + Sync {
    /// Generate a completion for the request and return its raw text.
    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> impl Future<Output = Result<String, InferenceError>> + Send;

    /// Check whether the service is reachable.
    fn health_check(&self) -> impl Future<Output = bool> + Send;
}

/// Connection settings for [`HttpInference`].
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Base URL of the server (e.g., "http://localhost:11434")
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// A chat message with role and content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Request body for /v1/chat/completions.
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

/// Response from /v1/chat/completions.
#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// A single choice in the response.
#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// HTTP client for an OpenAI-compatible inference server.
#[derive(Clone)]
pub struct HttpInference {
    client: reqwest::Client,
    base_url: String,
}

impl HttpInference {
    /// Create a new client with the configured timeout.
    pub fn new(config: &InferenceConfig) -> Result<Self, InferenceError> {
        let url = reqwest::Url::parse(&config.base_url)
            .map_err(|e| InferenceError::Config(format!("{}: {}", config.base_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(InferenceError::Config(format!(
                "{}: expected an http or https URL",
                config.base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| InferenceError::Config(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn classify(&self, url: &str, err: reqwest::Error) -> InferenceError {
        if err.is_decode() {
            InferenceError::Decode(err.to_string())
        } else {
            InferenceError::Unreachable {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

impl InferenceBackend for HttpInference {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, InferenceError> {
        let body = ChatRequest {
            model: &request.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system_prompt.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.user_prompt.clone(),
                },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream: false,
        };

        let url = self.completions_url();
        debug!(url = %url, model = %request.model, "Sending chat completion request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify(&url, e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::Status { status, body });
        }

        let chat: ChatResponse = response.json().await.map_err(|e| self.classify(&url, e))?;

        chat.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(InferenceError::EmptyResponse)
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/v1/models", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let config = InferenceConfig {
            base_url: "http://localhost:8000/".to_string(),
            ..Default::default()
        };
        let client = HttpInference::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(
            client.completions_url(),
            "http://localhost:8000/v1/chat/completions"
        );
    }

    #[test]
    fn test_bad_base_url_is_a_config_error() {
        for base_url in ["localhost:11434", "not a url", "ftp://localhost"] {
            let config = InferenceConfig {
                base_url: base_url.to_string(),
                ..Default::default()
            };
            assert!(
                matches!(HttpInference::new(&config), Err(InferenceError::Config(_))),
                "{base_url} should be rejected"
            );
        }
    }

    #[test]
    fn test_default_targets_local_server() {
        let config = InferenceConfig::default();
        assert!(config.base_url.starts_with("http://localhost"));
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_chat_response_decoding() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":"I give 4"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.choices[0].message.content, "I give 4");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_classified() {
        // Port 9 (discard) is closed on CI hosts
        let config = InferenceConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_secs(2),
        };
        let client = HttpInference::new(&config).unwrap();
        let request = GenerationRequest {
            model: "test".to_string(),
            system_prompt: String::new(),
            user_prompt: "hello".to_string(),
            temperature: 0.0,
            max_tokens: 8,
        };

        let err = client.generate(&request).await.unwrap_err();
        assert!(matches!(err, InferenceError::Unreachable { .. }));
        assert!(!client.health_check().await);
    }

    /// Requires an inference server on localhost:11434.
    #[tokio::test]
    #[ignore = "requires external inference server on localhost:11434"]
    async fn test_live_generation() {
        let client = HttpInference::new(&InferenceConfig::default()).unwrap();
        assert!(client.health_check().await);
    }
}
