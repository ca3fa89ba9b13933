//! Ollama chat client
//!
//! Streams `POST /api/chat` and assembles the reply from NDJSON frames.
//! Tokens can be forwarded to a sink as they arrive so the terminal renders
//! the reply live while the core still receives one complete string.

use super::parser::FrameParser;
use crate::collaborators::ModelCollaborator;
use crate::errors::{AgentError, Result};
use crate::types::ChatMessage;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Default Ollama API endpoint
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

pub const DEFAULT_MODEL: &str = "qwen2.5-coder:7b";

/// Whole-request timeout; generation on a local model can be slow
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Receives reply fragments while a completion streams
pub type TokenSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Streaming client for a local Ollama server
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: Arc<RwLock<String>>,
    temperature: Option<f32>,
    sink: Option<TokenSink>,
}

impl OllamaClient {
    pub fn new() -> Result<Self> {
        Self::with_config(DEFAULT_OLLAMA_URL, DEFAULT_MODEL, DEFAULT_REQUEST_TIMEOUT_SECS)
    }

    pub fn with_config(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(AgentError::HttpError)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: Arc::new(RwLock::new(model.to_string())),
            temperature: None,
            sink: None,
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Forward streamed tokens to `sink`
    pub fn with_token_sink(mut self, sink: TokenSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn model(&self) -> String {
        self.model
            .read()
            .map(|m| m.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Switch the model used by later completions
    pub fn set_model(&self, model: &str) {
        match self.model.write() {
            Ok(mut current) => *current = model.to_string(),
            Err(poisoned) => *poisoned.into_inner() = model.to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if Ollama answers at all
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/api/version", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// Names of locally installed models
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AgentError::ModelUnavailable(format!("Failed to list models: {}", e)))?;

        if !response.status().is_success() {
            return Err(AgentError::OllamaApiError(format!(
                "HTTP {} while listing models",
                response.status()
            )));
        }

        let models: ModelsResponse = response
            .json()
            .await
            .map_err(|e| AgentError::OllamaApiError(format!("Failed to parse models: {}", e)))?;

        Ok(models.models.into_iter().map(|m| m.name).collect())
    }

    /// Stream one chat completion and return the full reply
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);
        let request = ChatRequest {
            model: self.model(),
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            stream: true,
            options: self.temperature.map(|temperature| ChatOptions { temperature }),
        };

        tracing::debug!(model = %request.model, messages = messages.len(), "sending chat request");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::ModelUnavailable(format!("Cannot reach Ollama at {}: {}", self.base_url, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AgentError::OllamaApiError(format!("HTTP {}: {}", status, error_text)));
        }

        let mut parser = FrameParser::new();
        let mut reply = String::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| AgentError::StreamingError(e.to_string()))?;
            for frame in parser.push(&chunk)? {
                if let Some(error) = frame.error {
                    return Err(AgentError::OllamaApiError(error));
                }
                self.emit(frame.token(), &mut reply);
                if frame.done {
                    return Self::finish(reply);
                }
            }
        }

        if let Some(frame) = parser.finish()? {
            if let Some(error) = frame.error {
                return Err(AgentError::OllamaApiError(error));
            }
            self.emit(frame.token(), &mut reply);
        }
        Self::finish(reply)
    }

    fn emit(&self, token: &str, reply: &mut String) {
        if token.is_empty() {
            return;
        }
        if let Some(sink) = &self.sink {
            sink(token);
        }
        reply.push_str(token);
    }

    fn finish(reply: String) -> Result<String> {
        if reply.trim().is_empty() {
            return Err(AgentError::ModelUnavailable("model returned an empty reply".to_string()));
        }
        tracing::debug!(chars = reply.len(), "chat reply complete");
        Ok(reply)
    }
}

impl std::fmt::Debug for OllamaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model())
            .field("temperature", &self.temperature)
            .field("streams_tokens", &self.sink.is_some())
            .finish()
    }
}

#[async_trait]
impl ModelCollaborator for OllamaClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.chat(messages).await
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: String,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ChatOptions>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_client_creation() {
        let client = OllamaClient::new().unwrap();
        assert_eq!(client.model(), DEFAULT_MODEL);
        assert_eq!(client.base_url(), DEFAULT_OLLAMA_URL);
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = OllamaClient::with_config("http://localhost:11434/", "llama3", 10).unwrap();
        assert_eq!(client.base_url(), "http://localhost:11434");
    }

    #[test]
    fn test_model_switch_is_shared_between_clones() {
        let client = OllamaClient::new().unwrap();
        let clone = client.clone();
        clone.set_model("codellama:13b");
        assert_eq!(client.model(), "codellama:13b");
    }

    #[test]
    fn test_emit_forwards_to_sink() {
        let seen = Arc::new(Mutex::new(String::new()));
        let captured = Arc::clone(&seen);
        let client = OllamaClient::new()
            .unwrap()
            .with_token_sink(Arc::new(move |t| captured.lock().unwrap().push_str(t)));

        let mut reply = String::new();
        client.emit("Hel", &mut reply);
        client.emit("", &mut reply);
        client.emit("lo", &mut reply);

        assert_eq!(reply, "Hello");
        assert_eq!(*seen.lock().unwrap(), "Hello");
    }

    #[test]
    fn test_blank_reply_is_unavailable() {
        let err = OllamaClient::finish("  \n".to_string()).unwrap_err();
        assert!(err.is_collaborator_unavailable());
    }

    #[test]
    fn test_request_serialization() {
        let request = ChatRequest {
            model: "m".to_string(),
            messages: vec![WireMessage {
                role: "user",
                content: "hi",
            }],
            stream: true,
            options: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["stream"], true);
        assert!(json.get("options").is_none());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_model_unavailable() {
        let client = OllamaClient::with_config("http://127.0.0.1:9", "m", 2).unwrap();
        let err = client.chat(&[ChatMessage::user("hi")]).await.unwrap_err();
        assert!(matches!(err, AgentError::ModelUnavailable(_)));
    }
}
