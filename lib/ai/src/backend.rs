//! LLM backend abstraction.
//!
//! Provides a unified interface for a hosted generative API and a locally
//! served causal language model.

use crate::error::LlmError;
use crate::gemini::GeminiBackend;
use crate::ollama::OllamaBackend;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Available LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    /// Google Gemini generative language API.
    #[default]
    Gemini,
    /// Local Ollama instance.
    Ollama,
}

impl LlmProvider {
    /// Returns the provider's well-known base URL.
    #[must_use]
    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::Gemini => "https://generativelanguage.googleapis.com",
            Self::Ollama => "http://localhost:11434",
        }
    }

    /// Returns the provider's default model.
    #[must_use]
    pub fn default_model(self) -> &'static str {
        match self {
            Self::Gemini => "gemini-1.5-flash",
            Self::Ollama => "llama3.2",
        }
    }

    /// Returns the provider name used in logs and errors.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Ollama => "ollama",
        }
    }
}

/// Configuration for an LLM backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmBackendConfig {
    /// The provider type.
    #[serde(default)]
    pub provider: LlmProvider,
    /// Base URL for the API; the provider default when unset.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Model identifier; the provider default when unset.
    #[serde(default)]
    pub model: Option<String>,
    /// API key (if required).
    #[serde(default)]
    pub api_key: Option<String>,
    /// Transport-level timeout for a single HTTP exchange, in seconds.
    #[serde(default = "default_http_timeout_seconds")]
    pub http_timeout_seconds: u64,
}

fn default_http_timeout_seconds() -> u64 {
    120
}

impl Default for LlmBackendConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            base_url: None,
            model: None,
            api_key: None,
            http_timeout_seconds: default_http_timeout_seconds(),
        }
    }
}

impl LlmBackendConfig {
    /// Creates a new Gemini backend configuration.
    #[must_use]
    pub fn gemini(api_key: impl Into<String>) -> Self {
        Self {
            provider: LlmProvider::Gemini,
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Creates a new Ollama backend configuration.
    #[must_use]
    pub fn ollama(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: LlmProvider::Ollama,
            base_url: Some(base_url.into()),
            model: Some(model.into()),
            ..Self::default()
        }
    }

    /// Returns the effective base URL, without a trailing slash.
    #[must_use]
    pub fn resolved_base_url(&self) -> String {
        self.base_url
            .as_deref()
            .unwrap_or(self.provider.default_base_url())
            .trim_end_matches('/')
            .to_string()
    }

    /// Returns the effective model name.
    #[must_use]
    pub fn resolved_model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }

    /// Builds the HTTP client shared by all requests to this backend.
    pub(crate) fn http_client(&self) -> Result<reqwest::Client, LlmError> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.http_timeout_seconds))
            .build()
            .map_err(|e| LlmError::InvalidConfig {
                reason: e.to_string(),
            })
    }
}

/// A request to an LLM.
///
/// Carries the conversation twice: `prompt` is the fully rendered text for
/// completion-style backends, `messages` the same turns in structured form
/// for chat-style backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    /// The fully rendered prompt text.
    pub prompt: String,
    /// System prompt, if any.
    pub system: Option<String>,
    /// Conversation turns in chronological order.
    pub messages: Vec<LlmMessage>,
    /// Sequences that end generation when produced.
    pub stop: Vec<String>,
    /// Temperature for sampling (0.0 - 1.0).
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
}

impl LlmRequest {
    /// Creates a new simple request with just a prompt.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            messages: Vec::new(),
            stop: Vec::new(),
            temperature: None,
            max_tokens: None,
        }
    }

    /// Adds a system prompt.
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Adds the structured conversation.
    #[must_use]
    pub fn with_messages(mut self, messages: Vec<LlmMessage>) -> Self {
        self.messages = messages;
        self
    }

    /// Adds a stop sequence.
    #[must_use]
    pub fn with_stop(mut self, stop: impl Into<String>) -> Self {
        self.stop.push(stop.into());
        self
    }

    /// Sets the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the max tokens.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmMessage {
    /// The role of the message sender.
    pub role: MessageRole,
    /// The content of the message.
    pub content: String,
}

impl LlmMessage {
    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Creates an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User/human message.
    User,
    /// Assistant/AI message.
    Assistant,
}

/// A response from an LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// The raw generated text.
    pub content: String,
    /// Token usage statistics.
    pub usage: TokenUsage,
    /// Model that generated the response.
    pub model: String,
}

/// Token usage statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of input tokens.
    pub input_tokens: u32,
    /// Number of output tokens.
    pub output_tokens: u32,
}

impl TokenUsage {
    /// Returns the total number of tokens.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Trait for LLM backends.
///
/// This trait defines the interface that all LLM providers must implement.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Generates a response for the given request.
    ///
    /// # Errors
    ///
    /// Returns an error if the LLM call fails.
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Returns the provider type.
    fn provider(&self) -> LlmProvider;

    /// Returns the model name.
    fn model(&self) -> &str;
}

/// Builds the backend selected by `config`.
///
/// # Errors
///
/// Returns an error if the configuration is incomplete for the provider.
pub fn create_backend(config: &LlmBackendConfig) -> Result<Arc<dyn LlmBackend>, LlmError> {
    let backend: Arc<dyn LlmBackend> = match config.provider {
        LlmProvider::Gemini => Arc::new(GeminiBackend::new(config)?),
        LlmProvider::Ollama => Arc::new(OllamaBackend::new(config)?),
    };
    tracing::info!(
        provider = backend.provider().as_str(),
        model = backend.model(),
        "LLM backend configured"
    );
    Ok(backend)
}

/// Reads a `Retry-After` header expressed in seconds.
pub(crate) fn retry_after_secs(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
