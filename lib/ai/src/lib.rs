//! Text generation backends for lingochat.
//!
//! The conversation core talks to a language model only through the
//! [`LlmBackend`] trait. Two implementations are provided:
//!
//! - **Gemini**: hosted generative API, chat-style structured history
//! - **Ollama**: locally served causal model, raw text continuation

pub mod backend;
pub mod error;
pub mod gemini;
pub mod ollama;

pub use backend::{
    LlmBackend, LlmBackendConfig, LlmMessage, LlmProvider, LlmRequest, LlmResponse, MessageRole,
    TokenUsage, create_backend,
};
pub use error::LlmError;
pub use gemini::GeminiBackend;
pub use ollama::OllamaBackend;
