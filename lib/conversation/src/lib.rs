//! Per-session conversation context for lingochat.
//!
//! This crate provides:
//!
//! - **Topic Catalog**: Supported languages, preambles and seed questions
//! - **Session Store**: Bounded in-memory transcripts keyed by session
//! - **Context Formatter**: Prompt rendering and reply extraction
//! - **Conversation Manager**: Start / continue / reset orchestration

pub mod catalog;
pub mod error;
pub mod formatter;
pub mod manager;
pub mod session;
pub mod turn;

pub use catalog::{CatalogDefinition, LanguageProfile, TopicCatalog};
pub use error::{CatalogError, ConversationError, SessionError};
pub use formatter::{PromptPayload, SamplingConfig, build_prompt, extract_reply};
pub use manager::{ContinueOptions, ConversationConfig, ConversationManager};
pub use session::{
    ConversationInfo, DEFAULT_SESSION_CAPACITY, Session, SessionState, SessionStore,
};
pub use turn::{Speaker, Turn};
