//! Error types for the conversation crate.
//!
//! - `CatalogError`: Topic catalog lookups and loading
//! - `SessionError`: Session store operations
//! - `ConversationError`: Conversation manager operations, the taxonomy
//!   surfaced to the HTTP boundary

use lingochat_ai::LlmError;
use lingochat_core::{LanguageTag, SessionKey, TopicTag};
use std::fmt;

/// Errors from topic catalog operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// Language is not in the catalog.
    UnsupportedLanguage { language: LanguageTag },
    /// Topic is not offered for the language.
    UnsupportedTopic {
        language: LanguageTag,
        topic: TopicTag,
    },
    /// The catalog definition is inconsistent.
    Invalid { reason: String },
    /// The catalog file could not be read or parsed.
    LoadFailed { path: String, reason: String },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedLanguage { language } => {
                write!(f, "unsupported language: {language}")
            }
            Self::UnsupportedTopic { language, topic } => {
                write!(f, "unsupported topic '{topic}' for language {language}")
            }
            Self::Invalid { reason } => write!(f, "invalid topic catalog: {reason}"),
            Self::LoadFailed { path, reason } => {
                write!(f, "failed to load topic catalog from {path}: {reason}")
            }
        }
    }
}

impl std::error::Error for CatalogError {}

/// Errors from session store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Session not found.
    NotFound { key: SessionKey },
    /// The session was restarted or reset after the caller read it.
    Superseded { key: SessionKey },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { key } => write!(f, "session not found: {key}"),
            Self::Superseded { key } => {
                write!(f, "session {key} was restarted during the request")
            }
        }
    }
}

impl std::error::Error for SessionError {}

/// Errors from conversation manager operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationError {
    /// Language is not in the catalog.
    UnsupportedLanguage { language: LanguageTag },
    /// Topic is not offered for the language.
    UnsupportedTopic {
        language: LanguageTag,
        topic: TopicTag,
    },
    /// No conversation has been started for the session.
    SessionNotFound { key: SessionKey },
    /// The session was restarted or reset while a reply was being generated.
    SessionSuperseded { key: SessionKey },
    /// The user utterance was empty.
    EmptyUtterance,
    /// The generation capability failed.
    GenerationFailure { reason: String },
    /// The generation capability did not answer in time.
    GenerationTimeout { after_ms: u64 },
}

impl fmt::Display for ConversationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedLanguage { language } => {
                write!(f, "unsupported language: {language}")
            }
            Self::UnsupportedTopic { language, topic } => {
                write!(f, "unsupported topic '{topic}' for language {language}")
            }
            Self::SessionNotFound { key } => {
                write!(f, "no conversation started for session {key}")
            }
            Self::SessionSuperseded { key } => {
                write!(f, "session {key} was restarted during the request")
            }
            Self::EmptyUtterance => write!(f, "user text must not be empty"),
            Self::GenerationFailure { reason } => {
                write!(f, "reply generation failed: {reason}")
            }
            Self::GenerationTimeout { after_ms } => {
                write!(f, "reply generation timed out after {after_ms}ms")
            }
        }
    }
}

impl std::error::Error for ConversationError {}

impl From<CatalogError> for ConversationError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::UnsupportedLanguage { language } => Self::UnsupportedLanguage { language },
            CatalogError::UnsupportedTopic { language, topic } => {
                Self::UnsupportedTopic { language, topic }
            }
            other => Self::GenerationFailure {
                reason: other.to_string(),
            },
        }
    }
}

impl From<SessionError> for ConversationError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound { key } => Self::SessionNotFound { key },
            SessionError::Superseded { key } => Self::SessionSuperseded { key },
        }
    }
}

impl ConversationError {
    /// Classifies a backend failure for a request bounded by `timeout_ms`.
    pub(crate) fn from_llm(err: LlmError, timeout_ms: u64) -> Self {
        match err {
            LlmError::Timeout => Self::GenerationTimeout {
                after_ms: timeout_ms,
            },
            other => Self::GenerationFailure {
                reason: other.to_string(),
            },
        }
    }
}
