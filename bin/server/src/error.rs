//! Domain error types for server operations.
//!
//! [`ApiError`] maps library errors onto HTTP responses with a user-safe
//! message; internal detail is logged, not returned. [`StartupError`] is the
//! context for reports raised while bringing the server up.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lingochat_conversation::ConversationError;
use lingochat_speech::SpeechError;
use serde_json::json;
use std::fmt;

/// Errors returned by request handlers.
#[derive(Debug)]
pub enum ApiError {
    /// The request is missing a field or has a malformed value.
    BadRequest(String),
    /// A conversation operation failed.
    Conversation(ConversationError),
    /// A translation or speech operation failed.
    Speech(SpeechError),
}

impl ApiError {
    /// Builds a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message.clone()),
            Self::Conversation(err) => match err {
                ConversationError::UnsupportedLanguage { .. }
                | ConversationError::UnsupportedTopic { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
                }
                ConversationError::EmptyUtterance => (StatusCode::BAD_REQUEST, err.to_string()),
                ConversationError::SessionNotFound { .. } => {
                    (StatusCode::NOT_FOUND, err.to_string())
                }
                ConversationError::SessionSuperseded { .. } => {
                    (StatusCode::CONFLICT, err.to_string())
                }
                ConversationError::GenerationFailure { reason } => {
                    tracing::error!(%reason, "reply generation failed");
                    (
                        StatusCode::BAD_GATEWAY,
                        "Could not generate a reply".to_string(),
                    )
                }
                ConversationError::GenerationTimeout { .. } => (
                    StatusCode::GATEWAY_TIMEOUT,
                    "Reply generation timed out".to_string(),
                ),
            },
            Self::Speech(err) => match err {
                SpeechError::UnsupportedVoice { .. }
                | SpeechError::Unrecognized
                | SpeechError::UndetectedLanguage => {
                    (StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
                }
                SpeechError::TranslationFailure { reason } => {
                    tracing::error!(%reason, "translation failed");
                    (StatusCode::BAD_GATEWAY, "Translation failed".to_string())
                }
                SpeechError::ServiceUnavailable { reason } => {
                    tracing::error!(%reason, "speech service unavailable");
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "Speech service unavailable".to_string(),
                    )
                }
                SpeechError::InvalidConfig { reason } => {
                    tracing::error!(%reason, "speech service misconfigured");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal server error".to_string(),
                    )
                }
            },
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadRequest(message) => write!(f, "bad request: {message}"),
            Self::Conversation(err) => write!(f, "{err}"),
            Self::Speech(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<ConversationError> for ApiError {
    fn from(err: ConversationError) -> Self {
        Self::Conversation(err)
    }
}

impl From<SpeechError> for ApiError {
    fn from(err: SpeechError) -> Self {
        Self::Speech(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Errors that prevent the server from starting or keep it from running.
#[derive(Debug)]
pub enum StartupError {
    /// Configuration could not be loaded.
    Config { details: String },
    /// The topic catalog could not be loaded.
    Catalog { details: String },
    /// A capability client could not be built.
    Capability { name: &'static str, details: String },
    /// The listener could not be bound.
    Bind { addr: String, details: String },
    /// The server stopped with an error.
    Serve { details: String },
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { details } => write!(f, "failed to load configuration: {details}"),
            Self::Catalog { details } => write!(f, "failed to load topic catalog: {details}"),
            Self::Capability { name, details } => {
                write!(f, "failed to initialise {name}: {details}")
            }
            Self::Bind { addr, details } => write!(f, "failed to bind {addr}: {details}"),
            Self::Serve { details } => write!(f, "server error: {details}"),
        }
    }
}

impl std::error::Error for StartupError {}

#[cfg(test)]
mod tests {
    use super::*;
    use lingochat_core::SessionKey;

    fn status(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn conversation_errors_map_to_status_codes() {
        let key = SessionKey::new("s1").expect("key");
        assert_eq!(
            status(ConversationError::SessionNotFound { key: key.clone() }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(ConversationError::SessionSuperseded { key }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(ConversationError::UnsupportedLanguage {
                language: "de-DE".parse().expect("tag")
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status(ConversationError::GenerationTimeout { after_ms: 10 }),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status(ConversationError::GenerationFailure {
                reason: "x".to_string()
            }),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn speech_errors_map_to_status_codes() {
        assert_eq!(status(SpeechError::Unrecognized), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            status(SpeechError::UndetectedLanguage),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status(SpeechError::TranslationFailure {
                reason: "quota".to_string()
            }),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let err = ApiError::from(ConversationError::GenerationFailure {
            reason: "api key sk-123 rejected".to_string(),
        });
        let (_, message) = err.status_and_message();
        assert!(!message.contains("sk-123"));
    }

    #[test]
    fn startup_error_display() {
        let err = StartupError::Bind {
            addr: "127.0.0.1:5001".to_string(),
            details: "address in use".to_string(),
        };
        assert_eq!(err.to_string(), "failed to bind 127.0.0.1:5001: address in use");
    }
}
