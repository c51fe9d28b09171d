//! Error types for the AI crate.

use std::fmt;

/// Errors from LLM backend operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// Provider is unavailable.
    ProviderUnavailable { provider: String, reason: String },
    /// Request failed.
    RequestFailed { reason: String },
    /// Response parsing failed.
    ResponseParseFailed { reason: String },
    /// The provider returned no usable text.
    EmptyResponse,
    /// Timeout waiting for response.
    Timeout,
    /// Rate limit exceeded.
    RateLimited { retry_after_secs: Option<u64> },
    /// Invalid configuration.
    InvalidConfig { reason: String },
}

impl LlmError {
    /// Classifies a transport error from the HTTP client.
    pub(crate) fn from_transport(provider: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::ProviderUnavailable {
                provider: provider.to_string(),
                reason: err.to_string(),
            }
        } else if err.is_decode() {
            Self::ResponseParseFailed {
                reason: err.to_string(),
            }
        } else {
            Self::RequestFailed {
                reason: err.to_string(),
            }
        }
    }

    /// Classifies a non-success HTTP status.
    pub(crate) fn from_status(
        status: reqwest::StatusCode,
        retry_after_secs: Option<u64>,
        body: &str,
    ) -> Self {
        match status.as_u16() {
            429 => Self::RateLimited { retry_after_secs },
            401 | 403 => Self::InvalidConfig {
                reason: format!("credentials rejected ({status})"),
            },
            _ => Self::RequestFailed {
                reason: format!("{status}: {}", body.trim()),
            },
        }
    }
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProviderUnavailable { provider, reason } => {
                write!(f, "LLM provider '{provider}' unavailable: {reason}")
            }
            Self::RequestFailed { reason } => {
                write!(f, "LLM request failed: {reason}")
            }
            Self::ResponseParseFailed { reason } => {
                write!(f, "failed to parse LLM response: {reason}")
            }
            Self::EmptyResponse => write!(f, "LLM returned an empty response"),
            Self::Timeout => write!(f, "LLM request timed out"),
            Self::RateLimited { retry_after_secs } => {
                if let Some(secs) = retry_after_secs {
                    write!(f, "rate limited, retry after {secs}s")
                } else {
                    write!(f, "rate limited")
                }
            }
            Self::InvalidConfig { reason } => {
                write!(f, "invalid LLM configuration: {reason}")
            }
        }
    }
}

impl std::error::Error for LlmError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_error_display() {
        let err = LlmError::ProviderUnavailable {
            provider: "ollama".to_string(),
            reason: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("ollama"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn rate_limit_display_includes_retry() {
        let err = LlmError::RateLimited {
            retry_after_secs: Some(30),
        };
        assert_eq!(err.to_string(), "rate limited, retry after 30s");
    }

    #[test]
    fn status_classification() {
        let err = LlmError::from_status(reqwest::StatusCode::TOO_MANY_REQUESTS, Some(5), "");
        assert_eq!(
            err,
            LlmError::RateLimited {
                retry_after_secs: Some(5)
            }
        );

        let err = LlmError::from_status(reqwest::StatusCode::FORBIDDEN, None, "denied");
        assert!(matches!(err, LlmError::InvalidConfig { .. }));

        let err = LlmError::from_status(reqwest::StatusCode::BAD_GATEWAY, None, " upstream\n");
        assert_eq!(
            err,
            LlmError::RequestFailed {
                reason: "502 Bad Gateway: upstream".to_string()
            }
        );
    }
}
