//! Error types for the speech crate.

use lingochat_core::LanguageTag;
use std::fmt;

/// Errors from translation, synthesis and recognition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechError {
    /// No voice is configured for the language.
    UnsupportedVoice { language: LanguageTag },
    /// The translation service failed.
    TranslationFailure { reason: String },
    /// The audio contained no recognisable speech.
    Unrecognized,
    /// The text's language could not be identified.
    UndetectedLanguage,
    /// A speech service could not be reached or rejected the request.
    ServiceUnavailable { reason: String },
    /// Invalid configuration.
    InvalidConfig { reason: String },
}

impl SpeechError {
    pub(crate) fn service(err: impl fmt::Display) -> Self {
        Self::ServiceUnavailable {
            reason: err.to_string(),
        }
    }
}

impl fmt::Display for SpeechError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedVoice { language } => {
                write!(f, "no voice configured for language {language}")
            }
            Self::TranslationFailure { reason } => write!(f, "translation failed: {reason}"),
            Self::Unrecognized => write!(f, "no speech recognised in audio"),
            Self::UndetectedLanguage => write!(f, "could not identify the text's language"),
            Self::ServiceUnavailable { reason } => {
                write!(f, "speech service unavailable: {reason}")
            }
            Self::InvalidConfig { reason } => {
                write!(f, "invalid speech configuration: {reason}")
            }
        }
    }
}

impl std::error::Error for SpeechError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SpeechError::UnsupportedVoice {
            language: "de-DE".parse().expect("tag"),
        };
        assert_eq!(err.to_string(), "no voice configured for language de-DE");
        assert_eq!(
            SpeechError::service("connection refused").to_string(),
            "speech service unavailable: connection refused"
        );
    }
}
