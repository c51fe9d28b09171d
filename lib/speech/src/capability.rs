//! Capability traits consumed by the HTTP layer.

use crate::error::SpeechError;
use async_trait::async_trait;
use bytes::Bytes;
use lingochat_core::LanguageTag;

/// Translates text between languages.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translates `text` from `source` into `target`.
    ///
    /// # Errors
    ///
    /// Returns [`SpeechError::TranslationFailure`] if the service rejects or
    /// cannot complete the request.
    async fn translate(
        &self,
        text: &str,
        source: &LanguageTag,
        target: &LanguageTag,
    ) -> Result<String, SpeechError>;
}

/// Speaks text aloud.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Speaks `text` with the voice configured for `language`.
    ///
    /// # Errors
    ///
    /// Returns [`SpeechError::UnsupportedVoice`] if no voice is configured for
    /// the language, or [`SpeechError::ServiceUnavailable`] if playback fails.
    async fn speak(&self, text: &str, language: &LanguageTag) -> Result<(), SpeechError>;
}

/// Converts recorded audio into text.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Transcribes `audio`, optionally hinting the spoken language.
    ///
    /// # Errors
    ///
    /// Returns [`SpeechError::Unrecognized`] if no speech was found, or
    /// [`SpeechError::ServiceUnavailable`] if the service failed.
    async fn recognize(
        &self,
        audio: Bytes,
        language: Option<&LanguageTag>,
    ) -> Result<String, SpeechError>;
}

/// Identifies the language of a piece of text.
pub trait LanguageDetector: Send + Sync {
    /// Returns the primary language subtag of `text`, e.g. `es`.
    ///
    /// # Errors
    ///
    /// Returns [`SpeechError::UndetectedLanguage`] if the text is blank or no
    /// language can be identified.
    fn detect(&self, text: &str) -> Result<LanguageTag, SpeechError>;
}
