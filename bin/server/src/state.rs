//! Shared application state.

use lingochat_conversation::ConversationManager;
use lingochat_core::LanguageTag;
use lingochat_speech::{LanguageDetector, SpeechRecognizer, SpeechSynthesizer, Translator};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    /// Conversation orchestration.
    pub conversations: ConversationManager,
    /// Translation capability.
    pub translator: Arc<dyn Translator>,
    /// Speech output capability.
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    /// Speech input capability.
    pub recognizer: Arc<dyn SpeechRecognizer>,
    /// Language identification.
    pub detector: Arc<dyn LanguageDetector>,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(
        conversations: ConversationManager,
        translator: Arc<dyn Translator>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        recognizer: Arc<dyn SpeechRecognizer>,
        detector: Arc<dyn LanguageDetector>,
    ) -> Self {
        Self {
            conversations,
            translator,
            synthesizer,
            recognizer,
            detector,
        }
    }

    /// Speaks `text` in the background; playback failures are only logged.
    pub fn speak_in_background(&self, text: String, language: LanguageTag) {
        let synthesizer = self.synthesizer.clone();
        tokio::spawn(async move {
            if let Err(e) = synthesizer.speak(&text, &language).await {
                tracing::warn!(error = %e, %language, "Failed to speak text");
            }
        });
    }
}
