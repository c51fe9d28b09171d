//! Transcript turns.

use chrono::{DateTime, Utc};
use lingochat_ai::LlmMessage;
use lingochat_core::TurnId;
use serde::{Deserialize, Serialize};

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// The learner.
    User,
    /// The conversation partner played by the model.
    Assistant,
}

/// One utterance in a transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Unique turn identifier.
    pub id: TurnId,
    /// Who spoke.
    pub speaker: Speaker,
    /// What was said.
    pub text: String,
    /// When the turn was recorded.
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// Creates a new turn.
    #[must_use]
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            id: TurnId::new(),
            speaker,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    /// Creates a user turn.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Speaker::User, text)
    }

    /// Creates an assistant turn.
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Speaker::Assistant, text)
    }

    /// Converts the turn into a chat message for structured backends.
    #[must_use]
    pub fn to_message(&self) -> LlmMessage {
        match self.speaker {
            Speaker::User => LlmMessage::user(self.text.clone()),
            Speaker::Assistant => LlmMessage::assistant(self.text.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lingochat_ai::MessageRole;

    #[test]
    fn turn_creation() {
        let turn = Turn::user("Tengo dos hermanos.");
        assert_eq!(turn.speaker, Speaker::User);
        assert_eq!(turn.text, "Tengo dos hermanos.");
    }

    #[test]
    fn turn_ids_are_unique() {
        assert_ne!(Turn::assistant("a").id, Turn::assistant("a").id);
    }

    #[test]
    fn turn_maps_to_message_role() {
        assert_eq!(Turn::user("hi").to_message().role, MessageRole::User);
        let message = Turn::assistant("Bonjour").to_message();
        assert_eq!(message.role, MessageRole::Assistant);
        assert_eq!(message.content, "Bonjour");
    }

    #[test]
    fn speaker_serializes_lowercase() {
        let json = serde_json::to_string(&Speaker::Assistant).expect("serialize");
        assert_eq!(json, "\"assistant\"");
    }
}
