//! Prompt rendering and reply extraction.
//!
//! A transcript is rendered as the language's preamble followed by one
//! `"{label}: {text}"` line per turn, ending with an open assistant marker:
//!
//! ```text
//! The following is a casual conversation between 2 people that speak English.
//! Alicia: How many people are in your family?
//! Student: I have three siblings.
//! Alicia:
//! ```
//!
//! Completion models continue from the open marker and often echo the prompt
//! or run on into the next user turn; [`extract_reply`] recovers only the
//! newly generated assistant segment.

use crate::catalog::TopicCatalog;
use crate::error::ConversationError;
use crate::session::Session;
use crate::turn::{Speaker, Turn};
use lingochat_ai::{LlmMessage, LlmRequest};
use serde::{Deserialize, Serialize};

/// Sampling settings applied to every generation request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Sampling temperature.
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

/// The exact payload handed to the generation capability for one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptPayload {
    /// Fully rendered prompt text, ending with the open assistant marker.
    pub text: String,
    /// The language preamble.
    pub system: String,
    /// The transcript in structured form.
    pub messages: Vec<LlmMessage>,
    /// Marker that opens an assistant turn, e.g. `Alicia:`.
    pub assistant_marker: String,
    /// Marker that opens a user turn, e.g. `Student:`.
    pub user_marker: String,
    /// Rendered transcript lines, used to recognise an echoed prompt.
    turn_lines: Vec<String>,
}

impl PromptPayload {
    /// Builds the backend request for this payload.
    #[must_use]
    pub fn to_request(&self, sampling: &SamplingConfig) -> LlmRequest {
        let mut request = LlmRequest::new(self.text.clone())
            .with_system(self.system.clone())
            .with_messages(self.messages.clone())
            .with_stop(format!("\n{}", self.user_marker));
        if let Some(temperature) = sampling.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = sampling.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        request
    }
}

fn render_line(label: &str, text: &str) -> String {
    format!("{label}: {}", text.trim())
}

/// Renders a session's transcript into a prompt.
///
/// Deterministic in the transcript and the catalog entry for the session's
/// language.
///
/// # Errors
///
/// Returns [`ConversationError::SessionNotFound`] if no conversation has been
/// started, or [`ConversationError::UnsupportedLanguage`] if the session's
/// language is missing from the catalog.
pub fn build_prompt(
    session: &Session,
    catalog: &TopicCatalog,
) -> Result<PromptPayload, ConversationError> {
    let conversation =
        session
            .conversation
            .as_ref()
            .ok_or_else(|| ConversationError::SessionNotFound {
                key: session.key.clone(),
            })?;
    let preamble = catalog.preamble(&conversation.language)?.trim();
    let (assistant, user) = catalog.speakers(&conversation.language)?;

    let label = |turn: &Turn| match turn.speaker {
        Speaker::User => user,
        Speaker::Assistant => assistant,
    };

    let turn_lines: Vec<String> = session
        .transcript
        .iter()
        .map(|turn| render_line(label(turn), &turn.text))
        .collect();

    let mut lines = Vec::with_capacity(turn_lines.len() + 2);
    lines.push(preamble.to_string());
    lines.extend(turn_lines.iter().cloned());

    let assistant_marker = format!("{assistant}:");
    lines.push(assistant_marker.clone());

    Ok(PromptPayload {
        text: lines.join("\n"),
        system: preamble.to_string(),
        messages: session.transcript.iter().map(Turn::to_message).collect(),
        assistant_marker,
        user_marker: format!("{user}:"),
        turn_lines,
    })
}

/// Finds the end of the longest trailing run of transcript lines echoed in
/// `raw_output`.
fn echoed_tail_end(raw_output: &str, turn_lines: &[String]) -> Option<usize> {
    (0..turn_lines.len()).find_map(|start| {
        let tail = turn_lines[start..].join("\n");
        raw_output.find(&tail).map(|i| i + tail.len())
    })
}

/// Recovers the assistant's newly generated reply from raw model output.
///
/// - If the output echoes the prompt, everything up to the open assistant
///   marker that follows the echoed transcript is discarded. A loose echo is
///   matched on the longest trailing run of transcript lines it contains, so
///   a repeated learner line does not anchor on an earlier turn.
/// - Otherwise, if the output contains the assistant marker before any user
///   marker, the text after it is taken.
/// - If the output contains no assistant marker at all, the whole output is
///   returned trimmed.
///
/// The selected segment is cut at the next user or assistant marker, so
/// turns the model invents for the learner are dropped.
#[must_use]
pub fn extract_reply(raw_output: &str, prompt: &PromptPayload) -> String {
    let assistant = prompt.assistant_marker.as_str();
    let user = prompt.user_marker.as_str();

    if !raw_output.contains(assistant) {
        return raw_output.trim().to_string();
    }

    let continuation = if let Some(rest) = raw_output.strip_prefix(prompt.text.as_str()) {
        rest
    } else if let Some(echo_end) = echoed_tail_end(raw_output, &prompt.turn_lines) {
        let after_echo = &raw_output[echo_end..];
        match after_echo.find(assistant) {
            Some(i) => &after_echo[i + assistant.len()..],
            None => after_echo,
        }
    } else {
        let first_assistant = raw_output.find(assistant).unwrap_or(0);
        let first_user = raw_output.find(user).unwrap_or(raw_output.len());
        if first_assistant < first_user {
            &raw_output[first_assistant + assistant.len()..]
        } else {
            raw_output
        }
    };

    let end = [user, assistant]
        .iter()
        .filter_map(|marker| continuation.find(marker))
        .min()
        .unwrap_or(continuation.len());
    continuation[..end].trim().to_string()
}
