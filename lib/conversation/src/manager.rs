//! Conversation manager.
//!
//! Orchestrates a turn: validate against the catalog, snapshot the session,
//! render the prompt, call the generation backend outside any lock, extract
//! the reply and commit the exchange.

use crate::catalog::TopicCatalog;
use crate::error::ConversationError;
use crate::formatter::{SamplingConfig, build_prompt, extract_reply};
use crate::session::{Session, SessionStore};
use crate::turn::Turn;
use lingochat_ai::LlmBackend;
use lingochat_core::{LanguageTag, SessionKey, TopicTag};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

/// Tuning for reply generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Upper bound on a single generation call.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Sampling temperature.
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            temperature: None,
            max_tokens: None,
        }
    }
}

impl ConversationConfig {
    /// The generation timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The sampling settings applied to each request.
    #[must_use]
    pub fn sampling(&self) -> SamplingConfig {
        SamplingConfig {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

/// Per-call options for [`ConversationManager::continue_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContinueOptions {
    /// Replace the most recent exchange instead of extending the transcript.
    pub rewind: bool,
}

/// Drives conversations for every session.
///
/// Cheap to share: all state lives behind `Arc`s.
#[derive(Clone)]
pub struct ConversationManager {
    catalog: Arc<TopicCatalog>,
    store: Arc<SessionStore>,
    backend: Arc<dyn LlmBackend>,
    config: ConversationConfig,
}

impl std::fmt::Debug for ConversationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationManager")
            .field("provider", &self.backend.provider())
            .field("model", &self.backend.model())
            .field("sessions", &self.store.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ConversationManager {
    /// Creates a manager over the given catalog, store and backend.
    #[must_use]
    pub fn new(
        catalog: Arc<TopicCatalog>,
        store: Arc<SessionStore>,
        backend: Arc<dyn LlmBackend>,
        config: ConversationConfig,
    ) -> Self {
        Self {
            catalog,
            store,
            backend,
            config,
        }
    }

    /// The topic catalog.
    #[must_use]
    pub fn catalog(&self) -> &TopicCatalog {
        &self.catalog
    }

    /// The session store.
    #[must_use]
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Starts a conversation, replacing any previous one for the session.
    ///
    /// Returns the topic's seed question, which becomes the first turn.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationError::UnsupportedLanguage`] or
    /// [`ConversationError::UnsupportedTopic`]; the session is not touched.
    #[instrument(skip_all, fields(session_key = %key, language = %language, topic = %topic))]
    pub fn start(
        &self,
        key: &SessionKey,
        language: &LanguageTag,
        topic: &TopicTag,
    ) -> Result<String, ConversationError> {
        let seed = self.catalog.lookup(language, topic)?;
        self.store
            .replace(key, language.clone(), topic.clone(), seed);
        info!("conversation started");
        Ok(seed.to_string())
    }

    /// Adds a user turn and returns the assistant's reply.
    ///
    /// # Errors
    ///
    /// See [`ConversationManager::continue_with`].
    pub async fn continue_turn(
        &self,
        key: &SessionKey,
        user_text: &str,
    ) -> Result<String, ConversationError> {
        self.continue_with(key, user_text, ContinueOptions::default())
            .await
    }

    /// Adds a user turn and returns the assistant's reply.
    ///
    /// The transcript is only modified once a non-empty reply is available,
    /// so a failed call can be retried as is.
    ///
    /// # Errors
    ///
    /// - [`ConversationError::EmptyUtterance`] for blank input
    /// - [`ConversationError::SessionNotFound`] if no conversation was started
    /// - [`ConversationError::GenerationFailure`] if the backend fails or
    ///   produces no usable reply
    /// - [`ConversationError::GenerationTimeout`] if the backend is too slow
    /// - [`ConversationError::SessionSuperseded`] if the session was restarted
    ///   while the reply was generated
    #[instrument(skip_all, fields(session_key = %key, rewind = options.rewind))]
    pub async fn continue_with(
        &self,
        key: &SessionKey,
        user_text: &str,
        options: ContinueOptions,
    ) -> Result<String, ConversationError> {
        let user_text = user_text.trim();
        if user_text.is_empty() {
            return Err(ConversationError::EmptyUtterance);
        }

        let not_found = || ConversationError::SessionNotFound { key: key.clone() };
        let mut snapshot = self
            .store
            .get(key)
            .filter(|s| s.state.can_continue())
            .ok_or_else(not_found)?;
        let conversation = snapshot
            .conversation
            .as_ref()
            .map(|c| c.id)
            .ok_or_else(not_found)?;

        if options.rewind {
            snapshot.rewind_last_exchange();
        }
        snapshot.push_turn(Turn::user(user_text));
        let prompt = build_prompt(&snapshot, &self.catalog)?;
        let request = prompt.to_request(&self.config.sampling());

        let started = Instant::now();
        let response = tokio::time::timeout(self.config.timeout(), self.backend.generate(&request))
            .await
            .map_err(|_| {
                warn!(timeout_ms = self.config.timeout_ms, "reply generation timed out");
                ConversationError::GenerationTimeout {
                    after_ms: self.config.timeout_ms,
                }
            })?
            .map_err(|e| {
                warn!(error = %e, "reply generation failed");
                ConversationError::from_llm(e, self.config.timeout_ms)
            })?;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let reply = extract_reply(&response.content, &prompt);
        if reply.is_empty() {
            warn!(latency_ms, "backend returned no usable reply");
            return Err(ConversationError::GenerationFailure {
                reason: "empty reply".to_string(),
            });
        }

        self.store
            .commit_exchange(key, conversation, user_text, &reply, options.rewind)?;
        info!(
            latency_ms,
            model = %response.model,
            tokens = response.usage.total(),
            "reply generated"
        );
        Ok(reply)
    }

    /// Ends the session's conversation. Returns true if one existed.
    #[instrument(skip_all, fields(session_key = %key))]
    pub fn reset(&self, key: &SessionKey) -> bool {
        let existed = self.store.reset(key);
        info!(existed, "session reset");
        existed
    }

    /// Returns the session's transcript.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationError::SessionNotFound`] if the session does not
    /// exist.
    pub fn transcript(&self, key: &SessionKey) -> Result<Vec<Turn>, ConversationError> {
        Ok(self.store.get_transcript(key)?)
    }

    /// Returns a snapshot of the session, if it exists.
    #[must_use]
    pub fn session(&self, key: &SessionKey) -> Option<Session> {
        self.store.get(key)
    }
}
