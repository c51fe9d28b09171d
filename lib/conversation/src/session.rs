//! Conversation sessions and the in-memory session store.
//!
//! The store maps session keys to individually locked sessions. The map lock
//! is only held to find, insert or evict an entry; transcript mutation takes
//! the per-session lock. Neither lock is ever held across an `.await`.

use crate::error::SessionError;
use crate::turn::{Speaker, Turn};
use chrono::{DateTime, Utc};
use lingochat_core::{ConversationId, LanguageTag, SessionKey, TopicTag};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// The state of a conversation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No conversation has been started.
    Uninitialized,
    /// A conversation was started and holds only its seed turn.
    Started,
    /// At least one exchange has taken place.
    Active,
}

impl SessionState {
    /// Returns true if the session can accept user turns.
    #[must_use]
    pub fn can_continue(&self) -> bool {
        matches!(self, Self::Started | Self::Active)
    }
}

/// The language and topic a session is currently practising.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationInfo {
    /// Identifies this particular start of the conversation.
    pub id: ConversationId,
    /// Conversation language.
    pub language: LanguageTag,
    /// Conversation topic.
    pub topic: TopicTag,
}

/// A conversation session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// The caller-supplied key.
    pub key: SessionKey,
    /// Session state.
    pub state: SessionState,
    /// The active conversation, once started.
    pub conversation: Option<ConversationInfo>,
    /// Turns in chronological order.
    pub transcript: Vec<Turn>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session was last touched.
    pub last_active_at: DateTime<Utc>,
}

impl Session {
    /// Creates an empty, uninitialized session.
    #[must_use]
    pub fn new(key: SessionKey) -> Self {
        let now = Utc::now();
        Self {
            key,
            state: SessionState::Uninitialized,
            conversation: None,
            transcript: Vec::new(),
            created_at: now,
            last_active_at: now,
        }
    }

    /// Starts a new conversation, discarding the previous transcript.
    pub fn restart(&mut self, language: LanguageTag, topic: TopicTag, seed_text: &str) {
        self.conversation = Some(ConversationInfo {
            id: ConversationId::new(),
            language,
            topic,
        });
        self.transcript = vec![Turn::assistant(seed_text)];
        self.state = SessionState::Started;
        self.last_active_at = Utc::now();
    }

    /// Appends a turn.
    pub fn push_turn(&mut self, turn: Turn) {
        self.transcript.push(turn);
        if self.transcript.len() > 1 {
            self.state = SessionState::Active;
        }
        self.last_active_at = Utc::now();
    }

    /// Removes the most recent exchange: everything from the last user turn
    /// onwards. The seed turn is never removed.
    ///
    /// Returns the number of turns removed.
    pub fn rewind_last_exchange(&mut self) -> usize {
        let Some(index) = self
            .transcript
            .iter()
            .rposition(|t| t.speaker == Speaker::User)
            .filter(|&i| i > 0)
        else {
            return 0;
        };
        let removed = self.transcript.len() - index;
        self.transcript.truncate(index);
        if self.transcript.len() <= 1 && self.state == SessionState::Active {
            self.state = SessionState::Started;
        }
        self.last_active_at = Utc::now();
        removed
    }

    /// Returns the number of turns.
    #[must_use]
    pub fn turn_count(&self) -> usize {
        self.transcript.len()
    }

    /// Returns the last turn, if any.
    #[must_use]
    pub fn last_turn(&self) -> Option<&Turn> {
        self.transcript.last()
    }
}

type SharedSession = Arc<Mutex<Session>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Default maximum number of sessions held in memory.
pub const DEFAULT_SESSION_CAPACITY: usize = 10_000;

/// In-memory session store, bounded by least-recently-used eviction.
///
/// Sessions do not survive a process restart.
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<LruCache<SessionKey, SharedSession>>,
}

impl SessionStore {
    /// Creates a store holding at most `capacity` sessions.
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            sessions: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Creates a store from a configured capacity; zero is treated as one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN))
    }

    fn find(&self, key: &SessionKey) -> Option<SharedSession> {
        lock(&self.sessions).get(key).cloned()
    }

    fn find_or_insert(&self, key: &SessionKey) -> SharedSession {
        let mut sessions = lock(&self.sessions);
        if let Some(existing) = sessions.get(key) {
            return existing.clone();
        }
        let session = Arc::new(Mutex::new(Session::new(key.clone())));
        if let Some((evicted, _)) = sessions.push(key.clone(), session.clone()) {
            debug!(evicted_key = %evicted, "session store at capacity, evicted least recently used");
        }
        session
    }

    /// Returns the existing session or a fresh empty one.
    pub fn get_or_create(&self, key: &SessionKey) -> Session {
        lock(&self.find_or_insert(key)).clone()
    }

    /// Returns a snapshot of the session, if it exists.
    #[must_use]
    pub fn get(&self, key: &SessionKey) -> Option<Session> {
        self.find(key).map(|s| lock(&s).clone())
    }

    /// Starts or restarts the session's conversation with a single seed turn.
    ///
    /// Returns a snapshot of the restarted session.
    pub fn replace(
        &self,
        key: &SessionKey,
        language: LanguageTag,
        topic: TopicTag,
        seed_text: &str,
    ) -> Session {
        let shared = self.find_or_insert(key);
        let mut session = lock(&shared);
        session.restart(language, topic, seed_text);
        session.clone()
    }

    /// Appends a single turn.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotFound`] if the session does not exist.
    pub fn append_turn(
        &self,
        key: &SessionKey,
        speaker: Speaker,
        text: impl Into<String>,
    ) -> Result<Turn, SessionError> {
        let shared = self
            .find(key)
            .ok_or_else(|| SessionError::NotFound { key: key.clone() })?;
        let turn = Turn::new(speaker, text);
        lock(&shared).push_turn(turn.clone());
        Ok(turn)
    }

    /// Appends a user turn and the assistant's reply in one step, so that
    /// concurrent exchanges on the same session never interleave.
    ///
    /// With `rewind`, the most recent exchange is removed first.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotFound`] if the session no longer exists and
    /// [`SessionError::Superseded`] if it was restarted since `conversation`
    /// was read.
    pub fn commit_exchange(
        &self,
        key: &SessionKey,
        conversation: ConversationId,
        user_text: &str,
        assistant_text: &str,
        rewind: bool,
    ) -> Result<(), SessionError> {
        let shared = self
            .find(key)
            .ok_or_else(|| SessionError::NotFound { key: key.clone() })?;
        let mut session = lock(&shared);
        if session.conversation.as_ref().map(|c| c.id) != Some(conversation) {
            return Err(SessionError::Superseded { key: key.clone() });
        }
        if rewind {
            session.rewind_last_exchange();
        }
        session.push_turn(Turn::user(user_text));
        session.push_turn(Turn::assistant(assistant_text));
        Ok(())
    }

    /// Removes the most recent exchange.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotFound`] if the session does not exist.
    pub fn rewind(&self, key: &SessionKey) -> Result<usize, SessionError> {
        let shared = self
            .find(key)
            .ok_or_else(|| SessionError::NotFound { key: key.clone() })?;
        let removed = lock(&shared).rewind_last_exchange();
        Ok(removed)
    }

    /// Returns the session's turns in chronological order.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotFound`] if the session does not exist.
    pub fn get_transcript(&self, key: &SessionKey) -> Result<Vec<Turn>, SessionError> {
        self.find(key)
            .map(|s| lock(&s).transcript.clone())
            .ok_or_else(|| SessionError::NotFound { key: key.clone() })
    }

    /// Removes a session. Returns true if it existed.
    pub fn reset(&self, key: &SessionKey) -> bool {
        lock(&self.sessions).pop(key).is_some()
    }

    /// Removes every session idle since before `cutoff`.
    ///
    /// Returns the number of sessions removed.
    pub fn evict_idle(&self, cutoff: DateTime<Utc>) -> usize {
        let mut sessions = lock(&self.sessions);
        let stale: Vec<SessionKey> = sessions
            .iter()
            .filter(|(_, s)| lock(s).last_active_at < cutoff)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &stale {
            sessions.pop(key);
        }
        stale.len()
    }

    /// Returns the number of sessions held.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.sessions).len()
    }

    /// Returns true if no sessions are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_SESSION_CAPACITY)
    }
}
