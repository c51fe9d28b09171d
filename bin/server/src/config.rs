//! Centralized server configuration.
//!
//! Loaded via the `config` crate from an optional file named by
//! `LINGOCHAT_CONFIG`, overridden by environment variables using `__` as the
//! section separator (`LLM__PROVIDER=ollama`, `SESSION__CAPACITY=500`).

use chrono::TimeDelta;
use lingochat_ai::{LlmBackendConfig, LlmProvider};
use lingochat_conversation::{ConversationConfig, DEFAULT_SESSION_CAPACITY};
use lingochat_speech::{RecognitionConfig, SpeechConfig, TranslationConfig};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Environment variable naming an optional configuration file.
pub const CONFIG_FILE_ENV: &str = "LINGOCHAT_CONFIG";

/// Environment variable consulted when no LLM API key is configured.
pub const API_KEY_FALLBACK_ENV: &str = "GOOGLE_API_KEY";

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// Topic catalog file; the built-in catalog is used when unset.
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,

    /// Session store configuration.
    #[serde(default)]
    pub session: SessionConfig,

    /// Reply generation configuration.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Translation service configuration.
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Speech output configuration.
    #[serde(default)]
    pub speech: SpeechConfig,

    /// Speech recognition configuration.
    #[serde(default)]
    pub recognition: RecognitionConfig,
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 5001))
}

/// Session-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Maximum sessions held in memory.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Sessions idle for longer than this are dropped.
    #[serde(default = "default_idle_timeout_minutes")]
    pub idle_timeout_minutes: i64,

    /// Interval between idle session sweeps, in seconds.
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,
}

fn default_capacity() -> usize {
    DEFAULT_SESSION_CAPACITY
}

/// Idle timeout used when none is configured.
pub const DEFAULT_IDLE_TIMEOUT_MINUTES: i64 = 30;

fn default_idle_timeout_minutes() -> i64 {
    DEFAULT_IDLE_TIMEOUT_MINUTES
}

fn default_cleanup_interval_seconds() -> u64 {
    300
}

impl SessionConfig {
    /// The idle timeout, or `None` if the configured value is not a positive
    /// number of minutes that fits a [`TimeDelta`].
    #[must_use]
    pub fn idle_timeout(&self) -> Option<TimeDelta> {
        TimeDelta::try_minutes(self.idle_timeout_minutes).filter(|t| *t > TimeDelta::zero())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            idle_timeout_minutes: default_idle_timeout_minutes(),
            cleanup_interval_seconds: default_cleanup_interval_seconds(),
        }
    }
}

/// Language model configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LlmConfig {
    /// Which backend to use.
    #[serde(default)]
    pub provider: LlmProvider,
    /// Base URL override.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Model override.
    #[serde(default)]
    pub model: Option<String>,
    /// API key for hosted providers.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Upper bound on one generation call; defaults to 30 seconds.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    /// Sampling temperature.
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Maximum tokens per reply.
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl LlmConfig {
    /// Settings for the generation backend.
    #[must_use]
    pub fn backend_config(&self) -> LlmBackendConfig {
        let mut backend = LlmBackendConfig {
            provider: self.provider,
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            api_key: self.api_key.clone(),
            ..LlmBackendConfig::default()
        };
        if let Some(secs) = self.timeout_seconds {
            backend.http_timeout_seconds = secs;
        }
        backend
    }

    /// Settings for the conversation manager.
    #[must_use]
    pub fn conversation_config(&self) -> ConversationConfig {
        let defaults = ConversationConfig::default();
        ConversationConfig {
            timeout_ms: self
                .timeout_seconds
                .map_or(defaults.timeout_ms, |secs| secs.saturating_mul(1000)),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from the optional `LINGOCHAT_CONFIG` file and
    /// environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a value is invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let file = std::env::var_os(CONFIG_FILE_ENV).map(PathBuf::from);
        let config = Self::load(
            file.as_deref(),
            config::Environment::default()
                .separator("__")
                .try_parsing(true),
        )?;
        Ok(config.with_api_key_fallback(std::env::var(API_KEY_FALLBACK_ENV).ok()))
    }

    fn load(file: Option<&Path>, env: config::Environment) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path));
        }
        let config: Self = builder.add_source(env).build()?.try_deserialize()?;
        if config.session.idle_timeout().is_none() {
            return Err(config::ConfigError::Message(format!(
                "session.idle_timeout_minutes must be a positive number of minutes, got {}",
                config.session.idle_timeout_minutes
            )));
        }
        Ok(config)
    }

    fn with_api_key_fallback(mut self, fallback: Option<String>) -> Self {
        if self.llm.api_key.is_none() {
            self.llm.api_key = fallback.filter(|k| !k.trim().is_empty());
        }
        self
    }
}
