//! Google Cloud Translation (v2 REST) client.

use crate::capability::Translator;
use crate::error::SpeechError;
use async_trait::async_trait;
use lingochat_core::LanguageTag;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Translation service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    /// Service base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// API key sent as `x-goog-api-key`.
    #[serde(default)]
    pub api_key: Option<String>,
    /// HTTP request timeout.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_base_url() -> String {
    "https://translation.googleapis.com".to_string()
}

fn default_timeout_seconds() -> u64 {
    15
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// Translates through the Cloud Translation v2 `translate` method.
#[derive(Debug)]
pub struct GoogleTranslator {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl GoogleTranslator {
    /// Creates a translator from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SpeechError::InvalidConfig`] if the HTTP client cannot be built.
    pub fn new(config: &TranslationConfig) -> Result<Self, SpeechError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| SpeechError::InvalidConfig {
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            endpoint: format!(
                "{}/language/translate/v2",
                config.base_url.trim_end_matches('/')
            ),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
        })
    }
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'static str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Debug, Deserialize)]
struct TranslateData {
    #[serde(default)]
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Translation {
    translated_text: String,
}

fn parse_body(body: &str) -> Result<String, SpeechError> {
    let parsed: TranslateResponse =
        serde_json::from_str(body).map_err(|e| SpeechError::TranslationFailure {
            reason: format!("unexpected response: {e}"),
        })?;
    parsed
        .data
        .translations
        .into_iter()
        .next()
        .map(|t| t.translated_text)
        .ok_or_else(|| SpeechError::TranslationFailure {
            reason: "no translation returned".to_string(),
        })
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(
        &self,
        text: &str,
        source: &LanguageTag,
        target: &LanguageTag,
    ) -> Result<String, SpeechError> {
        if source.primary() == target.primary() {
            return Ok(text.to_string());
        }

        let body = TranslateRequest {
            q: text,
            source: source.primary(),
            target: target.primary(),
            format: "text",
        };
        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("x-goog-api-key", key);
        }

        let failure = |e: reqwest::Error| SpeechError::TranslationFailure {
            reason: e.to_string(),
        };
        let response = request.send().await.map_err(failure)?;
        let status = response.status();
        let text = response.text().await.map_err(failure)?;
        if !status.is_success() {
            return Err(SpeechError::TranslationFailure {
                reason: format!("{status}: {}", text.trim()),
            });
        }

        let translated = parse_body(&text)?;
        debug!(
            source = source.primary(),
            target = target.primary(),
            chars = translated.chars().count(),
            "translated text"
        );
        Ok(translated)
    }
}
