//! Speech recognition through an OpenAI-compatible transcription endpoint.

use crate::capability::SpeechRecognizer;
use crate::error::SpeechError;
use async_trait::async_trait;
use bytes::Bytes;
use lingochat_core::LanguageTag;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Transcription service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionConfig {
    /// Service base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer token, if the service requires one.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Transcription model.
    #[serde(default = "default_model")]
    pub model: String,
    /// HTTP request timeout.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_model() -> String {
    "whisper-1".to_string()
}

fn default_timeout_seconds() -> u64 {
    60
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            model: default_model(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// Uploads audio to `/v1/audio/transcriptions`.
#[derive(Debug)]
pub struct TranscriptionRecognizer {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl TranscriptionRecognizer {
    /// Creates a recognizer from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SpeechError::InvalidConfig`] if the HTTP client cannot be built.
    pub fn new(config: &RecognitionConfig) -> Result<Self, SpeechError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| SpeechError::InvalidConfig {
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            endpoint: format!(
                "{}/v1/audio/transcriptions",
                config.base_url.trim_end_matches('/')
            ),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            model: config.model.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

fn parse_body(body: &str) -> Result<String, SpeechError> {
    let parsed: TranscriptionResponse = serde_json::from_str(body)
        .map_err(|e| SpeechError::service(format!("unexpected response: {e}")))?;
    let text = parsed.text.trim();
    if text.is_empty() {
        return Err(SpeechError::Unrecognized);
    }
    Ok(text.to_string())
}

#[async_trait]
impl SpeechRecognizer for TranscriptionRecognizer {
    async fn recognize(
        &self,
        audio: Bytes,
        language: Option<&LanguageTag>,
    ) -> Result<String, SpeechError> {
        if audio.is_empty() {
            return Err(SpeechError::Unrecognized);
        }
        let audio_bytes = audio.len();

        let file = Part::bytes(audio.to_vec()).file_name("audio.wav");
        let mut form = Form::new()
            .text("model", self.model.clone())
            .text("response_format", "json")
            .part("file", file);
        if let Some(language) = language {
            form = form.text("language", language.primary().to_string());
        }

        let mut request = self.client.post(&self.endpoint).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(SpeechError::service)?;
        let status = response.status();
        let body = response.text().await.map_err(SpeechError::service)?;
        if !status.is_success() {
            return Err(SpeechError::service(format!("{status}: {}", body.trim())));
        }

        let text = parse_body(&body)?;
        debug!(audio_bytes, chars = text.chars().count(), "transcribed audio");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_from_base_url() {
        let recognizer = TranscriptionRecognizer::new(&RecognitionConfig {
            base_url: "http://localhost:8000/".to_string(),
            api_key: Some("  ".to_string()),
            ..RecognitionConfig::default()
        })
        .expect("recognizer");
        assert_eq!(
            recognizer.endpoint,
            "http://localhost:8000/v1/audio/transcriptions"
        );
        assert!(recognizer.api_key.is_none());
        assert_eq!(recognizer.model, "whisper-1");
    }

    #[test]
    fn parses_transcript() {
        assert_eq!(
            parse_body(r#"{"text":" Tengo tres hermanos. "}"#).expect("text"),
            "Tengo tres hermanos."
        );
        assert_eq!(parse_body(r#"{"text":""}"#).unwrap_err(), SpeechError::Unrecognized);
        assert!(matches!(
            parse_body("<html>").unwrap_err(),
            SpeechError::ServiceUnavailable { .. }
        ));
    }

    #[tokio::test]
    async fn empty_audio_is_unrecognized() {
        let recognizer =
            TranscriptionRecognizer::new(&RecognitionConfig::default()).expect("recognizer");
        let err = recognizer.recognize(Bytes::new(), None).await.unwrap_err();
        assert_eq!(err, SpeechError::Unrecognized);
    }

    #[tokio::test]
    async fn unreachable_service_is_unavailable() {
        let recognizer = TranscriptionRecognizer::new(&RecognitionConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_seconds: 2,
            ..RecognitionConfig::default()
        })
        .expect("recognizer");
        let err = recognizer
            .recognize(Bytes::from_static(b"RIFF"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SpeechError::ServiceUnavailable { .. }));
    }
}
