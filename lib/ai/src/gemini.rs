//! Gemini generative language API backend.
//!
//! Sends the conversation as structured `contents` with the preamble as the
//! system instruction, the way the hosted chat API expects it.

use crate::backend::{
    LlmBackend, LlmBackendConfig, LlmProvider, LlmRequest, LlmResponse, MessageRole, TokenUsage,
    retry_after_secs,
};
use crate::error::LlmError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Gemini `generateContent` client.
#[derive(Debug)]
pub struct GeminiBackend {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiBackend {
    /// Creates a backend from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::InvalidConfig`] if no API key is configured.
    pub fn new(config: &LlmBackendConfig) -> Result<Self, LlmError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| LlmError::InvalidConfig {
                reason: "gemini requires an API key".to_string(),
            })?;
        Ok(Self {
            client: config.http_client()?,
            base_url: config.resolved_base_url(),
            model: config.resolved_model(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<&'a [String]>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

fn build_body(request: &LlmRequest) -> GenerateContentRequest<'_> {
    let contents = if request.messages.is_empty() {
        vec![Content {
            role: Some("user"),
            parts: vec![Part {
                text: &request.prompt,
            }],
        }]
    } else {
        request
            .messages
            .iter()
            .map(|m| Content {
                role: Some(match m.role {
                    MessageRole::User => "user",
                    MessageRole::Assistant => "model",
                }),
                parts: vec![Part { text: &m.content }],
            })
            .collect()
    };

    GenerateContentRequest {
        system_instruction: request.system.as_deref().map(|text| Content {
            role: None,
            parts: vec![Part { text }],
        }),
        contents,
        generation_config: GenerationConfig {
            temperature: request.temperature,
            max_output_tokens: request.max_tokens,
            stop_sequences: (!request.stop.is_empty()).then_some(request.stop.as_slice()),
        },
    }
}

fn parse_body(body: &str, model: &str) -> Result<LlmResponse, LlmError> {
    let parsed: GenerateContentResponse =
        serde_json::from_str(body).map_err(|e| LlmError::ResponseParseFailed {
            reason: e.to_string(),
        })?;

    let content: String = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();
    if content.trim().is_empty() {
        return Err(LlmError::EmptyResponse);
    }

    let usage = parsed
        .usage_metadata
        .map(|u| TokenUsage {
            input_tokens: u.prompt_token_count,
            output_tokens: u.candidates_token_count,
        })
        .unwrap_or_default();

    Ok(LlmResponse {
        content,
        usage,
        model: model.to_string(),
    })
}

#[async_trait]
impl LlmBackend for GeminiBackend {
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let provider = LlmProvider::Gemini.as_str();
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&build_body(request))
            .send()
            .await
            .map_err(|e| LlmError::from_transport(provider, &e))?;

        let status = response.status();
        let retry_after = retry_after_secs(response.headers());
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::from_transport(provider, &e))?;
        if !status.is_success() {
            return Err(LlmError::from_status(status, retry_after, &body));
        }

        let parsed = parse_body(&body, &self.model)?;
        debug!(
            model = %self.model,
            input_tokens = parsed.usage.input_tokens,
            output_tokens = parsed.usage.output_tokens,
            "gemini generation complete"
        );
        Ok(parsed)
    }

    fn provider(&self) -> LlmProvider {
        LlmProvider::Gemini
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LlmMessage;

    #[test]
    fn requires_api_key() {
        let config = LlmBackendConfig {
            provider: LlmProvider::Gemini,
            ..LlmBackendConfig::default()
        };
        let err = GeminiBackend::new(&config).unwrap_err();
        assert!(matches!(err, LlmError::InvalidConfig { .. }));
    }

    #[test]
    fn endpoint_uses_model() {
        let backend = GeminiBackend::new(&LlmBackendConfig::gemini("k")).expect("backend");
        assert_eq!(
            backend.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn body_maps_roles_and_system_instruction() {
        let request = LlmRequest::new("ignored when messages present")
            .with_system("Casual conversation.")
            .with_messages(vec![
                LlmMessage::assistant("What is your favorite food?"),
                LlmMessage::user("Tacos."),
            ])
            .with_stop("\nStudent:")
            .with_temperature(0.5);

        let json = serde_json::to_value(build_body(&request)).expect("serialize");
        assert_eq!(
            json["systemInstruction"]["parts"][0]["text"],
            "Casual conversation."
        );
        assert_eq!(json["contents"][0]["role"], "model");
        assert_eq!(json["contents"][1]["role"], "user");
        assert_eq!(json["contents"][1]["parts"][0]["text"], "Tacos.");
        assert_eq!(json["generationConfig"]["temperature"], 0.5);
        assert_eq!(json["generationConfig"]["stopSequences"][0], "\nStudent:");
        assert!(json["generationConfig"].get("maxOutputTokens").is_none());
    }

    #[test]
    fn body_falls_back_to_prompt_text() {
        let request = LlmRequest::new("Hello");
        let json = serde_json::to_value(build_body(&request)).expect("serialize");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "Hello");
        assert!(json.get("systemInstruction").is_none());
    }

    #[test]
    fn parses_candidate_text_and_usage() {
        let body = r#"{
            "candidates": [{"content": {"role": "model", "parts": [{"text": "¡Qué bien! "}, {"text": "¿Y tú?"}]}}],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 7}
        }"#;
        let response = parse_body(body, "gemini-1.5-flash").expect("parse");
        assert_eq!(response.content, "¡Qué bien! ¿Y tú?");
        assert_eq!(response.usage.total(), 19);
    }

    #[test]
    fn empty_candidates_are_an_error() {
        let err = parse_body(r#"{"candidates": []}"#, "m").unwrap_err();
        assert_eq!(err, LlmError::EmptyResponse);

        let err = parse_body("not json", "m").unwrap_err();
        assert!(matches!(err, LlmError::ResponseParseFailed { .. }));
    }
}
