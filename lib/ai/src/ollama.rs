//! Ollama backend for locally served causal language models.
//!
//! Uses raw completion: the rendered transcript is sent verbatim and the
//! model continues it from the open assistant marker.

use crate::backend::{
    LlmBackend, LlmBackendConfig, LlmProvider, LlmRequest, LlmResponse, TokenUsage,
    retry_after_secs,
};
use crate::error::LlmError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Ollama `/api/generate` client.
#[derive(Debug)]
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaBackend {
    /// Creates a backend from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::InvalidConfig`] if the HTTP client cannot be built.
    pub fn new(config: &LlmBackendConfig) -> Result<Self, LlmError> {
        Ok(Self {
            client: config.http_client()?,
            base_url: config.resolved_base_url(),
            model: config.resolved_model(),
        })
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    raw: bool,
    stream: bool,
    options: GenerateOptions<'a>,
}

#[derive(Debug, Serialize)]
struct GenerateOptions<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

fn build_body<'a>(model: &'a str, request: &'a LlmRequest) -> GenerateRequest<'a> {
    GenerateRequest {
        model,
        prompt: &request.prompt,
        raw: true,
        stream: false,
        options: GenerateOptions {
            temperature: request.temperature,
            num_predict: request.max_tokens,
            stop: (!request.stop.is_empty()).then_some(request.stop.as_slice()),
        },
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let provider = LlmProvider::Ollama.as_str();
        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&build_body(&self.model, request))
            .send()
            .await
            .map_err(|e| LlmError::from_transport(provider, &e))?;

        let status = response.status();
        let retry_after = retry_after_secs(response.headers());
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status, retry_after, &body));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| LlmError::from_transport(provider, &e))?;
        debug!(
            model = %self.model,
            eval_count = parsed.eval_count,
            "ollama generation complete"
        );

        Ok(LlmResponse {
            content: parsed.response,
            usage: TokenUsage {
                input_tokens: parsed.prompt_eval_count,
                output_tokens: parsed.eval_count,
            },
            model: self.model.clone(),
        })
    }

    fn provider(&self) -> LlmProvider {
        LlmProvider::Ollama
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_is_raw_non_streaming_completion() {
        let request = LlmRequest::new("Alicia: Do you have any pets?\nStudent: A cat.\nAlicia:")
            .with_stop("\nStudent:")
            .with_max_tokens(64);
        let json = serde_json::to_value(build_body("llama3.2", &request)).expect("serialize");

        assert_eq!(json["model"], "llama3.2");
        assert_eq!(json["raw"], true);
        assert_eq!(json["stream"], false);
        assert!(json["prompt"].as_str().unwrap().ends_with("Alicia:"));
        assert_eq!(json["options"]["num_predict"], 64);
        assert_eq!(json["options"]["stop"][0], "\nStudent:");
        assert!(json["options"].get("temperature").is_none());
    }

    #[test]
    fn response_tolerates_missing_counters() {
        let parsed: GenerateResponse =
            serde_json::from_str(r#"{"response":" Meow!","done":true}"#).expect("parse");
        assert_eq!(parsed.response, " Meow!");
        assert_eq!(parsed.eval_count, 0);
    }

    #[tokio::test]
    async fn unreachable_server_is_provider_unavailable() {
        let config = LlmBackendConfig::ollama("http://127.0.0.1:9", "llama3.2");
        let backend = OllamaBackend::new(&config).expect("backend");
        let err = backend
            .generate(&LlmRequest::new("hi"))
            .await
            .unwrap_err();
        assert!(
            matches!(
                err,
                LlmError::ProviderUnavailable { .. } | LlmError::RequestFailed { .. }
            ),
            "unexpected error: {err}"
        );
    }
}
