//! HTTP routes.
//!
//! JSON in, JSON out. Required fields are checked by hand so that a missing
//! value produces a `400 {"error": ...}` body instead of an extractor
//! rejection.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use lingochat_conversation::{ContinueOptions, Speaker};
use lingochat_core::{LanguageTag, SessionKey, TopicTag};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Language assumed for speech when a request does not name one.
const DEFAULT_LANGUAGE: &str = "en-US";

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/topics", get(topics))
        .route("/session", post(create_session))
        .route("/start_conversation", post(start_conversation))
        .route("/chatbot", post(chatbot))
        .route("/translate", post(translate))
        .route("/detect_language", post(detect_language))
        .route("/reset", post(reset))
        .route("/transcribe", post(transcribe))
        .route("/transcript/{session_id}", get(transcript))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

fn parse_key(raw: Option<String>) -> Result<SessionKey, ApiError> {
    let raw = raw
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("No session_id provided"))?;
    SessionKey::new(raw).map_err(|e| ApiError::bad_request(e.to_string()))
}

fn parse_language(raw: &str) -> Result<LanguageTag, ApiError> {
    raw.parse()
        .map_err(|e: lingochat_core::ParseTagError| ApiError::bad_request(e.to_string()))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

async fn health() -> &'static str {
    "ok"
}

/// Supported languages and their topics.
async fn topics(State(state): State<Arc<AppState>>) -> Json<BTreeMap<String, Vec<String>>> {
    let catalog = state.conversations.catalog();
    let topics = catalog
        .languages()
        .map(|language| {
            let topics = catalog
                .topics(language)
                .map(|t| t.map(ToString::to_string).collect::<Vec<_>>())
                .unwrap_or_default();
            (language.to_string(), topics)
        })
        .collect();
    Json(topics)
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionResponse {
    session_id: String,
}

/// Issues a fresh session key.
async fn create_session() -> Json<SessionResponse> {
    Json(SessionResponse {
        session_id: SessionKey::issue().to_string(),
    })
}

#[derive(Debug, Deserialize)]
struct StartRequest {
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    language: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StartResponse {
    starter: String,
    session_id: String,
}

/// Starts (or restarts) a conversation and speaks its opening question.
async fn start_conversation(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<StartRequest>, JsonRejection>,
) -> Result<Json<StartResponse>, ApiError> {
    let request = json_body(payload)?;
    let (Some(topic), Some(language)) = (non_blank(request.topic), non_blank(request.language))
    else {
        return Err(ApiError::bad_request("No topic or language provided"));
    };
    let language = parse_language(&language)?;
    let topic: TopicTag = topic
        .parse()
        .map_err(|e: lingochat_core::ParseTagError| ApiError::bad_request(e.to_string()))?;
    let key = match non_blank(request.session_id) {
        Some(raw) => parse_key(Some(raw))?,
        None => SessionKey::issue(),
    };

    let starter = state.conversations.start(&key, &language, &topic)?;
    state.speak_in_background(starter.clone(), language);

    Ok(Json(StartResponse {
        starter,
        session_id: key.to_string(),
    }))
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default, rename = "rewindContext")]
    rewind_context: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatResponse {
    response: String,
}

/// Continues a conversation with the learner's utterance.
async fn chatbot(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let request = json_body(payload)?;
    let text = non_blank(request.text).ok_or_else(|| ApiError::bad_request("No text provided"))?;
    let key = parse_key(request.session_id)?;
    let language = match non_blank(request.language) {
        Some(raw) => Some(parse_language(&raw)?),
        None => None,
    };

    let response = state
        .conversations
        .continue_with(
            &key,
            &text,
            ContinueOptions {
                rewind: request.rewind_context,
            },
        )
        .await?;

    let speech_language = language
        .or_else(|| {
            state
                .conversations
                .session(&key)
                .and_then(|s| s.conversation.map(|c| c.language))
        })
        .map_or_else(|| parse_language(DEFAULT_LANGUAGE), Ok)?;
    state.speak_in_background(response.clone(), speech_language);

    Ok(Json(ChatResponse { response }))
}

fn default_from_lang() -> String {
    "es".to_string()
}

fn default_to_lang() -> String {
    "en".to_string()
}

#[derive(Debug, Deserialize)]
struct TranslateRequest {
    #[serde(default)]
    text: Option<String>,
    #[serde(default = "default_from_lang")]
    from_lang: String,
    #[serde(default = "default_to_lang")]
    to_lang: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct TranslateResponse {
    translation: String,
}

/// Translates text, by default from Spanish to English.
async fn translate(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TranslateRequest>, JsonRejection>,
) -> Result<Json<TranslateResponse>, ApiError> {
    let request = json_body(payload)?;
    let text = non_blank(request.text).ok_or_else(|| ApiError::bad_request("No text provided"))?;
    let source = parse_language(&request.from_lang)?;
    let target = parse_language(&request.to_lang)?;

    let translation = state.translator.translate(&text, &source, &target).await?;
    Ok(Json(TranslateResponse { translation }))
}

#[derive(Debug, Deserialize)]
struct DetectRequest {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DetectResponse {
    language: String,
}

/// Identifies the language of a piece of text.
async fn detect_language(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DetectRequest>, JsonRejection>,
) -> Result<Json<DetectResponse>, ApiError> {
    let text = non_blank(json_body(payload)?.text)
        .ok_or_else(|| ApiError::bad_request("No text provided"))?;
    let language = state.detector.detect(&text)?;
    Ok(Json(DetectResponse {
        language: language.to_string(),
    }))
}

#[derive(Debug, Deserialize)]
struct ResetRequest {
    #[serde(default)]
    session_id: Option<String>,
}

/// Ends a session's conversation.
async fn reset(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ResetRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let key = parse_key(json_body(payload)?.session_id)?;
    state.conversations.reset(&key);
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct TranscribeQuery {
    #[serde(default)]
    language: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TranscribeResponse {
    text: String,
}

/// Transcribes a raw audio body.
async fn transcribe(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TranscribeQuery>,
    audio: Bytes,
) -> Result<Json<TranscribeResponse>, ApiError> {
    if audio.is_empty() {
        return Err(ApiError::bad_request("No audio provided"));
    }
    let language = match non_blank(query.language) {
        Some(raw) => Some(parse_language(&raw)?),
        None => None,
    };
    let text = state.recognizer.recognize(audio, language.as_ref()).await?;
    Ok(Json(TranscribeResponse { text }))
}

#[derive(Debug, Serialize, Deserialize)]
struct TurnView {
    speaker: Speaker,
    text: String,
    timestamp: chrono::DateTime<chrono::Utc>,
}

/// Returns a session's transcript.
async fn transcript(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let key = parse_key(Some(session_id))?;
    let turns: Vec<TurnView> = state
        .conversations
        .transcript(&key)?
        .into_iter()
        .map(|turn| TurnView {
            speaker: turn.speaker,
            text: turn.text,
            timestamp: turn.timestamp,
        })
        .collect();
    Ok(Json(serde_json::json!({ "turns": turns })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, Response, header};
    use lingochat_ai::{LlmBackend, LlmError, LlmProvider, LlmRequest, LlmResponse, TokenUsage};
    use lingochat_conversation::{
        ConversationConfig, ConversationManager, SessionStore, TopicCatalog,
    };
    use lingochat_speech::{
        SilentSynthesizer, SpeechError, SpeechRecognizer, Translator, WhatlangDetector,
    };
    use serde::de::DeserializeOwned;
    use tower::ServiceExt;

    struct EchoBackend;

    #[async_trait]
    impl LlmBackend for EchoBackend {
        async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
            let turns = request.prompt.lines().count().saturating_sub(2);
            Ok(LlmResponse {
                content: format!("Alicia: Reply after {turns} turns.\nStudent: more"),
                usage: TokenUsage::default(),
                model: "echo".to_string(),
            })
        }

        fn provider(&self) -> LlmProvider {
            LlmProvider::Ollama
        }

        fn model(&self) -> &str {
            "echo"
        }
    }

    struct UppercaseTranslator;

    #[async_trait]
    impl Translator for UppercaseTranslator {
        async fn translate(
            &self,
            text: &str,
            source: &LanguageTag,
            target: &LanguageTag,
        ) -> Result<String, SpeechError> {
            if target.primary() == "xx" {
                return Err(SpeechError::TranslationFailure {
                    reason: "unsupported target".to_string(),
                });
            }
            Ok(format!("{}>{}: {}", source, target, text.to_uppercase()))
        }
    }

    struct FixedRecognizer;

    #[async_trait]
    impl SpeechRecognizer for FixedRecognizer {
        async fn recognize(
            &self,
            audio: Bytes,
            language: Option<&LanguageTag>,
        ) -> Result<String, SpeechError> {
            if audio.as_ref() == b"silence" {
                return Err(SpeechError::Unrecognized);
            }
            Ok(format!(
                "{} bytes in {}",
                audio.len(),
                language.map_or("auto", LanguageTag::as_str)
            ))
        }
    }

    fn app() -> Router {
        let conversations = ConversationManager::new(
            Arc::new(TopicCatalog::builtin()),
            Arc::new(SessionStore::default()),
            Arc::new(EchoBackend),
            ConversationConfig::default(),
        );
        router(Arc::new(AppState::new(
            conversations,
            Arc::new(UppercaseTranslator),
            Arc::new(SilentSynthesizer),
            Arc::new(FixedRecognizer),
            Arc::new(WhatlangDetector),
        )))
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn read_json<T: DeserializeOwned>(response: Response<Body>) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    async fn start(app: &Router, session_id: &str, topic: &str, language: &str) -> StartResponse {
        let response = app
            .clone()
            .oneshot(post_json(
                "/start_conversation",
                serde_json::json!({"session_id": session_id, "topic": topic, "language": language}),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        read_json(response).await
    }

    #[tokio::test]
    async fn health_check() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn issues_session_keys() {
        let response = app()
            .oneshot(post_json("/session", serde_json::json!({})))
            .await
            .expect("response");
        let body: SessionResponse = read_json(response).await;
        assert!(body.session_id.starts_with("sess_"));
    }

    #[tokio::test]
    async fn lists_topics_per_language() {
        let response = app()
            .oneshot(Request::get("/topics").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let body: BTreeMap<String, Vec<String>> = read_json(response).await;
        assert_eq!(body.len(), 3);
        assert!(body["es-ES"].contains(&"family".to_string()));
    }

    #[tokio::test]
    async fn start_returns_starter_and_issues_key_when_missing() {
        let app = app();
        let response = app
            .clone()
            .oneshot(post_json(
                "/start_conversation",
                serde_json::json!({"topic": "food", "language": "fr-FR"}),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body: StartResponse = read_json(response).await;
        assert_eq!(body.starter, "Quel est votre plat préféré?");
        assert!(body.session_id.starts_with("sess_"));
    }

    #[tokio::test]
    async fn start_requires_topic_and_language() {
        let response = app()
            .oneshot(post_json("/start_conversation", serde_json::json!({"topic": "food"})))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = read_json(response).await;
        assert_eq!(body["error"], "No topic or language provided");
    }

    #[tokio::test]
    async fn start_rejects_unsupported_pairs() {
        let response = app()
            .oneshot(post_json(
                "/start_conversation",
                serde_json::json!({"session_id": "s1", "topic": "weather", "language": "en-US"}),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn chat_round_trip_and_transcript() {
        let app = app();
        start(&app, "s1", "family", "en-US").await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/chatbot",
                serde_json::json!({"session_id": "s1", "text": "I have two brothers."}),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body: ChatResponse = read_json(response).await;
        assert_eq!(body.response, "Reply after 2 turns.");

        let response = app
            .oneshot(Request::get("/transcript/s1").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let body: serde_json::Value = read_json(response).await;
        let turns = body["turns"].as_array().expect("turns");
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0]["speaker"], "assistant");
        assert_eq!(turns[1]["text"], "I have two brothers.");
    }

    #[tokio::test]
    async fn chat_rewind_replaces_last_exchange() {
        let app = app();
        start(&app, "s1", "food", "es-ES").await;
        for (text, rewind) in [("Pizza.", false), ("Paella.", true)] {
            let response = app
                .clone()
                .oneshot(post_json(
                    "/chatbot",
                    serde_json::json!({"session_id": "s1", "text": text, "rewindContext": rewind}),
                ))
                .await
                .expect("response");
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app
            .oneshot(Request::get("/transcript/s1").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let body: serde_json::Value = read_json(response).await;
        let turns = body["turns"].as_array().expect("turns");
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[1]["text"], "Paella.");
    }

    #[tokio::test]
    async fn chat_validates_input() {
        let app = app();
        let response = app
            .clone()
            .oneshot(post_json("/chatbot", serde_json::json!({"session_id": "s1"})))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = read_json(response).await;
        assert_eq!(body["error"], "No text provided");

        let response = app
            .clone()
            .oneshot(post_json("/chatbot", serde_json::json!({"text": "hola"})))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(
                Request::post("/chatbot")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn chat_without_start_is_not_found() {
        let response = app()
            .oneshot(post_json(
                "/chatbot",
                serde_json::json!({"session_id": "ghost", "text": "hola"}),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn reset_ends_conversation() {
        let app = app();
        start(&app, "s1", "travel", "en-US").await;

        let response = app
            .clone()
            .oneshot(post_json("/reset", serde_json::json!({"session_id": "s1"})))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(post_json(
                "/chatbot",
                serde_json::json!({"session_id": "s1", "text": "Japan."}),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn translate_defaults_to_spanish_english() {
        let app = app();
        let response = app
            .clone()
            .oneshot(post_json("/translate", serde_json::json!({"text": "hola"})))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body: TranslateResponse = read_json(response).await;
        assert_eq!(body.translation, "es>en: HOLA");

        let response = app
            .clone()
            .oneshot(post_json("/translate", serde_json::json!({"from_lang": "es"})))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(post_json(
                "/translate",
                serde_json::json!({"text": "hola", "to_lang": "xx"}),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn detects_language_of_text() {
        let app = app();
        let response = app
            .clone()
            .oneshot(post_json(
                "/detect_language",
                serde_json::json!({
                    "text": "La siguientes es una conversación casual entre 2 personas que hablan Espanol."
                }),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body: DetectResponse = read_json(response).await;
        assert_eq!(body.language, "es");

        let response = app
            .oneshot(post_json("/detect_language", serde_json::json!({"text": " "})))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn transcribe_raw_audio() {
        let app = app();
        let response = app
            .clone()
            .oneshot(
                Request::post("/transcribe?language=es-ES")
                    .body(Body::from("RIFFdata"))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body: TranscribeResponse = read_json(response).await;
        assert_eq!(body.text, "8 bytes in es-ES");

        let response = app
            .clone()
            .oneshot(Request::post("/transcribe").body(Body::from("silence")).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = app
            .oneshot(Request::post("/transcribe").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
