use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use passbook_core::PageImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::AiConfig;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Response contained no text")]
    EmptyResponse,
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Environment variable {0} is not set")]
    MissingApiKey(String),
    #[error("Malformed model output: {0}")]
    Malformed(String),
    #[error("No scripted response left")]
    Exhausted,
}

/// Text-only completion.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, AiError>;
}

/// Completion over a prompt plus page images, in the given order.
#[async_trait]
pub trait VisionClient: Send + Sync {
    async fn complete_with_images(&self, prompt: &str, images: &[PageImage]) -> Result<String, AiError>;
}

// ── Gemini wire format ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    Inline { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Debug, Deserialize)]
struct ResponseCandidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Client for the Gemini `generateContent` endpoint. One instance serves
/// both text and vision requests.
pub struct GeminiClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl GeminiClient {
    pub fn new(config: &AiConfig, api_key: String) -> Result<Self, AiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            url: config.generate_url(),
            api_key,
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        })
    }

    /// Read the key from the variable named by `config.api_key_env`.
    pub fn from_env(config: &AiConfig) -> Result<Self, AiError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AiError::MissingApiKey(config.api_key_env.clone()))?;
        Self::new(config, api_key)
    }

    fn build_request(&self, prompt: &str, images: &[PageImage]) -> GenerateRequest {
        let mut parts = vec![Part::Text { text: prompt.to_string() }];
        parts.extend(images.iter().map(|img| Part::Inline {
            inline_data: InlineData {
                mime_type: img.mime_type.clone(),
                data: BASE64_STANDARD.encode(&img.bytes),
            },
        }));
        GenerateRequest {
            contents: vec![Content { parts }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        }
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String, AiError> {
        let response = self
            .http
            .post(&self.url)
            .query(&[("key", self.api_key.as_str())])
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Status { status: status.as_u16(), body });
        }

        let parsed: GenerateResponse = response.json().await?;
        let text = first_text(parsed).ok_or(AiError::EmptyResponse)?;
        debug!(chars = text.len(), "Model response received");
        Ok(text)
    }
}

fn first_text(response: GenerateResponse) -> Option<String> {
    response
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .find_map(|p| p.text)
        .filter(|t| !t.trim().is_empty())
}

#[async_trait]
impl CompletionClient for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String, AiError> {
        self.generate(&self.build_request(prompt, &[])).await
    }
}

#[async_trait]
impl VisionClient for GeminiClient {
    async fn complete_with_images(&self, prompt: &str, images: &[PageImage]) -> Result<String, AiError> {
        self.generate(&self.build_request(prompt, images)).await
    }
}

// ── Scripted client for tests ────────────────────────────────────────────────

/// Replays queued responses in call order and records every prompt.
/// Serves both text and vision calls from the same queue.
#[derive(Default)]
pub struct ScriptedCompletion {
    responses: Mutex<VecDeque<Result<String, AiError>>>,
    prompts: Mutex<Vec<String>>,
    image_counts: Mutex<Vec<usize>>,
    delay: Option<Duration>,
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()))
    }

    pub fn fail(self, error: AiError) -> Self {
        self.push(Err(error))
    }

    /// Every call sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Number of images attached to each vision call, in call order.
    pub fn image_counts(&self) -> Vec<usize> {
        self.image_counts.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn push(self, response: Result<String, AiError>) -> Self {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(response);
        }
        self
    }

    async fn next(&self, prompt: &str) -> Result<String, AiError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or(Err(AiError::Exhausted))
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, AiError> {
        self.next(prompt).await
    }
}

#[async_trait]
impl VisionClient for ScriptedCompletion {
    async fn complete_with_images(&self, prompt: &str, images: &[PageImage]) -> Result<String, AiError> {
        if let Ok(mut counts) = self.image_counts.lock() {
            counts.push(images.len());
        }
        self.next(prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GeminiClient {
        GeminiClient::new(&AiConfig::default(), "test-key".to_string()).unwrap()
    }

    #[test]
    fn text_request_matches_generate_content_shape() {
        let request = client().build_request("extract please", &[]);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "extract please");
        assert_eq!(json["contents"][0]["parts"].as_array().unwrap().len(), 1);
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 65_536);
        assert!((json["generationConfig"]["temperature"].as_f64().unwrap() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn images_are_inlined_as_base64_after_the_prompt() {
        let pages = vec![PageImage::png(0, vec![1, 2, 3]), PageImage::jpeg(1, vec![0xff, 0xd8])];
        let json = serde_json::to_value(client().build_request("p", &pages)).unwrap();
        let parts = json["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(parts[1]["inline_data"]["data"], "AQID");
        assert_eq!(parts[2]["inline_data"]["mime_type"], "image/jpeg");
    }

    #[test]
    fn url_joins_endpoint_and_model() {
        let config = AiConfig {
            endpoint: "http://localhost:8080/v1beta/models/".to_string(),
            model: "gemini-test".to_string(),
            ..AiConfig::default()
        };
        assert_eq!(config.generate_url(), "http://localhost:8080/v1beta/models/gemini-test:generateContent");
    }

    #[test]
    fn first_text_skips_empty_candidates() {
        let response: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"[]"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(first_text(response).as_deref(), Some("[]"));

        let empty: GenerateResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(first_text(empty).is_none());
    }

    #[test]
    fn missing_key_is_reported() {
        let config = AiConfig {
            api_key_env: "PASSBOOK_TEST_KEY_THAT_IS_NOT_SET".to_string(),
            ..AiConfig::default()
        };
        assert!(matches!(GeminiClient::from_env(&config), Err(AiError::MissingApiKey(_))));
    }

    #[tokio::test]
    async fn scripted_client_replays_in_order() {
        let scripted = ScriptedCompletion::new().respond("one").fail(AiError::EmptyResponse);
        assert_eq!(scripted.complete("a").await.unwrap(), "one");
        assert!(matches!(scripted.complete("b").await, Err(AiError::EmptyResponse)));
        assert!(matches!(scripted.complete("c").await, Err(AiError::Exhausted)));
        assert_eq!(scripted.prompts(), ["a", "b", "c"]);
    }
}
