use serde::{Deserialize, Serialize};

/// `[ai]` section of the pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Base URL; the request goes to `{endpoint}/{model}:generateContent`.
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub request_timeout_secs: u64,
    pub chunk_concurrency: usize,
    pub vision_batch_size: usize,
    pub vision_batch_delay_ms: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
            model: "gemini-1.5-flash".to_string(),
            api_key_env: "PASSBOOK_LLM_API_KEY".to_string(),
            temperature: 0.1,
            max_output_tokens: 65_536,
            request_timeout_secs: 90,
            chunk_concurrency: 4,
            vision_batch_size: 5,
            vision_batch_delay_ms: 5_000,
        }
    }
}

impl AiConfig {
    pub fn generate_url(&self) -> String {
        format!("{}/{}:generateContent", self.endpoint.trim_end_matches('/'), self.model)
    }
}
