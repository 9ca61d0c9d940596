// src/services/openai.rs
//! Client for OpenAI-compatible text generation.
//!
//! `gpt-5*` and `o*` reasoning models go through the Responses API, every
//! other model through Chat Completions. Transient failures are retried with
//! exponential backoff.

use crate::services::settings::SettingsService;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_RESUME_PARSING_MODEL: &str = "gpt-5-mini";
pub const DEFAULT_RESUME_PARSING_EFFORT: &str = "low";

const MAX_ATTEMPTS: u32 = 3;
const BASE_RETRY_DELAY: Duration = Duration::from_secs(1);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, thiserror::Error)]
pub enum OpenAIError {
    #[error("API key not configured")]
    NotConfigured,

    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("API rejected the request: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Settings error: {0}")]
    SettingsError(String),
}

impl OpenAIError {
    /// Network errors, 429 and 5xx are worth another attempt
    fn is_retryable(&self) -> bool {
        match self {
            OpenAIError::RequestFailed(_) | OpenAIError::RateLimitExceeded => true,
            OpenAIError::Rejected { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub base_url: String,
    pub resume_parsing_model: String,
    pub resume_parsing_effort: String,
}

const RESUME_PARSING_SYSTEM_PROMPT: &str =
    "You extract structured fields from student resumes. Reply with a single JSON object and nothing else.";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Request body for one of the two endpoint flavours
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GenerationRequest {
    Chat {
        model: String,
        messages: Vec<ChatMessage>,
        temperature: f32,
        max_tokens: u32,
    },
    Responses {
        model: String,
        input: Vec<serde_json::Value>,
        max_output_tokens: u32,
        reasoning: serde_json::Value,
        text: serde_json::Value,
    },
}

impl GenerationRequest {
    fn new(model: &str, effort: &str, system: &str, prompt: &str) -> Self {
        if uses_responses_api(model) {
            GenerationRequest::Responses {
                model: model.to_string(),
                input: vec![json!({
                    "role": "user",
                    "content": [
                        { "type": "input_text", "text": system },
                        { "type": "input_text", "text": prompt }
                    ]
                })],
                max_output_tokens: 2000,
                reasoning: json!({ "effort": effort }),
                text: json!({ "format": { "type": "text" } }),
            }
        } else {
            GenerationRequest::Chat {
                model: model.to_string(),
                messages: vec![
                    ChatMessage {
                        role: "system".to_string(),
                        content: system.to_string(),
                    },
                    ChatMessage {
                        role: "user".to_string(),
                        content: prompt.to_string(),
                    },
                ],
                temperature: 0.0,
                max_tokens: 1000,
            }
        }
    }

    fn endpoint(&self) -> &'static str {
        match self {
            GenerationRequest::Chat { .. } => "v1/chat/completions",
            GenerationRequest::Responses { .. } => "v1/responses",
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    output: Vec<OutputItem>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<ContentItem>,
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u32,
}

fn uses_responses_api(model: &str) -> bool {
    model.starts_with("gpt-5") || model.starts_with("o1") || model.starts_with("o3")
}

impl ChatCompletionResponse {
    /// Pulls the generated text from either response shape
    fn into_text(self) -> Result<String, OpenAIError> {
        if !self.output.is_empty() {
            return self
                .output
                .into_iter()
                .flat_map(|item| item.content)
                .find_map(|c| c.text)
                .ok_or_else(|| OpenAIError::InvalidResponse("No text in output".to_string()));
        }

        self.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| OpenAIError::InvalidResponse("No choices in response".to_string()))
    }
}

#[derive(Debug)]
pub struct OpenAIService {
    settings_service: Arc<SettingsService>,
    client: Client,
}

impl OpenAIService {
    pub fn new(settings_service: Arc<SettingsService>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            settings_service,
            client,
        }
    }

    async fn setting_or(&self, key: &str, default: &str) -> Result<String, OpenAIError> {
        let value = self
            .settings_service
            .get_setting(key)
            .await
            .map_err(|e| OpenAIError::SettingsError(e.to_string()))?;

        Ok(value
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| default.to_string()))
    }

    pub async fn get_config(&self) -> Result<OpenAIConfig, OpenAIError> {
        let api_key = self.setting_or("openai_api_key", "").await?;
        if api_key.is_empty() {
            return Err(OpenAIError::NotConfigured);
        }

        Ok(OpenAIConfig {
            api_key,
            base_url: self.setting_or("openai_base_url", DEFAULT_BASE_URL).await?,
            resume_parsing_model: self
                .setting_or("openai_model_resume_parsing", DEFAULT_RESUME_PARSING_MODEL)
                .await?,
            resume_parsing_effort: self
                .setting_or(
                    "openai_reasoning_effort_resume_parsing",
                    DEFAULT_RESUME_PARSING_EFFORT,
                )
                .await?,
        })
    }

    /// Request for the configured resume parsing model
    fn resume_parsing_request(config: &OpenAIConfig, prompt: &str) -> GenerationRequest {
        GenerationRequest::new(
            &config.resume_parsing_model,
            &config.resume_parsing_effort,
            RESUME_PARSING_SYSTEM_PROMPT,
            prompt,
        )
    }

    /// Sends a resume parsing prompt and returns the raw model text
    pub async fn parse_resume(&self, prompt: &str) -> Result<String, OpenAIError> {
        let config = self.get_config().await?;
        let request = Self::resume_parsing_request(&config, prompt);

        debug!(
            model = %config.resume_parsing_model,
            reasoning_effort = %config.resume_parsing_effort,
            endpoint = request.endpoint(),
            "Sending resume parsing request"
        );

        let response = self.send_with_retry(&config, &request).await?;

        if let Some(usage) = &response.usage {
            info!(model = %config.resume_parsing_model, tokens_used = usage.total_tokens, "Resume parsing completed");
        }

        response.into_text()
    }

    async fn send_with_retry(
        &self,
        config: &OpenAIConfig,
        request: &GenerationRequest,
    ) -> Result<ChatCompletionResponse, OpenAIError> {
        let mut attempt = 1;
        loop {
            match self.send(config, request).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < MAX_ATTEMPTS => {
                    let delay = BASE_RETRY_DELAY * 2u32.pow(attempt - 1);
                    warn!(attempt, max_attempts = MAX_ATTEMPTS, delay_ms = delay.as_millis() as u64, error = %e, "Text generation failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send(
        &self,
        config: &OpenAIConfig,
        request: &GenerationRequest,
    ) -> Result<ChatCompletionResponse, OpenAIError> {
        let url = format!(
            "{}/{}",
            config.base_url.trim_end_matches('/'),
            request.endpoint()
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&config.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| OpenAIError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(OpenAIError::RateLimitExceeded);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Text generation request rejected");
            return Err(OpenAIError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|e| OpenAIError::InvalidResponse(e.to_string()))
    }
}
