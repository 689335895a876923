//! OpenAI-compatible chat completion provider.
//!
//! Works against LM Studio, Ollama, llama.cpp server and OpenAI itself:
//! `GET {base_url}/models` for liveness and `POST {base_url}/chat/completions`
//! for generation.

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{AiProviderConfig, AiProviderKind};
use crate::error::{AiError, Result};

use super::{AiRequest, CompletionProvider};

/// Model name that asks for the first model the server reports.
pub const AUTO_MODEL: &str = "local-model";

const SYSTEM_PROMPT: &str = "You are a helpful assistant. Provide clear, concise responses. \
Use bullet points for lists and summaries.";

/// Chat completion request body.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

/// OpenAI error response format.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Completion provider for any OpenAI-compatible endpoint.
pub struct OpenAiCompatibleProvider {
    client: Client,
    kind: AiProviderKind,
    base_url: String,
    model: RwLock<String>,
    api_key: Option<String>,
    max_tokens: u32,
}

impl OpenAiCompatibleProvider {
    /// Create a provider from configuration.
    ///
    /// The cloud provider requires an API key (config or `OPENAI_API_KEY`);
    /// the local one sends none unless configured.
    pub fn from_config(kind: AiProviderKind, config: &AiProviderConfig) -> Result<Self> {
        let api_key = match kind {
            AiProviderKind::Local => config.api_key.clone(),
            AiProviderKind::Cloud => Some(
                config
                    .api_key
                    .clone()
                    .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                    .ok_or_else(|| {
                        AiError::Unavailable(
                            "API key not provided and OPENAI_API_KEY env var not set".to_string(),
                        )
                    })?,
            ),
        };

        Ok(
            Self::new(kind, &config.base_url, &config.model, api_key, config.timeout_secs)?
                .with_max_tokens(config.max_tokens),
        )
    }

    /// Create a provider with explicit parameters.
    pub fn new(
        kind: AiProviderKind,
        base_url: &str,
        model: &str,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AiError::Api(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            kind,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: RwLock::new(model.to_string()),
            api_key,
            max_tokens: u32::MAX,
        })
    }

    /// Cap the tokens requested per completion.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens.max(1);
        self
    }

    /// Model currently used for requests.
    pub fn model(&self) -> String {
        self.model.read().clone()
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.client.post(url);
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

fn map_request_error(e: reqwest::Error) -> AiError {
    if e.is_timeout() {
        AiError::Api("Request timed out".to_string())
    } else if e.is_connect() {
        AiError::Unavailable(format!("Connection failed: {}", e))
    } else {
        AiError::Api(format!("Request failed: {}", e))
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatibleProvider {
    fn kind(&self) -> AiProviderKind {
        self.kind
    }

    fn name(&self) -> String {
        format!("{} ({})", self.base_url, self.model())
    }

    async fn probe(&self) -> Result<()> {
        let url = format!("{}/models", self.base_url);
        let response = self.get(&url).send().await.map_err(map_request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AiError::Unavailable(format!("HTTP {} from {}", status, url)).into());
        }

        let models: ModelsResponse = response
            .json()
            .await
            .map_err(|e| AiError::Api(format!("Failed to parse models: {}", e)))?;

        if self.model() == AUTO_MODEL {
            if let Some(first) = models.data.first() {
                tracing::info!("Auto-detected model: {}", first.id);
                *self.model.write() = first.id.clone();
            }
        }

        Ok(())
    }

    async fn complete(&self, request: &AiRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let model = self.model();

        let body = ChatRequest {
            model: &model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            max_tokens: request.max_tokens.min(self.max_tokens),
            temperature: request.temperature,
            stream: false,
        };

        let response = self
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();

        if status.is_success() {
            let result: ChatResponse = response
                .json()
                .await
                .map_err(|e| AiError::Api(format!("Failed to parse response: {}", e)))?;

            let content = result
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .map(|c| clean_response(&c))
                .unwrap_or_default();

            if content.is_empty() {
                Err(AiError::EmptyCompletion.into())
            } else {
                Ok(content)
            }
        } else if status.as_u16() == 429 {
            Err(AiError::RateLimited.into())
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            if let Ok(error_response) = serde_json::from_str::<ErrorResponse>(&error_text) {
                Err(AiError::Api(format!(
                    "API error ({}): {}",
                    status, error_response.error.message
                ))
                .into())
            } else {
                Err(AiError::Api(format!("API error ({}): {}", status, error_text)).into())
            }
        }
    }
}

/// Strip a leading reasoning line ("Let me ...", "I need to ...") and whitespace.
pub fn clean_response(content: &str) -> String {
    let content = content.trim();

    if content.starts_with("Let me ") || content.starts_with("I need to ") {
        if let Some((_, rest)) = content.split_once('\n') {
            return rest.trim().to_string();
        }
    }

    content.to_string()
}
