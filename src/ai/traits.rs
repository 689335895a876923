//! Completion provider trait and request/response types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::AiProviderKind;

/// One completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct AiRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Deadline for a single provider attempt
    pub timeout: Duration,
}

impl AiRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: 300,
            temperature: 0.3,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Completion outcome. `degraded` means no provider answered and `text`
/// is the unprocessed input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiResponse {
    pub text: String,
    pub provider_used: Option<AiProviderKind>,
    pub degraded: bool,
}

/// An inference backend reachable over HTTP.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Whether this is the local or the cloud backend.
    fn kind(&self) -> AiProviderKind;

    /// Display name (endpoint and model).
    fn name(&self) -> String;

    /// Lightweight liveness call; `Ok` means the provider can take requests.
    async fn probe(&self) -> crate::error::Result<()>;

    /// Generate a completion for `request.prompt`.
    async fn complete(&self, request: &AiRequest) -> crate::error::Result<String>;
}
