//! Shared bearer-token HTTP plumbing for the REST integrations.

use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use crate::config::IntegrationConfig;
use crate::error::IntegrationError;

use super::traits::FetchResult;
use super::types::IntegrationId;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Google-style error body: `{"error": {"message": ...}}`.
#[derive(Debug, Deserialize)]
struct GoogleErrorResponse {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    message: String,
}

/// GitHub-style error body: `{"message": ...}`.
#[derive(Debug, Deserialize)]
struct MessageResponse {
    message: String,
}

/// Thin REST client carrying a base URL and an optional bearer token.
#[derive(Clone)]
pub(crate) struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    integration: IntegrationId,
}

impl ApiClient {
    /// Build a client; the token falls back to `token_env` when not configured.
    pub fn from_config(
        integration: IntegrationId,
        config: &IntegrationConfig,
        token_env: &str,
    ) -> FetchResult<Self> {
        let token = config
            .token
            .clone()
            .or_else(|| std::env::var(token_env).ok())
            .filter(|t| !t.trim().is_empty());

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(concat!("concierge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| IntegrationError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token,
            integration,
        })
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> FetchResult<serde_json::Value> {
        let response = self.send(path, query).await?;
        response
            .json()
            .await
            .map_err(|e| IntegrationError::Decode(format!("Failed to parse response: {}", e)))
    }

    pub async fn get_text(&self, path: &str, query: &[(&str, String)]) -> FetchResult<String> {
        let response = self.send(path, query).await?;
        response
            .text()
            .await
            .map_err(|e| IntegrationError::Decode(format!("Failed to read body: {}", e)))
    }

    async fn send(&self, path: &str, query: &[(&str, String)]) -> FetchResult<Response> {
        let token = self.token.as_deref().ok_or_else(|| {
            IntegrationError::NotAuthenticated(self.integration.display_name().to_string())
        })?;

        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        tracing::debug!(integration = %self.integration, url = %url, "GET");

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .query(query)
            .send()
            .await
            .map_err(IntegrationError::from_reqwest)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED {
            return Err(IntegrationError::NotAuthenticated(
                self.integration.display_name().to_string(),
            ));
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(IntegrationError::Api {
            status: status.as_u16(),
            message: error_message(&body),
        })
    }
}

/// Pull a readable message out of an error body.
fn error_message(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<GoogleErrorResponse>(body) {
        return parsed.error.message;
    }
    if let Ok(parsed) = serde_json::from_str::<MessageResponse>(body) {
        return parsed.message;
    }
    if body.trim().is_empty() {
        "Unknown error".to_string()
    } else {
        body.trim().to_string()
    }
}
