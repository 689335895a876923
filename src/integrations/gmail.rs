//! Gmail REST client.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{json, Value};

use crate::config::IntegrationConfig;
use crate::utils::truncate_with_ellipsis;

use super::http::ApiClient;
use super::traits::{FetchResult, Integration, Operation};
use super::types::{EmailMessage, IntegrationId};

const MAX_BODY_BYTES: usize = 500;

/// Mail integration backed by the Gmail v1 API.
pub struct GmailClient {
    api: ApiClient,
}

impl GmailClient {
    pub fn from_config(config: &IntegrationConfig) -> FetchResult<Self> {
        Ok(Self {
            api: ApiClient::from_config(
                IntegrationId::Mail,
                config,
                IntegrationId::Mail.token_env(),
            )?,
        })
    }

    async fn unread_count(&self) -> FetchResult<Value> {
        let listing = self
            .api
            .get_json(
                "users/me/messages",
                &[("q", "is:unread".to_string()), ("maxResults", "1".to_string())],
            )
            .await?;
        let count = listing
            .get("resultSizeEstimate")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        Ok(json!({ "unread_count": count }))
    }

    /// List messages matching a Gmail search query and fetch each one.
    async fn messages(&self, query: &str, limit: usize) -> FetchResult<Vec<EmailMessage>> {
        let listing = self
            .api
            .get_json(
                "users/me/messages",
                &[("q", query.to_string()), ("maxResults", limit.to_string())],
            )
            .await?;

        let ids: Vec<String> = listing
            .get("messages")
            .and_then(Value::as_array)
            .map(|messages| {
                messages
                    .iter()
                    .filter_map(|m| m.get("id").and_then(Value::as_str).map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        let mut emails = Vec::with_capacity(ids.len());
        for id in ids.iter().take(limit) {
            let message = self
                .api
                .get_json(
                    &format!("users/me/messages/{}", id),
                    &[("format", "full".to_string())],
                )
                .await?;
            emails.push(parse_message(&message));
        }

        Ok(emails)
    }
}

#[async_trait]
impl Integration for GmailClient {
    fn id(&self) -> IntegrationId {
        IntegrationId::Mail
    }

    async fn authenticate(&self) -> FetchResult<bool> {
        Ok(self.api.has_token())
    }

    async fn test_connection(&self) -> FetchResult<bool> {
        let profile = self.api.get_json("users/me/profile", &[]).await?;
        Ok(profile.get("emailAddress").is_some())
    }

    async fn execute(&self, op: &Operation) -> FetchResult<Value> {
        let emails = match op {
            Operation::UnreadCount => return self.unread_count().await,
            Operation::RecentEmails { limit } => self.messages("in:inbox", *limit).await?,
            Operation::EmailsFromSender { sender, limit } => {
                self.messages(&format!("from:{}", sender), *limit).await?
            }
            Operation::SearchEmails { query, limit } => self.messages(query, *limit).await?,
            Operation::UrgentEmails { limit } => {
                self.messages("is:unread is:important", *limit).await?
            }
            other => return Err(other.unsupported_by(self.id())),
        };
        Ok(serde_json::to_value(emails).unwrap_or_else(|_| json!([])))
    }
}

/// Turn a Gmail `messages.get` payload into an [`EmailMessage`].
pub(crate) fn parse_message(message: &Value) -> EmailMessage {
    let payload = message.get("payload").cloned().unwrap_or(Value::Null);
    let header = |name: &str| -> Option<String> {
        payload
            .get("headers")
            .and_then(Value::as_array)?
            .iter()
            .find(|h| h.get("name").and_then(Value::as_str) == Some(name))
            .and_then(|h| h.get("value").and_then(Value::as_str))
            .map(String::from)
    };

    let body = extract_body(&payload);
    let body = truncate_with_ellipsis(&body, MAX_BODY_BYTES);

    let is_unread = message
        .get("labelIds")
        .and_then(Value::as_array)
        .map(|labels| labels.iter().any(|l| l.as_str() == Some("UNREAD")))
        .unwrap_or(false);

    EmailMessage {
        id: message
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        subject: header("Subject").unwrap_or_else(|| "No Subject".to_string()),
        sender: header("From").unwrap_or_else(|| "Unknown Sender".to_string()),
        date: header("Date").unwrap_or_default(),
        snippet: message
            .get("snippet")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        body,
        is_unread,
    }
}

/// First `text/plain` part of a message payload, base64url-decoded.
fn extract_body(payload: &Value) -> String {
    if let Some(parts) = payload.get("parts").and_then(Value::as_array) {
        return parts
            .iter()
            .find(|p| p.get("mimeType").and_then(Value::as_str) == Some("text/plain"))
            .map(decode_part)
            .unwrap_or_default();
    }

    if payload.get("mimeType").and_then(Value::as_str) == Some("text/plain") {
        return decode_part(payload);
    }

    String::new()
}

fn decode_part(part: &Value) -> String {
    part.get("body")
        .and_then(|b| b.get("data"))
        .and_then(Value::as_str)
        .and_then(|data| URL_SAFE_NO_PAD.decode(data.trim_end_matches('=')).ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(text: &str) -> String {
        URL_SAFE_NO_PAD.encode(text)
    }

    #[test]
    fn test_parse_multipart_message() {
        let message = json!({
            "id": "m1",
            "snippet": "Weekly digest",
            "labelIds": ["INBOX", "UNREAD"],
            "payload": {
                "mimeType": "multipart/alternative",
                "headers": [
                    {"name": "Subject", "value": "n8n digest"},
                    {"name": "From", "value": "n8n <hello@n8n.io>"},
                    {"name": "Date", "value": "Mon, 1 Sep 2025 10:00:00 +0000"}
                ],
                "parts": [
                    {"mimeType": "text/html", "body": {"data": encode("<p>hi</p>")}},
                    {"mimeType": "text/plain", "body": {"data": encode("New workflow templates")}}
                ]
            }
        });

        let email = parse_message(&message);
        assert_eq!(email.id, "m1");
        assert_eq!(email.subject, "n8n digest");
        assert_eq!(email.sender, "n8n <hello@n8n.io>");
        assert_eq!(email.body, "New workflow templates");
        assert!(email.is_unread);
    }

    #[test]
    fn test_parse_message_defaults() {
        let email = parse_message(&json!({"id": "m2", "payload": {"mimeType": "text/html"}}));
        assert_eq!(email.subject, "No Subject");
        assert_eq!(email.sender, "Unknown Sender");
        assert!(email.body.is_empty());
        assert!(!email.is_unread);
    }

    #[test]
    fn test_long_body_truncated() {
        let long = "a".repeat(800);
        let message = json!({
            "id": "m3",
            "payload": {"mimeType": "text/plain", "body": {"data": encode(&long)}}
        });
        let email = parse_message(&message);
        assert_eq!(email.body.len(), MAX_BODY_BYTES + 3);
        assert!(email.body.ends_with("..."));
    }

    #[tokio::test]
    async fn test_missing_token_not_authenticated() {
        let config = IntegrationConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            token: None,
            ..Default::default()
        };
        std::env::remove_var("GOOGLE_ACCESS_TOKEN");
        let client = GmailClient::from_config(&config).unwrap();
        assert!(!client.authenticate().await.unwrap());
        assert!(client.execute(&Operation::UnreadCount).await.is_err());
    }
}
