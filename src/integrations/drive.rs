//! Google Drive REST client.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::config::IntegrationConfig;

use super::http::ApiClient;
use super::traits::{FetchResult, Integration, Operation};
use super::types::{FileDescriptor, FileType, IntegrationId, MimeClass, StorageUsage};

const FILE_FIELDS: &str = "id,name,mimeType,modifiedTime,size,webViewLink";

/// Document-store integration backed by the Google Drive v3 API.
pub struct DriveClient {
    api: ApiClient,
}

impl DriveClient {
    pub fn from_config(config: &IntegrationConfig) -> FetchResult<Self> {
        Ok(Self {
            api: ApiClient::from_config(
                IntegrationId::Drive,
                config,
                IntegrationId::Drive.token_env(),
            )?,
        })
    }

    async fn list(&self, q: String, order_by: &str, limit: usize) -> FetchResult<Value> {
        let result = self
            .api
            .get_json(
                "files",
                &[
                    ("q", q),
                    ("orderBy", order_by.to_string()),
                    ("pageSize", limit.to_string()),
                    ("fields", format!("files({})", FILE_FIELDS)),
                ],
            )
            .await?;

        let files: Vec<FileDescriptor> = result
            .get("files")
            .and_then(Value::as_array)
            .map(|files| files.iter().take(limit).filter_map(parse_file).collect())
            .unwrap_or_default();

        Ok(serde_json::to_value(files).unwrap_or_else(|_| json!([])))
    }

    async fn metadata(&self, file_id: &str) -> FetchResult<Value> {
        let file = self
            .api
            .get_json(
                &format!("files/{}", file_id),
                &[("fields", FILE_FIELDS.to_string())],
            )
            .await?;
        Ok(parse_file(&file)
            .and_then(|f| serde_json::to_value(f).ok())
            .unwrap_or(Value::Null))
    }

    async fn export(
        &self,
        op: &Operation,
        file_id: &str,
        mime_class: MimeClass,
    ) -> FetchResult<Value> {
        let text = match (mime_class, mime_class.export_mime()) {
            (_, Some(export_mime)) => {
                self.api
                    .get_text(
                        &format!("files/{}/export", file_id),
                        &[("mimeType", export_mime.to_string())],
                    )
                    .await?
            }
            (MimeClass::PlainText, None) => {
                self.api
                    .get_text(
                        &format!("files/{}", file_id),
                        &[("alt", "media".to_string())],
                    )
                    .await?
            }
            _ => return Err(op.unsupported_by(self.id())),
        };
        Ok(json!({ "text": text }))
    }

    async fn storage_usage(&self) -> FetchResult<Value> {
        let about = self
            .api
            .get_json("about", &[("fields", "storageQuota".to_string())])
            .await?;
        let usage = parse_storage_quota(about.get("storageQuota").unwrap_or(&Value::Null));
        Ok(serde_json::to_value(usage).unwrap_or(Value::Null))
    }
}

#[async_trait]
impl Integration for DriveClient {
    fn id(&self) -> IntegrationId {
        IntegrationId::Drive
    }

    async fn authenticate(&self) -> FetchResult<bool> {
        Ok(self.api.has_token())
    }

    async fn test_connection(&self) -> FetchResult<bool> {
        let about = self
            .api
            .get_json("about", &[("fields", "user".to_string())])
            .await?;
        Ok(about.get("user").is_some())
    }

    async fn execute(&self, op: &Operation) -> FetchResult<Value> {
        match op {
            Operation::RecentFiles { limit } => {
                self.list("trashed=false".to_string(), "modifiedTime desc", *limit)
                    .await
            }
            Operation::SearchFiles {
                query,
                full_text,
                limit,
            } => {
                self.list(search_query(query, *full_text), "modifiedTime desc", *limit)
                    .await
            }
            Operation::SharedFiles { limit } => {
                self.list(
                    "sharedWithMe=true and trashed=false".to_string(),
                    "modifiedTime desc",
                    *limit,
                )
                .await
            }
            Operation::FilesByType { file_type, limit } => {
                self.list(type_query(*file_type), "modifiedTime desc", *limit)
                    .await
            }
            Operation::FileMetadata { file_id } => self.metadata(file_id).await,
            Operation::ExportFile {
                file_id,
                mime_class,
            } => self.export(op, file_id, *mime_class).await,
            Operation::StorageUsage => self.storage_usage().await,
            other => Err(other.unsupported_by(self.id())),
        }
    }
}

/// Escape a user term for a Drive `q` string literal.
fn escape_term(term: &str) -> String {
    term.replace('\\', "\\\\").replace('\'', "\\'")
}

pub(crate) fn search_query(term: &str, full_text: bool) -> String {
    let term = escape_term(term.trim());
    if full_text {
        format!(
            "(name contains '{0}' or fullText contains '{0}') and trashed=false",
            term
        )
    } else {
        format!("name contains '{}' and trashed=false", term)
    }
}

pub(crate) fn type_query(file_type: FileType) -> String {
    format!("{} and trashed=false", file_type.query_clause())
}

/// Parse one Drive `files` resource. `size` arrives as a decimal string.
pub(crate) fn parse_file(file: &Value) -> Option<FileDescriptor> {
    let id = file.get("id").and_then(Value::as_str)?.to_string();
    let name = file
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let mime_type = file
        .get("mimeType")
        .and_then(Value::as_str)
        .unwrap_or("application/octet-stream")
        .to_string();

    Some(FileDescriptor {
        id,
        name,
        mime_class: MimeClass::from_mime_type(&mime_type),
        mime_type,
        size_bytes: int64_field(file, "size").unwrap_or(0),
        modified_time: file
            .get("modifiedTime")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc)),
        web_link: file
            .get("webViewLink")
            .and_then(Value::as_str)
            .map(String::from),
    })
}

fn int64_field(value: &Value, key: &str) -> Option<u64> {
    match value.get(key)? {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

fn parse_storage_quota(quota: &Value) -> StorageUsage {
    StorageUsage {
        limit: int64_field(quota, "limit"),
        usage: int64_field(quota, "usage").unwrap_or(0),
        usage_in_drive: int64_field(quota, "usageInDrive").unwrap_or(0),
        usage_in_trash: int64_field(quota, "usageInDriveTrash").unwrap_or(0),
    }
}
