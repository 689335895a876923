//! Integration capability trait and the operations it serves.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::IntegrationError;

use super::types::{FileType, IntegrationId, MimeClass};

/// Result of a single integration call.
pub type FetchResult<T> = std::result::Result<T, IntegrationError>;

/// Uniform read access to one external data source.
#[async_trait]
pub trait Integration: Send + Sync {
    /// Which data source this is.
    fn id(&self) -> IntegrationId;

    /// Check that credentials are present and accepted.
    async fn authenticate(&self) -> FetchResult<bool>;

    /// Lightweight liveness call against the service.
    async fn test_connection(&self) -> FetchResult<bool>;

    /// Run one read operation and return its raw JSON payload.
    async fn execute(&self, op: &Operation) -> FetchResult<serde_json::Value>;
}

/// Every read operation the dispatcher can request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    // Mail
    UnreadCount,
    RecentEmails { limit: usize },
    EmailsFromSender { sender: String, limit: usize },
    SearchEmails { query: String, limit: usize },
    UrgentEmails { limit: usize },

    // Source control
    OpenPullRequests { limit: usize },
    PullRequestsToReview { limit: usize },
    AssignedIssues { limit: usize },
    RecentCommits { limit: usize },
    RepositoryStats,

    // Calendar
    EventsInRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    // Document store
    RecentFiles { limit: usize },
    SearchFiles {
        query: String,
        full_text: bool,
        limit: usize,
    },
    SharedFiles { limit: usize },
    FilesByType { file_type: FileType, limit: usize },
    FileMetadata { file_id: String },
    ExportFile { file_id: String, mime_class: MimeClass },
    StorageUsage,
}

impl Operation {
    /// Stable identifier used in cache keys and logs.
    pub fn operation_id(&self) -> &'static str {
        match self {
            Self::UnreadCount => "unread_count",
            Self::RecentEmails { .. } => "recent_emails",
            Self::EmailsFromSender { .. } => "emails_from_sender",
            Self::SearchEmails { .. } => "search_emails",
            Self::UrgentEmails { .. } => "urgent_emails",
            Self::OpenPullRequests { .. } => "open_pull_requests",
            Self::PullRequestsToReview { .. } => "pull_requests_to_review",
            Self::AssignedIssues { .. } => "assigned_issues",
            Self::RecentCommits { .. } => "recent_commits",
            Self::RepositoryStats => "repository_stats",
            Self::EventsInRange { .. } => "events_in_range",
            Self::RecentFiles { .. } => "recent_files",
            Self::SearchFiles { .. } => "search_files",
            Self::SharedFiles { .. } => "shared_files",
            Self::FilesByType { .. } => "files_by_type",
            Self::FileMetadata { .. } => "file_metadata",
            Self::ExportFile { .. } => "export_file",
            Self::StorageUsage => "storage_usage",
        }
    }

    /// The integration that serves this operation.
    pub fn integration(&self) -> IntegrationId {
        match self {
            Self::UnreadCount
            | Self::RecentEmails { .. }
            | Self::EmailsFromSender { .. }
            | Self::SearchEmails { .. }
            | Self::UrgentEmails { .. } => IntegrationId::Mail,
            Self::OpenPullRequests { .. }
            | Self::PullRequestsToReview { .. }
            | Self::AssignedIssues { .. }
            | Self::RecentCommits { .. }
            | Self::RepositoryStats => IntegrationId::SourceControl,
            Self::EventsInRange { .. } => IntegrationId::Calendar,
            Self::RecentFiles { .. }
            | Self::SearchFiles { .. }
            | Self::SharedFiles { .. }
            | Self::FilesByType { .. }
            | Self::FileMetadata { .. }
            | Self::ExportFile { .. }
            | Self::StorageUsage => IntegrationId::Drive,
        }
    }

    /// Canonical JSON encoding of the operation and its parameters.
    ///
    /// Field order follows declaration order, so equal operations always
    /// encode to the same string.
    pub fn canonical_params(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.operation_id().to_string())
    }

    /// Error for an operation sent to the wrong integration.
    pub fn unsupported_by(&self, integration: IntegrationId) -> IntegrationError {
        IntegrationError::Unsupported {
            integration: integration.to_string(),
            operation: self.operation_id().to_string(),
        }
    }
}
