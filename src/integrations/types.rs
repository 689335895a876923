//! Domain records returned by integrations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifies one external data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationId {
    Mail,
    SourceControl,
    Calendar,
    Drive,
}

impl IntegrationId {
    pub const ALL: [IntegrationId; 4] = [
        IntegrationId::Mail,
        IntegrationId::SourceControl,
        IntegrationId::Calendar,
        IntegrationId::Drive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mail => "mail",
            Self::SourceControl => "source_control",
            Self::Calendar => "calendar",
            Self::Drive => "drive",
        }
    }

    /// Human-readable service name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Mail => "Gmail",
            Self::SourceControl => "GitHub",
            Self::Calendar => "Google Calendar",
            Self::Drive => "Google Drive",
        }
    }

    /// Parse a config key or service name, e.g. `source_control` or `github`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "mail" | "gmail" | "email" => Some(Self::Mail),
            "source_control" | "github" | "git" => Some(Self::SourceControl),
            "calendar" => Some(Self::Calendar),
            "drive" | "files" => Some(Self::Drive),
            _ => None,
        }
    }

    /// Environment variable holding the bearer token for this service.
    pub fn token_env(&self) -> &'static str {
        match self {
            Self::SourceControl => "GITHUB_TOKEN",
            Self::Mail | Self::Calendar | Self::Drive => "GOOGLE_ACCESS_TOKEN",
        }
    }
}

impl fmt::Display for IntegrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Mail
// ============================================================================

/// A single email message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub id: String,
    pub subject: String,
    pub sender: String,
    pub date: String,
    pub snippet: String,
    /// Plain-text body, truncated to 500 characters
    pub body: String,
    pub is_unread: bool,
}

// ============================================================================
// Source control
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub repository: String,
    pub author: String,
    pub url: String,
    pub state: String,
    #[serde(default)]
    pub draft: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub repository: String,
    pub url: String,
    pub state: String,
    #[serde(default)]
    pub labels: Vec<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    /// Short SHA
    pub sha: String,
    /// First line of the commit message
    pub message: String,
    pub repository: String,
    pub date: Option<DateTime<Utc>>,
}

/// One repository singled out in [`RepositoryStats`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryHighlight {
    pub name: String,
    pub url: String,
    pub stars: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Totals over the repositories the user owns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositoryStats {
    pub total_repos: usize,
    pub public_repos: usize,
    pub private_repos: usize,
    pub total_stars: u64,
    pub total_forks: u64,
    /// Primary language to number of repositories
    #[serde(default)]
    pub languages: BTreeMap<String, usize>,
    pub most_starred: Option<RepositoryHighlight>,
    pub most_recent: Option<RepositoryHighlight>,
}

impl RepositoryStats {
    /// Languages by repository count, most used first; ties by name.
    pub fn top_languages(&self, n: usize) -> Vec<(&str, usize)> {
        let mut languages: Vec<(&str, usize)> = self
            .languages
            .iter()
            .map(|(name, count)| (name.as_str(), *count))
            .collect();
        languages.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        languages.truncate(n);
        languages
    }
}

// ============================================================================
// Calendar
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub summary: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub all_day: bool,
    pub location: Option<String>,
    #[serde(default)]
    pub attendees: Vec<String>,
    pub link: Option<String>,
}

/// A gap between calendar events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_minutes: i64,
}

// ============================================================================
// Document store
// ============================================================================

/// Coarse content class deciding whether a file can be exported as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MimeClass {
    Doc,
    Sheet,
    Slide,
    PlainText,
    UnsupportedBinary,
}

impl MimeClass {
    pub fn from_mime_type(mime_type: &str) -> Self {
        match mime_type {
            "application/vnd.google-apps.document" => Self::Doc,
            "application/vnd.google-apps.spreadsheet" => Self::Sheet,
            "application/vnd.google-apps.presentation" => Self::Slide,
            "application/json" | "application/xml" => Self::PlainText,
            m if m.starts_with("text/") => Self::PlainText,
            _ => Self::UnsupportedBinary,
        }
    }

    pub fn is_readable(&self) -> bool {
        !matches!(self, Self::UnsupportedBinary)
    }

    /// Export format requested from the store; `None` downloads the raw bytes.
    pub fn export_mime(&self) -> Option<&'static str> {
        match self {
            Self::Doc | Self::Slide => Some("text/plain"),
            Self::Sheet => Some("text/csv"),
            Self::PlainText | Self::UnsupportedBinary => None,
        }
    }
}

/// Human label for a MIME type, used in listings and "unsupported" messages.
pub fn file_type_label(mime_type: &str) -> &'static str {
    match mime_type {
        "application/vnd.google-apps.document" => "Google Doc",
        "application/vnd.google-apps.spreadsheet" => "Google Sheet",
        "application/vnd.google-apps.presentation" => "Google Slides",
        "application/vnd.google-apps.folder" => "Folder",
        "application/vnd.google-apps.form" => "Google Form",
        "application/vnd.google-apps.drawing" => "Google Drawing",
        "application/pdf" => "PDF",
        "application/vnd.ms-excel"
        | "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => "Excel File",
        "application/msword"
        | "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
            "Word Document"
        }
        "application/vnd.ms-powerpoint"
        | "application/vnd.openxmlformats-officedocument.presentationml.presentation" => {
            "PowerPoint"
        }
        "application/zip" | "application/x-tar" | "application/gzip" => "Archive",
        m if m.starts_with("image/") => "Image",
        m if m.starts_with("audio/") => "Audio",
        m if m.starts_with("video/") => "Video",
        m if m.starts_with("text/") => "Text File",
        _ => "File",
    }
}

/// File category a user can ask for ("list my spreadsheets").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Document,
    Spreadsheet,
    Presentation,
    Pdf,
    Image,
    Folder,
}

impl FileType {
    /// Map a user word (doc, sheets, slides, pdf, ...) to a category.
    pub fn from_word(word: &str) -> Option<Self> {
        let word = word.trim().to_lowercase();
        if word == "directory" || word == "directories" {
            return Some(Self::Folder);
        }
        match word.trim_end_matches('s') {
            "doc" | "document" | "google doc" => Some(Self::Document),
            "sheet" | "spreadsheet" | "google sheet" => Some(Self::Spreadsheet),
            "slide" | "presentation" | "deck" | "google slide" => Some(Self::Presentation),
            "pdf" => Some(Self::Pdf),
            "image" | "photo" | "picture" => Some(Self::Image),
            "folder" => Some(Self::Folder),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Document => "documents",
            Self::Spreadsheet => "spreadsheets",
            Self::Presentation => "presentations",
            Self::Pdf => "PDFs",
            Self::Image => "images",
            Self::Folder => "folders",
        }
    }

    /// Drive `q` clause selecting this category.
    pub fn query_clause(&self) -> &'static str {
        match self {
            Self::Document => "mimeType='application/vnd.google-apps.document'",
            Self::Spreadsheet => "mimeType='application/vnd.google-apps.spreadsheet'",
            Self::Presentation => "mimeType='application/vnd.google-apps.presentation'",
            Self::Pdf => "mimeType='application/pdf'",
            Self::Image => "mimeType contains 'image/'",
            Self::Folder => "mimeType='application/vnd.google-apps.folder'",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Metadata for one stored file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub mime_class: MimeClass,
    /// Size in bytes; 0 for store-native documents that report no size
    #[serde(default)]
    pub size_bytes: u64,
    pub modified_time: Option<DateTime<Utc>>,
    pub web_link: Option<String>,
}

impl FileDescriptor {
    pub fn type_label(&self) -> &'static str {
        file_type_label(&self.mime_type)
    }

    /// Case-insensitive name comparison ignoring the extension.
    pub fn name_matches_exactly(&self, fragment: &str) -> bool {
        let name = self.name.to_lowercase();
        let fragment = fragment.trim().to_lowercase();
        if name == fragment {
            return true;
        }
        match name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem == fragment,
            _ => false,
        }
    }
}

/// Text content read from a file, possibly truncated to a preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileContent {
    pub file: FileDescriptor,
    pub text: String,
    /// Size of the exported text in bytes before truncation
    pub original_size: usize,
    pub truncated: bool,
}

/// Quota information for the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageUsage {
    /// Total quota in bytes; `None` for unlimited plans
    pub limit: Option<u64>,
    pub usage: u64,
    pub usage_in_drive: u64,
    pub usage_in_trash: u64,
}

impl StorageUsage {
    pub fn percent_used(&self) -> Option<f64> {
        self.limit
            .filter(|l| *l > 0)
            .map(|l| (self.usage as f64 / l as f64) * 100.0)
    }
}
