//! Types for the query system.

use chrono::{DateTime, Datelike, Days, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::integrations::{FileType, IntegrationId};

// ============================================================================
// Intent Kind
// ============================================================================

/// Closed set of actions a query can resolve to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntentKind {
    // Mail
    EmailSummary,
    UnreadCount,
    EmailsFromSender,
    RecentEmails,
    UrgentEmails,
    SearchEmails,

    // Source control
    PrsToReview,
    ListPrs,
    AssignedIssues,
    RecentCommits,
    RepoStats,
    SourceControlSummary,

    // Calendar
    ScheduleToday,
    ScheduleTomorrow,
    ScheduleWeek,
    NextMeeting,
    FreeTime,

    // Document store
    SearchAndRead,
    ReadFile,
    SearchFiles,
    RecentFiles,
    SharedFiles,
    ListFilesByType,
    StorageUsage,

    // General
    DailySummary,
    Status,
    Help,
    #[default]
    Unknown,
}

impl IntentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmailSummary => "email-summary",
            Self::UnreadCount => "unread-count",
            Self::EmailsFromSender => "emails-from-sender",
            Self::RecentEmails => "recent-emails",
            Self::UrgentEmails => "urgent-emails",
            Self::SearchEmails => "search-emails",
            Self::PrsToReview => "prs-to-review",
            Self::ListPrs => "list-prs",
            Self::AssignedIssues => "assigned-issues",
            Self::RecentCommits => "recent-commits",
            Self::RepoStats => "repo-stats",
            Self::SourceControlSummary => "source-control-summary",
            Self::ScheduleToday => "schedule-today",
            Self::ScheduleTomorrow => "schedule-tomorrow",
            Self::ScheduleWeek => "schedule-week",
            Self::NextMeeting => "next-meeting",
            Self::FreeTime => "free-time",
            Self::SearchAndRead => "search-and-read",
            Self::ReadFile => "read-file",
            Self::SearchFiles => "search-files",
            Self::RecentFiles => "recent-files",
            Self::SharedFiles => "shared-files",
            Self::ListFilesByType => "list-files-by-type",
            Self::StorageUsage => "storage-usage",
            Self::DailySummary => "daily-summary",
            Self::Status => "status",
            Self::Help => "help",
            Self::Unknown => "unknown",
        }
    }

    /// The single integration this kind reads from, if any.
    ///
    /// `DailySummary` spans several integrations and returns `None`, as do
    /// the general kinds.
    pub fn integration(&self) -> Option<IntegrationId> {
        match self {
            Self::EmailSummary
            | Self::UnreadCount
            | Self::EmailsFromSender
            | Self::RecentEmails
            | Self::UrgentEmails
            | Self::SearchEmails => Some(IntegrationId::Mail),
            Self::PrsToReview
            | Self::ListPrs
            | Self::AssignedIssues
            | Self::RecentCommits
            | Self::RepoStats
            | Self::SourceControlSummary => Some(IntegrationId::SourceControl),
            Self::ScheduleToday
            | Self::ScheduleTomorrow
            | Self::ScheduleWeek
            | Self::NextMeeting
            | Self::FreeTime => Some(IntegrationId::Calendar),
            Self::SearchAndRead
            | Self::ReadFile
            | Self::SearchFiles
            | Self::RecentFiles
            | Self::SharedFiles
            | Self::ListFilesByType
            | Self::StorageUsage => Some(IntegrationId::Drive),
            Self::DailySummary | Self::Status | Self::Help | Self::Unknown => None,
        }
    }
}

impl std::fmt::Display for IntentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Intent
// ============================================================================

/// Inclusive calendar-day range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn single(day: NaiveDate) -> Self {
        Self::new(day, day)
    }

    /// Monday through Sunday of the week containing `day`, if that week
    /// lies inside the representable calendar.
    pub fn week_of(day: NaiveDate) -> Option<Self> {
        let monday =
            day.checked_sub_days(Days::new(u64::from(day.weekday().num_days_from_monday())))?;
        let sunday = monday.checked_add_days(Days::new(6))?;
        Some(Self::new(monday, sunday))
    }

    /// `[start 00:00, (end + 1) 00:00)` in local time, as UTC instants.
    ///
    /// A range ending on the last representable day stops at its midnight.
    pub fn bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let after_end = self.end.succ_opt().unwrap_or(self.end);
        (local_midnight(self.start), local_midnight(after_end))
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

fn local_midnight(day: NaiveDate) -> DateTime<Utc> {
    let naive = day.and_time(NaiveTime::MIN);
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| naive.and_utc())
}

/// Entities extracted from the query text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<FileType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// A classified query. Immutable once produced by the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub kind: IntentKind,
    pub raw_text: String,
    pub params: IntentParams,
    /// 0.0 for `Unknown`, otherwise in `[0.5, 1.0]`
    pub confidence: f32,
    /// Other kinds whose rules also matched, in priority order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<IntentKind>,
}

impl Intent {
    pub fn new(kind: IntentKind, raw_text: impl Into<String>) -> Self {
        Self {
            kind,
            raw_text: raw_text.into(),
            params: IntentParams::default(),
            confidence: if kind == IntentKind::Unknown { 0.0 } else { 1.0 },
            alternatives: Vec::new(),
        }
    }

    pub fn unknown(raw_text: impl Into<String>) -> Self {
        Self::new(IntentKind::Unknown, raw_text)
    }

    pub fn with_params(mut self, params: IntentParams) -> Self {
        self.params = params;
        self
    }
}

// ============================================================================
// Query Result
// ============================================================================

/// Shape of the answer carried by a [`QueryResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResultKind {
    /// Data (and possibly AI text) for the request
    Answer,
    /// The lookup succeeded but found nothing
    NoMatches,
    /// Several files matched; `data` lists the candidates
    FileChoices,
    /// File text, possibly a truncated preview
    FileContent,
    UnsupportedFormat,
    FileTooLarge,
    /// A required parameter could not be extracted
    MissingParameter,
    /// The integration is disabled or not registered
    IntegrationUnavailable,
    /// Every fetch failed and nothing could be shown
    IntegrationFailed,
    Status,
    Help,
    Unknown,
}

/// Execution statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryStats {
    pub classification_time_ms: u64,
    pub execution_time_ms: u64,
    pub total_time_ms: u64,
    /// Integration fetches issued (cache hits included)
    pub fetches: usize,
    pub cache_hits: usize,
    pub timed_out: bool,
}

/// The single outcome of processing one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub kind: ResultKind,
    pub intent: IntentKind,
    /// Human-readable answer
    pub answer: String,
    /// Structured result data
    pub data: serde_json::Value,
    /// No AI provider answered and `answer` is the non-AI fallback
    pub degraded_ai: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Suggested follow-up queries
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    pub stats: QueryStats,
}

impl QueryResult {
    pub fn new(kind: ResultKind, intent: IntentKind, answer: impl Into<String>) -> Self {
        Self {
            kind,
            intent,
            answer: answer.into(),
            data: serde_json::Value::Null,
            degraded_ai: false,
            warnings: Vec::new(),
            suggestions: Vec::new(),
            stats: QueryStats::default(),
        }
    }

    pub fn answer(intent: IntentKind, answer: impl Into<String>) -> Self {
        Self::new(ResultKind::Answer, intent, answer)
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn with_degraded_ai(mut self, degraded: bool) -> Self {
        self.degraded_ai = degraded;
        self
    }

    pub fn with_stats(mut self, stats: QueryStats) -> Self {
        self.stats = stats;
        self
    }

    pub fn is_partial(&self) -> bool {
        !self.warnings.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
