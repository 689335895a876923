//! Query dispatcher.
//!
//! Routes a classified [`Intent`] to integration fetches through the shared
//! [`FetchCache`], enriches selected answers through the [`AiAdapter`], and
//! folds every failure into the returned [`QueryResult`]. Handlers never
//! return errors to the caller: a disabled integration, an integration
//! failure or a missed deadline each map to a [`ResultKind`] plus warnings.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::time::Instant;

use crate::ai::{self, AiAdapter, AiResponse, DayOverview, ProviderStatus};
use crate::cache::{FetchCache, FetchStatus, IntegrationResult};
use crate::config::Config;
use crate::error::{IntegrationError, Result};
use crate::integrations::calendar::{free_slots, next_meeting, next_meeting_window};
use crate::integrations::{
    CalendarEvent, Commit, EmailMessage, FileContent, FileDescriptor, IntegrationId,
    IntegrationRegistry, Issue, Operation, PullRequest, RepositoryStats, StorageUsage, TimeSlot,
};
use crate::metrics::{get_metrics, Metrics};
use crate::utils::human_size;

use super::classifier::IntentClassifier;
use super::content::{self, ReadCheck};
use super::types::*;

/// Readable candidates opened by a search-and-read query.
const MAX_SEARCH_READS: usize = 3;

/// Example queries offered when a query is not understood.
const EXAMPLE_QUERIES: &[&str] = &[
    "summarize emails from alice@example.com",
    "how many unread emails do I have",
    "what PRs need my review",
    "what's my schedule today",
    "read file quarterly-report",
];

const HELP_TEXT: &str = "\
I can answer questions about your email, code, calendar and files.

📧 Email
  • summarize emails from hello@n8n.io
  • how many unread emails do I have
  • urgent emails / recent emails / search emails for invoice

🐙 GitHub
  • what PRs need my review
  • my assigned issues / recent commits
  • repo stats / github summary

📅 Calendar
  • what's my schedule today / tomorrow / this week
  • when is my next meeting
  • when am I free today

📁 Google Drive
  • read file quarterly-report
  • search and read files about roadmap
  • search files for budget / recent files / shared with me
  • list spreadsheets / storage usage

🔧 General
  • daily summary / status / help";

/// Tunables for a [`Dispatcher`].
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    /// Deadline for all integration fetches of one query
    pub query_timeout: Duration,
    pub ai_temperature: f32,
    /// Per-attempt completion timeout, independent of `query_timeout`
    pub ai_timeout: Duration,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(45),
            ai_temperature: 0.3,
            ai_timeout: Duration::from_secs(30),
        }
    }
}

impl DispatcherSettings {
    /// Query deadline from `[query]`, AI tuning from the primary provider.
    pub fn from_config(config: &Config) -> Self {
        let provider = config.ai.provider(config.ai_provider);
        Self {
            query_timeout: Duration::from_secs(config.query.timeout_secs),
            ai_temperature: provider.temperature,
            ai_timeout: Duration::from_secs(provider.timeout_secs),
        }
    }
}

/// Health of one integration as reported by [`Dispatcher::status_report`].
#[derive(Debug, Clone, Serialize)]
pub struct IntegrationStatus {
    pub id: IntegrationId,
    pub name: &'static str,
    pub enabled: bool,
    pub authenticated: bool,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// System-wide status: integrations, cache and AI providers.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub integrations: Vec<IntegrationStatus>,
    pub cache_entries: u64,
    pub ai_providers: Vec<ProviderStatus>,
}

impl StatusReport {
    pub fn render(&self) -> String {
        let mut lines = vec!["🔌 Integrations:".to_string()];
        for status in &self.integrations {
            let state = if !status.enabled {
                "⚪ disabled".to_string()
            } else if status.connected {
                "🟢 connected".to_string()
            } else if !status.authenticated {
                "🔴 not authenticated".to_string()
            } else {
                match &status.error {
                    Some(e) => format!("🔴 unreachable ({})", e),
                    None => "🔴 unreachable".to_string(),
                }
            };
            lines.push(format!("  {:<16} {}", status.name, state));
        }

        lines.push(String::new());
        lines.push("🤖 AI providers:".to_string());
        if self.ai_providers.is_empty() {
            lines.push("  none configured (answers are not AI-enriched)".to_string());
        }
        for provider in &self.ai_providers {
            lines.push(format!(
                "  {:<16} {:?} ({})",
                provider.kind.as_str(),
                provider.state,
                provider.name
            ));
        }

        lines.push(String::new());
        lines.push(format!("🗄️  Cache entries: {}", self.cache_entries));
        lines.join("\n")
    }
}

// ============================================================================
// Fetch failures and per-query state
// ============================================================================

/// Why a handler could not get the data it needed.
#[derive(Debug, Clone)]
enum FetchFailure {
    Disabled(IntegrationId),
    Failed {
        integration: IntegrationId,
        error: IntegrationError,
    },
}

impl FetchFailure {
    fn warning(&self) -> String {
        match self {
            Self::Disabled(id) => format!("{} is disabled", id.display_name()),
            Self::Failed { integration, error } => {
                format!("{}: {}", integration.display_name(), error)
            }
        }
    }

    fn into_result(self, intent: IntentKind) -> QueryResult {
        match self {
            Self::Disabled(id) => QueryResult::new(
                ResultKind::IntegrationUnavailable,
                intent,
                format!("{} integration is disabled or not configured.", id.display_name()),
            )
            .with_suggestions(vec![format!(
                "Enable [integrations.{}] in your config file",
                id.as_str()
            )]),
            Self::Failed { integration, error } => {
                let suggestions = match &error {
                    IntegrationError::NotAuthenticated(_) => vec![format!(
                        "Set {} or add a token under [integrations.{}]",
                        integration.token_env(),
                        integration.as_str()
                    )],
                    _ => vec!["status".to_string()],
                };
                QueryResult::new(
                    ResultKind::IntegrationFailed,
                    intent,
                    format!(
                        "Could not fetch data from {}: {}",
                        integration.display_name(),
                        error
                    ),
                )
                .with_suggestions(suggestions)
            }
        }
    }
}

type Handled = std::result::Result<QueryResult, FetchFailure>;

#[derive(Debug, Default)]
struct ContextState {
    warnings: Vec<String>,
    fetches: usize,
    cache_hits: usize,
    timed_out: bool,
}

/// Deadline and bookkeeping shared by the fetches of one query.
struct QueryContext {
    deadline: Instant,
    started: std::time::Instant,
    state: Mutex<ContextState>,
}

impl QueryContext {
    fn new(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            started: std::time::Instant::now(),
            state: Mutex::new(ContextState::default()),
        }
    }

    fn warn(&self, warning: String) {
        self.state.lock().warnings.push(warning);
    }

    fn record_fetch(&self, cache_hit: bool) {
        let mut state = self.state.lock();
        state.fetches += 1;
        if cache_hit {
            state.cache_hits += 1;
        }
    }

    fn record_timeout(&self) {
        let mut state = self.state.lock();
        state.fetches += 1;
        state.timed_out = true;
    }

    fn finish(self, result: QueryResult) -> QueryResult {
        let state = self.state.into_inner();
        let elapsed = self.started.elapsed().as_millis() as u64;
        let stats = QueryStats {
            execution_time_ms: elapsed,
            total_time_ms: elapsed,
            fetches: state.fetches,
            cache_hits: state.cache_hits,
            timed_out: state.timed_out,
            ..Default::default()
        };
        result.with_warnings(state.warnings).with_stats(stats)
    }
}

#[derive(Deserialize)]
struct UnreadCount {
    unread_count: u64,
}

#[derive(Deserialize)]
struct ExportedText {
    text: String,
}

enum ReadOutcome {
    Content(FileContent),
    TooLarge { file: FileDescriptor, message: String },
    Unsupported { file: FileDescriptor, message: String },
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Turns query text into a [`QueryResult`].
pub struct Dispatcher {
    classifier: IntentClassifier,
    registry: Arc<IntegrationRegistry>,
    cache: FetchCache,
    ai: Arc<AiAdapter>,
    settings: DispatcherSettings,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<IntegrationRegistry>,
        cache: FetchCache,
        ai: Arc<AiAdapter>,
        settings: DispatcherSettings,
    ) -> Self {
        Self {
            classifier: IntentClassifier::new(),
            registry,
            cache,
            ai,
            settings,
        }
    }

    /// Wire registry, cache and AI adapter from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let registry = IntegrationRegistry::from_config(config)?;
        Ok(Self::new(
            Arc::new(registry),
            FetchCache::new(&config.cache),
            Arc::new(AiAdapter::from_config(config)),
            DispatcherSettings::from_config(config),
        ))
    }

    pub fn cache(&self) -> &FetchCache {
        &self.cache
    }

    pub fn ai(&self) -> &AiAdapter {
        &self.ai
    }

    pub fn registry(&self) -> &IntegrationRegistry {
        &self.registry
    }

    /// Classify and answer one query.
    pub async fn process(&self, text: &str) -> QueryResult {
        let metrics = get_metrics();
        metrics.queries_total.inc();
        let timer = Metrics::start_timer(&metrics.query_duration_seconds);

        let intent = self.classifier.classify(text);
        let classification_time_ms = timer.elapsed().as_millis() as u64;
        tracing::debug!(
            intent = %intent.kind,
            confidence = intent.confidence,
            "classified query"
        );

        let mut result = self.handle(&intent).await;
        result.stats.classification_time_ms = classification_time_ms;
        result.stats.total_time_ms = timer.elapsed().as_millis() as u64;

        tracing::info!(
            intent = %intent.kind,
            kind = ?result.kind,
            warnings = result.warnings.len(),
            total_ms = result.stats.total_time_ms,
            "query processed"
        );
        result
    }

    /// Answer an already classified intent.
    pub async fn handle(&self, intent: &Intent) -> QueryResult {
        let ctx = QueryContext::new(self.settings.query_timeout);
        let result = match self.route(intent, &ctx).await {
            Ok(result) => result,
            Err(failure) => failure.into_result(intent.kind),
        };
        ctx.finish(result)
    }

    async fn route(&self, intent: &Intent, ctx: &QueryContext) -> Handled {
        match intent.kind {
            IntentKind::EmailSummary => self.email_summary(intent, ctx).await,
            IntentKind::UnreadCount => self.unread_count(ctx).await,
            IntentKind::EmailsFromSender
            | IntentKind::RecentEmails
            | IntentKind::UrgentEmails
            | IntentKind::SearchEmails => self.list_emails(intent, ctx).await,
            IntentKind::PrsToReview | IntentKind::ListPrs => {
                self.list_pull_requests(intent, ctx).await
            }
            IntentKind::AssignedIssues => self.assigned_issues(intent, ctx).await,
            IntentKind::RecentCommits => self.recent_commits(intent, ctx).await,
            IntentKind::RepoStats => self.repository_stats(intent, ctx).await,
            IntentKind::SourceControlSummary => self.source_control_summary(intent, ctx).await,
            IntentKind::ScheduleToday | IntentKind::ScheduleTomorrow | IntentKind::ScheduleWeek => {
                self.schedule(intent, ctx).await
            }
            IntentKind::NextMeeting => self.next_meeting(intent, ctx).await,
            IntentKind::FreeTime => self.free_time(intent, ctx).await,
            IntentKind::SearchAndRead => self.search_and_read(intent, ctx).await,
            IntentKind::ReadFile => self.read_file(intent, ctx).await,
            IntentKind::SearchFiles
            | IntentKind::RecentFiles
            | IntentKind::SharedFiles
            | IntentKind::ListFilesByType => self.list_files(intent, ctx).await,
            IntentKind::StorageUsage => self.storage_usage(intent, ctx).await,
            IntentKind::DailySummary => self.daily_summary(intent, ctx).await,
            IntentKind::Status => {
                let report = self.status_report().await;
                Ok(
                    QueryResult::new(ResultKind::Status, intent.kind, report.render())
                        .with_data(json!(report)),
                )
            }
            IntentKind::Help => Ok(QueryResult::new(ResultKind::Help, intent.kind, HELP_TEXT)),
            IntentKind::Unknown => Ok(QueryResult::new(
                ResultKind::Unknown,
                intent.kind,
                format!(
                    "I didn't understand \"{}\". Try one of these, or type 'help'.",
                    intent.raw_text.trim()
                ),
            )
            .with_suggestions(EXAMPLE_QUERIES.iter().map(|q| q.to_string()).collect())),
        }
    }

    // ------------------------------------------------------------------------
    // Fetching
    // ------------------------------------------------------------------------

    /// Fetch through the cache, bounded by the query deadline.
    ///
    /// Stale data served after a failed refresh is returned with a warning.
    async fn fetch_value(
        &self,
        ctx: &QueryContext,
        op: Operation,
    ) -> std::result::Result<Arc<Value>, FetchFailure> {
        let id = op.integration();
        let Some(integration) = self.registry.get(id) else {
            return Err(FetchFailure::Disabled(id));
        };
        let ttl = self.registry.settings(id).cache_duration;

        let fetched = tokio::time::timeout_at(
            ctx.deadline,
            self.cache.fetch(integration.as_ref(), &op, ttl),
        )
        .await;

        let IntegrationResult {
            status,
            payload,
            error,
            from_cache,
            fetched_at,
        } = match fetched {
            Ok(result) => result,
            Err(_) => {
                ctx.record_timeout();
                tracing::warn!(
                    integration = %id,
                    operation = op.operation_id(),
                    "fetch hit query deadline"
                );
                return Err(FetchFailure::Failed {
                    integration: id,
                    error: IntegrationError::Timeout(
                        self.settings.query_timeout.as_millis() as u64
                    ),
                });
            }
        };

        ctx.record_fetch(from_cache && status == FetchStatus::Success);

        match (status, payload) {
            (FetchStatus::Success, Some(payload)) => Ok(payload),
            (FetchStatus::Partial, Some(payload)) => {
                let age = fetched_at
                    .map(|t| t.with_timezone(&Local).format("%H:%M").to_string())
                    .unwrap_or_else(|| "earlier".to_string());
                let reason = error.map(|e| e.to_string()).unwrap_or_default();
                ctx.warn(format!(
                    "{} refresh failed ({}); showing cached data from {}",
                    id.display_name(),
                    reason,
                    age
                ));
                Ok(payload)
            }
            _ => Err(FetchFailure::Failed {
                integration: id,
                error: error
                    .unwrap_or_else(|| IntegrationError::Decode("empty payload".to_string())),
            }),
        }
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        ctx: &QueryContext,
        op: Operation,
    ) -> std::result::Result<T, FetchFailure> {
        let id = op.integration();
        let value = self.fetch_value(ctx, op).await?;
        decode(id, &value)
    }

    fn limit(&self, intent: &Intent, id: IntegrationId) -> usize {
        intent
            .params
            .limit
            .unwrap_or_else(|| self.registry.settings(id).max_items)
    }

    async fn complete(&self, prompt: &str, max_tokens: u32) -> AiResponse {
        self.ai
            .complete(
                prompt,
                max_tokens,
                self.settings.ai_temperature,
                self.settings.ai_timeout,
            )
            .await
    }

    // ------------------------------------------------------------------------
    // Mail
    // ------------------------------------------------------------------------

    async fn email_summary(&self, intent: &Intent, ctx: &QueryContext) -> Handled {
        let Some(sender) = intent.params.sender.clone() else {
            return Ok(missing_parameter(
                intent.kind,
                "sender",
                "summarize emails from alice@example.com",
            ));
        };

        let emails: Vec<EmailMessage> = self
            .fetch(
                ctx,
                Operation::EmailsFromSender {
                    sender: sender.clone(),
                    limit: ai::EMAIL_SUMMARY_LIMIT,
                },
            )
            .await?;

        if emails.is_empty() {
            return Ok(QueryResult::new(
                ResultKind::NoMatches,
                intent.kind,
                format!("No emails found from {}.", sender),
            )
            .with_data(json!({ "emails": [] })));
        }

        let prompt = ai::email_summary_prompt(&emails, Some(&sender));
        let response = self.complete(&prompt, ai::EMAIL_SUMMARY_MAX_TOKENS).await;

        let answer = if response.degraded {
            format!(
                "📧 {} emails from {} (AI summary unavailable):\n\n{}",
                emails.len(),
                sender,
                ai::email_listing(&emails)
            )
        } else {
            format!(
                "📧 Summary of {} emails from {}:\n\n{}",
                emails.len(),
                sender,
                response.text
            )
        };

        let summary = (!response.degraded).then_some(response.text.as_str());
        Ok(QueryResult::answer(intent.kind, answer)
            .with_data(json!({
                "emails": emails,
                "summary": summary,
                "provider": response.provider_used,
            }))
            .with_degraded_ai(response.degraded))
    }

    async fn unread_count(&self, ctx: &QueryContext) -> Handled {
        let count: UnreadCount = self.fetch(ctx, Operation::UnreadCount).await?;
        let answer = match count.unread_count {
            0 => "📧 No unread emails. Inbox zero! 🎉".to_string(),
            1 => "📧 You have 1 unread email.".to_string(),
            n => format!("📧 You have {} unread emails.", n),
        };
        Ok(QueryResult::answer(IntentKind::UnreadCount, answer)
            .with_data(json!({ "unread_count": count.unread_count })))
    }

    async fn list_emails(&self, intent: &Intent, ctx: &QueryContext) -> Handled {
        let limit = self.limit(intent, IntegrationId::Mail);
        let params = &intent.params;

        let (op, empty, header) = match intent.kind {
            IntentKind::EmailsFromSender => {
                let Some(sender) = &params.sender else {
                    return Ok(missing_parameter(
                        intent.kind,
                        "sender",
                        "emails from alice@example.com",
                    ));
                };
                (
                    Operation::EmailsFromSender {
                        sender: sender.clone(),
                        limit,
                    },
                    format!("No emails found from {}.", sender),
                    format!("📧 Emails from {}:", sender),
                )
            }
            IntentKind::SearchEmails => {
                let Some(keyword) = &params.keyword else {
                    return Ok(missing_parameter(
                        intent.kind,
                        "search term",
                        "search emails for invoice",
                    ));
                };
                (
                    Operation::SearchEmails {
                        query: keyword.clone(),
                        limit,
                    },
                    format!("No emails matching '{}'.", keyword),
                    format!("📧 Emails matching '{}':", keyword),
                )
            }
            IntentKind::UrgentEmails => (
                Operation::UrgentEmails { limit },
                "No urgent emails. 🎉".to_string(),
                "🚨 Urgent emails:".to_string(),
            ),
            _ => (
                Operation::RecentEmails { limit },
                "Your inbox is empty.".to_string(),
                "📧 Recent emails:".to_string(),
            ),
        };

        let emails: Vec<EmailMessage> = self.fetch(ctx, op).await?;
        Ok(list_result(intent.kind, &emails, empty, header, format_email))
    }

    // ------------------------------------------------------------------------
    // Source control
    // ------------------------------------------------------------------------

    async fn list_pull_requests(&self, intent: &Intent, ctx: &QueryContext) -> Handled {
        let limit = self.limit(intent, IntegrationId::SourceControl);
        let (op, empty, header) = if intent.kind == IntentKind::PrsToReview {
            (
                Operation::PullRequestsToReview { limit },
                "No pull requests waiting for your review. 🎉",
                "🔍 Pull requests waiting for your review:",
            )
        } else {
            (
                Operation::OpenPullRequests { limit },
                "You have no open pull requests.",
                "🔀 Your open pull requests:",
            )
        };

        let prs: Vec<PullRequest> = self.fetch(ctx, op).await?;
        Ok(list_result(
            intent.kind,
            &prs,
            empty.to_string(),
            header.to_string(),
            format_pull_request,
        ))
    }

    async fn assigned_issues(&self, intent: &Intent, ctx: &QueryContext) -> Handled {
        let limit = self.limit(intent, IntegrationId::SourceControl);
        let issues: Vec<Issue> = self
            .fetch(ctx, Operation::AssignedIssues { limit })
            .await?;
        Ok(list_result(
            intent.kind,
            &issues,
            "No open issues assigned to you.".to_string(),
            "📋 Issues assigned to you:".to_string(),
            format_issue,
        ))
    }

    async fn recent_commits(&self, intent: &Intent, ctx: &QueryContext) -> Handled {
        let limit = self.limit(intent, IntegrationId::SourceControl);
        let commits: Vec<Commit> = self
            .fetch(ctx, Operation::RecentCommits { limit })
            .await?;
        Ok(list_result(
            intent.kind,
            &commits,
            "No recent commits found.".to_string(),
            "📝 Recent commits:".to_string(),
            format_commit,
        ))
    }

    async fn repository_stats(&self, intent: &Intent, ctx: &QueryContext) -> Handled {
        let stats: RepositoryStats = self.fetch(ctx, Operation::RepositoryStats).await?;
        if stats.total_repos == 0 {
            return Ok(QueryResult::new(
                ResultKind::NoMatches,
                intent.kind,
                "You don't own any repositories yet.",
            )
            .with_data(json!(stats)));
        }
        let answer = format_repository_stats(&stats);
        Ok(QueryResult::answer(intent.kind, answer).with_data(json!(stats)))
    }

    /// Review requests, assigned issues and recent commits, fetched
    /// concurrently. Sections that fail become warnings.
    async fn source_control_summary(&self, intent: &Intent, ctx: &QueryContext) -> Handled {
        let id = IntegrationId::SourceControl;
        if !self.registry.is_enabled(id) {
            return Err(FetchFailure::Disabled(id));
        }
        let limit = self.limit(intent, id);

        let (prs, issues, commits) = futures::join!(
            self.fetch::<Vec<PullRequest>>(ctx, Operation::PullRequestsToReview { limit }),
            self.fetch::<Vec<Issue>>(ctx, Operation::AssignedIssues { limit }),
            self.fetch::<Vec<Commit>>(ctx, Operation::RecentCommits { limit }),
        );

        let mut first_failure = None;
        let prs = settle(ctx, &mut first_failure, prs);
        let issues = settle(ctx, &mut first_failure, issues);
        let commits = settle(ctx, &mut first_failure, commits);

        if prs.is_none() && issues.is_none() && commits.is_none() {
            if let Some(failure) = first_failure {
                return Err(failure);
            }
        }

        let mut sections = vec!["🐙 GitHub summary".to_string()];
        if let Some(prs) = &prs {
            sections.push(section("🔍 Waiting for your review", prs, format_pull_request));
        }
        if let Some(issues) = &issues {
            sections.push(section("📋 Assigned issues", issues, format_issue));
        }
        if let Some(commits) = &commits {
            sections.push(section("📝 Recent commits", commits, format_commit));
        }

        Ok(QueryResult::answer(intent.kind, sections.join("\n\n")).with_data(json!({
            "prs_to_review": prs,
            "assigned_issues": issues,
            "recent_commits": commits,
        })))
    }

    // ------------------------------------------------------------------------
    // Calendar
    // ------------------------------------------------------------------------

    async fn events_in(
        &self,
        ctx: &QueryContext,
        range: DateRange,
    ) -> std::result::Result<Vec<CalendarEvent>, FetchFailure> {
        let (start, end) = range.bounds();
        let mut events: Vec<CalendarEvent> = self
            .fetch(ctx, Operation::EventsInRange { start, end })
            .await?;
        events.sort_by_key(|e| e.start);
        Ok(events)
    }

    async fn schedule(&self, intent: &Intent, ctx: &QueryContext) -> Handled {
        let today = Local::now().date_naive();
        let range = match intent.kind {
            IntentKind::ScheduleTomorrow => {
                DateRange::single(today.succ_opt().unwrap_or(today))
            }
            IntentKind::ScheduleWeek => intent
                .params
                .date_range
                .filter(|r| r.days() > 1)
                .or_else(|| DateRange::week_of(today))
                .unwrap_or_else(|| DateRange::single(today)),
            _ => intent
                .params
                .date_range
                .unwrap_or_else(|| DateRange::single(today)),
        };

        let events = self.events_in(ctx, range).await?;
        let label = range_label(range, today);
        let multi_day = range.days() > 1;

        if events.is_empty() {
            return Ok(QueryResult::new(
                ResultKind::NoMatches,
                intent.kind,
                format!("📅 No events scheduled for {}.", label),
            )
            .with_data(json!({ "events": [] })));
        }

        let lines: Vec<String> = events
            .iter()
            .map(|e| format_event(e, multi_day))
            .collect();
        let answer = format!(
            "📅 {} events for {}:\n{}",
            events.len(),
            label,
            lines.join("\n")
        );
        Ok(QueryResult::answer(intent.kind, answer).with_data(json!({ "events": events })))
    }

    async fn next_meeting(&self, intent: &Intent, ctx: &QueryContext) -> Handled {
        let now = Utc::now();
        let today = Local::now().date_naive();
        let window = next_meeting_window();
        let range = DateRange::new(today, today + window);

        let events = self.events_in(ctx, range).await?;
        let horizon = now + window;
        let upcoming: Vec<CalendarEvent> =
            events.into_iter().filter(|e| e.start < horizon).collect();

        match next_meeting(&upcoming, now) {
            Some(event) => {
                let when = event.start.with_timezone(&Local);
                let answer = format!(
                    "📅 Next meeting: {}\n  {} ({})",
                    event.summary,
                    when.format("%a %b %-d at %H:%M"),
                    humanize_until(event.start - now)
                );
                let answer = match &event.location {
                    Some(location) => format!("{}\n  📍 {}", answer, location),
                    None => answer,
                };
                Ok(QueryResult::answer(intent.kind, answer).with_data(json!({ "event": event })))
            }
            None => Ok(QueryResult::new(
                ResultKind::NoMatches,
                intent.kind,
                format!("📅 No meetings in the next {} days.", window.num_days()),
            )),
        }
    }

    async fn free_time(&self, intent: &Intent, ctx: &QueryContext) -> Handled {
        let today = DateRange::single(Local::now().date_naive());
        let (day_start, day_end) = today.bounds();
        let events = self.events_in(ctx, today).await?;
        let slots = free_slots(&events, day_start, day_end, Utc::now());

        Ok(list_result(
            intent.kind,
            &slots,
            "📅 No free time left today.".to_string(),
            "🕐 Free time today:".to_string(),
            format_slot,
        ))
    }

    // ------------------------------------------------------------------------
    // Document store
    // ------------------------------------------------------------------------

    async fn list_files(&self, intent: &Intent, ctx: &QueryContext) -> Handled {
        let limit = self.limit(intent, IntegrationId::Drive);
        let params = &intent.params;

        let (op, empty, header) = match intent.kind {
            IntentKind::SearchFiles => {
                let Some(keyword) = &params.keyword else {
                    return Ok(missing_parameter(
                        intent.kind,
                        "search term",
                        "search files for budget",
                    ));
                };
                (
                    Operation::SearchFiles {
                        query: keyword.clone(),
                        full_text: true,
                        limit,
                    },
                    format!("No files found matching '{}'.", keyword),
                    format!("📁 Files matching '{}':", keyword),
                )
            }
            IntentKind::ListFilesByType => {
                let Some(file_type) = params.file_type else {
                    return Ok(missing_parameter(
                        intent.kind,
                        "file type",
                        "list spreadsheets",
                    ));
                };
                (
                    Operation::FilesByType { file_type, limit },
                    format!("No {} found.", file_type.label()),
                    format!("📁 Recent {}:", file_type.label()),
                )
            }
            IntentKind::SharedFiles => (
                Operation::SharedFiles { limit },
                "No files have been shared with you.".to_string(),
                "👥 Shared with you:".to_string(),
            ),
            _ => (
                Operation::RecentFiles { limit },
                "No recent files.".to_string(),
                "📁 Recently modified files:".to_string(),
            ),
        };

        let files: Vec<FileDescriptor> = self.fetch(ctx, op).await?;
        Ok(list_result(intent.kind, &files, empty, header, format_file))
    }

    /// Locate one file by name and read it.
    ///
    /// One candidate is read directly. Several candidates are always
    /// returned for the user to choose from, exact name matches first.
    async fn read_file(&self, intent: &Intent, ctx: &QueryContext) -> Handled {
        let Some(name) = intent.params.filename.clone() else {
            return Ok(missing_parameter(
                intent.kind,
                "file",
                "read file quarterly-report",
            ));
        };
        let limit = self.limit(intent, IntegrationId::Drive);

        let mut candidates: Vec<FileDescriptor> = self
            .fetch(
                ctx,
                Operation::SearchFiles {
                    query: name.clone(),
                    full_text: false,
                    limit,
                },
            )
            .await?;

        if candidates.len() > 1 {
            // exact (extension-insensitive) names lead the list
            candidates.sort_by_key(|f| !f.name_matches_exactly(&name));
            return Ok(file_choices(intent.kind, &name, candidates));
        }

        match candidates.pop() {
            Some(file) => {
                let outcome = self.read_content(ctx, file).await?;
                Ok(read_result(intent.kind, outcome))
            }
            None => Ok(QueryResult::new(
                ResultKind::NoMatches,
                intent.kind,
                format!("No files found matching '{}'.", name),
            )
            .with_suggestions(vec![format!("search files for {}", name)])),
        }
    }

    /// Full-text search, then read up to [`MAX_SEARCH_READS`] readable hits.
    async fn search_and_read(&self, intent: &Intent, ctx: &QueryContext) -> Handled {
        let Some(keyword) = intent.params.keyword.clone() else {
            return Ok(missing_parameter(
                intent.kind,
                "search term",
                "search and read files about roadmap",
            ));
        };
        let limit = self.limit(intent, IntegrationId::Drive);

        let candidates: Vec<FileDescriptor> = self
            .fetch(
                ctx,
                Operation::SearchFiles {
                    query: keyword.clone(),
                    full_text: true,
                    limit,
                },
            )
            .await?;

        if candidates.is_empty() {
            return Ok(QueryResult::new(
                ResultKind::NoMatches,
                intent.kind,
                format!("No files found matching '{}'.", keyword),
            ));
        }

        let mut readable = Vec::new();
        for file in &candidates {
            if readable.len() == MAX_SEARCH_READS {
                break;
            }
            match content::check_readable(file) {
                ReadCheck::Allowed => readable.push(file.clone()),
                ReadCheck::TooLarge { size_bytes } => {
                    ctx.warn(content::too_large_message(file, size_bytes))
                }
                ReadCheck::Unsupported { label } => ctx.warn(format!(
                    "Skipped '{}': {} files cannot be read as text",
                    file.name, label
                )),
            }
        }

        if readable.is_empty() {
            return Ok(QueryResult::new(
                ResultKind::UnsupportedFormat,
                intent.kind,
                format!(
                    "Found {} files matching '{}' but none can be read as text.",
                    candidates.len(),
                    keyword
                ),
            )
            .with_data(json!({ "files": candidates })));
        }

        let outcomes = join_all(readable.into_iter().map(|f| self.read_content(ctx, f))).await;

        let mut contents = Vec::new();
        let mut first_failure = None;
        for outcome in outcomes {
            match outcome {
                Ok(ReadOutcome::Content(content)) => contents.push(content),
                Ok(_) => {}
                Err(failure) => {
                    ctx.warn(failure.warning());
                    first_failure.get_or_insert(failure);
                }
            }
        }

        if contents.is_empty() {
            if let Some(failure) = first_failure {
                return Err(failure);
            }
        }

        let rendered: Vec<String> = contents.iter().map(content::render_content).collect();
        let answer = format!(
            "🔍 Read {} of {} files matching '{}':\n\n{}",
            contents.len(),
            candidates.len(),
            keyword,
            rendered.join("\n\n---\n\n")
        );
        Ok(
            QueryResult::new(ResultKind::FileContent, intent.kind, answer).with_data(json!({
                "files": candidates,
                "contents": contents,
            })),
        )
    }

    /// Apply the read policy, then export the text.
    async fn read_content(
        &self,
        ctx: &QueryContext,
        file: FileDescriptor,
    ) -> std::result::Result<ReadOutcome, FetchFailure> {
        match content::check_readable(&file) {
            ReadCheck::TooLarge { size_bytes } => {
                let message = content::too_large_message(&file, size_bytes);
                Ok(ReadOutcome::TooLarge { file, message })
            }
            ReadCheck::Unsupported { label } => {
                let message = content::unsupported_message(&file, label);
                Ok(ReadOutcome::Unsupported { file, message })
            }
            ReadCheck::Allowed => {
                let exported: ExportedText = self
                    .fetch(
                        ctx,
                        Operation::ExportFile {
                            file_id: file.id.clone(),
                            mime_class: file.mime_class,
                        },
                    )
                    .await?;
                Ok(ReadOutcome::Content(content::preview(file, &exported.text)))
            }
        }
    }

    async fn storage_usage(&self, intent: &Intent, ctx: &QueryContext) -> Handled {
        let usage: StorageUsage = self.fetch(ctx, Operation::StorageUsage).await?;

        let total = match (usage.limit, usage.percent_used()) {
            (Some(limit), Some(percent)) => format!(
                "{} of {} used ({:.1}%)",
                human_size(usage.usage),
                human_size(limit),
                percent
            ),
            _ => format!("{} used (unlimited plan)", human_size(usage.usage)),
        };
        let answer = format!(
            "💾 Google Drive storage: {}\n  • Drive files: {}\n  • Trash: {}",
            total,
            human_size(usage.usage_in_drive),
            human_size(usage.usage_in_trash)
        );
        Ok(QueryResult::answer(intent.kind, answer).with_data(json!(usage)))
    }

    // ------------------------------------------------------------------------
    // General
    // ------------------------------------------------------------------------

    /// Unread mail, today's events, review requests and assigned issues,
    /// fetched concurrently from every enabled integration, plus an
    /// optional AI narrative.
    async fn daily_summary(&self, intent: &Intent, ctx: &QueryContext) -> Handled {
        let today = DateRange::single(Local::now().date_naive());
        let (start, end) = today.bounds();
        let github_limit = self.limit(intent, IntegrationId::SourceControl);

        let ops: Vec<Operation> = [
            Operation::UnreadCount,
            Operation::EventsInRange { start, end },
            Operation::PullRequestsToReview {
                limit: github_limit,
            },
            Operation::AssignedIssues {
                limit: github_limit,
            },
        ]
        .into_iter()
        .filter(|op| self.registry.is_enabled(op.integration()))
        .collect();

        if ops.is_empty() {
            return Ok(QueryResult::new(
                ResultKind::IntegrationUnavailable,
                intent.kind,
                "No integrations are enabled. Run 'concierge setup' to configure them.",
            ));
        }

        let outcomes = join_all(ops.iter().cloned().map(|op| self.fetch_value(ctx, op))).await;

        let mut overview = DayOverview::default();
        let mut events: Option<Vec<CalendarEvent>> = None;
        let mut prs: Option<Vec<PullRequest>> = None;
        let mut issues: Option<Vec<Issue>> = None;

        for (op, outcome) in ops.iter().zip(outcomes) {
            let value = match outcome {
                Ok(value) => value,
                Err(failure) => {
                    ctx.warn(failure.warning());
                    continue;
                }
            };
            let id = op.integration();
            let decoded = match op {
                Operation::UnreadCount => decode::<UnreadCount>(id, &value)
                    .map(|c| overview.unread_emails = Some(c.unread_count)),
                Operation::EventsInRange { .. } => {
                    decode::<Vec<CalendarEvent>>(id, &value).map(|e| {
                        overview.events_today = Some(e.len());
                        events = Some(e);
                    })
                }
                Operation::PullRequestsToReview { .. } => {
                    decode::<Vec<PullRequest>>(id, &value).map(|p| {
                        overview.prs_to_review = Some(p.len());
                        prs = Some(p);
                    })
                }
                Operation::AssignedIssues { .. } => decode::<Vec<Issue>>(id, &value).map(|i| {
                    overview.assigned_issues = Some(i.len());
                    issues = Some(i);
                }),
                _ => Ok(()),
            };
            if let Err(failure) = decoded {
                ctx.warn(failure.warning());
            }
        }

        if overview.is_empty() {
            return Ok(QueryResult::new(
                ResultKind::IntegrationFailed,
                intent.kind,
                "Could not fetch any data for your daily summary.",
            )
            .with_suggestions(vec!["status".to_string()]));
        }

        let response = self
            .complete(
                &ai::daily_summary_prompt(&overview),
                ai::DAILY_SUMMARY_MAX_TOKENS,
            )
            .await;

        let mut answer = format!("🌅 Daily summary\n\n{}", overview.bullets());
        if !response.degraded {
            answer.push_str("\n\n");
            answer.push_str(&response.text);
        }
        let narrative = (!response.degraded).then_some(response.text.as_str());

        Ok(QueryResult::answer(intent.kind, answer)
            .with_data(json!({
                "unread_emails": overview.unread_emails,
                "events": events,
                "prs_to_review": prs,
                "assigned_issues": issues,
                "narrative": narrative,
            }))
            .with_degraded_ai(response.degraded))
    }

    /// Probe every integration and AI provider concurrently and collect
    /// their state with the cache size.
    pub async fn status_report(&self) -> StatusReport {
        let deadline = Instant::now() + self.settings.query_timeout;
        let (integrations, ai_providers) = futures::join!(
            join_all(
                IntegrationId::ALL
                    .into_iter()
                    .map(|id| self.integration_status(id, deadline)),
            ),
            self.ai.health_check(),
        );

        StatusReport {
            integrations,
            cache_entries: self.cache.entry_count().await,
            ai_providers,
        }
    }

    /// Drop cached data for one integration, or for all of them.
    pub fn refresh(&self, integration: Option<IntegrationId>) {
        match integration {
            Some(id) => self.cache.invalidate(id),
            None => self.cache.invalidate_all(),
        }
    }

    async fn integration_status(&self, id: IntegrationId, deadline: Instant) -> IntegrationStatus {
        let mut status = IntegrationStatus {
            id,
            name: id.display_name(),
            enabled: false,
            authenticated: false,
            connected: false,
            error: None,
        };
        let Some(integration) = self.registry.get(id) else {
            return status;
        };
        status.enabled = true;

        match tokio::time::timeout_at(deadline, integration.authenticate()).await {
            Ok(Ok(authenticated)) => status.authenticated = authenticated,
            Ok(Err(e)) => status.error = Some(e.to_string()),
            Err(_) => status.error = Some("authentication check timed out".to_string()),
        }
        if !status.authenticated {
            return status;
        }

        match tokio::time::timeout_at(deadline, integration.test_connection()).await {
            Ok(Ok(connected)) => status.connected = connected,
            Ok(Err(e)) => status.error = Some(e.to_string()),
            Err(_) => status.error = Some("connection test timed out".to_string()),
        }
        status
    }
}

// ============================================================================
// Result helpers
// ============================================================================

fn decode<T: DeserializeOwned>(
    id: IntegrationId,
    value: &Value,
) -> std::result::Result<T, FetchFailure> {
    T::deserialize(value).map_err(|e| FetchFailure::Failed {
        integration: id,
        error: IntegrationError::Decode(e.to_string()),
    })
}

/// Keep a successful section; record a failed one as a warning.
fn settle<T>(
    ctx: &QueryContext,
    first_failure: &mut Option<FetchFailure>,
    outcome: std::result::Result<T, FetchFailure>,
) -> Option<T> {
    match outcome {
        Ok(value) => Some(value),
        Err(failure) => {
            ctx.warn(failure.warning());
            first_failure.get_or_insert(failure);
            None
        }
    }
}

fn missing_parameter(intent: IntentKind, what: &str, example: &str) -> QueryResult {
    QueryResult::new(
        ResultKind::MissingParameter,
        intent,
        format!("Please tell me which {}. For example: \"{}\"", what, example),
    )
    .with_suggestions(vec![example.to_string()])
}

fn list_result<T: Serialize>(
    intent: IntentKind,
    items: &[T],
    empty: String,
    header: String,
    line: fn(&T) -> String,
) -> QueryResult {
    if items.is_empty() {
        return QueryResult::new(ResultKind::NoMatches, intent, empty).with_data(json!([]));
    }
    let lines: Vec<String> = items.iter().map(line).collect();
    QueryResult::answer(intent, format!("{}\n{}", header, lines.join("\n"))).with_data(json!(items))
}

fn section<T>(title: &str, items: &[T], line: fn(&T) -> String) -> String {
    if items.is_empty() {
        return format!("{}: none", title);
    }
    let lines: Vec<String> = items.iter().map(line).collect();
    format!("{} ({}):\n{}", title, items.len(), lines.join("\n"))
}

fn file_choices(intent: IntentKind, name: &str, candidates: Vec<FileDescriptor>) -> QueryResult {
    let lines: Vec<String> = candidates.iter().map(format_file).collect();
    let suggestions = candidates
        .iter()
        .map(|f| format!("read file {}", f.name))
        .collect();
    QueryResult::new(
        ResultKind::FileChoices,
        intent,
        format!(
            "Found {} files matching '{}'. Which one did you mean?\n{}",
            candidates.len(),
            name,
            lines.join("\n")
        ),
    )
    .with_data(json!(candidates))
    .with_suggestions(suggestions)
}

fn read_result(intent: IntentKind, outcome: ReadOutcome) -> QueryResult {
    match outcome {
        ReadOutcome::Content(content) => {
            QueryResult::new(ResultKind::FileContent, intent, content::render_content(&content))
                .with_data(json!(content))
        }
        ReadOutcome::TooLarge { file, message } => {
            QueryResult::new(ResultKind::FileTooLarge, intent, message)
                .with_data(json!({ "file": file }))
        }
        ReadOutcome::Unsupported { file, message } => {
            let suggestions = file.web_link.iter().cloned().collect();
            QueryResult::new(ResultKind::UnsupportedFormat, intent, message)
                .with_data(json!({ "file": file }))
                .with_suggestions(suggestions)
        }
    }
}

fn range_label(range: DateRange, today: chrono::NaiveDate) -> String {
    if range.days() == 1 {
        if range.start == today {
            return "today".to_string();
        }
        if range.start == today + chrono::Duration::days(1) {
            return "tomorrow".to_string();
        }
        return range.start.format("%A, %b %-d").to_string();
    }
    format!(
        "{} to {}",
        range.start.format("%a %b %-d"),
        range.end.format("%a %b %-d")
    )
}

fn local_time(t: DateTime<Utc>, fmt: &str) -> String {
    t.with_timezone(&Local).format(fmt).to_string()
}

fn humanize_until(delta: chrono::Duration) -> String {
    let minutes = delta.num_minutes().max(0);
    match minutes {
        0 => "now".to_string(),
        m if m < 60 => format!("in {} min", m),
        m if m < 24 * 60 => format!("in {}h {}m", m / 60, m % 60),
        m => format!("in {} days", m / (24 * 60)),
    }
}

fn format_email(email: &EmailMessage) -> String {
    let marker = if email.is_unread { "● " } else { "" };
    format!("• {}{} (from {})", marker, email.subject, email.sender)
}

fn format_pull_request(pr: &PullRequest) -> String {
    let draft = if pr.draft { " [draft]" } else { "" };
    format!(
        "• #{} {}{} ({}, by {})",
        pr.number, pr.title, draft, pr.repository, pr.author
    )
}

fn format_issue(issue: &Issue) -> String {
    if issue.labels.is_empty() {
        format!("• #{} {} ({})", issue.number, issue.title, issue.repository)
    } else {
        format!(
            "• #{} {} ({}) [{}]",
            issue.number,
            issue.title,
            issue.repository,
            issue.labels.join(", ")
        )
    }
}

fn format_repository_stats(stats: &RepositoryStats) -> String {
    let mut lines = vec![
        "📊 Your GitHub repository statistics:".to_string(),
        format!("  📚 Repositories: {}", stats.total_repos),
        format!(
            "  🌍 Public: {} | 🔒 Private: {}",
            stats.public_repos, stats.private_repos
        ),
        format!("  ⭐ Stars: {}", stats.total_stars),
        format!("  🍴 Forks: {}", stats.total_forks),
    ];

    let languages = stats.top_languages(5);
    if !languages.is_empty() {
        lines.push("  🔤 Top languages:".to_string());
        lines.extend(
            languages
                .iter()
                .map(|(name, count)| format!("    • {}: {} repos", name, count)),
        );
    }
    if let Some(repo) = stats.most_starred.as_ref().filter(|r| r.stars > 0) {
        lines.push(format!("  🌟 Most starred: {} ({} stars)", repo.name, repo.stars));
    }
    if let Some(repo) = &stats.most_recent {
        lines.push(format!("  🕒 Most recently updated: {}", repo.name));
    }
    lines.join("\n")
}

fn format_commit(commit: &Commit) -> String {
    format!("• {} {} ({})", commit.sha, commit.message, commit.repository)
}

fn format_event(event: &CalendarEvent, with_day: bool) -> String {
    let when = if event.all_day {
        if with_day {
            format!("{} all day", local_time(event.start, "%a"))
        } else {
            "All day".to_string()
        }
    } else if with_day {
        format!(
            "{}-{}",
            local_time(event.start, "%a %H:%M"),
            local_time(event.end, "%H:%M")
        )
    } else {
        format!(
            "{}-{}",
            local_time(event.start, "%H:%M"),
            local_time(event.end, "%H:%M")
        )
    };
    match &event.location {
        Some(location) => format!("• {} {} 📍 {}", when, event.summary, location),
        None => format!("• {} {}", when, event.summary),
    }
}

fn format_slot(slot: &TimeSlot) -> String {
    let duration = match (slot.duration_minutes / 60, slot.duration_minutes % 60) {
        (0, m) => format!("{}m", m),
        (h, 0) => format!("{}h", h),
        (h, m) => format!("{}h {}m", h, m),
    };
    format!(
        "• {}-{} ({})",
        local_time(slot.start, "%H:%M"),
        local_time(slot.end, "%H:%M"),
        duration
    )
}

fn format_file(file: &FileDescriptor) -> String {
    if file.size_bytes > 0 {
        format!(
            "• {} ({}, {})",
            file.name,
            file.type_label(),
            human_size(file.size_bytes)
        )
    } else {
        format!("• {} ({})", file.name, file.type_label())
    }
}
