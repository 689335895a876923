//! End-to-end query scenarios against fake integrations.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::json;

use concierge::ai::{AiAdapter, CompletionProvider, ProviderState};
use concierge::config::AiProviderKind;
use concierge::error::IntegrationError;
use concierge::integrations::{
    CalendarEvent, EmailMessage, FileDescriptor, Integration, IntegrationId, Operation,
    PullRequest,
};
use concierge::query::{DispatcherSettings, Intent, IntentKind, ResultKind};

use crate::fakes::{
    dispatcher, dispatcher_with_settings, email, file, FakeIntegration, FakeProvider,
};

const MB: u64 = 1024 * 1024;

fn mail_with(emails: Vec<EmailMessage>) -> Arc<FakeIntegration> {
    Arc::new(FakeIntegration::new(IntegrationId::Mail, move |op| match op {
        Operation::EmailsFromSender { sender, limit } => {
            let matching: Vec<&EmailMessage> = emails
                .iter()
                .filter(|e| &e.sender == sender)
                .take(*limit)
                .collect();
            Ok(json!(matching))
        }
        Operation::UnreadCount => Ok(json!({ "unread_count": emails.len() })),
        other => Err(other.unsupported_by(IntegrationId::Mail)),
    }))
}

fn drive_with(
    files: Vec<FileDescriptor>,
    texts: HashMap<String, String>,
) -> Arc<FakeIntegration> {
    Arc::new(FakeIntegration::new(IntegrationId::Drive, move |op| match op {
        Operation::SearchFiles { query, .. } => {
            let query = query.to_lowercase();
            let matching: Vec<&FileDescriptor> = files
                .iter()
                .filter(|f| f.name.to_lowercase().contains(&query))
                .collect();
            Ok(json!(matching))
        }
        Operation::ExportFile { file_id, .. } => match texts.get(file_id) {
            Some(text) => Ok(json!({ "text": text })),
            None => Err(IntegrationError::Api {
                status: 404,
                message: "File not found".to_string(),
            }),
        },
        other => Err(other.unsupported_by(IntegrationId::Drive)),
    }))
}

fn exported(drive: &FakeIntegration) -> usize {
    drive
        .operations()
        .iter()
        .filter(|op| matches!(op, Operation::ExportFile { .. }))
        .count()
}

fn pull_request(number: u64) -> PullRequest {
    PullRequest {
        number,
        title: "Add retry to webhook node".to_string(),
        repository: "n8n-io/n8n".to_string(),
        author: "octocat".to_string(),
        url: format!("https://github.com/n8n-io/n8n/pull/{}", number),
        state: "open".to_string(),
        draft: false,
        updated_at: None,
    }
}

// ============================================================================
// Mail
// ============================================================================

#[tokio::test]
async fn test_email_summary_uses_ai() {
    let mut emails: Vec<EmailMessage> = (1..=3).map(|i| email(i, "hello@n8n.io")).collect();
    emails.push(email(9, "other@example.com"));
    let mail = mail_with(emails);
    let provider = Arc::new(FakeProvider::replying(
        AiProviderKind::Local,
        "• n8n shipped workflow updates",
    ));

    let dispatcher = dispatcher(
        vec![mail.clone() as Arc<dyn Integration>],
        AiAdapter::new(vec![provider.clone() as Arc<dyn CompletionProvider>]),
    );
    let result = dispatcher.process("summarize emails from hello@n8n.io").await;

    assert_eq!(result.kind, ResultKind::Answer);
    assert_eq!(result.intent, IntentKind::EmailSummary);
    assert!(!result.degraded_ai);
    assert!(result.answer.contains("n8n shipped workflow updates"));
    assert_eq!(
        mail.operations(),
        vec![Operation::EmailsFromSender {
            sender: "hello@n8n.io".to_string(),
            limit: 5,
        }]
    );

    let prompts = provider.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("from hello@n8n.io"));
    assert!(prompts[0].contains("Email 3:"));
    assert!(!prompts[0].contains("other@example.com"));
}

#[tokio::test]
async fn test_email_summary_without_matches_skips_ai() {
    let mail = mail_with(vec![email(1, "other@example.com")]);
    let provider = Arc::new(FakeProvider::replying(AiProviderKind::Local, "unused"));

    let dispatcher = dispatcher(
        vec![mail as Arc<dyn Integration>],
        AiAdapter::new(vec![provider.clone() as Arc<dyn CompletionProvider>]),
    );
    let result = dispatcher.process("summarize emails from hello@n8n.io").await;

    assert_eq!(result.kind, ResultKind::NoMatches);
    assert!(result.answer.contains("hello@n8n.io"));
    assert!(provider.prompts().is_empty());
}

#[tokio::test]
async fn test_email_summary_degrades_when_ai_is_down() {
    let mail = mail_with((1..=2).map(|i| email(i, "hello@n8n.io")).collect());
    let ai = AiAdapter::new(vec![
        Arc::new(FakeProvider::down(AiProviderKind::Local)) as Arc<dyn CompletionProvider>,
        Arc::new(FakeProvider::down(AiProviderKind::Cloud)),
    ]);

    let dispatcher = dispatcher(vec![mail as Arc<dyn Integration>], ai);
    let result = dispatcher.process("summarize emails from hello@n8n.io").await;

    assert_eq!(result.kind, ResultKind::Answer);
    assert!(result.degraded_ai);
    assert!(result.answer.contains("AI summary unavailable"));
    assert!(result.answer.contains("Subject: Workflow update 1"));
    assert!(result.answer.contains("Subject: Workflow update 2"));
}

#[tokio::test]
async fn test_missing_sender_asks_for_it() {
    let mail = mail_with(vec![email(1, "hello@n8n.io")]);
    let dispatcher = dispatcher(
        vec![mail.clone() as Arc<dyn Integration>],
        AiAdapter::disabled(),
    );

    let result = dispatcher.process("summarize emails from").await;

    assert_eq!(result.kind, ResultKind::MissingParameter);
    assert!(!result.suggestions.is_empty());
    assert_eq!(mail.calls(), 0);
}

#[tokio::test]
async fn test_repeated_query_is_served_from_cache() {
    let mail = mail_with(vec![email(1, "a@example.com"), email(2, "b@example.com")]);
    let dispatcher = dispatcher(
        vec![mail.clone() as Arc<dyn Integration>],
        AiAdapter::disabled(),
    );

    let first = dispatcher.process("how many unread emails do I have").await;
    let second = dispatcher.process("how many unread emails do I have").await;

    assert_eq!(first.answer, "📧 You have 2 unread emails.");
    assert_eq!(first.stats.cache_hits, 0);
    assert_eq!(second.stats.cache_hits, 1);
    assert_eq!(second.data["unread_count"], 2);
    assert_eq!(mail.calls(), 1);
}

#[tokio::test]
async fn test_refresh_drops_cached_data() {
    let mail = mail_with(vec![email(1, "a@example.com")]);
    let dispatcher = dispatcher(
        vec![mail.clone() as Arc<dyn Integration>],
        AiAdapter::disabled(),
    );
    let query = "how many unread emails do I have";

    dispatcher.process(query).await;
    dispatcher.refresh(Some(IntegrationId::Drive));
    dispatcher.process(query).await;
    assert_eq!(mail.calls(), 1);

    dispatcher.refresh(Some(IntegrationId::Mail));
    let refetched = dispatcher.process(query).await;
    assert_eq!(refetched.stats.cache_hits, 0);
    assert_eq!(mail.calls(), 2);

    dispatcher.refresh(None);
    dispatcher.process(query).await;
    assert_eq!(mail.calls(), 3);
}

#[tokio::test]
async fn test_unauthenticated_integration_suggests_token() {
    let mail = Arc::new(FakeIntegration::new(IntegrationId::Mail, |_| {
        Err(IntegrationError::NotAuthenticated("Gmail".to_string()))
    }));
    let dispatcher = dispatcher(vec![mail as Arc<dyn Integration>], AiAdapter::disabled());

    let result = dispatcher.process("how many unread emails do I have").await;

    assert_eq!(result.kind, ResultKind::IntegrationFailed);
    assert!(result.answer.contains("Gmail"));
    assert!(result.suggestions[0].contains("GOOGLE_ACCESS_TOKEN"));
}

// ============================================================================
// Document store
// ============================================================================

#[tokio::test]
async fn test_read_pdf_is_unsupported_without_export() {
    let drive = drive_with(
        vec![file("f1", "futeur-contract.pdf", "application/pdf", 48_000)],
        HashMap::new(),
    );
    let dispatcher = dispatcher(
        vec![drive.clone() as Arc<dyn Integration>],
        AiAdapter::disabled(),
    );

    let result = dispatcher.process("read file futeur-contract").await;

    assert_eq!(result.kind, ResultKind::UnsupportedFormat);
    assert!(result.answer.contains("PDF"));
    assert!(result.answer.contains("web interface"));
    assert_eq!(
        result.suggestions,
        vec!["https://drive.google.com/file/d/f1/view".to_string()]
    );
    assert_eq!(result.data["file"]["name"], "futeur-contract.pdf");
    assert_eq!(exported(&drive), 0);
}

#[tokio::test]
async fn test_ambiguous_filename_returns_choices() {
    let drive = drive_with(
        vec![
            file("q1", "report-q1.txt", "text/plain", 100),
            file("q2", "report-q2.txt", "text/plain", 100),
        ],
        HashMap::new(),
    );
    let dispatcher = dispatcher(
        vec![drive.clone() as Arc<dyn Integration>],
        AiAdapter::disabled(),
    );

    let result = dispatcher.process("read file report").await;

    assert_eq!(result.kind, ResultKind::FileChoices);
    assert_eq!(result.suggestions.len(), 2);
    assert!(result.answer.contains("report-q1.txt"));
    assert!(result.answer.contains("report-q2.txt"));
    assert_eq!(exported(&drive), 0);
}

#[tokio::test]
async fn test_exact_name_is_listed_first_not_read() {
    let drive = drive_with(
        vec![
            file("b1", "budget-2024.txt", "text/plain", 100),
            file("b2", "budget.txt", "text/plain", 100),
        ],
        HashMap::from([("b2".to_string(), "Q3 budget: 42k".to_string())]),
    );
    let dispatcher = dispatcher(
        vec![drive.clone() as Arc<dyn Integration>],
        AiAdapter::disabled(),
    );

    let result = dispatcher.process("read file budget").await;

    assert_eq!(result.kind, ResultKind::FileChoices);
    assert_eq!(result.data[0]["name"], "budget.txt");
    assert_eq!(result.data[1]["name"], "budget-2024.txt");
    assert_eq!(
        result.suggestions,
        vec![
            "read file budget.txt".to_string(),
            "read file budget-2024.txt".to_string()
        ]
    );
    assert!(!result.answer.contains("Q3 budget: 42k"));
    assert_eq!(exported(&drive), 0);
}

async fn read_text_file(size: u64) -> (concierge::QueryResult, Arc<FakeIntegration>) {
    let mut texts = HashMap::new();
    if size <= 10 * MB {
        texts.insert("n1".to_string(), "a".repeat(size as usize));
    }
    let drive = drive_with(vec![file("n1", "notes.txt", "text/plain", size)], texts);
    let dispatcher = dispatcher(
        vec![drive.clone() as Arc<dyn Integration>],
        AiAdapter::disabled(),
    );
    (dispatcher.process("read file notes").await, drive)
}

#[tokio::test]
async fn test_small_file_is_read_in_full() {
    let (result, _) = read_text_file(1536).await;

    assert_eq!(result.kind, ResultKind::FileContent);
    assert_eq!(result.data["truncated"], false);
    assert_eq!(result.data["text"].as_str().map(str::len), Some(1536));
    assert!(!result.answer.contains("truncated"));
}

#[tokio::test]
async fn test_medium_file_is_previewed() {
    let (result, _) = read_text_file(50 * 1024).await;

    assert_eq!(result.kind, ResultKind::FileContent);
    assert_eq!(result.data["truncated"], true);
    assert_eq!(result.data["original_size"], 50 * 1024);
    assert_eq!(result.data["text"].as_str().map(str::len), Some(2048));
    assert!(result.answer.contains("truncated"));
}

#[tokio::test]
async fn test_large_file_is_rejected_before_export() {
    let (result, drive) = read_text_file(15 * MB).await;

    assert_eq!(result.kind, ResultKind::FileTooLarge);
    assert!(result.answer.contains("15.0 MB"));
    assert_eq!(exported(&drive), 0);
}

#[tokio::test]
async fn test_search_and_read_skips_unreadable_files() {
    let drive = drive_with(
        vec![
            file("r1", "roadmap.txt", "text/plain", 100),
            file("r2", "roadmap.pdf", "application/pdf", 100),
            file("r3", "roadmap-notes.txt", "text/plain", 100),
        ],
        HashMap::from([
            ("r1".to_string(), "Ship v2 in Q4".to_string()),
            ("r3".to_string(), "Hire two engineers".to_string()),
        ]),
    );
    let dispatcher = dispatcher(
        vec![drive.clone() as Arc<dyn Integration>],
        AiAdapter::disabled(),
    );

    let result = dispatcher.process("search and read files for roadmap").await;

    assert_eq!(result.intent, IntentKind::SearchAndRead);
    assert_eq!(result.kind, ResultKind::FileContent);
    assert!(result.answer.contains("Ship v2 in Q4"));
    assert!(result.answer.contains("Hire two engineers"));
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("roadmap.pdf"));
    assert_eq!(result.data["contents"].as_array().map(Vec::len), Some(2));
    assert!(matches!(
        drive.operations().first(),
        Some(Operation::SearchFiles {
            full_text: true,
            ..
        })
    ));
}

#[tokio::test]
async fn test_list_files_by_type_requires_type() {
    let drive = drive_with(Vec::new(), HashMap::new());
    let dispatcher = dispatcher(
        vec![drive.clone() as Arc<dyn Integration>],
        AiAdapter::disabled(),
    );

    let result = dispatcher
        .handle(&Intent::new(IntentKind::ListFilesByType, "list files"))
        .await;

    assert_eq!(result.kind, ResultKind::MissingParameter);
    assert_eq!(drive.calls(), 0);
}

#[tokio::test]
async fn test_disabled_integration_is_unavailable() {
    let dispatcher = dispatcher(Vec::new(), AiAdapter::disabled());

    let result = dispatcher.process("read file budget").await;

    assert_eq!(result.kind, ResultKind::IntegrationUnavailable);
    assert!(result.answer.contains("Google Drive"));
}

// ============================================================================
// Source control, calendar and multi-source
// ============================================================================

#[tokio::test]
async fn test_source_control_summary_is_partial_on_failure() {
    let github = Arc::new(FakeIntegration::new(IntegrationId::SourceControl, |op| {
        match op {
            Operation::PullRequestsToReview { .. } => Ok(json!([pull_request(42)])),
            Operation::AssignedIssues { .. } => Err(IntegrationError::Api {
                status: 502,
                message: "Bad gateway".to_string(),
            }),
            Operation::RecentCommits { .. } => Ok(json!([])),
            other => Err(other.unsupported_by(IntegrationId::SourceControl)),
        }
    }));
    let dispatcher = dispatcher(vec![github as Arc<dyn Integration>], AiAdapter::disabled());

    let result = dispatcher.process("github summary").await;

    assert_eq!(result.kind, ResultKind::Answer);
    assert!(result.answer.contains("#42"));
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("GitHub"));
    assert!(result.data["assigned_issues"].is_null());
    assert_eq!(result.data["prs_to_review"][0]["number"], 42);
}

#[tokio::test]
async fn test_repo_stats_lists_totals_and_languages() {
    let github = Arc::new(FakeIntegration::new(IntegrationId::SourceControl, |op| {
        match op {
            Operation::RepositoryStats => Ok(json!({
                "total_repos": 3,
                "public_repos": 2,
                "private_repos": 1,
                "total_stars": 40,
                "total_forks": 5,
                "languages": { "Rust": 2, "Go": 1 },
                "most_starred": {
                    "name": "api",
                    "url": "https://github.com/acme/api",
                    "stars": 38,
                    "updated_at": null
                },
                "most_recent": null
            })),
            other => Err(other.unsupported_by(IntegrationId::SourceControl)),
        }
    }));
    let dispatcher = dispatcher(
        vec![github.clone() as Arc<dyn Integration>],
        AiAdapter::disabled(),
    );

    let result = dispatcher.process("show my repository statistics").await;

    assert_eq!(result.intent, IntentKind::RepoStats);
    assert_eq!(result.kind, ResultKind::Answer);
    assert!(result.answer.contains("Repositories: 3"));
    assert!(result.answer.contains("• Rust: 2 repos"));
    assert!(result.answer.contains("Most starred: api (38 stars)"));
    assert_eq!(result.data["total_stars"], 40);
    assert_eq!(github.operations(), vec![Operation::RepositoryStats]);
}

#[tokio::test]
async fn test_daily_summary_survives_one_failing_integration() {
    let mail = mail_with((1..=4).map(|i| email(i, "team@example.com")).collect());
    let github = Arc::new(FakeIntegration::new(IntegrationId::SourceControl, |_| {
        Err(IntegrationError::Http("connection reset".to_string()))
    }));
    let calendar = Arc::new(FakeIntegration::new(IntegrationId::Calendar, |_| {
        Ok(json!([]))
    }));
    let provider = Arc::new(FakeProvider::replying(
        AiProviderKind::Cloud,
        "Focus on your inbox first.",
    ));

    let dispatcher = dispatcher(
        vec![
            mail as Arc<dyn Integration>,
            github as Arc<dyn Integration>,
            calendar as Arc<dyn Integration>,
        ],
        AiAdapter::new(vec![provider.clone() as Arc<dyn CompletionProvider>]),
    );
    let result = dispatcher.process("give me my daily summary").await;

    assert_eq!(result.kind, ResultKind::Answer);
    assert!(!result.degraded_ai);
    assert!(result.answer.contains("• Email: 4 unread"));
    assert!(result.answer.contains("• Calendar: 0 events today"));
    assert!(!result.answer.contains("• GitHub"));
    assert!(result.answer.contains("Focus on your inbox first."));
    assert_eq!(result.warnings.len(), 2);
    assert!(result.warnings.iter().all(|w| w.contains("GitHub")));
    assert!(provider.prompts()[0].contains("• Email: 4 unread"));
}

#[tokio::test]
async fn test_next_meeting_prefers_events_with_attendees() {
    let now = Utc::now();
    let event = |id: &str, hours: i64, attendees: usize| CalendarEvent {
        id: id.to_string(),
        summary: format!("Event {}", id),
        start: now + chrono::Duration::hours(hours),
        end: now + chrono::Duration::hours(hours + 1),
        all_day: false,
        location: None,
        attendees: (0..attendees).map(|i| format!("person{}@example.com", i)).collect(),
        link: None,
    };
    let events = vec![event("focus", 1, 1), event("sync", 2, 3), event("later", 24 * 10, 5)];

    let calendar = Arc::new(FakeIntegration::new(IntegrationId::Calendar, move |op| {
        match op {
            Operation::EventsInRange { start, end } => {
                let within: Vec<&CalendarEvent> = events
                    .iter()
                    .filter(|e| e.start >= *start && e.start < *end)
                    .collect();
                Ok(json!(within))
            }
            other => Err(other.unsupported_by(IntegrationId::Calendar)),
        }
    }));
    let dispatcher = dispatcher(vec![calendar as Arc<dyn Integration>], AiAdapter::disabled());

    let result = dispatcher.process("when is my next meeting").await;

    assert_eq!(result.kind, ResultKind::Answer);
    assert!(result.answer.contains("Event sync"));
    assert_eq!(result.data["event"]["id"], "sync");
}

#[tokio::test]
async fn test_query_deadline_abandons_slow_fetch() {
    let github = Arc::new(
        FakeIntegration::new(IntegrationId::SourceControl, |_| Ok(json!([])))
            .with_delay(Duration::from_secs(5)),
    );
    let settings = DispatcherSettings {
        query_timeout: Duration::from_millis(100),
        ..Default::default()
    };
    let dispatcher = dispatcher_with_settings(
        vec![github as Arc<dyn Integration>],
        AiAdapter::disabled(),
        settings,
    );

    let started = Instant::now();
    let result = dispatcher.process("PRs waiting for my review").await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(result.kind, ResultKind::IntegrationFailed);
    assert!(result.stats.timed_out);
}

// ============================================================================
// General
// ============================================================================

#[tokio::test]
async fn test_unknown_query_offers_examples() {
    let dispatcher = dispatcher(Vec::new(), AiAdapter::disabled());

    let result = dispatcher.process("xyzzy plugh").await;

    assert_eq!(result.kind, ResultKind::Unknown);
    assert_eq!(result.intent, IntentKind::Unknown);
    assert!(result.answer.contains("xyzzy plugh"));
    assert!(!result.suggestions.is_empty());
}

#[tokio::test]
async fn test_status_report_covers_every_integration() {
    let mail = mail_with(Vec::new());
    let dispatcher = dispatcher(vec![mail as Arc<dyn Integration>], AiAdapter::disabled());

    let report = dispatcher.status_report().await;

    assert_eq!(report.integrations.len(), 4);
    let gmail = &report.integrations[0];
    assert_eq!(gmail.id, IntegrationId::Mail);
    assert!(gmail.enabled && gmail.authenticated && gmail.connected);
    assert!(report
        .integrations
        .iter()
        .filter(|s| s.id != IntegrationId::Mail)
        .all(|s| !s.enabled));
    assert!(report.ai_providers.is_empty());

    let result = dispatcher.process("status").await;
    assert_eq!(result.kind, ResultKind::Status);
    assert!(result.answer.contains("Gmail"));
}

#[tokio::test]
async fn test_status_report_checks_ai_providers() {
    let local = Arc::new(FakeProvider::down(AiProviderKind::Local));
    let cloud = Arc::new(FakeProvider::replying(AiProviderKind::Cloud, "ok"));
    let ai = AiAdapter::new(vec![
        local as Arc<dyn CompletionProvider>,
        cloud as Arc<dyn CompletionProvider>,
    ]);
    let dispatcher = dispatcher(Vec::new(), ai);

    let report = dispatcher.status_report().await;

    let states: Vec<ProviderState> = report.ai_providers.iter().map(|p| p.state).collect();
    assert_eq!(
        states,
        vec![ProviderState::Unavailable, ProviderState::Available]
    );
    assert!(dispatcher.status_report().await.render().contains("Unavailable"));
}
