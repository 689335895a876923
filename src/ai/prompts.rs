//! Prompt builders for the summaries the dispatcher asks for.

use std::fmt::Write;

use crate::integrations::EmailMessage;
use crate::utils::truncate_with_ellipsis;

/// Messages included in an email summary prompt.
pub const EMAIL_SUMMARY_LIMIT: usize = 5;

/// Bytes of each message body included in an email summary prompt.
const EMAIL_CONTENT_BYTES: usize = 200;

pub const EMAIL_SUMMARY_MAX_TOKENS: u32 = 250;
pub const DAILY_SUMMARY_MAX_TOKENS: u32 = 500;

/// Numbered listing of up to [`EMAIL_SUMMARY_LIMIT`] messages, also used as
/// the non-AI answer when no provider is available.
pub fn email_listing(emails: &[EmailMessage]) -> String {
    let mut text = String::new();
    for (i, email) in emails.iter().take(EMAIL_SUMMARY_LIMIT).enumerate() {
        let content = if email.snippet.is_empty() {
            &email.body
        } else {
            &email.snippet
        };
        let _ = writeln!(text, "Email {}:", i + 1);
        let _ = writeln!(text, "From: {}", email.sender);
        let _ = writeln!(text, "Subject: {}", email.subject);
        let _ = writeln!(
            text,
            "Content: {}\n",
            truncate_with_ellipsis(content, EMAIL_CONTENT_BYTES)
        );
    }
    text.trim_end().to_string()
}

/// Prompt asking for a bullet summary of `emails`.
pub fn email_summary_prompt(emails: &[EmailMessage], sender: Option<&str>) -> String {
    let sender_context = sender.map(|s| format!(" from {}", s)).unwrap_or_default();

    format!(
        "Please summarize these emails{}:\n\n{}\n\n\
         Provide a clear summary with:\n\
         • Key topics and themes\n\
         • Important action items\n\
         • Any urgent matters\n\
         • Overall tone\n\n\
         Keep it concise and well-organized.",
        sender_context,
        email_listing(emails)
    )
}

/// Counts gathered for the daily summary. `None` means the fetch failed.
#[derive(Debug, Clone, Default)]
pub struct DayOverview {
    pub unread_emails: Option<u64>,
    pub events_today: Option<usize>,
    pub prs_to_review: Option<usize>,
    pub assigned_issues: Option<usize>,
}

impl DayOverview {
    /// Plain bullet list, used in the prompt and as the non-AI answer.
    pub fn bullets(&self) -> String {
        let mut lines = Vec::new();
        if let Some(n) = self.unread_emails {
            lines.push(format!("• Email: {} unread", n));
        }
        if let Some(n) = self.events_today {
            lines.push(format!("• Calendar: {} events today", n));
        }
        match (self.prs_to_review, self.assigned_issues) {
            (Some(prs), Some(issues)) => lines.push(format!(
                "• GitHub: {} PRs to review, {} assigned issues",
                prs, issues
            )),
            (Some(prs), None) => lines.push(format!("• GitHub: {} PRs to review", prs)),
            (None, Some(issues)) => {
                lines.push(format!("• GitHub: {} assigned issues", issues))
            }
            (None, None) => {}
        }
        lines.join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.unread_emails.is_none()
            && self.events_today.is_none()
            && self.prs_to_review.is_none()
            && self.assigned_issues.is_none()
    }
}

/// Prompt asking for a daily overview with priorities.
pub fn daily_summary_prompt(overview: &DayOverview) -> String {
    format!(
        "Based on the following information about my day, please provide a helpful \
         daily summary and recommendations:\n\n{}\n\n\
         Please provide:\n\
         1. A brief overview of my day\n\
         2. Priority items that need attention\n\
         3. Suggested order of tasks\n\
         4. Any potential scheduling conflicts or opportunities\n\n\
         Keep the response concise but helpful.",
        overview.bullets()
    )
}
