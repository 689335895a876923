//! Query Intent Classifier.
//!
//! Maps free text to an [`Intent`] using one ordered table of rules. Each
//! rule pairs an [`IntentKind`] with a case-insensitive pattern and an
//! extractor for the pattern's capture. The first matching rule wins;
//! every later match is kept as an alternative. Order in [`RULES`] is the
//! tie-break and is covered by tests.

use std::sync::LazyLock;

use chrono::{Days, Local, NaiveDate};
use regex::{Captures, Regex};

use crate::integrations::FileType;

use super::types::*;

// ============================================================================
// Rule Table
// ============================================================================

/// Pulls rule-specific parameters out of the winning match.
type Extractor = fn(&Captures<'_>, &mut IntentParams);

/// One classification rule.
pub struct Rule {
    pub kind: IntentKind,
    pattern: Regex,
    extractor: Extractor,
}

impl Rule {
    fn new(kind: IntentKind, pattern: &str, extractor: Extractor) -> Self {
        Self {
            kind,
            pattern: Regex::new(&format!("(?i){}", pattern)).expect("Invalid regex"),
            extractor,
        }
    }

    /// Word count of the pattern source, used for specificity.
    fn pattern_words(&self) -> usize {
        self.pattern.as_str().split_whitespace().count()
    }
}

const FILE_WORDS: &str = r"(?:files?|documents?|docs?)";

/// Rules in priority order: mail, source control, calendar, document
/// store, general; more specific rules first inside each group.
pub static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    use IntentKind::*;

    vec![
        // Mail
        Rule::new(
            EmailSummary,
            r"(?:summarize|summarise|summary of).*(?:email|mail).*\bfrom\b\s*(.*)",
            extract_sender,
        ),
        Rule::new(
            UnreadCount,
            r"(?:how many|count of|number of).*(?:unread|new).*(?:email|mail)|\bunread (?:email|mail)",
            no_params,
        ),
        Rule::new(EmailsFromSender, r"(?:email|mail).*\bfrom\b\s*(.*)", extract_sender),
        Rule::new(
            SearchEmails,
            r"(?:email|mail).*\b(?:about|regarding)\b\s*(.*)",
            extract_keyword,
        ),
        Rule::new(UrgentEmails, r"(?:urgent|important).*(?:email|mail)", no_params),
        Rule::new(RecentEmails, r"(?:recent|latest|last|new).*(?:email|mail)|\binbox\b", no_params),
        // Source control
        Rule::new(
            RepoStats,
            r"\b(?:repository|repositories|repos?)\b.*\bstat(?:s|istics?)?\b",
            no_params,
        ),
        Rule::new(
            SourceControlSummary,
            r"\b(?:github|git)\b.*(?:summary|overview)",
            no_params,
        ),
        Rule::new(
            PrsToReview,
            r"(?:pull request|\bprs?\b).*review|review.*(?:pull request|\bprs?\b)",
            no_params,
        ),
        Rule::new(
            AssignedIssues,
            r"\bissues?\b.*assigned|assigned.*\bissues?\b|my issues",
            no_params,
        ),
        Rule::new(RecentCommits, r"(?:recent|latest|my|last).*\bcommits?\b", no_params),
        Rule::new(ListPrs, r"(?:pull requests?|\bprs?\b)", no_params),
        // Calendar
        Rule::new(
            FreeTime,
            r"free time|when am i free|free slots?|\bavailable\b|availability",
            no_params,
        ),
        Rule::new(NextMeeting, r"(?:next|upcoming).*(?:meeting|event)", no_params),
        Rule::new(
            ScheduleTomorrow,
            r"(?:schedule|calendar|agenda|meetings?|events?).*(?:tomorrow|next day)",
            no_params,
        ),
        Rule::new(
            ScheduleWeek,
            r"(?:schedule|calendar|agenda|meetings?|events?).*\bweek\b",
            no_params,
        ),
        Rule::new(
            ScheduleToday,
            r"(?:schedule|calendar|agenda|meetings?|events?).*(?:today|this day)|what'?s on (?:my calendar )?today|\b(?:schedule|calendar|agenda)\b",
            no_params,
        ),
        // Document store
        Rule::new(
            SearchAndRead,
            &format!(
                r"\b(?:search|find)\b.*\bread\b.*{}.*\b(?:for|about)\b\s*(.*)",
                FILE_WORDS
            ),
            extract_keyword,
        ),
        Rule::new(
            ReadFile,
            &format!(r"\b(?:read|open|show content)\b.*\b{}\b\s*(.*)", FILE_WORDS),
            extract_filename,
        ),
        Rule::new(
            SearchFiles,
            &format!(r"\b(?:search|find)\b.*{}.*\b(?:for|about)\b\s*(.*)", FILE_WORDS),
            extract_keyword,
        ),
        Rule::new(
            SharedFiles,
            &format!(r"\bshared?\b.*{0}|{0}.*\bshared\b", FILE_WORDS),
            no_params,
        ),
        Rule::new(
            StorageUsage,
            r"(?:storage|space|quota).*(?:usage|used|left)|how much (?:storage|space)",
            no_params,
        ),
        Rule::new(
            RecentFiles,
            &format!(r"(?:recent|latest).*{}|(?:drive|google drive).*{0}", FILE_WORDS),
            no_params,
        ),
        Rule::new(
            ListFilesByType,
            r"\b(?:docs?|documents?|sheets?|spreadsheets?|slides?|presentations?|decks?|pdfs?|images?|pictures?|photos?|folders?|director(?:y|ies))\b",
            no_params,
        ),
        // General
        Rule::new(
            DailySummary,
            r"(?:daily|day).*(?:summary|overview|briefing)|(?:summary|overview) of (?:my )?day",
            no_params,
        ),
        Rule::new(
            Status,
            r"\bstatus\b|health ?check|overview.*(?:all|everything)",
            no_params,
        ),
        Rule::new(Help, r"\bhelp\b|what can you do|\bcommands\b", no_params),
    ]
});

/// Words that raise confidence when present anywhere in the query.
const DOMAIN_KEYWORDS: &[&str] = &[
    "email",
    "mail",
    "github",
    "pr",
    "pull request",
    "calendar",
    "schedule",
    "meeting",
    "commit",
    "drive",
    "file",
    "document",
    "folder",
];

// ============================================================================
// Intent Classifier
// ============================================================================

/// Classifies natural language queries into structured intents.
#[derive(Debug, Default, Clone, Copy)]
pub struct IntentClassifier;

impl IntentClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify a query. Never fails; unmatched text yields `Unknown`.
    pub fn classify(&self, query: &str) -> Intent {
        self.classify_at(query, Local::now().date_naive())
    }

    /// Classify with an explicit "today" for date-range extraction.
    pub fn classify_at(&self, query: &str, today: NaiveDate) -> Intent {
        let text = query.trim();
        let mut matches = RULES
            .iter()
            .filter_map(|rule| rule.pattern.captures(text).map(|caps| (rule, caps)));

        let Some((rule, caps)) = matches.next() else {
            tracing::debug!("No rule matched query: {}", text);
            return Intent::unknown(text);
        };

        let alternatives: Vec<IntentKind> = matches
            .map(|(r, _)| r.kind)
            .filter(|kind| *kind != rule.kind)
            .fold(Vec::new(), |mut acc, kind| {
                if !acc.contains(&kind) {
                    acc.push(kind);
                }
                acc
            });

        let mut params = extract_common(text, today);
        (rule.extractor)(&caps, &mut params);

        let confidence = confidence(text, rule.pattern_words());
        tracing::debug!(
            "Classified {:?} as {} ({:.2})",
            text,
            rule.kind,
            confidence
        );

        Intent {
            kind: rule.kind,
            raw_text: text.to_string(),
            params,
            confidence,
            alternatives,
        }
    }

    /// The rule table, in priority order.
    pub fn rules(&self) -> impl Iterator<Item = IntentKind> {
        RULES.iter().map(|r| r.kind)
    }
}

/// `0.5 + 0.3 * specificity + 0.1` per domain keyword, capped at 1.0.
fn confidence(text: &str, pattern_words: usize) -> f32 {
    let query_words = text.split_whitespace().count().max(1);
    let specificity = (pattern_words as f32 / query_words as f32).min(1.0);

    let lower = text.to_lowercase();
    let keyword_bonus = DOMAIN_KEYWORDS
        .iter()
        .filter(|k| lower.contains(*k))
        .count() as f32
        * 0.1;

    (0.5 + specificity * 0.3 + keyword_bonus).min(1.0)
}

// ============================================================================
// Extractors
// ============================================================================

fn no_params(_: &Captures<'_>, _: &mut IntentParams) {}

fn extract_sender(caps: &Captures<'_>, params: &mut IntentParams) {
    let Some(raw) = capture(caps) else {
        return;
    };
    params.sender = match EMAIL_ADDRESS_PATTERN.find(&raw) {
        Some(m) => Some(m.as_str().to_string()),
        None => clean_capture(&raw),
    };
}

fn extract_keyword(caps: &Captures<'_>, params: &mut IntentParams) {
    params.keyword = capture(caps).and_then(|raw| clean_capture(&raw));
}

fn extract_filename(caps: &Captures<'_>, params: &mut IntentParams) {
    params.filename = capture(caps).and_then(|raw| {
        let raw = FILENAME_PREFIX_PATTERN.replace(&raw, "");
        clean_capture(&raw)
    });
}

fn capture(caps: &Captures<'_>) -> Option<String> {
    caps.get(1)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Cut trailing time qualifiers and punctuation, strip quotes.
fn clean_capture(raw: &str) -> Option<String> {
    let cut = match TIME_QUALIFIER_PATTERN.find(raw) {
        Some(m) => &raw[..m.start()],
        None => raw,
    };
    let cleaned = cut
        .trim()
        .trim_end_matches(['?', '.', '!', ','])
        .trim()
        .trim_matches(['"', '\''])
        .trim();

    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

/// Parameters every rule gets: date range, limit, file type.
fn extract_common(text: &str, today: NaiveDate) -> IntentParams {
    IntentParams {
        date_range: extract_date_range(text, today),
        limit: extract_limit(text),
        file_type: extract_file_type(text),
        ..IntentParams::default()
    }
}

fn extract_limit(text: &str) -> Option<usize> {
    LIMIT_PATTERN
        .captures_iter(text)
        .filter(|caps| caps.get(2).is_none())
        .find_map(|caps| caps.get(1).and_then(|m| m.as_str().parse().ok()))
        .filter(|n| *n > 0)
}

fn extract_file_type(text: &str) -> Option<FileType> {
    text.split(|c: char| !c.is_alphanumeric())
        .find_map(FileType::from_word)
}

/// Longest "last N days" window honoured; larger counts are clamped.
const MAX_LOOKBACK_DAYS: u64 = 3650;

/// Date range relative to `today`. Weeks run Monday to Sunday.
///
/// Ranges that fall outside the representable calendar are dropped.
fn extract_date_range(text: &str, today: NaiveDate) -> Option<DateRange> {
    if let Some(days) = DAYS_PATTERN
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
    {
        let days = days.min(MAX_LOOKBACK_DAYS);
        return today
            .checked_sub_days(Days::new(days))
            .map(|start| DateRange::new(start, today));
    }

    if LAST_WEEK_PATTERN.is_match(text) {
        return today
            .checked_sub_days(Days::new(7))
            .and_then(DateRange::week_of);
    }
    if THIS_WEEK_PATTERN.is_match(text) {
        return DateRange::week_of(today);
    }
    if YESTERDAY_PATTERN.is_match(text) {
        return today.pred_opt().map(DateRange::single);
    }
    if TOMORROW_PATTERN.is_match(text) {
        return today.succ_opt().map(DateRange::single);
    }
    if TODAY_PATTERN.is_match(text) {
        return Some(DateRange::single(today));
    }
    None
}

// ============================================================================
// Regex Patterns (using LazyLock for static initialization)
// ============================================================================

static EMAIL_ADDRESS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("Invalid regex")
});
static FILENAME_PREFIX_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:called|named|titled)\s+").expect("Invalid regex")
});
static TIME_QUALIFIER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s+(?:today|yesterday|tomorrow|this week|last week|(?:in the )?(?:last|past) \d+ days?)\b")
        .expect("Invalid regex")
});
static LIMIT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:last|recent|latest|top)\s+(\d+)(\s+days?)?").expect("Invalid regex")
});
static DAYS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:last|past)\s+(\d+)\s+days?\b").expect("Invalid regex")
});
static LAST_WEEK_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\blast\s+week\b").expect("Invalid regex"));
static THIS_WEEK_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bthis\s+week\b").expect("Invalid regex"));
static YESTERDAY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\byesterday\b").expect("Invalid regex"));
static TOMORROW_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\btomorrow\b").expect("Invalid regex"));
static TODAY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\btoday\b").expect("Invalid regex"));

// ============================================================================
// Tests
// ============================================================================
