//! Concierge: a natural language front end for personal productivity data
//!
//! Free-text questions ("summarize emails from hello@n8n.io", "what PRs
//! need my review", "read file quarterly-report") are classified into a
//! closed set of intents, answered from Gmail, GitHub, Google Calendar and
//! Google Drive through a shared TTL cache, and optionally enriched by a
//! local or cloud language model with automatic failover.

pub mod ai;
pub mod cache;
pub mod config;
pub mod error;
pub mod integrations;
pub mod metrics;
pub mod query;
pub mod utils;

pub use ai::{AiAdapter, AiRequest, AiResponse, CompletionProvider, OpenAiCompatibleProvider};
pub use cache::{FetchCache, FetchStatus, IntegrationResult};
pub use config::Config;
pub use error::{AiError, ConciergeError, ConfigError, IntegrationError, Result};
pub use integrations::{
    DriveClient, GitHubClient, GmailClient, GoogleCalendarClient, Integration, IntegrationId,
    IntegrationRegistry, Operation,
};
pub use metrics::{get_metrics, Metrics, MetricsSnapshot};
pub use query::{
    Dispatcher, DispatcherSettings, Intent, IntentClassifier, IntentKind, IntentParams,
    QueryResult, ResultKind, StatusReport,
};
