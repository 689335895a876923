//! Integrations with external data sources.
//!
//! Every data source implements [`Integration`]: a uniform read interface
//! (`authenticate`, `test_connection`, `execute`) over a closed set of
//! [`Operation`]s. The dispatcher never talks to a client directly; calls go
//! through [`crate::cache::FetchCache`].
//!
//! # Clients
//!
//! - [`GmailClient`]: mail (unread count, recent, from sender, search, urgent)
//! - [`GitHubClient`]: source control (PRs, review requests, assigned issues, commits)
//! - [`GoogleCalendarClient`]: calendar events in a time range
//! - [`DriveClient`]: document store listings, metadata, text export, quota
//!
//! OAuth flows are not handled here: each client takes a bearer token from
//! configuration or the environment and reports `authenticate() == false`
//! without one.

pub mod calendar;
pub mod drive;
pub mod github;
pub mod gmail;
mod http;
mod registry;
mod traits;
mod types;

pub use calendar::GoogleCalendarClient;
pub use drive::DriveClient;
pub use github::GitHubClient;
pub use gmail::GmailClient;
pub use registry::*;
pub use traits::*;
pub use types::*;
