//! GitHub REST client.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::sync::OnceCell;

use crate::config::IntegrationConfig;
use crate::error::IntegrationError;

use super::http::ApiClient;
use super::traits::{FetchResult, Integration, Operation};
use super::types::{
    Commit, IntegrationId, Issue, PullRequest, RepositoryHighlight, RepositoryStats,
};

/// Page size for repository listings, the API maximum.
const REPOS_PER_PAGE: usize = 100;
/// Upper bound on pages read for repository statistics.
const MAX_REPO_PAGES: usize = 10;

/// Source-control integration backed by the GitHub REST API.
pub struct GitHubClient {
    api: ApiClient,
    login: OnceCell<String>,
}

impl GitHubClient {
    pub fn from_config(config: &IntegrationConfig) -> FetchResult<Self> {
        Ok(Self {
            api: ApiClient::from_config(
                IntegrationId::SourceControl,
                config,
                IntegrationId::SourceControl.token_env(),
            )?,
            login: OnceCell::new(),
        })
    }

    /// Login of the authenticated user, fetched once.
    async fn login(&self) -> FetchResult<&str> {
        let login = self
            .login
            .get_or_try_init(|| async {
                let user = self.api.get_json("user", &[]).await?;
                user.get("login")
                    .and_then(Value::as_str)
                    .map(String::from)
                    .ok_or_else(|| IntegrationError::Decode("user response has no login".to_string()))
            })
            .await?;
        Ok(login.as_str())
    }

    async fn search(&self, query: String, limit: usize) -> FetchResult<Vec<Value>> {
        let result = self
            .api
            .get_json(
                "search/issues",
                &[
                    ("q", query),
                    ("sort", "updated".to_string()),
                    ("per_page", limit.to_string()),
                ],
            )
            .await?;

        Ok(result
            .get("items")
            .and_then(Value::as_array)
            .map(|items| items.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn pull_requests(&self, qualifier: &str, limit: usize) -> FetchResult<Value> {
        let login = self.login().await?;
        let items = self
            .search(format!("is:pr is:open {}:{}", qualifier, login), limit)
            .await?;
        let prs: Vec<PullRequest> = items.iter().map(parse_pull_request).collect();
        Ok(serde_json::to_value(prs).unwrap_or_else(|_| json!([])))
    }

    async fn assigned_issues(&self, limit: usize) -> FetchResult<Value> {
        let login = self.login().await?;
        let items = self
            .search(format!("is:issue is:open assignee:{}", login), limit)
            .await?;
        let issues: Vec<Issue> = items.iter().map(parse_issue).collect();
        Ok(serde_json::to_value(issues).unwrap_or_else(|_| json!([])))
    }

    async fn recent_commits(&self, limit: usize) -> FetchResult<Value> {
        let login = self.login().await?;
        let events = self
            .api
            .get_json(
                &format!("users/{}/events", login),
                &[("per_page", "50".to_string())],
            )
            .await?;

        let mut commits = commits_from_events(&events);
        commits.sort_by(|a, b| b.date.cmp(&a.date));
        commits.truncate(limit);
        Ok(serde_json::to_value(commits).unwrap_or_else(|_| json!([])))
    }

    /// Statistics over every repository the user owns.
    async fn repository_stats(&self) -> FetchResult<Value> {
        let mut repos = Vec::new();
        for page in 1..=MAX_REPO_PAGES {
            let batch = self
                .api
                .get_json(
                    "user/repos",
                    &[
                        ("type", "owner".to_string()),
                        ("per_page", REPOS_PER_PAGE.to_string()),
                        ("page", page.to_string()),
                    ],
                )
                .await?;
            let batch = batch.as_array().cloned().unwrap_or_default();
            let last = batch.len() < REPOS_PER_PAGE;
            repos.extend(batch);
            if last {
                break;
            }
        }

        serde_json::to_value(summarize_repositories(&repos))
            .map_err(|e| IntegrationError::Decode(e.to_string()))
    }
}

#[async_trait]
impl Integration for GitHubClient {
    fn id(&self) -> IntegrationId {
        IntegrationId::SourceControl
    }

    async fn authenticate(&self) -> FetchResult<bool> {
        Ok(self.api.has_token())
    }

    async fn test_connection(&self) -> FetchResult<bool> {
        self.login().await.map(|login| !login.is_empty())
    }

    async fn execute(&self, op: &Operation) -> FetchResult<Value> {
        match op {
            Operation::OpenPullRequests { limit } => self.pull_requests("author", *limit).await,
            Operation::PullRequestsToReview { limit } => {
                self.pull_requests("review-requested", *limit).await
            }
            Operation::AssignedIssues { limit } => self.assigned_issues(*limit).await,
            Operation::RecentCommits { limit } => self.recent_commits(*limit).await,
            Operation::RepositoryStats => self.repository_stats().await,
            other => Err(other.unsupported_by(self.id())),
        }
    }
}

fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn time_field(value: &Value, key: &str) -> Option<DateTime<Utc>> {
    value
        .get(key)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

/// "owner/repo" from a `repository_url` like `https://api.github.com/repos/owner/repo`.
fn repository_name(item: &Value) -> String {
    let url = str_field(item, "repository_url");
    let mut segments = url.rsplit('/');
    match (segments.next(), segments.next()) {
        (Some(repo), Some(owner)) if !repo.is_empty() => format!("{}/{}", owner, repo),
        _ => url,
    }
}

pub(crate) fn parse_pull_request(item: &Value) -> PullRequest {
    PullRequest {
        number: item.get("number").and_then(Value::as_u64).unwrap_or(0),
        title: str_field(item, "title"),
        repository: repository_name(item),
        author: item
            .get("user")
            .map(|u| str_field(u, "login"))
            .unwrap_or_default(),
        url: str_field(item, "html_url"),
        state: str_field(item, "state"),
        draft: item.get("draft").and_then(Value::as_bool).unwrap_or(false),
        updated_at: time_field(item, "updated_at"),
    }
}

pub(crate) fn parse_issue(item: &Value) -> Issue {
    Issue {
        number: item.get("number").and_then(Value::as_u64).unwrap_or(0),
        title: str_field(item, "title"),
        repository: repository_name(item),
        url: str_field(item, "html_url"),
        state: str_field(item, "state"),
        labels: item
            .get("labels")
            .and_then(Value::as_array)
            .map(|labels| labels.iter().map(|l| str_field(l, "name")).collect())
            .unwrap_or_default(),
        updated_at: time_field(item, "updated_at"),
    }
}

/// Commits carried by `PushEvent`s in a user event feed.
fn commits_from_events(events: &Value) -> Vec<Commit> {
    let Some(events) = events.as_array() else {
        return Vec::new();
    };

    events
        .iter()
        .filter(|e| e.get("type").and_then(Value::as_str) == Some("PushEvent"))
        .flat_map(|event| {
            let repository = event
                .get("repo")
                .map(|r| str_field(r, "name"))
                .unwrap_or_default();
            let date = time_field(event, "created_at");
            event
                .get("payload")
                .and_then(|p| p.get("commits"))
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .map(move |c| Commit {
                    sha: str_field(&c, "sha").chars().take(8).collect(),
                    message: str_field(&c, "message")
                        .lines()
                        .next()
                        .unwrap_or_default()
                        .to_string(),
                    repository: repository.clone(),
                    date,
                })
        })
        .collect()
}

fn highlight(repo: &Value) -> RepositoryHighlight {
    RepositoryHighlight {
        name: str_field(repo, "name"),
        url: str_field(repo, "html_url"),
        stars: count_field(repo, "stargazers_count"),
        updated_at: time_field(repo, "updated_at"),
    }
}

fn count_field(value: &Value, key: &str) -> u64 {
    value.get(key).and_then(Value::as_u64).unwrap_or(0)
}

/// Fold a `user/repos` listing into totals and highlights.
pub(crate) fn summarize_repositories(repos: &[Value]) -> RepositoryStats {
    let private_repos = repos
        .iter()
        .filter(|r| r.get("private").and_then(Value::as_bool).unwrap_or(false))
        .count();

    let mut languages = BTreeMap::new();
    for language in repos
        .iter()
        .filter_map(|r| r.get("language").and_then(Value::as_str))
        .filter(|l| !l.is_empty())
    {
        *languages.entry(language.to_string()).or_insert(0) += 1;
    }

    // first repository wins ties
    let most_starred = repos
        .iter()
        .rev()
        .max_by_key(|r| count_field(r, "stargazers_count"))
        .map(highlight);
    let most_recent = repos
        .iter()
        .rev()
        .max_by_key(|r| time_field(r, "updated_at"))
        .map(highlight);

    RepositoryStats {
        total_repos: repos.len(),
        public_repos: repos.len() - private_repos,
        private_repos,
        total_stars: repos.iter().map(|r| count_field(r, "stargazers_count")).sum(),
        total_forks: repos.iter().map(|r| count_field(r, "forks_count")).sum(),
        languages,
        most_starred,
        most_recent,
    }
}
