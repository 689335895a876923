//! GitHub client against a mock REST API.

use serde_json::{json, Value};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use concierge::config::IntegrationConfig;
use concierge::integrations::{GitHubClient, Integration, Operation, RepositoryStats};

fn client(server: &MockServer) -> GitHubClient {
    let config = IntegrationConfig {
        base_url: server.uri(),
        token: Some("ghp_test".to_string()),
        ..Default::default()
    };
    GitHubClient::from_config(&config).unwrap()
}

fn repo(name: &str, language: &str, stars: u64, private: bool) -> Value {
    json!({
        "name": name,
        "html_url": format!("https://github.com/octocat/{}", name),
        "private": private,
        "language": language,
        "stargazers_count": stars,
        "forks_count": 1,
        "updated_at": "2025-08-01T10:00:00Z"
    })
}

#[tokio::test]
async fn test_repository_stats_reads_every_page() {
    let server = MockServer::start().await;
    let first_page: Vec<Value> = (0..100)
        .map(|i| repo(&format!("repo-{}", i), "Rust", 1, i % 2 == 0))
        .collect();
    Mock::given(method("GET"))
        .and(path("/user/repos"))
        .and(query_param("type", "owner"))
        .and(query_param("page", "1"))
        .and(header("authorization", "Bearer ghp_test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(first_page)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user/repos"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            repo("workflows", "TypeScript", 250, false),
            repo("dotfiles", "Shell", 0, false)
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let value = client(&server)
        .execute(&Operation::RepositoryStats)
        .await
        .unwrap();
    let stats: RepositoryStats = serde_json::from_value(value).unwrap();

    assert_eq!(stats.total_repos, 102);
    assert_eq!(stats.private_repos, 50);
    assert_eq!(stats.public_repos, 52);
    assert_eq!(stats.total_stars, 350);
    assert_eq!(stats.total_forks, 102);
    assert_eq!(
        stats.top_languages(2),
        vec![("Rust", 100), ("Shell", 1)]
    );
    assert_eq!(stats.most_starred.unwrap().name, "workflows");
}

#[tokio::test]
async fn test_repository_stats_without_repositories() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/repos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let value = client(&server)
        .execute(&Operation::RepositoryStats)
        .await
        .unwrap();

    assert_eq!(value["total_repos"], 0);
    assert!(value["most_starred"].is_null());
}
