//! Config files on disk.

use std::io::Write;

use concierge::config::{AiProviderKind, Config};
use concierge::integrations::IntegrationId;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_setup_output_loads_back() {
    let rendered = Config::default().to_toml().unwrap();
    let file = write_config(&rendered);

    let config = Config::from_file(file.path()).unwrap();

    assert_eq!(config.ai_provider, AiProviderKind::Local);
    assert!(config.ai.fallback);
    assert_eq!(config.ai.cloud.base_url, "https://api.openai.com/v1");
    assert_eq!(config.query.timeout_secs, 45);
    assert_eq!(
        config.integration(IntegrationId::SourceControl).cache_duration,
        600
    );
}

#[test]
fn test_partial_tables_keep_their_own_defaults() {
    let file = write_config(
        r#"
        ai_provider = "cloud"

        [ai.cloud]
        model = "gpt-4o"

        [integrations.source_control]
        max_items = 20

        [logging]
        json = true
        "#,
    );

    let config = Config::from_file(file.path()).unwrap();

    assert_eq!(config.ai.cloud.model, "gpt-4o");
    assert_eq!(config.ai.cloud.temperature, 0.7);
    assert_eq!(config.ai.local.model, "local-model");

    let github = config.integration(IntegrationId::SourceControl);
    assert_eq!(github.max_items, 20);
    assert_eq!(github.cache_duration, 600);
    assert_eq!(github.base_url, "https://api.github.com");

    assert!(config.logging.json);
    assert_eq!(config.logging.level, "warn");
}

#[test]
fn test_invalid_values_are_rejected() {
    let file = write_config(
        r#"
        [ai.local]
        temperature = 2.5
        "#,
    );
    assert!(Config::from_file(file.path()).is_err());

    let file = write_config(
        r#"
        [query]
        timeout_secs = 0
        "#,
    );
    assert!(Config::from_file(file.path()).is_err());

    let file = write_config("ai_provider = \"remote\"");
    assert!(Config::from_file(file.path()).is_err());
}

#[test]
fn test_missing_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(Config::from_file(dir.path().join("absent.toml")).is_err());
}
