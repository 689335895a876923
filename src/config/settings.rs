//! Configuration settings for concierge.

use crate::error::{ConfigError, Result};
use crate::integrations::IntegrationId;
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Primary AI provider: "local" or "cloud"
    pub ai_provider: AiProviderKind,
    pub ai: AiConfig,
    pub integrations: IntegrationsConfig,
    pub cache: CacheConfig,
    pub query: QueryConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::ReadFile)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default locations or use defaults.
    pub fn load() -> Result<Self> {
        for path in Self::search_paths() {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(&path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Config::default())
    }

    /// Candidate config locations, in lookup order.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("concierge.toml")];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("concierge/config.toml"));
        }
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".concierge/config.toml"));
        }
        paths
    }

    /// Location `setup` writes a fresh config to.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|p| p.join("concierge/config.toml"))
            .unwrap_or_else(|| PathBuf::from("concierge.toml"))
    }

    /// Render this configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self).map_err(ConfigError::Render)?)
    }

    /// Settings for one integration.
    pub fn integration(&self, id: IntegrationId) -> &IntegrationConfig {
        match id {
            IntegrationId::Mail => &self.integrations.mail,
            IntegrationId::SourceControl => &self.integrations.source_control,
            IntegrationId::Calendar => &self.integrations.calendar,
            IntegrationId::Drive => &self.integrations.drive,
        }
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<()> {
        for (name, provider) in [("ai.local", &self.ai.local), ("ai.cloud", &self.ai.cloud)] {
            if !provider.enabled {
                continue;
            }
            if provider.base_url.is_empty() {
                return Err(ConfigError::MissingField(format!("{}.base_url", name)).into());
            }
            if provider.model.is_empty() {
                return Err(ConfigError::MissingField(format!("{}.model", name)).into());
            }
            if !(0.0..=2.0).contains(&provider.temperature) {
                return Err(ConfigError::Invalid(format!(
                    "{}.temperature must be between 0 and 2",
                    name
                ))
                .into());
            }
            if provider.timeout_secs == 0 {
                return Err(
                    ConfigError::Invalid(format!("{}.timeout_secs must be > 0", name)).into(),
                );
            }
        }

        for id in IntegrationId::ALL {
            let integration = self.integration(id);
            if integration.enabled && integration.base_url.is_empty() {
                return Err(ConfigError::MissingField(format!(
                    "integrations.{}.base_url",
                    id.as_str()
                ))
                .into());
            }
        }

        if self.query.timeout_secs == 0 {
            return Err(ConfigError::Invalid("query.timeout_secs must be > 0".to_string()).into());
        }

        Ok(())
    }
}

/// Which AI backend is tried first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProviderKind {
    #[default]
    Local,
    Cloud,
}

impl AiProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Cloud => "cloud",
        }
    }

    /// The other provider.
    pub fn other(&self) -> Self {
        match self {
            Self::Local => Self::Cloud,
            Self::Cloud => Self::Local,
        }
    }
}

/// AI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Fail over to the other provider when the primary is unusable
    pub fallback: bool,
    /// Local inference endpoint (LM Studio, Ollama, llama.cpp server)
    #[serde(deserialize_with = "local_provider")]
    pub local: AiProviderConfig,
    /// Cloud inference endpoint (OpenAI-compatible)
    #[serde(deserialize_with = "cloud_provider")]
    pub cloud: AiProviderConfig,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            fallback: true,
            local: AiProviderConfig::local_default(),
            cloud: AiProviderConfig::cloud_default(),
        }
    }
}

impl AiConfig {
    pub fn provider(&self, kind: AiProviderKind) -> &AiProviderConfig {
        match kind {
            AiProviderKind::Local => &self.local,
            AiProviderKind::Cloud => &self.cloud,
        }
    }
}

/// Settings for one OpenAI-compatible completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiProviderConfig {
    pub enabled: bool,
    /// Base URL, e.g. "http://localhost:1234/v1"
    pub base_url: String,
    /// Model name; "local-model" picks the first model the server reports
    pub model: String,
    /// API key (cloud falls back to OPENAI_API_KEY)
    pub api_key: Option<String>,
    /// Upper bound on tokens per completion
    pub max_tokens: u32,
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for AiProviderConfig {
    fn default() -> Self {
        Self::local_default()
    }
}

impl AiProviderConfig {
    pub fn local_default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:1234/v1".to_string(),
            model: "local-model".to_string(),
            api_key: None,
            max_tokens: 500,
            temperature: 0.3,
            timeout_secs: 30,
        }
    }

    pub fn cloud_default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            max_tokens: 500,
            temperature: 0.7,
            timeout_secs: 30,
        }
    }
}

/// Per-integration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationsConfig {
    #[serde(deserialize_with = "mail_integration")]
    pub mail: IntegrationConfig,
    #[serde(deserialize_with = "source_control_integration")]
    pub source_control: IntegrationConfig,
    #[serde(deserialize_with = "calendar_integration")]
    pub calendar: IntegrationConfig,
    #[serde(deserialize_with = "drive_integration")]
    pub drive: IntegrationConfig,
}

impl Default for IntegrationsConfig {
    fn default() -> Self {
        Self {
            mail: IntegrationConfig::new("https://gmail.googleapis.com/gmail/v1", 300),
            source_control: IntegrationConfig::new("https://api.github.com", 600),
            calendar: IntegrationConfig::new("https://www.googleapis.com/calendar/v3", 300),
            drive: IntegrationConfig::new("https://www.googleapis.com/drive/v3", 300),
        }
    }
}

/// Settings for one data-source integration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationConfig {
    pub enabled: bool,
    /// Cache TTL in seconds
    pub cache_duration: u64,
    /// Default number of items fetched per list call
    pub max_items: usize,
    /// API base URL
    pub base_url: String,
    /// Access token (loaded from environment if not set)
    pub token: Option<String>,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self::new("", 300)
    }
}

impl IntegrationConfig {
    fn new(base_url: &str, cache_duration: u64) -> Self {
        Self {
            enabled: true,
            cache_duration,
            max_items: 10,
            base_url: base_url.to_string(),
            token: None,
        }
    }
}

/// Deserialize a partial table on top of `defaults`, so `[ai.cloud]` with
/// only `model` set keeps the cloud endpoint rather than the local one.
fn overlay<'de, D, T>(defaults: T, deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Serialize + DeserializeOwned,
{
    let overrides = toml::Table::deserialize(deserializer)?;
    let mut merged = match toml::Value::try_from(defaults).map_err(de::Error::custom)? {
        toml::Value::Table(table) => table,
        _ => toml::Table::new(),
    };
    for (key, value) in overrides {
        merged.insert(key, value);
    }
    toml::Value::Table(merged)
        .try_into()
        .map_err(de::Error::custom)
}

fn local_provider<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<AiProviderConfig, D::Error> {
    overlay(AiProviderConfig::local_default(), deserializer)
}

fn cloud_provider<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<AiProviderConfig, D::Error> {
    overlay(AiProviderConfig::cloud_default(), deserializer)
}

fn mail_integration<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<IntegrationConfig, D::Error> {
    overlay(IntegrationsConfig::default().mail, deserializer)
}

fn source_control_integration<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<IntegrationConfig, D::Error> {
    overlay(IntegrationsConfig::default().source_control, deserializer)
}

fn calendar_integration<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<IntegrationConfig, D::Error> {
    overlay(IntegrationsConfig::default().calendar, deserializer)
}

fn drive_integration<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<IntegrationConfig, D::Error> {
    overlay(IntegrationsConfig::default().drive, deserializer)
}

/// Shared fetch cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached entries across all integrations
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_entries: 1000 }
    }
}

/// Query processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Overall deadline for one query in seconds
    pub timeout_secs: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { timeout_secs: 45 }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    pub level: String,
    /// Emit JSON log lines
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}
