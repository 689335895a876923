//! Cache-and-fetch layer shared by all integrations.
//!
//! Every integration call goes through [`FetchCache::fetch`]. Entries are
//! keyed by `(integration, operation, sha256(params))`, stored as immutable
//! `Arc`s and replaced wholesale on refresh. Each entry carries the TTL it
//! was written with; expiry is checked lazily on access, so an expired
//! entry is still around to serve as stale data when a refresh fails.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::config::CacheConfig;
use crate::error::IntegrationError;
use crate::integrations::{Integration, IntegrationId, Operation};
use crate::metrics::get_metrics;

/// Cache key: integration, operation and a hash of the canonical parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub integration: IntegrationId,
    pub operation: &'static str,
    params_hash: String,
}

impl CacheKey {
    pub fn new(integration: IntegrationId, op: &Operation) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(op.canonical_params().as_bytes());
        Self {
            integration,
            operation: op.operation_id(),
            params_hash: format!("{:x}", hasher.finalize()),
        }
    }
}

/// One cached integration payload. Never mutated after insertion.
#[derive(Debug)]
pub struct CacheEntry {
    pub value: Arc<Value>,
    pub fetched_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl CacheEntry {
    /// `now - fetched_at > ttl`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let ttl = chrono::Duration::from_std(self.ttl)
            .unwrap_or_else(|_| chrono::Duration::days(365 * 100));
        now.signed_duration_since(self.fetched_at) > ttl
    }
}

/// Outcome class of a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    Success,
    /// Refresh failed; payload is the last known (stale) value
    Partial,
    Failure,
}

/// Result of one [`FetchCache::fetch`] call.
#[derive(Debug, Clone)]
pub struct IntegrationResult {
    pub status: FetchStatus,
    pub payload: Option<Arc<Value>>,
    pub error: Option<IntegrationError>,
    pub from_cache: bool,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl IntegrationResult {
    fn success(entry: &CacheEntry, from_cache: bool) -> Self {
        Self {
            status: FetchStatus::Success,
            payload: Some(entry.value.clone()),
            error: None,
            from_cache,
            fetched_at: Some(entry.fetched_at),
        }
    }

    fn stale(entry: &CacheEntry, error: IntegrationError) -> Self {
        Self {
            status: FetchStatus::Partial,
            payload: Some(entry.value.clone()),
            error: Some(error),
            from_cache: true,
            fetched_at: Some(entry.fetched_at),
        }
    }

    pub fn failure(error: IntegrationError) -> Self {
        Self {
            status: FetchStatus::Failure,
            payload: None,
            error: Some(error),
            from_cache: false,
            fetched_at: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == FetchStatus::Success
    }

    /// Deserialize the payload into a domain type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, IntegrationError> {
        match &self.payload {
            Some(value) => T::deserialize(value.as_ref())
                .map_err(|e| IntegrationError::Decode(e.to_string())),
            None => Err(self
                .error
                .clone()
                .unwrap_or_else(|| IntegrationError::Decode("empty payload".to_string()))),
        }
    }
}

/// Shared TTL cache in front of every integration call.
#[derive(Clone)]
pub struct FetchCache {
    entries: Cache<CacheKey, Arc<CacheEntry>>,
}

impl FetchCache {
    pub fn new(config: &CacheConfig) -> Self {
        let entries = Cache::builder()
            .max_capacity(config.max_entries)
            .support_invalidation_closures()
            .build();
        Self { entries }
    }

    /// Fetch `op` from `integration`, serving a cached entry until the TTL
    /// it was stored with runs out. A fresh result is stored with `ttl`.
    pub async fn fetch(
        &self,
        integration: &dyn Integration,
        op: &Operation,
        ttl: Duration,
    ) -> IntegrationResult {
        self.fetch_at(integration, op, ttl, Utc::now()).await
    }

    /// [`fetch`](Self::fetch) with an explicit notion of "now".
    pub async fn fetch_at(
        &self,
        integration: &dyn Integration,
        op: &Operation,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> IntegrationResult {
        let id = integration.id();
        if op.integration() != id {
            return IntegrationResult::failure(op.unsupported_by(id));
        }

        let key = CacheKey::new(id, op);
        let existing = self.entries.get(&key).await;
        let metrics = get_metrics();

        if let Some(entry) = existing.as_ref().filter(|e| !e.is_expired(now)) {
            metrics.cache_hits_total.inc();
            tracing::debug!(integration = %id, operation = key.operation, "cache hit");
            return IntegrationResult::success(entry, true);
        }

        metrics.cache_misses_total.inc();
        tracing::debug!(integration = %id, operation = key.operation, "cache miss");

        match integration.execute(op).await {
            Ok(value) => {
                let entry = Arc::new(CacheEntry {
                    value: Arc::new(value),
                    fetched_at: now,
                    ttl,
                });
                self.entries.insert(key, entry.clone()).await;
                IntegrationResult::success(&entry, false)
            }
            Err(error) => {
                metrics
                    .integration_failures_total
                    .with_label_values(&[id.as_str()])
                    .inc();
                tracing::warn!(
                    integration = %id,
                    operation = key.operation,
                    "fetch failed: {}",
                    error
                );
                match existing {
                    Some(stale) => IntegrationResult::stale(&stale, error),
                    None => IntegrationResult::failure(error),
                }
            }
        }
    }

    /// Drop every entry belonging to one integration.
    pub fn invalidate(&self, integration: IntegrationId) {
        if let Err(e) = self
            .entries
            .invalidate_entries_if(move |key, _| key.integration == integration)
        {
            tracing::warn!("Selective invalidation failed, clearing cache: {}", e);
            self.entries.invalidate_all();
        }
    }

    pub fn invalidate_all(&self) {
        self.entries.invalidate_all();
    }

    /// Number of live entries, after flushing pending maintenance.
    pub async fn entry_count(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }
}
