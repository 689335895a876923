//! Local/cloud failover over completion providers.
//!
//! Each provider carries a [`ProviderState`]. A provider in `Unknown` is
//! probed once; a provider that fails a probe, errors, or exceeds the
//! request timeout is marked `Unavailable` for the rest of the session and
//! never retried. When no provider answers, the adapter returns the prompt
//! unchanged with `degraded = true` instead of an error.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{AiProviderKind, Config};
use crate::metrics::{get_metrics, Metrics};

use super::{create_provider, AiRequest, AiResponse, CompletionProvider};

/// Upper bound on a liveness probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Last known availability of one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderState {
    Unknown,
    Available,
    Unavailable,
}

/// Provider state as reported by `status`.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub kind: AiProviderKind,
    pub name: String,
    pub state: ProviderState,
}

struct Slot {
    provider: Arc<dyn CompletionProvider>,
    state: Mutex<ProviderState>,
}

impl Slot {
    fn state(&self) -> ProviderState {
        *self.state.lock()
    }

    fn set_state(&self, state: ProviderState) {
        *self.state.lock() = state;
    }

    async fn probe(&self, timeout: Duration) -> ProviderState {
        let kind = self.provider.kind();
        let state = match tokio::time::timeout(timeout, self.provider.probe()).await {
            Ok(Ok(())) => ProviderState::Available,
            Ok(Err(e)) => {
                tracing::info!("AI provider {} unavailable: {}", kind.as_str(), e);
                ProviderState::Unavailable
            }
            Err(_) => {
                tracing::info!("AI provider {} probe timed out", kind.as_str());
                ProviderState::Unavailable
            }
        };
        self.set_state(state);
        state
    }
}

/// Primary/secondary completion providers with session-scoped failover.
pub struct AiAdapter {
    slots: Vec<Slot>,
}

impl AiAdapter {
    /// Providers in preference order; the first is the primary.
    pub fn new(providers: Vec<Arc<dyn CompletionProvider>>) -> Self {
        Self {
            slots: providers
                .into_iter()
                .map(|provider| Slot {
                    provider,
                    state: Mutex::new(ProviderState::Unknown),
                })
                .collect(),
        }
    }

    /// An adapter with no providers; every completion is degraded.
    pub fn disabled() -> Self {
        Self::new(Vec::new())
    }

    /// Build the configured primary and, when `ai.fallback` is set, the
    /// other provider as secondary. Providers that cannot be constructed
    /// (disabled, missing API key) are left out.
    pub fn from_config(config: &Config) -> Self {
        let primary = config.ai_provider;
        let mut order = vec![primary];
        if config.ai.fallback {
            order.push(primary.other());
        }

        let providers = order
            .into_iter()
            .filter_map(|kind| {
                let provider_config = config.ai.provider(kind);
                if !provider_config.enabled {
                    return None;
                }
                match create_provider(kind, provider_config) {
                    Ok(provider) => Some(Arc::from(provider)),
                    Err(e) => {
                        tracing::debug!("AI provider {} not configured: {}", kind.as_str(), e);
                        None
                    }
                }
            })
            .collect();

        Self::new(providers)
    }

    /// Complete `prompt`, failing over between providers.
    pub async fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
        timeout: Duration,
    ) -> AiResponse {
        let request = AiRequest::new(prompt)
            .with_max_tokens(max_tokens)
            .with_temperature(temperature)
            .with_timeout(timeout);
        self.complete_request(&request).await
    }

    pub async fn complete_request(&self, request: &AiRequest) -> AiResponse {
        let metrics = get_metrics();

        for slot in &self.slots {
            let kind = slot.provider.kind();

            match slot.state() {
                ProviderState::Unavailable => continue,
                ProviderState::Unknown => {
                    if slot.probe(PROBE_TIMEOUT.min(request.timeout)).await
                        == ProviderState::Unavailable
                    {
                        metrics.ai_failovers_total.inc();
                        continue;
                    }
                }
                ProviderState::Available => {}
            }

            metrics
                .ai_requests_total
                .with_label_values(&[kind.as_str()])
                .inc();
            let timer = Metrics::start_timer(&metrics.ai_duration_seconds);

            match tokio::time::timeout(request.timeout, slot.provider.complete(request)).await {
                Ok(Ok(text)) => {
                    tracing::debug!(
                        "AI completion from {} in {:?}",
                        kind.as_str(),
                        timer.elapsed()
                    );
                    return AiResponse {
                        text,
                        provider_used: Some(kind),
                        degraded: false,
                    };
                }
                Ok(Err(e)) => {
                    tracing::info!(
                        "AI provider {} failed, marking unavailable: {}",
                        kind.as_str(),
                        e
                    );
                }
                Err(_) => {
                    tracing::info!(
                        "AI provider {} timed out after {:?}, marking unavailable",
                        kind.as_str(),
                        request.timeout
                    );
                }
            }

            slot.set_state(ProviderState::Unavailable);
            metrics.ai_failovers_total.inc();
        }

        metrics.ai_degraded_total.inc();
        tracing::warn!("No AI provider available, returning unprocessed text");
        AiResponse {
            text: request.prompt.clone(),
            provider_used: None,
            degraded: true,
        }
    }

    /// Re-probe every provider, resetting its state.
    pub async fn health_check(&self) -> Vec<ProviderStatus> {
        for slot in &self.slots {
            slot.probe(PROBE_TIMEOUT).await;
        }
        self.states()
    }

    /// Current state of every provider, primary first.
    pub fn states(&self) -> Vec<ProviderStatus> {
        self.slots
            .iter()
            .map(|slot| ProviderStatus {
                kind: slot.provider.kind(),
                name: slot.provider.name(),
                state: slot.state(),
            })
            .collect()
    }
}
