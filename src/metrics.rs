//! Prometheus-compatible metrics for concierge.
//!
//! Counters and histograms for the fetch cache, integrations, AI providers
//! and query processing. The `status` command prints a snapshot.

use prometheus::{
    self, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Global metrics instance.
static METRICS: std::sync::OnceLock<Arc<Metrics>> = std::sync::OnceLock::new();

/// Get or initialize the global metrics instance.
pub fn get_metrics() -> Arc<Metrics> {
    METRICS.get_or_init(|| Arc::new(Metrics::new())).clone()
}

/// Latency buckets in seconds, 10ms to 60s.
fn default_latency_buckets() -> Vec<f64> {
    vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
}

/// All concierge metrics.
pub struct Metrics {
    /// Prometheus registry for all metrics.
    pub registry: Registry,

    // =========================================================================
    // Counters
    // =========================================================================
    /// Queries processed.
    pub queries_total: IntCounter,
    /// Fetch cache hits.
    pub cache_hits_total: IntCounter,
    /// Fetch cache misses (including expired entries).
    pub cache_misses_total: IntCounter,
    /// Failed integration calls, by integration.
    pub integration_failures_total: IntCounterVec,
    /// Completion requests sent, by provider.
    pub ai_requests_total: IntCounterVec,
    /// Times a provider was marked unavailable and the next one tried.
    pub ai_failovers_total: IntCounter,
    /// Completions answered with the non-AI fallback.
    pub ai_degraded_total: IntCounter,

    // =========================================================================
    // Gauges
    // =========================================================================
    /// Process uptime in seconds.
    pub uptime_seconds: IntGauge,

    // =========================================================================
    // Histograms (durations in seconds)
    // =========================================================================
    /// End-to-end query duration.
    pub query_duration_seconds: Histogram,
    /// Completion request duration.
    pub ai_duration_seconds: Histogram,

    start_time: Instant,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics instance with all metrics registered.
    pub fn new() -> Self {
        let registry = Registry::new();

        let queries_total =
            IntCounter::new("concierge_queries_total", "Total number of queries processed")
                .expect("failed to create counter");

        let cache_hits_total =
            IntCounter::new("concierge_cache_hits_total", "Total number of cache hits")
                .expect("failed to create counter");

        let cache_misses_total =
            IntCounter::new("concierge_cache_misses_total", "Total number of cache misses")
                .expect("failed to create counter");

        let integration_failures_total = IntCounterVec::new(
            Opts::new(
                "concierge_integration_failures_total",
                "Total number of failed integration calls",
            ),
            &["integration"],
        )
        .expect("failed to create counter");

        let ai_requests_total = IntCounterVec::new(
            Opts::new(
                "concierge_ai_requests_total",
                "Total number of completion requests",
            ),
            &["provider"],
        )
        .expect("failed to create counter");

        let ai_failovers_total = IntCounter::new(
            "concierge_ai_failovers_total",
            "Total number of AI provider failovers",
        )
        .expect("failed to create counter");

        let ai_degraded_total = IntCounter::new(
            "concierge_ai_degraded_total",
            "Total number of degraded (non-AI) completions",
        )
        .expect("failed to create counter");

        let uptime_seconds = IntGauge::new("concierge_uptime_seconds", "Uptime in seconds")
            .expect("failed to create gauge");

        let query_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "concierge_query_duration_seconds",
                "Query processing duration in seconds",
            )
            .buckets(default_latency_buckets()),
        )
        .expect("failed to create histogram");

        let ai_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "concierge_ai_duration_seconds",
                "Completion request duration in seconds",
            )
            .buckets(default_latency_buckets()),
        )
        .expect("failed to create histogram");

        // Register all metrics
        registry
            .register(Box::new(queries_total.clone()))
            .expect("failed to register metric");
        registry
            .register(Box::new(cache_hits_total.clone()))
            .expect("failed to register metric");
        registry
            .register(Box::new(cache_misses_total.clone()))
            .expect("failed to register metric");
        registry
            .register(Box::new(integration_failures_total.clone()))
            .expect("failed to register metric");
        registry
            .register(Box::new(ai_requests_total.clone()))
            .expect("failed to register metric");
        registry
            .register(Box::new(ai_failovers_total.clone()))
            .expect("failed to register metric");
        registry
            .register(Box::new(ai_degraded_total.clone()))
            .expect("failed to register metric");
        registry
            .register(Box::new(uptime_seconds.clone()))
            .expect("failed to register metric");
        registry
            .register(Box::new(query_duration_seconds.clone()))
            .expect("failed to register metric");
        registry
            .register(Box::new(ai_duration_seconds.clone()))
            .expect("failed to register metric");

        Self {
            registry,
            queries_total,
            cache_hits_total,
            cache_misses_total,
            integration_failures_total,
            ai_requests_total,
            ai_failovers_total,
            ai_degraded_total,
            uptime_seconds,
            query_duration_seconds,
            ai_duration_seconds,
            start_time: Instant::now(),
        }
    }

    /// Update the uptime gauge.
    pub fn update_uptime(&self) {
        self.uptime_seconds
            .set(self.start_time.elapsed().as_secs() as i64);
    }

    /// Export metrics in Prometheus text format.
    pub fn export_prometheus(&self) -> String {
        use prometheus::Encoder;

        self.update_uptime();
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!("Failed to encode metrics: {}", e);
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }

    /// Snapshot of every metric for display or JSON output.
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.update_uptime();
        MetricsSnapshot {
            queries_total: self.queries_total.get(),
            cache_hits_total: self.cache_hits_total.get(),
            cache_misses_total: self.cache_misses_total.get(),
            integration_failures: labelled_counts(&self.integration_failures_total),
            ai_requests: labelled_counts(&self.ai_requests_total),
            ai_failovers_total: self.ai_failovers_total.get(),
            ai_degraded_total: self.ai_degraded_total.get(),
            uptime_seconds: self.uptime_seconds.get(),
            query_duration_seconds: HistogramSnapshot::from_prometheus(
                &self.query_duration_seconds,
            ),
            ai_duration_seconds: HistogramSnapshot::from_prometheus(&self.ai_duration_seconds),
        }
    }

    /// Start a timer that records duration to a histogram when dropped.
    pub fn start_timer(histogram: &Histogram) -> HistogramTimer {
        HistogramTimer {
            histogram: histogram.clone(),
            start: Instant::now(),
        }
    }
}

/// Current value of every label combination of a single-label counter.
fn labelled_counts(counter: &IntCounterVec) -> BTreeMap<String, u64> {
    use prometheus::core::Collector;

    counter
        .collect()
        .iter()
        .flat_map(|family| family.get_metric().iter())
        .filter_map(|metric| {
            let label = metric.get_label().first()?.get_value().to_string();
            Some((label, metric.get_counter().get_value() as u64))
        })
        .collect()
}

/// Timer that records duration to a histogram when dropped.
pub struct HistogramTimer {
    histogram: Histogram,
    start: Instant,
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

impl HistogramTimer {
    /// Elapsed time without stopping the timer.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Snapshot of all metrics for serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub queries_total: u64,
    pub cache_hits_total: u64,
    pub cache_misses_total: u64,
    pub integration_failures: BTreeMap<String, u64>,
    pub ai_requests: BTreeMap<String, u64>,
    pub ai_failovers_total: u64,
    pub ai_degraded_total: u64,
    pub uptime_seconds: i64,
    pub query_duration_seconds: HistogramSnapshot,
    pub ai_duration_seconds: HistogramSnapshot,
}

impl MetricsSnapshot {
    /// Cache hit ratio in `[0, 1]`, `None` before any lookup.
    pub fn cache_hit_ratio(&self) -> Option<f64> {
        let total = self.cache_hits_total + self.cache_misses_total;
        (total > 0).then(|| self.cache_hits_total as f64 / total as f64)
    }
}

/// Snapshot of a histogram for serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistogramSnapshot {
    pub count: u64,
    pub sum: f64,
}

impl HistogramSnapshot {
    fn from_prometheus(histogram: &Histogram) -> Self {
        Self {
            count: histogram.get_sample_count(),
            sum: histogram.get_sample_sum(),
        }
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}
