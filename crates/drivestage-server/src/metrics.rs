//! Prometheus metrics registry for drivestage
//!
//! Counters and histograms for the HTTP endpoints, relayed notices and
//! pipeline runs. Each process owns one registry and exposes it on
//! `GET /metrics`.

use std::sync::Arc;

use async_trait::async_trait;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

use drivestage_core::domain::FileNotice;
use drivestage_core::ports::INotificationRelay;

/// Central metrics registry holding all Prometheus metrics.
pub struct MetricsRegistry {
    registry: Registry,
    /// Counter: HTTP requests by (route, status)
    pub http_requests_total: IntCounterVec,
    /// Counter: inbound notices by (role, outcome)
    pub notices_total: IntCounterVec,
    /// Counter: outbound relays by (transport, status)
    pub relays_total: IntCounterVec,
    /// Counter: pipeline runs by (outcome, step)
    pub pipeline_runs_total: IntCounterVec,
    /// Histogram: pipeline run duration in seconds
    pub pipeline_duration_seconds: HistogramVec,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with all metrics registered.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new_custom(Some("drivestage".to_string()), None)?;

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests served"),
            &["route", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let notices_total = IntCounterVec::new(
            Opts::new("notices_total", "Inbound notices by outcome"),
            &["role", "outcome"],
        )?;
        registry.register(Box::new(notices_total.clone()))?;

        let relays_total = IntCounterVec::new(
            Opts::new("relays_total", "Notices relayed to the mover"),
            &["transport", "status"],
        )?;
        registry.register(Box::new(relays_total.clone()))?;

        let pipeline_runs_total = IntCounterVec::new(
            Opts::new("pipeline_runs_total", "Pipeline runs by outcome"),
            &["outcome", "step"],
        )?;
        registry.register(Box::new(pipeline_runs_total.clone()))?;

        let pipeline_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "pipeline_duration_seconds",
                "Pipeline run duration in seconds",
            )
            .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, f64::INFINITY]),
            &["outcome"],
        )?;
        registry.register(Box::new(pipeline_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            notices_total,
            relays_total,
            pipeline_runs_total,
            pipeline_duration_seconds,
        })
    }

    // ========================================================================
    // Recording helpers
    // ========================================================================

    /// Record a served HTTP request.
    pub fn record_http_request(&self, route: &str, status: u16) {
        self.http_requests_total
            .with_label_values(&[route, &status.to_string()])
            .inc();
    }

    /// Record how an inbound notice was handled.
    pub fn record_notice(&self, role: &str, outcome: &str) {
        self.notices_total.with_label_values(&[role, outcome]).inc();
    }

    /// Record an outbound relay attempt.
    pub fn record_relay(&self, transport: &str, status: &str) {
        self.relays_total
            .with_label_values(&[transport, status])
            .inc();
    }

    /// Record a finished pipeline run. `step` is empty for successful runs
    /// and rejections.
    pub fn record_pipeline_run(&self, outcome: &str, step: &str, duration_secs: f64) {
        self.pipeline_runs_total
            .with_label_values(&[outcome, step])
            .inc();
        self.pipeline_duration_seconds
            .with_label_values(&[outcome])
            .observe(duration_secs);
    }

    // ========================================================================
    // Encoding
    // ========================================================================

    /// Encode all metrics in Prometheus text exposition format.
    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

// ============================================================================
// MeteredRelay
// ============================================================================

/// Relay decorator that counts every delivery attempt
pub struct MeteredRelay {
    inner: Arc<dyn INotificationRelay + Send + Sync>,
    metrics: Arc<MetricsRegistry>,
}

impl MeteredRelay {
    pub fn new(
        inner: Arc<dyn INotificationRelay + Send + Sync>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self { inner, metrics }
    }
}

#[async_trait]
impl INotificationRelay for MeteredRelay {
    async fn relay(&self, notice: &FileNotice) -> anyhow::Result<()> {
        let result = self.inner.relay(notice).await;
        let status = if result.is_ok() { "success" } else { "failure" };
        self.metrics.record_relay(self.inner.transport(), status);
        result
    }

    fn transport(&self) -> &'static str {
        self.inner.transport()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drivestage_core::domain::NoticeSource;
    use drivestage_core::testing::{file_id, RecordingRelay};

    #[test]
    fn test_metrics_registry_creation() {
        let registry = MetricsRegistry::new().expect("create registry");
        let output = registry.encode().expect("encode");
        assert!(output.is_empty() || output.contains("drivestage"));
    }

    #[test]
    fn test_record_http_request() {
        let registry = MetricsRegistry::new().unwrap();
        registry.record_http_request("/", 200);
        registry.record_http_request("/healthz", 200);

        let output = registry.encode().unwrap();
        assert!(output.contains("drivestage_http_requests_total"));
        assert!(output.contains("route=\"/healthz\""));
    }

    #[test]
    fn test_record_pipeline_run() {
        let registry = MetricsRegistry::new().unwrap();
        registry.record_pipeline_run("failed", "process", 2.1);

        let output = registry.encode().unwrap();
        assert!(output.contains("drivestage_pipeline_runs_total"));
        assert!(output.contains("step=\"process\""));
        assert!(output.contains("drivestage_pipeline_duration_seconds"));
        assert!(output.contains("# TYPE"));
    }

    #[tokio::test]
    async fn test_metered_relay_counts_outcomes() {
        let metrics = Arc::new(MetricsRegistry::new().unwrap());
        let notice = FileNotice::new(file_id("F1"), None, NoticeSource::Poll);

        let ok = MeteredRelay::new(Arc::new(RecordingRelay::new()), metrics.clone());
        ok.relay(&notice).await.unwrap();
        let failing = MeteredRelay::new(Arc::new(RecordingRelay::failing()), metrics.clone());
        assert!(failing.relay(&notice).await.is_err());

        assert_eq!(
            metrics
                .relays_total
                .with_label_values(&["memory", "success"])
                .get(),
            1
        );
        assert_eq!(
            metrics
                .relays_total
                .with_label_values(&["memory", "failure"])
                .get(),
            1
        );
        assert_eq!(ok.transport(), "memory");
    }
}
