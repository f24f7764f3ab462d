use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

// Declare the static OnceCell to hold the Metrics.
static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Asynchronously initializes and gets a reference to the static `Metrics`.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE
        .get_or_init(|| async {
            info!("Initializing Metrics ...");
            Metrics::new()
        })
        .await
}

pub const OUTCOME_CACHED: &str = "cached";
pub const OUTCOME_REFRESHED: &str = "refreshed";
pub const OUTCOME_STALE: &str = "stale";
pub const OUTCOME_UNAVAILABLE: &str = "unavailable";
pub const OUTCOME_CLOSED: &str = "closed";

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Service metrics
    pub token_requests: IntCounterVec,

    // Fetch metrics
    pub fetch_requests: IntCounter,
    pub fetch_failures: IntCounterVec,
    pub fetch_duration: Histogram,

    // Cache metrics
    pub token_expiry_unix: IntGauge,

    // Config/runtime
    pub config_parse_failures: IntCounter,
    pub config_validation_errors: IntCounter,
    pub up: IntGauge,
}

impl Metrics {
    // metric names and labels are static; failures here are programming errors
    #[allow(clippy::expect_used)]
    fn new() -> Arc<Self> {
        Arc::new(Self::build().expect("static metric definitions must register"))
    }

    fn build() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("m2m_token".into()), None)?;

        let metrics = Self {
            token_requests: IntCounterVec::new(Opts::new("token_requests_total", "Token requests by outcome"), &["outcome"])?,

            fetch_requests: IntCounter::new("fetch_requests_total", "Token endpoint calls")?,
            fetch_failures: IntCounterVec::new(Opts::new("fetch_failures_total", "Token endpoint failures by reason"), &["reason"])?,
            fetch_duration: Histogram::with_opts(HistogramOpts::new("fetch_duration_seconds", "Token endpoint call duration seconds").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]))?,

            token_expiry_unix: IntGauge::new("token_expiry_unix_seconds", "Expiry of the cached token")?,

            config_parse_failures: IntCounter::new("config_parse_failures_total", "Config file parse failures")?,
            config_validation_errors: IntCounter::new("config_validation_errors_total", "Validation errors during startup")?,
            up: IntGauge::new("up", "1 if service is healthy")?,

            registry,
        };

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.token_requests.clone()))?;
        reg.register(Box::new(metrics.fetch_requests.clone()))?;
        reg.register(Box::new(metrics.fetch_failures.clone()))?;
        reg.register(Box::new(metrics.fetch_duration.clone()))?;
        reg.register(Box::new(metrics.token_expiry_unix.clone()))?;
        reg.register(Box::new(metrics.config_parse_failures.clone()))?;
        reg.register(Box::new(metrics.config_validation_errors.clone()))?;
        reg.register(Box::new(metrics.up.clone()))?;

        Ok(metrics)
    }
}
