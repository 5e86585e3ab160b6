use std::time::Duration;

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
    proto::MetricFamily,
};
use tether_core::MetricsBackend;
use tether_model::ListenerState;

/// Session lengths reach up to the ten minute default budget.
const DURATION_BUCKETS: &[f64] = &[1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 900.0];

#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    started: IntCounterVec,
    finished: IntCounterVec,
    duration: HistogramVec,
    evictions: IntCounterVec,
    coordination_errors: IntCounterVec,
}

impl PrometheusMetrics {
    /// Backend with a fresh private registry.
    pub fn new() -> prometheus::Result<Self> {
        Self::with_registry(Registry::new())
    }

    /// Register all collectors on `registry`.
    pub fn with_registry(registry: Registry) -> prometheus::Result<Self> {
        let started = IntCounterVec::new(
            Opts::new("tether_sessions_started_total", "Listener sessions started"),
            &["listener"],
        )?;
        let finished = IntCounterVec::new(
            Opts::new("tether_sessions_finished_total", "Listener sessions finished"),
            &["listener", "outcome"],
        )?;
        let duration = HistogramVec::new(
            HistogramOpts::new(
                "tether_session_duration_seconds",
                "Wall time of a listener session",
            )
            .buckets(DURATION_BUCKETS.to_vec()),
            &["listener"],
        )?;
        let evictions = IntCounterVec::new(
            Opts::new(
                "tether_evictions_total",
                "Sessions told to yield to a newer one",
            ),
            &["listener"],
        )?;
        let coordination_errors = IntCounterVec::new(
            Opts::new(
                "tether_coordination_errors_total",
                "Coordination store failures",
            ),
            &["listener", "stage"],
        )?;

        registry.register(Box::new(started.clone()))?;
        registry.register(Box::new(finished.clone()))?;
        registry.register(Box::new(duration.clone()))?;
        registry.register(Box::new(evictions.clone()))?;
        registry.register(Box::new(coordination_errors.clone()))?;

        Ok(Self {
            registry,
            started,
            finished,
            duration,
            evictions,
            coordination_errors,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Text exposition format, ready to be served.
    pub fn encode(&self) -> prometheus::Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    pub fn content_type(&self) -> &'static str {
        prometheus::TEXT_FORMAT
    }
}

impl MetricsBackend for PrometheusMetrics {
    fn session_started(&self, listener: &str) {
        self.started.with_label_values(&[listener]).inc();
    }

    fn session_finished(&self, listener: &str, state: ListenerState, elapsed: Duration) {
        self.finished
            .with_label_values(&[listener, state.as_str()])
            .inc();
        self.duration
            .with_label_values(&[listener])
            .observe(elapsed.as_secs_f64());
    }

    fn eviction_signalled(&self, listener: &str) {
        self.evictions.with_label_values(&[listener]).inc();
    }

    fn coordination_failed(&self, listener: &str, stage: &'static str) {
        self.coordination_errors
            .with_label_values(&[listener, stage])
            .inc();
    }
}
