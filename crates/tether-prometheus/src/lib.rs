//! Prometheus metrics backend for persistent listeners.
//!
//! [`PrometheusMetrics`] implements [`tether_core::MetricsBackend`] on its own
//! [`Registry`]; serve [`PrometheusMetrics::encode`] from whatever HTTP
//! framework the host already runs.
//!
//! ## Metrics
//! - `tether_sessions_started_total{listener}` - Counter
//! - `tether_sessions_finished_total{listener, outcome}` - Counter
//! - `tether_session_duration_seconds{listener}` - Histogram
//! - `tether_evictions_total{listener}` - Counter
//! - `tether_coordination_errors_total{listener, stage}` - Counter

mod backend;
pub use backend::PrometheusMetrics;

pub use prometheus::{Encoder, Registry, TextEncoder};
