//! Observability infrastructure for the preprocessor
//!
//! Provides:
//! - Prometheus metrics (invocation latency, outcomes, rows transformed, model info)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    GaugeVec, Histogram, IntCounter, IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Histogram buckets for invocation latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Invocation outcome labels
pub mod outcomes {
    pub const SUCCESS: &str = "success";
    pub const CLIENT_ERROR: &str = "client_error";
    pub const SERVER_ERROR: &str = "server_error";
}

static GLOBAL_METRICS: OnceLock<ServingMetricsInner> = OnceLock::new();

struct ServingMetricsInner {
    invocation_latency_seconds: Histogram,
    invocations: IntCounterVec,
    rows_transformed: IntCounter,
    model_info: GaugeVec,
}

impl ServingMetricsInner {
    fn new() -> Self {
        Self {
            invocation_latency_seconds: register_histogram!(
                "preprocessor_invocation_latency_seconds",
                "Time spent parsing, transforming and encoding one request",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register invocation_latency_seconds"),

            invocations: register_int_counter_vec!(
                "preprocessor_invocations_total",
                "Invocations handled, by outcome",
                &["outcome"]
            )
            .expect("Failed to register invocations_total"),

            rows_transformed: register_int_counter!(
                "preprocessor_rows_transformed_total",
                "Rows standardized across all invocations"
            )
            .expect("Failed to register rows_transformed_total"),

            model_info: register_gauge_vec!(
                "preprocessor_model_info",
                "Information about the loaded transform",
                &["kind", "features"]
            )
            .expect("Failed to register model_info"),
        }
    }
}

/// Serving metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the same
/// underlying metrics.
#[derive(Clone)]
pub struct ServingMetrics {
    _private: (),
}

impl Default for ServingMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServingMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ServingMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ServingMetricsInner {
        GLOBAL_METRICS.get_or_init(ServingMetricsInner::new)
    }

    pub fn observe_invocation_latency(&self, duration_secs: f64) {
        self.inner().invocation_latency_seconds.observe(duration_secs);
    }

    /// Count one invocation under `outcome` (see [`outcomes`])
    pub fn inc_invocations(&self, outcome: &str) {
        self.inner().invocations.with_label_values(&[outcome]).inc();
    }

    pub fn add_rows_transformed(&self, rows: u64) {
        self.inner().rows_transformed.inc_by(rows);
    }

    /// Replace the loaded-model info series
    pub fn set_model_info(&self, kind: &str, features: usize) {
        let features = features.to_string();
        self.inner().model_info.reset();
        self.inner()
            .model_info
            .with_label_values(&[kind, features.as_str()])
            .set(1.0);
    }

    pub fn invocations(&self, outcome: &str) -> u64 {
        self.inner().invocations.with_label_values(&[outcome]).get()
    }
}

/// Structured logger for serving events
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_startup(&self, version: &str, model_dir: &str) {
        info!(
            event = "server_started",
            instance = %self.instance,
            version = %version,
            model_dir = %model_dir,
            "Preprocessor server started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "server_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Preprocessor server shutting down"
        );
    }

    pub fn log_model_loaded(&self, model_dir: &str, kind: &str, features: usize, samples: usize) {
        info!(
            event = "model_loaded",
            instance = %self.instance,
            model_dir = %model_dir,
            kind = %kind,
            features = features,
            n_samples_seen = samples,
            "Fitted transform loaded"
        );
    }

    pub fn log_invocation(
        &self,
        trace_id: Option<&str>,
        rows: usize,
        content_type: &str,
        accept: &str,
        elapsed_us: u128,
    ) {
        info!(
            event = "invocation_completed",
            instance = %self.instance,
            trace_id = trace_id.unwrap_or("-"),
            rows = rows,
            content_type = %content_type,
            accept = %accept,
            elapsed_us = elapsed_us as u64,
            "Invocation completed"
        );
    }

    pub fn log_invocation_failed(
        &self,
        trace_id: Option<&str>,
        code: &str,
        message: &str,
        client_error: bool,
    ) {
        if client_error {
            warn!(
                event = "invocation_failed",
                instance = %self.instance,
                trace_id = trace_id.unwrap_or("-"),
                code = %code,
                message = %message,
                "Invocation rejected"
            );
        } else {
            error!(
                event = "invocation_failed",
                instance = %self.instance,
                trace_id = trace_id.unwrap_or("-"),
                code = %code,
                message = %message,
                "Invocation failed"
            );
        }
    }

    pub fn log_training_failed(&self, code: &str, message: &str) {
        error!(
            event = "training_failed",
            instance = %self.instance,
            code = %code,
            message = %message,
            "Training failed"
        );
    }
}
