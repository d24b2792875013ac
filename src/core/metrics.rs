//! Prometheus metrics for monitoring the chat relay.
//!
//! A single registry is created lazily and shared process-wide. Every counter
//! here is monotonic or a gauge; nothing in request handling reads them back.

use prometheus::{
    register_gauge, register_histogram_vec, register_int_counter, register_int_counter_vec,
    Gauge, HistogramVec, IntCounter, IntCounterVec,
};
use std::sync::OnceLock;

/// Container for all application metrics.
pub struct Metrics {
    /// Total number of requests by method, endpoint and status
    pub request_count: IntCounterVec,

    /// Time until response headers are ready, in seconds
    pub request_duration: HistogramVec,

    /// Relay sessions currently pumping chunks
    pub active_streams: Gauge,

    /// Finished relay sessions by terminal state
    pub sessions_total: IntCounterVec,

    /// Chunks written to clients
    pub chunks_forwarded: IntCounter,

    /// Frame bytes written to clients
    pub bytes_forwarded: IntCounter,

    /// Sessions that ended because the client went away
    pub client_disconnects_total: IntCounter,

    /// Requests whose model was replaced by the fallback
    pub model_substitutions_total: IntCounter,

    /// Time from upstream open to first forwarded chunk, by model
    pub ttft: HistogramVec,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Initialize the metrics registry.
///
/// Safe to call more than once; later calls return the same instance.
pub fn init_metrics() -> &'static Metrics {
    METRICS.get_or_init(|| {
        let request_count = register_int_counter_vec!(
            "chat_relay_requests_total",
            "Total number of requests",
            &["method", "endpoint", "status_code"]
        )
        .expect("Failed to register request_count metric");

        let request_duration = register_histogram_vec!(
            "chat_relay_request_duration_seconds",
            "Time until response headers are ready in seconds",
            &["method", "endpoint"],
            vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]
        )
        .expect("Failed to register request_duration metric");

        let active_streams = register_gauge!(
            "chat_relay_active_streams",
            "Number of relay sessions currently streaming"
        )
        .expect("Failed to register active_streams metric");

        let sessions_total = register_int_counter_vec!(
            "chat_relay_sessions_total",
            "Finished relay sessions by outcome",
            &["outcome"]
        )
        .expect("Failed to register sessions_total metric");

        let chunks_forwarded = register_int_counter!(
            "chat_relay_chunks_forwarded_total",
            "Total chunks forwarded to clients"
        )
        .expect("Failed to register chunks_forwarded metric");

        let bytes_forwarded = register_int_counter!(
            "chat_relay_bytes_forwarded_total",
            "Total bytes forwarded to clients"
        )
        .expect("Failed to register bytes_forwarded metric");

        let client_disconnects_total = register_int_counter!(
            "chat_relay_client_disconnects_total",
            "Sessions cancelled by client disconnect"
        )
        .expect("Failed to register client_disconnects_total metric");

        let model_substitutions_total = register_int_counter!(
            "chat_relay_model_substitutions_total",
            "Requests whose model identifier was replaced by the fallback"
        )
        .expect("Failed to register model_substitutions_total metric");

        let ttft = register_histogram_vec!(
            "chat_relay_ttft_seconds",
            "Time to first forwarded chunk in seconds",
            &["model"],
            vec![0.05, 0.1, 0.2, 0.5, 1.0, 2.0, 5.0, 10.0]
        )
        .expect("Failed to register ttft metric");

        Metrics {
            request_count,
            request_duration,
            active_streams,
            sessions_total,
            chunks_forwarded,
            bytes_forwarded,
            client_disconnects_total,
            model_substitutions_total,
            ttft,
        }
    })
}

/// Get the global metrics instance, initializing it on first use.
pub fn get_metrics() -> &'static Metrics {
    init_metrics()
}
