//! Prometheus metrics for monitoring ledger server health and performance.
//!
//! Metrics are exposed in Prometheus text format by an exporter listening on
//! `METRICS_BIND`. Without an installed exporter the recording calls are no-ops.
//!
//! # Metrics
//!
//! - `http_requests_total{method,path,status}`
//! - `http_request_duration_ms{method,path}`
//! - `transfers_total{outcome}`
//! - `transfer_duration_ms`
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use sb_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::http_requests_total("POST", "/api/v1/transfers", 201);
//! metrics::transfer_completed("committed", 3.2);
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
///
/// # Arguments
///
/// - `addr`: Address to bind the metrics server to (e.g., `0.0.0.0:9090`)
///
/// # Returns
///
/// Result indicating success or error message
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Record HTTP request.
pub fn http_requests_total(method: &str, path: &str, status: u16) {
    metrics::counter!("http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record HTTP request duration in milliseconds.
pub fn http_request_duration_ms(method: &str, path: &str, duration_ms: f64) {
    metrics::histogram!("http_request_duration_ms",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_ms);
}

// ============================================================================
// Ledger Metrics
// ============================================================================

/// Record a finished transfer and how long the engine took.
///
/// `outcome` is `committed` or the snake_case error kind.
pub fn transfer_completed(outcome: &'static str, duration_ms: f64) {
    metrics::counter!("transfers_total", "outcome" => outcome).increment(1);
    metrics::histogram!("transfer_duration_ms").record(duration_ms);
}
