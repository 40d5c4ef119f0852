//! Structured logging configuration.
//!
//! `tracing` events from the server and `log` records from the ledger library
//! go to the same subscriber.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Transfers slower than this are logged at WARN
pub const SLOW_TRANSFER_MS: u64 = 1000;

/// Initialize structured logging
///
/// Log levels come from `RUST_LOG`; the default keeps the ledger at debug and
/// quiets sqlx and hyper.
///
/// # Example
///
/// ```no_run
/// use sb_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,simple_bank=debug,sqlx=warn,hyper=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log the outcome of a transfer request
///
/// # Arguments
///
/// * `request_id` - Correlation ID of the HTTP request
/// * `outcome` - `committed` or the error kind
/// * `duration_ms` - Time spent in the engine
pub fn log_transfer(request_id: &str, outcome: &str, duration_ms: u64) {
    if duration_ms > SLOW_TRANSFER_MS {
        tracing::warn!(
            request_id = request_id,
            outcome = outcome,
            duration_ms = duration_ms,
            "Slow transfer"
        );
    } else {
        tracing::debug!(
            request_id = request_id,
            outcome = outcome,
            duration_ms = duration_ms,
            "Transfer finished"
        );
    }
}

/// Log API request/response
///
/// # Arguments
///
/// * `request_id` - Correlation ID
/// * `method` - HTTP method
/// * `path` - Request path
/// * `status_code` - Response status code
/// * `duration_ms` - Request duration in milliseconds
pub fn log_api_request(
    request_id: &str,
    method: &str,
    path: &str,
    status_code: u16,
    duration_ms: u64,
) {
    tracing::info!(
        request_id = request_id,
        http_method = method,
        http_path = path,
        http_status = status_code,
        duration_ms = duration_ms,
        "API request completed"
    );
}
