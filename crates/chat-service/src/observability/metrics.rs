//! Metrics definitions for the chat service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `chat_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `method`: HTTP verbs
//! - `endpoint`: the fixed route set, anything else collapses to `/other`
//! - `status`: success, error, timeout
//! - `operation`: bounded by repository code

use metrics::{counter, histogram};
use std::time::Duration;

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `chat_http_requests_total`, `chat_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("chat_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("chat_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Normalize endpoint path to prevent label cardinality explosion
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/participants" => "/participants",
        "/messages" => "/messages",
        "/status" => "/status",
        "/health" => "/health",
        "/metrics" => "/metrics",
        _ => "/other",
    }
}

// ============================================================================
// Database Metrics
// ============================================================================

/// Record database query execution
///
/// Metric: `chat_db_query_duration_seconds`, `chat_db_queries_total`
/// Labels: `operation`, `status`
pub fn record_db_query(operation: &'static str, status: &'static str, duration: Duration) {
    histogram!("chat_db_query_duration_seconds",
        "operation" => operation
    )
    .record(duration.as_secs_f64());

    counter!("chat_db_queries_total",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
}

// ============================================================================
// Liveness Sweeper Metrics
// ============================================================================

/// Record one sweep cycle.
///
/// Metric: `chat_sweep_cycles_total`, `chat_sweep_evictions_total`,
/// `chat_sweep_duration_seconds`
/// Labels: `status` (success, partial, error)
pub fn record_sweep(status: &'static str, evicted: u64, duration: Duration) {
    histogram!("chat_sweep_duration_seconds").record(duration.as_secs_f64());

    counter!("chat_sweep_cycles_total",
        "status" => status
    )
    .increment(1);

    if evicted > 0 {
        counter!("chat_sweep_evictions_total").increment(evicted);
    }
}
