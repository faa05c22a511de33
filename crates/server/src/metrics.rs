//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring a Plazza process:
//! - HTTP request metrics (counts by path and status)
//! - Reception metrics (connected kitchens, commands)
//! - Kitchen metrics (pizzas cooked)
//! - Core board and protocol metrics (registered from `plazza_core::metrics`)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("plazza_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

// =============================================================================
// Reception Metrics
// =============================================================================

/// Kitchens currently connected to the reception.
pub static KITCHENS_CONNECTED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "plazza_kitchens_connected",
        "Number of kitchens connected to the reception",
    )
    .unwrap()
});

/// Commands accepted at the reception.
pub static COMMANDS_ACCEPTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "plazza_commands_accepted_total",
        "Total commands accepted since startup",
    )
    .unwrap()
});

/// Commands whose every pizza was cooked.
pub static COMMANDS_COMPLETED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "plazza_commands_completed_total",
        "Total commands completed since startup",
    )
    .unwrap()
});

/// Tickets put back in the queue after their kitchen disconnected.
pub static TICKETS_REQUEUED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "plazza_tickets_requeued_total",
        "Tickets requeued after their kitchen disconnected",
    )
    .unwrap()
});

// =============================================================================
// Kitchen Metrics
// =============================================================================

/// Pizzas cooked by this kitchen.
pub static PIZZAS_COOKED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("plazza_pizzas_cooked_total", "Pizzas cooked by this kitchen").unwrap()
});

/// Time between a ticket being assigned and its pizza coming out of the oven.
pub static COOKING_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "plazza_cooking_duration_seconds",
            "Time from assignment to a cooked pizza",
        )
        .buckets(vec![0.01, 0.1, 0.5, 1.0, 2.0, 4.0, 8.0, 16.0]),
    )
    .unwrap()
});

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();

    // Reception
    registry
        .register(Box::new(KITCHENS_CONNECTED.clone()))
        .unwrap();
    registry
        .register(Box::new(COMMANDS_ACCEPTED.clone()))
        .unwrap();
    registry
        .register(Box::new(COMMANDS_COMPLETED.clone()))
        .unwrap();
    registry
        .register(Box::new(TICKETS_REQUEUED.clone()))
        .unwrap();

    // Kitchen
    registry.register(Box::new(PIZZAS_COOKED.clone())).unwrap();
    registry
        .register(Box::new(COOKING_DURATION.clone()))
        .unwrap();

    // Core metrics (board, protocol)
    for metric in plazza_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    static UUID_REGEX: Lazy<regex_lite::Regex> = Lazy::new(|| {
        regex_lite::Regex::new(
            r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
        )
        .unwrap()
    });

    UUID_REGEX.replace_all(path, "{id}").to_string()
}
