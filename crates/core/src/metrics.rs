//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Ticket board (registry churn, fired events)
//! - Protocol (lines received per message type and outcome)

use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, Opts};

// =============================================================================
// Ticket Board
// =============================================================================

/// Tickets inserted into a board.
pub static TICKETS_ADDED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "plazza_tickets_added_total",
        "Total tickets inserted into a ticket board",
    )
    .unwrap()
});

/// Tickets removed from a board.
pub static TICKETS_REMOVED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "plazza_tickets_removed_total",
        "Total tickets removed from a ticket board",
    )
    .unwrap()
});

/// Events dispatched to listeners, by event type.
pub static EVENTS_FIRED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("plazza_ticket_events_fired_total", "Ticket events fired"),
        &["event"],
    )
    .unwrap()
});

// =============================================================================
// Protocol
// =============================================================================

/// Protocol lines received, by message type and outcome.
pub static PROTOCOL_LINES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "plazza_protocol_lines_total",
            "Protocol lines received from the peer",
        ),
        &["message_type", "result"], // "applied", "rejected", "not_found"
    )
    .unwrap()
});

/// Protocol lines that could not be decoded at all.
pub static PROTOCOL_DECODE_ERRORS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "plazza_protocol_decode_errors_total",
        "Protocol lines that matched no message pattern",
    )
    .unwrap()
});

/// All core metrics, for registration in the binary's registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(TICKETS_ADDED.clone()),
        Box::new(TICKETS_REMOVED.clone()),
        Box::new(EVENTS_FIRED.clone()),
        Box::new(PROTOCOL_LINES.clone()),
        Box::new(PROTOCOL_DECODE_ERRORS.clone()),
    ]
}
