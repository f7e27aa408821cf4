//! Business metrics for the registration core.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `conference_registrations_total{outcome}` - Register/unregister calls by outcome
//! - `conference_wishlist_changes_total{op}` - Wishlist mutations by operation
//! - `conference_announcements_published_total{slot}` - Announcements written to a slot
//! - `conference_created_total` - Conferences created
//!
//! Transaction metrics (commits, conflicts, exhaustion) are recorded by
//! `conference-runtime`.

use metrics::describe_counter;

/// Register descriptions for every business metric.
///
/// Pass to `MetricsServer::with_descriptions` so they are described once the
/// recorder is installed.
pub fn register_business_metrics() {
    describe_counter!(
        "conference_registrations_total",
        "Registration calls by outcome (registered, unregistered, sold_out, conflict, transient, error)"
    );
    describe_counter!(
        "conference_wishlist_changes_total",
        "Wishlist mutations by operation (add, remove, clear, sweep)"
    );
    describe_counter!(
        "conference_announcements_published_total",
        "Announcements written to an announcement slot"
    );
    describe_counter!("conference_created_total", "Total number of conferences created");

    tracing::info!("Business metrics registered");
}

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Record the outcome of a register or unregister call.
pub fn record_registration(outcome: &'static str) {
    metrics::counter!("conference_registrations_total", "outcome" => outcome).increment(1);
    tracing::debug!(outcome, "Recorded registration metric");
}

/// Record a wishlist mutation.
pub fn record_wishlist_change(op: &'static str) {
    metrics::counter!("conference_wishlist_changes_total", "op" => op).increment(1);
}

/// Record an announcement written to `slot`.
pub fn record_announcement_published(slot: &'static str) {
    metrics::counter!("conference_announcements_published_total", "slot" => slot).increment(1);
    tracing::debug!(slot, "Recorded announcement metric");
}

/// Record a conference created.
pub fn record_conference_created() {
    metrics::counter!("conference_created_total").increment(1);
}
