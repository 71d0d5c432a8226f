//! In-process counters for grid traffic.
//!
//! Lock-free atomics updated on every request and rendered as `key=value`
//! lines for `/metrics`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::request::RowMutation;

/// Aggregated request counters.
#[derive(Debug, Default)]
pub struct GridMetrics {
    /// Grid page reads served.
    reads: AtomicU64,
    /// Tag autocomplete lookups served.
    autocompletes: AtomicU64,
    /// Rows returned across all page reads.
    rows_returned: AtomicU64,
    /// Sum of page read latency in nanoseconds.
    read_latency_ns_total: AtomicU64,
    deletes: AtomicU64,
    tag_updates: AtomicU64,
    field_updates: AtomicU64,
    /// Requests rejected for client input.
    client_rejects: AtomicU64,
    /// Statements the store failed.
    query_failures: AtomicU64,
}

/// Point-in-time copy of [`GridMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridMetricsSnapshot {
    pub reads: u64,
    pub autocompletes: u64,
    pub rows_returned: u64,
    pub read_latency_ns_total: u64,
    pub deletes: u64,
    pub tag_updates: u64,
    pub field_updates: u64,
    pub client_rejects: u64,
    pub query_failures: u64,
}

impl GridMetrics {
    /// Records one completed page read.
    pub fn record_read(&self, rows: usize, latency: Duration) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.rows_returned
            .fetch_add(rows as u64, Ordering::Relaxed);
        self.read_latency_ns_total.fetch_add(
            u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX),
            Ordering::Relaxed,
        );
    }

    pub fn record_autocomplete(&self) {
        self.autocompletes.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one committed mutation by kind.
    pub fn record_mutation(&self, mutation: &RowMutation) {
        let counter = match mutation {
            RowMutation::Delete { .. } => &self.deletes,
            RowMutation::SetTags { .. } => &self.tag_updates,
            RowMutation::SetField { .. } => &self.field_updates,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_client_reject(&self) {
        self.client_rejects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_query_failure(&self) {
        self.query_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> GridMetricsSnapshot {
        GridMetricsSnapshot {
            reads: self.reads.load(Ordering::Relaxed),
            autocompletes: self.autocompletes.load(Ordering::Relaxed),
            rows_returned: self.rows_returned.load(Ordering::Relaxed),
            read_latency_ns_total: self.read_latency_ns_total.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            tag_updates: self.tag_updates.load(Ordering::Relaxed),
            field_updates: self.field_updates.load(Ordering::Relaxed),
            client_rejects: self.client_rejects.load(Ordering::Relaxed),
            query_failures: self.query_failures.load(Ordering::Relaxed),
        }
    }

    /// Renders counters in the plain-text `/metrics` format.
    pub fn render_text(&self) -> String {
        let s = self.snapshot();
        format!(
            "grid_reads={}\ngrid_autocompletes={}\ngrid_rows_returned={}\ngrid_read_latency_ns_total={}\ngrid_deletes={}\ngrid_tag_updates={}\ngrid_field_updates={}\ngrid_client_rejects={}\ngrid_query_failures={}\n",
            s.reads,
            s.autocompletes,
            s.rows_returned,
            s.read_latency_ns_total,
            s.deletes,
            s.tag_updates,
            s.field_updates,
            s.client_rejects,
            s.query_failures,
        )
    }
}
