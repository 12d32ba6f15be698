// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics for observability.
//!
//! Exports Prometheus-compatible metrics for:
//! - Sync attempts by direction and final status
//! - Items transmitted, ignored and in conflict
//! - Commit/rollback retries
//! - Watermark movement
//! - Sync duration
//!
//! # Metric Naming Convention
//!
//! All metrics are prefixed with `collection_sync_` and follow Prometheus conventions:
//! - Counters end in `_total`
//! - Gauges represent current state
//! - Histograms track distributions (duration, size)
//!
//! Nothing is exported unless the host application installs a `metrics` recorder.

use crate::metadata::SyncOperation;
use crate::synchronizer::SyncStatus;
use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record a finished sync attempt.
pub fn record_sync_attempt(op: SyncOperation, status: SyncStatus, duration: Duration) {
    counter!(
        "collection_sync_attempts_total",
        "op" => op.as_str(),
        "status" => status.as_str()
    )
    .increment(1);
    histogram!("collection_sync_duration_seconds", "op" => op.as_str())
        .record(duration.as_secs_f64());
}

/// Record items handed to the destination's batch apply.
pub fn record_items_transmitted(op: SyncOperation, count: usize) {
    counter!("collection_sync_items_transmitted_total", "op" => op.as_str())
        .increment(count as u64);
}

/// Record items classified as conflicts.
pub fn record_conflicts(op: SyncOperation, count: usize) {
    if count > 0 {
        counter!("collection_sync_conflicts_total", "op" => op.as_str()).increment(count as u64);
    }
}

/// Record conflicting items skipped under the `Ignore` strategy.
pub fn record_ignored(op: SyncOperation, count: usize) {
    if count > 0 {
        counter!("collection_sync_ignored_total", "op" => op.as_str()).increment(count as u64);
    }
}

/// Record a failed attempt of a retried operation (commit, rollback).
pub fn record_retry(operation: &str) {
    counter!("collection_sync_retries_total", "operation" => operation.to_string()).increment(1);
}

/// Record a watermark advance and its new position (unix millis).
pub fn record_watermark_advance(op: SyncOperation, at_millis: i64) {
    counter!("collection_sync_watermark_advances_total", "op" => op.as_str()).increment(1);
    gauge!("collection_sync_watermark_ms", "op" => op.as_str()).set(at_millis as f64);
}
