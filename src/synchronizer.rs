// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Per-attempt sync state machine.
//!
//! A [`Synchronizer`] is created for exactly one sync attempt. It classifies
//! the candidate batch against the destination, transmits the eligible items,
//! and records the outcome. It is never reused.
//!
//! # State Transitions
//!
//! ```text
//!              prepare_sync_data()        execute_sync()
//! NotStarted ─────────────────────→ (classified) ────────→ Running
//!    │    │                                                  │
//!    │    │ (RaiseError + conflict)                          ├──→ PreCommitDataTransmittedSuccessfully
//!    │    └──────────────────────────→ Conflict              │
//!    │                                                       └──→ UnexpectedError
//!    │ abort()
//!    └──────→ Aborted
//! ```
//!
//! # Outcomes Are State, Not Errors
//!
//! Conflicts and destination failures never surface as `Err`. They are
//! recorded in [`status`](Synchronizer::status),
//! [`conflict_items`](Synchronizer::conflict_items) and
//! [`failures`](Synchronizer::failures) so commit/rollback orchestration can
//! always run. `Err` is reserved for misuse: executing twice, or a candidate
//! batch that is not ordered by `updated_at`.

use crate::collection::{Collection, SyncBatch};
use crate::conflict_policy::{ConflictPolicy, ConflictStrategy, SyncOptions};
use crate::error::{Result, SyncError};
use crate::item::{are_items_sorted, latest_item, DocId, Document, SyncItem, Timestamp};
use crate::resilience::{retry_with_backoff, RetryConfig};
use chrono::Utc;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Status of a sync attempt.
///
/// See module docs for the state transition diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncStatus {
    /// Created, nothing transmitted yet.
    NotStarted,

    /// Transmission in progress.
    Running,

    /// Every eligible item reached the destination. Not committed yet: the
    /// destination may hold the data in temporary storage until commit.
    PreCommitDataTransmittedSuccessfully,

    /// A destination call failed (lookup, transmission, commit or rollback).
    UnexpectedError,

    /// A conflict was found under `RaiseError`. Nothing was transmitted.
    Conflict,

    /// A hook aborted the attempt before transmission.
    Aborted,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::NotStarted => "NotStarted",
            SyncStatus::Running => "Running",
            SyncStatus::PreCommitDataTransmittedSuccessfully => {
                "PreCommitDataTransmittedSuccessfully"
            }
            SyncStatus::UnexpectedError => "UnexpectedError",
            SyncStatus::Conflict => "Conflict",
            SyncStatus::Aborted => "Aborted",
        }
    }

    /// Whether no further transition can happen.
    pub fn is_terminal(&self) -> bool {
        match self {
            SyncStatus::NotStarted | SyncStatus::Running => false,
            SyncStatus::PreCommitDataTransmittedSuccessfully
            | SyncStatus::UnexpectedError
            | SyncStatus::Conflict
            | SyncStatus::Aborted => true,
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sync attempt against a destination collection.
pub struct Synchronizer<D: Document> {
    dest: Arc<dyn Collection<D>>,
    options: SyncOptions,
    retry: RetryConfig,
    last_sync_at: Option<Timestamp>,
    start_date: Timestamp,

    unfiltered_items: Vec<SyncItem<D>>,
    items_to_sync: Vec<SyncItem<D>>,
    ignored_items: Vec<SyncItem<D>>,
    conflict_items: Vec<SyncItem<D>>,
    synced_items: Vec<SyncItem<D>>,
    last_synced_item: Option<SyncItem<D>>,
    batch_limit: Option<usize>,
    /// Highest source version that was transmitted or ignored.
    source_high_water: Option<Timestamp>,

    status: SyncStatus,
    prepared: bool,
    executed: bool,
    committed: bool,
    rollbacked: bool,
    failures: Vec<String>,
}

impl<D: Document> Synchronizer<D> {
    /// Create a synchronizer over `items`, to be applied to `dest`.
    ///
    /// `last_sync_at` is the watermark of the direction being synced, read
    /// before the candidate batch was computed.
    pub fn new(
        dest: Arc<dyn Collection<D>>,
        items: Vec<SyncItem<D>>,
        last_sync_at: Option<Timestamp>,
        options: SyncOptions,
    ) -> Self {
        Self {
            dest,
            options,
            retry: RetryConfig::default(),
            last_sync_at,
            start_date: Utc::now(),
            unfiltered_items: items,
            items_to_sync: Vec::new(),
            ignored_items: Vec::new(),
            conflict_items: Vec::new(),
            synced_items: Vec::new(),
            last_synced_item: None,
            batch_limit: None,
            source_high_water: None,
            status: SyncStatus::NotStarted,
            prepared: false,
            executed: false,
            committed: false,
            rollbacked: false,
            failures: Vec::new(),
        }
    }

    /// Retry policy for commit and rollback.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Limit the candidate batch was selected with. A batch that fills it may
    /// have left newer source items behind.
    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = Some(limit);
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn status(&self) -> SyncStatus {
        self.status
    }

    pub fn options(&self) -> SyncOptions {
        self.options
    }

    pub fn last_sync_at(&self) -> Option<Timestamp> {
        self.last_sync_at
    }

    /// When this attempt started. Ignored conflicts are re-stamped with it.
    pub fn start_date(&self) -> Timestamp {
        self.start_date
    }

    /// Candidate batch as received.
    pub fn unfiltered_items(&self) -> &[SyncItem<D>] {
        &self.unfiltered_items
    }

    /// Items selected for transmission, ascending by `updated_at`.
    pub fn items_to_sync(&self) -> &[SyncItem<D>] {
        &self.items_to_sync
    }

    /// Conflicting incoming items skipped under `Ignore`.
    pub fn ignored_items(&self) -> &[SyncItem<D>] {
        &self.ignored_items
    }

    pub fn conflict_items(&self) -> &[SyncItem<D>] {
        &self.conflict_items
    }

    /// Items the destination reported as applied.
    pub fn synced_items(&self) -> &[SyncItem<D>] {
        &self.synced_items
    }

    /// Candidate for the new watermark: the highest `updated_at` among
    /// applied items.
    ///
    /// Re-stamped `Ignore` records carry [`start_date`](Self::start_date).
    /// When the batch filled its limit, the value is capped at the highest
    /// source version that was transmitted or ignored, so source items left
    /// out of the batch are still selected next time.
    pub fn last_updated_at(&self) -> Option<Timestamp> {
        let applied = self.last_synced_item.as_ref().map(SyncItem::updated_at)?;
        match self.source_high_water {
            Some(high_water) if self.batch_was_capped() => Some(applied.min(high_water)),
            _ => Some(applied),
        }
    }

    fn batch_was_capped(&self) -> bool {
        self.batch_limit
            .is_some_and(|limit| self.unfiltered_items.len() >= limit)
    }

    pub fn successfully_committed(&self) -> bool {
        self.committed
    }

    pub fn successfully_rollbacked(&self) -> bool {
        self.rollbacked
    }

    /// Diagnostic messages of every failed destination call.
    pub fn failures(&self) -> &[String] {
        &self.failures
    }

    pub fn has_executed(&self) -> bool {
        self.executed
    }

    // =========================================================================
    // Classification
    // =========================================================================

    /// Classify the candidate batch against the destination.
    ///
    /// Looks up every candidate id in one `find_by_ids` call, then walks the
    /// batch in order applying the [`ConflictPolicy`] rules. Walking stops at
    /// the first conflict under `RaiseError` and `SyncUntilConflict`; later
    /// items are never evaluated.
    ///
    /// Under `Ignore`, the destination's own record for each conflicting id is
    /// re-stamped with [`start_date`](Self::start_date) and queued for
    /// transmission, so the destination keeps its content under a fresh version.
    ///
    /// Fails with [`SyncError::UnsortedItems`] if the candidate batch is not
    /// ascending by `updated_at`. A failed lookup sets `UnexpectedError`.
    pub async fn prepare_sync_data(&mut self) -> Result<()> {
        if self.prepared || self.executed {
            return Err(SyncError::AlreadyExecuted);
        }
        self.prepared = true;

        if !are_items_sorted(&self.unfiltered_items) {
            return Err(SyncError::UnsortedItems);
        }

        if self.unfiltered_items.is_empty() {
            return Ok(());
        }

        let ids: Vec<DocId> = self.unfiltered_items.iter().map(|i| i.id().clone()).collect();
        let existing = match self.dest.find_by_ids(&ids).await {
            Ok(existing) => existing,
            Err(e) => {
                warn!(error = %e, "Destination lookup failed, nothing will be transmitted");
                self.failures.push(format!("find_by_ids: {}", e));
                self.status = SyncStatus::UnexpectedError;
                return Ok(());
            }
        };
        let existing: HashMap<DocId, SyncItem<D>> = existing
            .into_iter()
            .map(|item| (item.id().clone(), item))
            .collect();

        let strategy = self.options.conflict_strategy;
        let mut stopped_adding = false;
        let mut restamped = Vec::new();

        for item in &self.unfiltered_items {
            let item_to_compare = existing.get(item.id());
            let conflict = ConflictPolicy::is_conflict(self.last_sync_at, item, item_to_compare);

            if ConflictPolicy::should_ignore_item(conflict, strategy) {
                self.source_high_water = self.source_high_water.max(Some(item.updated_at()));
                self.ignored_items.push(item.clone());
                if let Some(current) = item_to_compare {
                    restamped.push(current.restamped(self.start_date));
                }
                continue;
            }

            if ConflictPolicy::should_sync_item(conflict, strategy, stopped_adding) {
                self.source_high_water = self.source_high_water.max(Some(item.updated_at()));
                self.items_to_sync.push(item.clone());
            }

            if ConflictPolicy::should_handle_as_conflict(conflict, strategy) {
                self.conflict_items.push(item.clone());
            }

            if ConflictPolicy::should_stop_adding(conflict, strategy) {
                stopped_adding = true;
                break;
            }
        }

        self.items_to_sync.extend(restamped);
        self.items_to_sync.sort_by_key(SyncItem::updated_at);

        debug!(
            candidates = self.unfiltered_items.len(),
            to_sync = self.items_to_sync.len(),
            ignored = self.ignored_items.len(),
            conflicts = self.conflict_items.len(),
            strategy = %strategy,
            "Classified sync batch"
        );

        if ConflictPolicy::should_set_status_as_conflict(!self.conflict_items.is_empty(), strategy)
        {
            self.status = SyncStatus::Conflict;
        }

        Ok(())
    }

    // =========================================================================
    // Transmission
    // =========================================================================

    /// Transmit the classified items to the destination.
    ///
    /// One-shot: a second call fails with [`SyncError::AlreadyExecuted`].
    /// Does nothing if classification already ended the attempt (conflict,
    /// failed lookup, abort). A failed `sync_batch` sets `UnexpectedError`
    /// and returns `Ok`.
    pub async fn execute_sync(&mut self) -> Result<()> {
        if self.executed {
            return Err(SyncError::AlreadyExecuted);
        }
        self.executed = true;

        if !are_items_sorted(&self.items_to_sync) {
            return Err(SyncError::UnsortedItems);
        }

        if self.status != SyncStatus::NotStarted {
            debug!(status = %self.status, "Skipping transmission");
            return Ok(());
        }

        self.status = SyncStatus::Running;

        if !self.items_to_sync.is_empty() {
            match self.dest.sync_batch(self.items_to_sync.clone()).await {
                Ok(applied) => {
                    self.synced_items = applied;
                }
                Err(e) => {
                    warn!(
                        items = self.items_to_sync.len(),
                        error = %e,
                        "Transmission to destination failed"
                    );
                    self.failures.push(format!("sync_batch: {}", e));
                    self.status = SyncStatus::UnexpectedError;
                    return Ok(());
                }
            }
        }

        self.last_synced_item = latest_item(&self.synced_items).cloned();
        self.status = SyncStatus::PreCommitDataTransmittedSuccessfully;
        Ok(())
    }

    // =========================================================================
    // Commit / Rollback
    // =========================================================================

    /// Ask the destination to commit. Retried per the retry policy.
    ///
    /// If every attempt fails the status becomes `UnexpectedError`.
    pub async fn commit(&mut self) {
        let dest = Arc::clone(&self.dest);
        let batch = SyncBatch {
            synced: &self.items_to_sync,
            ignored: &self.ignored_items,
            conflicted: &self.conflict_items,
        };

        let result = retry_with_backoff(&self.retry, "commit", || dest.commit_sync(batch)).await;

        match result {
            Ok(committed) => {
                self.committed = committed;
                if !committed {
                    debug!("Destination declined commit");
                }
            }
            Err(e) => {
                self.committed = false;
                self.failures.extend(e.errors.iter().map(|m| format!("commit: {}", m)));
                self.status = SyncStatus::UnexpectedError;
            }
        }
    }

    /// Ask the destination to roll back. Retried per the retry policy.
    ///
    /// If every attempt fails the status becomes `UnexpectedError`.
    pub async fn rollback(&mut self) {
        let dest = Arc::clone(&self.dest);
        let batch = SyncBatch {
            synced: &self.items_to_sync,
            ignored: &self.ignored_items,
            conflicted: &self.conflict_items,
        };

        let result =
            retry_with_backoff(&self.retry, "rollback", || dest.rollback_sync(batch)).await;

        match result {
            Ok(()) => {
                self.rollbacked = true;
            }
            Err(e) => {
                self.failures.extend(e.errors.iter().map(|m| format!("rollback: {}", m)));
                self.status = SyncStatus::UnexpectedError;
            }
        }
    }

    /// Abort before transmission.
    pub fn abort(&mut self) {
        self.status = SyncStatus::Aborted;
    }

    pub(crate) fn strategy(&self) -> ConflictStrategy {
        self.options.conflict_strategy
    }
}

impl<D: Document> fmt::Debug for Synchronizer<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Synchronizer")
            .field("status", &self.status)
            .field("strategy", &self.options.conflict_strategy)
            .field("last_sync_at", &self.last_sync_at)
            .field("start_date", &self.start_date)
            .field("candidates", &self.unfiltered_items.len())
            .field("items_to_sync", &self.items_to_sync.len())
            .field("ignored", &self.ignored_items.len())
            .field("conflicts", &self.conflict_items.len())
            .field("committed", &self.committed)
            .field("rollbacked", &self.rollbacked)
            .finish()
    }
}
