// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Sync orchestrator.
//!
//! A [`SynchronizableCollection`] wraps a local [`Collection`] and, optionally,
//! a parent. It owns the local collection's watermarks and drives one
//! [`Synchronizer`] per `sync` call.
//!
//! # Directions
//!
//! | Operation | Source | Destination | Watermark |
//! |-----------|--------|-------------|-----------|
//! | `Fetch` | parent | local | `last_fetch_at` |
//! | `Post` | local | parent | `last_post_at` |
//!
//! # Sync Flow
//!
//! ```text
//! snapshot watermark → items_newer_than → prepare_sync_data
//!     → pre_execute_sync hook → execute_sync
//!     → pre_commit_sync hook → commit (if transmitted)
//!     → advance watermark (if committed and something was applied)
//! always: rollback (if needed) → clean_up hook
//! ```
//!
//! # Concurrency
//!
//! Nothing serializes concurrent `sync` calls on one collection. The
//! destination's `find_by_ids`/`sync_batch`/`commit_sync` are the only
//! consistency boundary; callers running several sync processes against one
//! destination must coordinate them.
//!
//! # Example
//!
//! ```rust
//! # async fn example() -> collection_sync::Result<()> {
//! use collection_sync::store::memory::MemoryCollection;
//! use collection_sync::{SyncItem, SyncOperation, SyncStatus, SynchronizableCollection};
//! use chrono::Utc;
//! use std::sync::Arc;
//!
//! let master = Arc::new(MemoryCollection::with_items(vec![
//!     SyncItem::new("chris123", "Chris".to_string(), Utc::now()),
//! ]));
//! let slave = SynchronizableCollection::new("slave", Arc::new(MemoryCollection::<String>::new()))
//!     .with_parent(master);
//!
//! let synchronizer = slave.sync_default(SyncOperation::Fetch).await?;
//! assert_eq!(synchronizer.status(), SyncStatus::PreCommitDataTransmittedSuccessfully);
//! assert!(!slave.needs_sync(SyncOperation::Fetch).await?);
//! # Ok(())
//! # }
//! ```

use crate::collection::{BoxFuture, Collection, SyncBatch};
use crate::config::SyncConfig;
use crate::conflict_policy::SyncOptions;
use crate::error::{Result, SyncError};
use crate::events::{EventBus, SyncEvent};
use crate::hooks::{NoOpHooks, SyncHooks};
use crate::item::{DocId, Document, SyncItem, Timestamp};
use crate::metadata::{BasicSyncMetadata, CollectionSyncMetadata, SyncOperation};
use crate::metrics;
use crate::resilience::RetryConfig;
use crate::sync_policy::SyncPolicy;
use crate::synchronizer::{SyncStatus, Synchronizer};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, field, info, instrument, warn, Span};

/// A collection that can fetch from and post to a parent collection.
pub struct SynchronizableCollection<D: Document> {
    name: String,
    local: Arc<dyn Collection<D>>,
    parent: RwLock<Option<Arc<dyn Collection<D>>>>,
    metadata: Arc<dyn CollectionSyncMetadata>,
    hooks: Arc<dyn SyncHooks<D>>,
    events: EventBus,
    default_options: SyncOptions,
    default_limit: usize,
    retry: RetryConfig,
    last_synchronizer: Mutex<Option<Arc<Synchronizer<D>>>>,
}

impl<D: Document> SynchronizableCollection<D> {
    /// Root collection with in-memory watermarks and default settings.
    pub fn new(name: impl Into<String>, local: Arc<dyn Collection<D>>) -> Self {
        let config = SyncConfig::default();
        Self {
            name: name.into(),
            local,
            parent: RwLock::new(None),
            metadata: Arc::new(BasicSyncMetadata::default()),
            hooks: Arc::new(NoOpHooks),
            events: EventBus::new(config.event_capacity),
            default_options: config.sync_options(),
            default_limit: config.default_limit,
            retry: RetryConfig::default(),
            last_synchronizer: Mutex::new(None),
        }
    }

    /// Build from configuration, opening the configured watermark store.
    pub async fn from_config(
        name: impl Into<String>,
        local: Arc<dyn Collection<D>>,
        config: &SyncConfig,
    ) -> Result<Self> {
        config.validate()?;
        let name = name.into();
        let metadata = config.metadata.open(&name).await?;
        let retry = config.commit_retry.to_retry_config()?;

        Ok(Self {
            events: EventBus::new(config.event_capacity),
            default_options: config.sync_options(),
            default_limit: config.default_limit,
            retry,
            ..Self::new(name, local).with_metadata(metadata)
        })
    }

    pub fn with_parent(self, parent: Arc<dyn Collection<D>>) -> Self {
        Self {
            parent: RwLock::new(Some(parent)),
            ..self
        }
    }

    pub fn with_metadata(self, metadata: Arc<dyn CollectionSyncMetadata>) -> Self {
        Self { metadata, ..self }
    }

    pub fn with_hooks(self, hooks: Arc<dyn SyncHooks<D>>) -> Self {
        Self { hooks, ..self }
    }

    pub fn with_options(self, default_options: impl Into<SyncOptions>) -> Self {
        Self {
            default_options: default_options.into(),
            ..self
        }
    }

    pub fn with_default_limit(self, default_limit: usize) -> Self {
        Self {
            default_limit,
            ..self
        }
    }

    /// Retry policy for commit and rollback.
    pub fn with_retry(self, retry: RetryConfig) -> Self {
        Self { retry, ..self }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local(&self) -> &Arc<dyn Collection<D>> {
        &self.local
    }

    pub async fn parent(&self) -> Option<Arc<dyn Collection<D>>> {
        self.parent.read().await.clone()
    }

    /// Replace (or remove) the parent. Watermarks are left as they are.
    pub async fn set_parent(&self, parent: Option<Arc<dyn Collection<D>>>) {
        *self.parent.write().await = parent;
    }

    pub fn metadata(&self) -> &Arc<dyn CollectionSyncMetadata> {
        &self.metadata
    }

    pub fn default_options(&self) -> SyncOptions {
        self.default_options
    }

    pub fn default_limit(&self) -> usize {
        self.default_limit
    }

    /// Synchronizer of the most recent `sync` call, if any.
    pub async fn last_synchronizer(&self) -> Option<Arc<Synchronizer<D>>> {
        self.last_synchronizer.lock().await.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Prepare the local collection and the watermark store.
    pub async fn initialize(&self) -> Result<()> {
        self.local.initialize().await?;
        self.metadata.initialize().await?;
        Ok(())
    }

    async fn require_parent(&self, context: &str) -> Result<Arc<dyn Collection<D>>> {
        self.parent()
            .await
            .ok_or_else(|| SyncError::parent_not_set(context))
    }

    /// Source and destination of `op`.
    fn endpoints(
        &self,
        op: SyncOperation,
        parent: Arc<dyn Collection<D>>,
    ) -> (Arc<dyn Collection<D>>, Arc<dyn Collection<D>>) {
        match op {
            SyncOperation::Fetch => (parent, Arc::clone(&self.local)),
            SyncOperation::Post => (Arc::clone(&self.local), parent),
        }
    }

    // =========================================================================
    // Candidate selection
    // =========================================================================

    /// Whether the source of `op` has anything newer than the watermark.
    ///
    /// Necessary, not sufficient: an item written by a sync in the opposite
    /// direction counts as new here although syncing it changes nothing.
    /// Always `false` without a parent.
    pub async fn needs_sync(&self, op: SyncOperation) -> Result<bool> {
        let Some(parent) = self.parent().await else {
            return Ok(false);
        };
        let last_at = self.metadata.get_last_at(op).await?;
        let (source, _) = self.endpoints(op, parent);
        Self::source_has_newer(source.as_ref(), last_at).await
    }

    async fn source_has_newer(
        source: &dyn Collection<D>,
        last_at: Option<Timestamp>,
    ) -> Result<bool> {
        let Some(latest) = source.latest_updated_item().await? else {
            return Ok(false);
        };
        Ok(match last_at {
            None => true,
            Some(last_at) => last_at < latest.updated_at(),
        })
    }

    /// Candidate batch for `op`: items newer than the watermark, at most `limit`.
    pub async fn items_to_sync(&self, op: SyncOperation, limit: usize) -> Result<Vec<SyncItem<D>>> {
        let parent = self.require_parent("Cannot sync to parent").await?;
        let last_at = self.metadata.get_last_at(op).await?;
        let (source, _) = self.endpoints(op, parent);
        Self::candidates(source.as_ref(), last_at, limit).await
    }

    async fn candidates(
        source: &dyn Collection<D>,
        last_at: Option<Timestamp>,
        limit: usize,
    ) -> Result<Vec<SyncItem<D>>> {
        if !Self::source_has_newer(source, last_at).await? {
            return Ok(Vec::new());
        }
        Ok(source.items_newer_than(last_at, limit).await?)
    }

    // =========================================================================
    // Sync
    // =========================================================================

    /// Sync with the default limit and options.
    pub async fn sync_default(&self, op: SyncOperation) -> Result<Arc<Synchronizer<D>>> {
        self.sync(op, self.default_limit, self.default_options).await
    }

    /// Run one sync attempt in direction `op`.
    ///
    /// Conflicts and destination failures do not return `Err`: inspect the
    /// returned synchronizer's status. `Err` means the attempt could not run
    /// (no parent, `limit` of 0, unsorted candidates, a failing hook or
    /// watermark store). The watermark is unchanged in every `Err` case
    /// except a failure after it was advanced.
    #[instrument(skip(self, options), fields(collection = %self.name, strategy = field::Empty))]
    pub async fn sync(
        &self,
        op: SyncOperation,
        limit: usize,
        options: impl Into<SyncOptions> + Send,
    ) -> Result<Arc<Synchronizer<D>>> {
        let options: SyncOptions = options.into();
        Span::current().record("strategy", field::display(options.conflict_strategy));
        if limit < 1 {
            return Err(SyncError::InvalidLimit(limit));
        }
        let parent = self.require_parent("Cannot sync to parent").await?;
        let start = Instant::now();

        // Snapshot before computing the batch so classification sees the
        // watermark the batch was selected against.
        let last_sync_at = self.metadata.get_last_at(op).await?;
        let (source, dest) = self.endpoints(op, parent);
        let items = Self::candidates(source.as_ref(), last_sync_at, limit).await?;

        debug!(op = %op, candidates = items.len(), last_sync_at = ?last_sync_at, "Starting sync");
        self.events.publish(SyncEvent::Started {
            op,
            candidates: items.len(),
        });

        let mut synchronizer = Synchronizer::new(dest, items, last_sync_at, options)
            .with_retry(self.retry.clone())
            .with_batch_limit(limit);

        let outcome = self.run(op, &mut synchronizer).await;
        let finished = self.finish(op, &mut synchronizer).await;

        let status = synchronizer.status();
        let committed = synchronizer.successfully_committed();
        let synchronizer = Arc::new(synchronizer);
        *self.last_synchronizer.lock().await = Some(Arc::clone(&synchronizer));

        metrics::record_sync_attempt(op, status, start.elapsed());
        self.events.publish(SyncEvent::Finished {
            op,
            status,
            committed,
        });

        outcome?;
        finished?;

        info!(
            op = %op,
            status = %status,
            committed,
            items = synchronizer.items_to_sync().len(),
            conflicts = synchronizer.conflict_items().len(),
            "Sync finished"
        );
        Ok(synchronizer)
    }

    /// Classify, transmit, commit, advance. Stops at the first `Err`.
    async fn run(&self, op: SyncOperation, s: &mut Synchronizer<D>) -> Result<()> {
        s.prepare_sync_data().await?;

        if !s.conflict_items().is_empty() {
            warn!(op = %op, conflicts = s.conflict_items().len(), strategy = %s.options().conflict_strategy, "Conflicts detected");
            metrics::record_conflicts(op, s.conflict_items().len());
            self.events.publish(SyncEvent::ConflictsDetected {
                op,
                count: s.conflict_items().len(),
            });
        }
        if !s.ignored_items().is_empty() {
            debug!(op = %op, ignored = s.ignored_items().len(), "Conflicting items ignored");
            metrics::record_ignored(op, s.ignored_items().len());
            self.events.publish(SyncEvent::ItemsIgnored {
                op,
                count: s.ignored_items().len(),
            });
        }

        let proceed = self.hooks.pre_execute_sync(s).await?;
        if !proceed && s.status() == SyncStatus::NotStarted {
            debug!(op = %op, "Aborted by pre_execute_sync hook");
            s.abort();
            self.events.publish(SyncEvent::Aborted { op });
        }

        s.execute_sync().await?;

        match s.status() {
            SyncStatus::PreCommitDataTransmittedSuccessfully => {
                metrics::record_items_transmitted(op, s.items_to_sync().len());
                self.events.publish(SyncEvent::Transmitted {
                    op,
                    count: s.synced_items().len(),
                });
            }
            SyncStatus::UnexpectedError => {
                self.events.publish(SyncEvent::TransmissionFailed {
                    op,
                    errors: s.failures().to_vec(),
                });
            }
            SyncStatus::NotStarted
            | SyncStatus::Running
            | SyncStatus::Conflict
            | SyncStatus::Aborted => {}
        }

        if SyncPolicy::should_commit(s.status()) {
            if self.hooks.pre_commit_sync(s).await? {
                s.commit().await;
                if s.successfully_committed() {
                    self.events.publish(SyncEvent::Committed { op });
                } else if s.status() == SyncStatus::UnexpectedError {
                    self.events.publish(SyncEvent::TransmissionFailed {
                        op,
                        errors: s.failures().to_vec(),
                    });
                }
            } else {
                debug!(op = %op, "Commit skipped by pre_commit_sync hook");
            }
        }

        if SyncPolicy::should_update_last_sync_at(s.successfully_committed(), s.last_updated_at()) {
            if let Some(at) = s.last_updated_at() {
                self.advance_watermark(op, at).await?;
            }
        }

        Ok(())
    }

    /// Rollback if needed, then `clean_up`. Runs on every path.
    async fn finish(&self, op: SyncOperation, s: &mut Synchronizer<D>) -> Result<()> {
        if SyncPolicy::should_roll_back(s.status(), s.successfully_committed()) {
            s.rollback().await;
            if s.successfully_rollbacked() {
                self.events.publish(SyncEvent::RolledBack { op });
            } else {
                warn!(op = %op, failures = s.failures().len(), "Rollback failed");
            }
        }
        self.hooks.clean_up(s).await?;
        Ok(())
    }

    /// Store `to` as the watermark of `op` if it moves forward.
    async fn advance_watermark(&self, op: SyncOperation, to: Timestamp) -> Result<()> {
        let from = self.metadata.get_last_at(op).await?;
        if from.is_some_and(|from| to <= from) {
            debug!(op = %op, from = ?from, to = %to, "Watermark not advanced");
            return Ok(());
        }

        self.metadata.set_last_at(to, op).await?;
        info!(collection = %self.name, op = %op, from = ?from, to = %to, "Watermark advanced");
        metrics::record_watermark_advance(op, to.timestamp_millis());
        self.events.publish(SyncEvent::WatermarkAdvanced { op, from, to });
        Ok(())
    }
}

/// A synchronizable collection is itself a collection, so it can be the
/// parent of another one. Every call goes to the local collection.
impl<D: Document> Collection<D> for SynchronizableCollection<D> {
    fn initialize(&self) -> BoxFuture<'_, ()> {
        self.local.initialize()
    }

    fn count_all(&self) -> BoxFuture<'_, usize> {
        self.local.count_all()
    }

    fn find_by_ids<'a>(&'a self, ids: &'a [DocId]) -> BoxFuture<'a, Vec<SyncItem<D>>> {
        self.local.find_by_ids(ids)
    }

    fn sync_batch(&self, items: Vec<SyncItem<D>>) -> BoxFuture<'_, Vec<SyncItem<D>>> {
        self.local.sync_batch(items)
    }

    fn items_newer_than(
        &self,
        after: Option<Timestamp>,
        limit: usize,
    ) -> BoxFuture<'_, Vec<SyncItem<D>>> {
        self.local.items_newer_than(after, limit)
    }

    fn latest_updated_item(&self) -> BoxFuture<'_, Option<SyncItem<D>>> {
        self.local.latest_updated_item()
    }

    fn commit_sync<'a>(&'a self, batch: SyncBatch<'a, D>) -> BoxFuture<'a, bool> {
        self.local.commit_sync(batch)
    }

    fn rollback_sync<'a>(&'a self, batch: SyncBatch<'a, D>) -> BoxFuture<'a, ()> {
        self.local.rollback_sync(batch)
    }
}

impl<D: Document> std::fmt::Debug for SynchronizableCollection<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynchronizableCollection")
            .field("name", &self.name)
            .field("default_options", &self.default_options)
            .field("default_limit", &self.default_limit)
            .finish_non_exhaustive()
    }
}
