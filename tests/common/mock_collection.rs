// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Mock `Collection` for testing.
//!
//! Stores items in a [`MemoryCollection`] and records every call for
//! assertions. Failures can be injected per operation.
//!
//! # Example
//! ```rust,ignore
//! let mock = MockCollection::new();
//! mock.fail_commit_times(2);
//!
//! // Use in tests...
//!
//! assert_eq!(mock.commit_calls().await, 3);
//! ```

use collection_sync::store::memory::MemoryCollection;
use collection_sync::{
    BoxFuture, Collection, CollectionError, DocId, Document, SyncBatch, SyncItem, Timestamp,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// A recorded call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    FindByIds(Vec<DocId>),
    SyncBatch(Vec<DocId>),
    ItemsNewerThan {
        after: Option<Timestamp>,
        limit: usize,
    },
    Commit {
        synced: usize,
        ignored: usize,
        conflicted: usize,
    },
    Rollback {
        synced: usize,
        ignored: usize,
        conflicted: usize,
    },
}

pub struct MockCollection<D> {
    inner: MemoryCollection<D>,
    calls: RwLock<Vec<Call>>,
    fail_find_by_ids: AtomicBool,
    fail_sync_batch: AtomicBool,
    commit_failures: AtomicUsize,
    commit_result: AtomicBool,
    rollback_failures: AtomicUsize,
    unsorted_output: AtomicBool,
}

impl<D: Document> MockCollection<D> {
    pub fn new() -> Self {
        Self::with_items(Vec::new())
    }

    pub fn with_items(items: Vec<SyncItem<D>>) -> Self {
        Self {
            inner: MemoryCollection::with_items(items),
            calls: RwLock::new(Vec::new()),
            fail_find_by_ids: AtomicBool::new(false),
            fail_sync_batch: AtomicBool::new(false),
            commit_failures: AtomicUsize::new(0),
            commit_result: AtomicBool::new(true),
            rollback_failures: AtomicUsize::new(0),
            unsorted_output: AtomicBool::new(false),
        }
    }

    // =========================================================================
    // Failure injection
    // =========================================================================

    pub fn fail_find_by_ids(&self) {
        self.fail_find_by_ids.store(true, Ordering::SeqCst);
    }

    pub fn fail_sync_batch(&self) {
        self.fail_sync_batch.store(true, Ordering::SeqCst);
    }

    /// Fail the next `n` commit calls.
    pub fn fail_commit_times(&self, n: usize) {
        self.commit_failures.store(n, Ordering::SeqCst);
    }

    /// Value returned by a commit that does not fail.
    pub fn set_commit_result(&self, committed: bool) {
        self.commit_result.store(committed, Ordering::SeqCst);
    }

    /// Fail the next `n` rollback calls.
    pub fn fail_rollback_times(&self, n: usize) {
        self.rollback_failures.store(n, Ordering::SeqCst);
    }

    /// Make `items_newer_than` return newest first.
    pub fn return_unsorted(&self) {
        self.unsorted_output.store(true, Ordering::SeqCst);
    }

    // =========================================================================
    // Direct access
    // =========================================================================

    pub fn store(&self) -> &MemoryCollection<D> {
        &self.inner
    }

    pub async fn upsert(&self, item: SyncItem<D>) {
        self.inner.upsert(item).await;
    }

    pub async fn get(&self, id: impl Into<DocId>) -> Option<SyncItem<D>> {
        self.inner.get(id).await
    }

    // =========================================================================
    // Recorded calls
    // =========================================================================

    pub async fn calls(&self) -> Vec<Call> {
        self.calls.read().await.clone()
    }

    pub async fn commit_calls(&self) -> usize {
        self.count(|c| matches!(c, Call::Commit { .. })).await
    }

    pub async fn rollback_calls(&self) -> usize {
        self.count(|c| matches!(c, Call::Rollback { .. })).await
    }

    pub async fn sync_batch_calls(&self) -> Vec<Vec<DocId>> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|c| match c {
                Call::SyncBatch(ids) => Some(ids.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn find_by_ids_calls(&self) -> usize {
        self.count(|c| matches!(c, Call::FindByIds(_))).await
    }

    pub async fn clear_calls(&self) {
        self.calls.write().await.clear();
    }

    async fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.read().await.iter().filter(|c| pred(c)).count()
    }

    async fn record(&self, call: Call) {
        self.calls.write().await.push(call);
    }

    /// Decrement `counter` if positive; returns whether this call should fail.
    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl<D: Document> Collection<D> for MockCollection<D> {
    fn count_all(&self) -> BoxFuture<'_, usize> {
        self.inner.count_all()
    }

    fn find_by_ids<'a>(&'a self, ids: &'a [DocId]) -> BoxFuture<'a, Vec<SyncItem<D>>> {
        Box::pin(async move {
            self.record(Call::FindByIds(ids.to_vec())).await;
            if self.fail_find_by_ids.load(Ordering::SeqCst) {
                return Err(CollectionError::new("lookup unavailable"));
            }
            self.inner.find_by_ids(ids).await
        })
    }

    fn sync_batch(&self, items: Vec<SyncItem<D>>) -> BoxFuture<'_, Vec<SyncItem<D>>> {
        Box::pin(async move {
            self.record(Call::SyncBatch(items.iter().map(|i| i.id().clone()).collect()))
                .await;
            if self.fail_sync_batch.load(Ordering::SeqCst) {
                return Err(CollectionError::new("connection reset"));
            }
            self.inner.sync_batch(items).await
        })
    }

    fn items_newer_than(
        &self,
        after: Option<Timestamp>,
        limit: usize,
    ) -> BoxFuture<'_, Vec<SyncItem<D>>> {
        Box::pin(async move {
            self.record(Call::ItemsNewerThan { after, limit }).await;
            let mut items = self.inner.items_newer_than(after, limit).await?;
            if self.unsorted_output.load(Ordering::SeqCst) {
                items.reverse();
            }
            Ok(items)
        })
    }

    fn latest_updated_item(&self) -> BoxFuture<'_, Option<SyncItem<D>>> {
        self.inner.latest_updated_item()
    }

    fn commit_sync<'a>(&'a self, batch: SyncBatch<'a, D>) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            self.record(Call::Commit {
                synced: batch.synced.len(),
                ignored: batch.ignored.len(),
                conflicted: batch.conflicted.len(),
            })
            .await;
            if Self::take_failure(&self.commit_failures) {
                return Err(CollectionError::new("commit timed out"));
            }
            Ok(self.commit_result.load(Ordering::SeqCst))
        })
    }

    fn rollback_sync<'a>(&'a self, batch: SyncBatch<'a, D>) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.record(Call::Rollback {
                synced: batch.synced.len(),
                ignored: batch.ignored.len(),
                conflicted: batch.conflicted.len(),
            })
            .await;
            if Self::take_failure(&self.rollback_failures) {
                return Err(CollectionError::new("rollback timed out"));
            }
            Ok(())
        })
    }
}
