// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Collection capability trait.
//!
//! Defines the storage contract the synchronization core consumes. Concrete
//! stores (in-memory, embedded databases, remote services) implement
//! [`Collection`] directly; the core only ever sees `Arc<dyn Collection<D>>`.
//!
//! # Contract
//!
//! - `items_newer_than` MUST return items ascending by `updated_at`, capped at
//!   `limit`. The core re-checks this and refuses unsorted batches.
//! - `find_by_ids` omits unknown ids (never pads).
//! - `sync_batch` upserts `Update` items, deletes `Delete` items, and returns
//!   the items actually applied in any order.
//! - `commit_sync` / `rollback_sync` must only affect the data of the sync
//!   process that passed them the batch.
//!
//! # Example
//!
//! ```rust,no_run
//! use collection_sync::collection::{BoxFuture, Collection};
//! use collection_sync::item::{DocId, SyncItem, Timestamp};
//!
//! struct Remote { /* ... */ }
//!
//! impl Collection<String> for Remote {
//!     fn count_all(&self) -> BoxFuture<'_, usize> {
//!         Box::pin(async move { Ok(0) })
//!     }
//!
//!     fn find_by_ids<'a>(&'a self, _ids: &'a [DocId]) -> BoxFuture<'a, Vec<SyncItem<String>>> {
//!         Box::pin(async move { Ok(vec![]) })
//!     }
//!
//!     fn sync_batch(&self, items: Vec<SyncItem<String>>) -> BoxFuture<'_, Vec<SyncItem<String>>> {
//!         Box::pin(async move { Ok(items) })
//!     }
//!
//!     fn items_newer_than(&self, _after: Option<Timestamp>, _limit: usize) -> BoxFuture<'_, Vec<SyncItem<String>>> {
//!         Box::pin(async move { Ok(vec![]) })
//!     }
//!
//!     fn latest_updated_item(&self) -> BoxFuture<'_, Option<SyncItem<String>>> {
//!         Box::pin(async move { Ok(None) })
//!     }
//! }
//! ```

use crate::item::{DocId, Document, SyncItem, Timestamp};
use std::future::Future;
use std::pin::Pin;

/// Result type for collection operations.
pub type CollectionResult<T> = std::result::Result<T, CollectionError>;

/// Type alias for boxed async futures (reduces trait signature complexity).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = CollectionResult<T>> + Send + 'a>>;

/// Failure reported by a collection collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct CollectionError(pub String);

impl CollectionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// The items a synchronizer classified, handed to commit and rollback.
#[derive(Debug)]
pub struct SyncBatch<'a, D> {
    /// Items transmitted to the destination.
    pub synced: &'a [SyncItem<D>],
    /// Conflicting items skipped under the `Ignore` strategy.
    pub ignored: &'a [SyncItem<D>],
    /// Items classified as conflicts.
    pub conflicted: &'a [SyncItem<D>],
}

// Manual impls: only references are copied, so `D` needs no bounds.
impl<D> Clone for SyncBatch<'_, D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D> Copy for SyncBatch<'_, D> {}

/// Storage contract for a versioned item store.
pub trait Collection<D: Document>: Send + Sync + 'static {
    /// Prepare the store (open a connection, create a file, ...).
    ///
    /// Default implementation does nothing.
    fn initialize(&self) -> BoxFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }

    /// Number of live documents.
    fn count_all(&self) -> BoxFuture<'_, usize>;

    /// Current records for `ids`. Unknown ids are omitted.
    fn find_by_ids<'a>(&'a self, ids: &'a [DocId]) -> BoxFuture<'a, Vec<SyncItem<D>>>;

    /// Apply a batch: upsert `Update` items, delete `Delete` items.
    ///
    /// Returns the items actually applied, in any order.
    fn sync_batch(&self, items: Vec<SyncItem<D>>) -> BoxFuture<'_, Vec<SyncItem<D>>>;

    /// Items with `updated_at` strictly after `after` (all items if `None`),
    /// ascending by `updated_at`, at most `limit` of them.
    fn items_newer_than(
        &self,
        after: Option<Timestamp>,
        limit: usize,
    ) -> BoxFuture<'_, Vec<SyncItem<D>>>;

    /// Item with the highest `updated_at`, if any.
    fn latest_updated_item(&self) -> BoxFuture<'_, Option<SyncItem<D>>>;

    /// Make a transmitted batch durable.
    ///
    /// Returns whether the commit took effect. Default implementation
    /// treats `sync_batch` as already durable and returns `true`.
    fn commit_sync<'a>(&'a self, _batch: SyncBatch<'a, D>) -> BoxFuture<'a, bool> {
        Box::pin(async { Ok(true) })
    }

    /// Undo whatever this sync process transmitted but did not commit.
    ///
    /// Default implementation does nothing.
    fn rollback_sync<'a>(&'a self, _batch: SyncBatch<'a, D>) -> BoxFuture<'a, ()> {
        Box::pin(async { Ok(()) })
    }
}
