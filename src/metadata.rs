// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Sync direction and per-collection watermarks.
//!
//! A watermark is the last `updated_at` up to which a direction is known to
//! be durably applied. Each collection keeps one for [`SyncOperation::Fetch`]
//! and one for [`SyncOperation::Post`].
//!
//! Stores only persist what they are given. Monotonic advance is enforced by
//! the [`SynchronizableCollection`](crate::SynchronizableCollection) that owns
//! the store.

use crate::error::MetadataError;
use crate::item::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::RwLock;

/// Result type for watermark store operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;

/// Boxed future returned by [`CollectionSyncMetadata`] methods.
pub type MetadataFuture<'a, T> = Pin<Box<dyn Future<Output = MetadataResult<T>> + Send + 'a>>;

/// Direction of a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncOperation {
    /// Pull from the parent into this collection.
    Fetch,
    /// Push from this collection into the parent.
    Post,
}

impl SyncOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOperation::Fetch => "fetch",
            SyncOperation::Post => "post",
        }
    }
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Watermark store for one collection.
pub trait CollectionSyncMetadata: Send + Sync + 'static {
    /// Prepare the store. Default implementation does nothing.
    fn initialize(&self) -> MetadataFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }

    fn get_last_fetch_at(&self) -> MetadataFuture<'_, Option<Timestamp>>;

    fn get_last_post_at(&self) -> MetadataFuture<'_, Option<Timestamp>>;

    fn set_last_fetch_at(&self, at: Timestamp) -> MetadataFuture<'_, ()>;

    fn set_last_post_at(&self, at: Timestamp) -> MetadataFuture<'_, ()>;

    /// Watermark for `operation`.
    fn get_last_at(&self, operation: SyncOperation) -> MetadataFuture<'_, Option<Timestamp>> {
        match operation {
            SyncOperation::Fetch => self.get_last_fetch_at(),
            SyncOperation::Post => self.get_last_post_at(),
        }
    }

    /// Store the watermark for `operation`.
    fn set_last_at(&self, at: Timestamp, operation: SyncOperation) -> MetadataFuture<'_, ()> {
        match operation {
            SyncOperation::Fetch => self.set_last_fetch_at(at),
            SyncOperation::Post => self.set_last_post_at(at),
        }
    }
}

/// In-memory watermarks. Lost when dropped.
#[derive(Debug, Default)]
pub struct BasicSyncMetadata {
    last_fetch_at: RwLock<Option<Timestamp>>,
    last_post_at: RwLock<Option<Timestamp>>,
}

impl BasicSyncMetadata {
    pub fn new(last_fetch_at: Option<Timestamp>, last_post_at: Option<Timestamp>) -> Self {
        Self {
            last_fetch_at: RwLock::new(last_fetch_at),
            last_post_at: RwLock::new(last_post_at),
        }
    }
}

impl CollectionSyncMetadata for BasicSyncMetadata {
    fn get_last_fetch_at(&self) -> MetadataFuture<'_, Option<Timestamp>> {
        Box::pin(async move { Ok(*self.last_fetch_at.read().await) })
    }

    fn get_last_post_at(&self) -> MetadataFuture<'_, Option<Timestamp>> {
        Box::pin(async move { Ok(*self.last_post_at.read().await) })
    }

    fn set_last_fetch_at(&self, at: Timestamp) -> MetadataFuture<'_, ()> {
        Box::pin(async move {
            *self.last_fetch_at.write().await = Some(at);
            Ok(())
        })
    }

    fn set_last_post_at(&self, at: Timestamp) -> MetadataFuture<'_, ()> {
        Box::pin(async move {
            *self.last_post_at.write().await = Some(at);
            Ok(())
        })
    }
}
