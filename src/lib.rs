// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Collection Sync
//!
//! Bidirectional, date-versioned replication between a collection and its
//! parent collection. A typical deployment is a master store with several
//! offline-capable slaves that fetch from and post to it.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────────┐
//! │                     SynchronizableCollection (slave)                      │
//! │                                                                           │
//! │  ┌──────────────┐   ┌──────────────────┐   ┌───────────────────────────┐  │
//! │  │ Watermarks   │──►│ items_newer_than │──►│ Synchronizer (per sync)   │  │
//! │  │ fetch / post │   │ (source side)    │   │ classify → transmit →     │  │
//! │  └──────────────┘   └──────────────────┘   │ commit / rollback         │  │
//! │         ▲                                  └───────────────────────────┘  │
//! │         │ advance (committed only)                      │                 │
//! │         └───────────────────────────────────────────────┘                 │
//! └───────────────────────────────────────────────────────────────────────────┘
//!                │ Fetch ▲                              │ Post ▼
//!        ┌──────────────────────────────────────────────────────────┐
//!        │                  parent Collection (master)               │
//!        └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Conflicts
//!
//! An incoming item conflicts when the destination's record for the same id
//! changed after the direction's watermark. How conflicts are resolved is
//! chosen per sync with a [`ConflictStrategy`]: `Force`, `RaiseError`
//! (default), `Ignore` or `SyncUntilConflict`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use collection_sync::store::memory::MemoryCollection;
//! use collection_sync::{ConflictStrategy, SyncOperation, SyncStatus, SynchronizableCollection};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> collection_sync::Result<()> {
//!     let master = Arc::new(MemoryCollection::<String>::new());
//!     let slave = SynchronizableCollection::new("slave", Arc::new(MemoryCollection::<String>::new()))
//!         .with_parent(master);
//!
//!     let synchronizer = slave.sync(SyncOperation::Fetch, 100, ConflictStrategy::Ignore).await?;
//!     if synchronizer.status() == SyncStatus::Conflict {
//!         // inspect synchronizer.conflict_items()
//!     }
//!     Ok(())
//! }
//! ```

pub mod collection;
pub mod config;
pub mod conflict_policy;
pub mod error;
pub mod events;
pub mod hooks;
pub mod item;
pub mod metadata;
pub mod metrics;
pub mod resilience;
pub mod store;
pub mod sync_policy;
pub mod synchronizable;
pub mod synchronizer;

// Re-exports for convenience
pub use collection::{BoxFuture, Collection, CollectionError, CollectionResult, SyncBatch};
pub use config::{CommitRetryConfig, MetadataStoreConfig, SyncConfig};
pub use conflict_policy::{ConflictPolicy, ConflictStrategy, SyncOptions};
pub use error::{MetadataError, Result, SyncError};
pub use events::{EventBus, SyncEvent};
pub use hooks::{NoOpHooks, SyncHooks};
pub use item::{DocId, Document, SyncAction, SyncItem, Timestamp};
pub use metadata::{BasicSyncMetadata, CollectionSyncMetadata, SyncOperation};
pub use sync_policy::SyncPolicy;
pub use synchronizable::SynchronizableCollection;
pub use synchronizer::{SyncStatus, Synchronizer};
