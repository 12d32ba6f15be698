// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Extension points around a sync attempt.
//!
//! ```text
//! prepare_sync_data → pre_execute_sync ─false→ abort
//!                          │ true
//!                          ▼
//!                     execute_sync → pre_commit_sync ─false→ (no commit)
//!                                         │ true
//!                                         ▼
//!                                       commit → rollback if needed → clean_up
//! ```
//!
//! `clean_up` runs on every path, including errors.

use crate::collection::BoxFuture;
use crate::item::Document;
use crate::synchronizer::Synchronizer;

/// Hooks invoked by [`SynchronizableCollection::sync`](crate::SynchronizableCollection::sync).
///
/// Every method has a default, so implementors override only what they need.
/// A hook error aborts the `sync` call after rollback and clean-up ran.
pub trait SyncHooks<D: Document>: Send + Sync + 'static {
    /// Called after classification, before transmission, on every attempt.
    ///
    /// `false` aborts an attempt that is still `NotStarted`. An attempt that
    /// classification already ended (`Conflict`, `UnexpectedError`) keeps its
    /// status and is not transmitted either way.
    fn pre_execute_sync<'a>(&'a self, _synchronizer: &'a Synchronizer<D>) -> BoxFuture<'a, bool> {
        Box::pin(async { Ok(true) })
    }

    /// Called after transmission, before commit. `false` skips the commit.
    fn pre_commit_sync<'a>(&'a self, _synchronizer: &'a Synchronizer<D>) -> BoxFuture<'a, bool> {
        Box::pin(async { Ok(true) })
    }

    /// Called last, whatever the outcome.
    fn clean_up<'a>(&'a self, _synchronizer: &'a Synchronizer<D>) -> BoxFuture<'a, ()> {
        Box::pin(async { Ok(()) })
    }
}

/// Hooks that change nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpHooks;

impl<D: Document> SyncHooks<D> for NoOpHooks {}
