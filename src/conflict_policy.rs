// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Conflict detection and per-item classification rules.
//!
//! Pure functions, no state. The [`Synchronizer`](crate::Synchronizer) calls
//! them for each candidate item in order: ignore check, sync eligibility,
//! conflict classification, stop check.
//!
//! # Conflict Rule
//!
//! An item conflicts when the destination's record for the same id was
//! modified after the watermark of the direction being synced:
//!
//! ```text
//! conflict = dest exists
//!          && watermark exists
//!          && !item.same_version(dest)
//!          && dest.updated_at > watermark
//! ```
//!
//! It is *not* "destination is newer than the incoming item". A destination
//! record older than the watermark was already seen by the last sync and may
//! be overwritten whatever its timestamp relative to the incoming item.
//!
//! # Strategy Matrix
//!
//! | strategy | sync item | stop adding | ignore | handle as conflict |
//! |----------|-----------|-------------|--------|--------------------|
//! | `Force` | always | never | never | never |
//! | `RaiseError` | if no conflict | on conflict | never | on conflict |
//! | `Ignore` | if no conflict | never | on conflict | never |
//! | `SyncUntilConflict` | if no conflict | on conflict | never | on conflict |

use crate::item::{SyncItem, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How conflicting items are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConflictStrategy {
    /// Always apply the incoming item, overwriting the destination.
    Force,

    /// Sync all or nothing: any conflict aborts the whole batch.
    #[default]
    RaiseError,

    /// Keep the destination's version. The destination record is re-stamped
    /// with the sync start time and re-submitted so that the next sync in the
    /// opposite direction carries it as a fresh version.
    Ignore,

    /// Apply items in order until the first conflict, then stop.
    SyncUntilConflict,
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictStrategy::Force => write!(f, "Force"),
            ConflictStrategy::RaiseError => write!(f, "RaiseError"),
            ConflictStrategy::Ignore => write!(f, "Ignore"),
            ConflictStrategy::SyncUntilConflict => write!(f, "SyncUntilConflict"),
        }
    }
}

/// Options for a single sync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncOptions {
    pub conflict_strategy: ConflictStrategy,
}

impl SyncOptions {
    pub fn new(conflict_strategy: ConflictStrategy) -> Self {
        Self { conflict_strategy }
    }
}

impl From<ConflictStrategy> for SyncOptions {
    fn from(conflict_strategy: ConflictStrategy) -> Self {
        Self { conflict_strategy }
    }
}

/// Namespace for the classification rules.
pub struct ConflictPolicy;

impl ConflictPolicy {
    /// Whether `item` conflicts with the destination's `item_to_compare`.
    pub fn is_conflict<D>(
        collection_last_sync_at: Option<Timestamp>,
        item: &SyncItem<D>,
        item_to_compare: Option<&SyncItem<D>>,
    ) -> bool {
        let Some(item_to_compare) = item_to_compare else {
            return false;
        };
        if item.same_version(item_to_compare) {
            return false;
        }
        match collection_last_sync_at {
            Some(last_sync_at) => item_to_compare.updated_at() > last_sync_at,
            None => false,
        }
    }

    pub fn should_sync_item(
        conflict: bool,
        strategy: ConflictStrategy,
        stopped_adding: bool,
    ) -> bool {
        if stopped_adding {
            return false;
        }
        strategy == ConflictStrategy::Force || !conflict
    }

    pub fn should_stop_adding(conflict: bool, strategy: ConflictStrategy) -> bool {
        conflict
            && matches!(
                strategy,
                ConflictStrategy::RaiseError | ConflictStrategy::SyncUntilConflict
            )
    }

    pub fn should_ignore_item(conflict: bool, strategy: ConflictStrategy) -> bool {
        conflict && strategy == ConflictStrategy::Ignore
    }

    /// `Ignore` and `Force` consume conflicts silently.
    pub fn should_handle_as_conflict(conflict: bool, strategy: ConflictStrategy) -> bool {
        match strategy {
            ConflictStrategy::Ignore | ConflictStrategy::Force => false,
            ConflictStrategy::RaiseError | ConflictStrategy::SyncUntilConflict => conflict,
        }
    }

    pub fn should_set_status_as_conflict(has_conflicts: bool, strategy: ConflictStrategy) -> bool {
        has_conflicts && strategy == ConflictStrategy::RaiseError
    }
}
