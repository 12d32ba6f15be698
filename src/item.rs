// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Versioned items exchanged between collections.
//!
//! A [`SyncItem`] is the unit of replication: a stable [`DocId`], an opaque
//! document payload, the `updated_at` timestamp that versions it, and the
//! [`SyncAction`] the destination must apply.
//!
//! The engine never looks inside the document. Only `id`, `updated_at` and
//! `action` drive conflict detection and watermark movement.
//!
//! # Version Equality
//!
//! Two items with the same `updated_at` are the *same version*
//! ([`SyncItem::same_version`]). This is how an already-applied item is
//! recognised: it is a no-op apply, not a conflict.

use crate::error::{Result, SyncError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Point in time used for item versions and watermarks.
pub type Timestamp = DateTime<Utc>;

/// Bounds every document payload must satisfy.
///
/// Blanket-implemented, so any `Clone + Send + Sync + 'static` type works.
pub trait Document: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> Document for T {}

/// Identifier of a document, stable across every store that holds it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocId {
    Int(i64),
    Str(String),
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocId::Int(id) => write!(f, "{}", id),
            DocId::Str(id) => write!(f, "{}", id),
        }
    }
}

impl From<i64> for DocId {
    fn from(id: i64) -> Self {
        DocId::Int(id)
    }
}

impl From<i32> for DocId {
    fn from(id: i32) -> Self {
        DocId::Int(id as i64)
    }
}

impl From<&str> for DocId {
    fn from(id: &str) -> Self {
        DocId::Str(id.to_string())
    }
}

impl From<String> for DocId {
    fn from(id: String) -> Self {
        DocId::Str(id)
    }
}

/// What the destination does with an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SyncAction {
    /// Insert or replace the document.
    #[default]
    Update,
    /// Remove the document.
    Delete,
}

/// A versioned document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncItem<D> {
    id: DocId,
    document: D,
    updated_at: Timestamp,
    action: SyncAction,
}

impl<D> SyncItem<D> {
    /// Create an `Update` item.
    pub fn new(id: impl Into<DocId>, document: D, updated_at: Timestamp) -> Self {
        Self::with_action(id, document, updated_at, SyncAction::Update)
    }

    /// Create a `Delete` item (a tombstone carrying the last known document).
    pub fn deleted(id: impl Into<DocId>, document: D, updated_at: Timestamp) -> Self {
        Self::with_action(id, document, updated_at, SyncAction::Delete)
    }

    pub fn with_action(
        id: impl Into<DocId>,
        document: D,
        updated_at: Timestamp,
        action: SyncAction,
    ) -> Self {
        Self {
            id: id.into(),
            document,
            updated_at,
            action,
        }
    }

    /// Create an item from a possibly-missing timestamp.
    ///
    /// Records read from external stores may lack a version. Those cannot be
    /// synchronized and are rejected with [`SyncError::MissingTimestamp`].
    pub fn try_new(
        id: impl Into<DocId>,
        document: D,
        updated_at: Option<Timestamp>,
        action: SyncAction,
    ) -> Result<Self> {
        let id = id.into();
        match updated_at {
            Some(updated_at) => Ok(Self::with_action(id, document, updated_at, action)),
            None => Err(SyncError::MissingTimestamp { id }),
        }
    }

    pub fn id(&self) -> &DocId {
        &self.id
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    pub fn action(&self) -> SyncAction {
        self.action
    }

    pub fn is_update(&self) -> bool {
        self.action == SyncAction::Update
    }

    pub fn is_delete(&self) -> bool {
        self.action == SyncAction::Delete
    }

    /// Replace the document and bump its version in place.
    pub fn update(&mut self, document: D, updated_at: Timestamp) {
        self.document = document;
        self.updated_at = updated_at;
    }

    /// Same version means same `updated_at`; document contents are not compared.
    pub fn same_version(&self, other: &SyncItem<D>) -> bool {
        self.updated_at == other.updated_at
    }

    pub fn into_document(self) -> D {
        self.document
    }
}

impl<D: Clone> SyncItem<D> {
    /// Copy of this item carrying a new version.
    pub fn restamped(&self, updated_at: Timestamp) -> Self {
        Self {
            updated_at,
            ..self.clone()
        }
    }
}

/// Whether `items` are ordered by `updated_at` ascending (ties allowed).
pub fn are_items_sorted<D>(items: &[SyncItem<D>]) -> bool {
    items
        .windows(2)
        .all(|pair| pair[0].updated_at <= pair[1].updated_at)
}

/// Item with the highest `updated_at`. The first one wins on ties.
pub fn latest_item<D>(items: &[SyncItem<D>]) -> Option<&SyncItem<D>> {
    items.iter().fold(None, |latest: Option<&SyncItem<D>>, item| match latest {
        Some(current) if current.updated_at >= item.updated_at => Some(current),
        _ => Some(item),
    })
}
