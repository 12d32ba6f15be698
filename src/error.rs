// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for collection synchronization.
//!
//! Only configuration mistakes, protocol-invariant violations and misuse are
//! raised as errors. Data-level outcomes (conflicts, a failed transmission,
//! a failed commit) are captured on the [`Synchronizer`](crate::Synchronizer)
//! instead, so `sync()` still returns and the caller inspects its status.
//!
//! # Error Categories
//!
//! | Error Type | Retryable | Description |
//! |------------|-----------|-------------|
//! | `ParentNotSet` | No | Operation needs a parent collection |
//! | `InvalidLimit` | No | Batch limit below 1 |
//! | `UnsortedItems` | No | Collaborator returned items not ordered by `updated_at` |
//! | `AlreadyExecuted` | No | `execute_sync` called twice on one synchronizer |
//! | `MissingTimestamp` | No | Item built without a version |
//! | `Collection` | Yes | Collaborator read/write failed |
//! | `Metadata` | Yes | Watermark store failed |
//! | `Config` | No | Configuration invalid |

use crate::collection::CollectionError;
use crate::item::DocId;
use thiserror::Error;

/// Result type alias for synchronization operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors raised by the synchronization core.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The collection has no parent but the operation needs one.
    #[error("Operation cannot be executed because node has no parent defined{}", .0.as_ref().map(|m| format!(": {}", m)).unwrap_or_default())]
    ParentNotSet(Option<String>),

    /// Batch limit must be at least 1.
    #[error("Invalid sync limit {0}: must be at least 1")]
    InvalidLimit(usize),

    /// Items handed to the synchronizer were not ascending by `updated_at`.
    ///
    /// The collaborator broke the `items_newer_than` contract. Proceeding
    /// would corrupt watermark semantics, so nothing is transmitted.
    #[error("Items to sync are not ordered correctly (order must be updated_at ascending)")]
    UnsortedItems,

    /// `execute_sync` was called on a synchronizer that already ran.
    #[error("Cannot execute sync again: synchronizer already executed")]
    AlreadyExecuted,

    /// An item was built without an `updated_at`.
    #[error("Updated at must be defined (document ID {id})")]
    MissingTimestamp { id: DocId },

    /// A collection collaborator failed.
    #[error("Collection error: {0}")]
    Collection(#[from] CollectionError),

    /// The watermark store failed.
    #[error("Sync metadata error: {0}")]
    Metadata(#[from] MetadataError),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    pub fn parent_not_set(extra: impl Into<String>) -> Self {
        let extra = extra.into();
        if extra.trim().is_empty() {
            Self::ParentNotSet(None)
        } else {
            Self::ParentNotSet(Some(extra))
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Collection(_) => true,
            Self::Metadata(_) => true,
            Self::ParentNotSet(_) => false,
            Self::InvalidLimit(_) => false,
            Self::UnsortedItems => false,
            Self::AlreadyExecuted => false,
            Self::MissingTimestamp { .. } => false,
            Self::Config(_) => false,
        }
    }
}

/// Errors from watermark stores.
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_not_set_message() {
        let err = SyncError::ParentNotSet(None);
        assert_eq!(
            err.to_string(),
            "Operation cannot be executed because node has no parent defined"
        );

        let err = SyncError::parent_not_set("Cannot sync to parent");
        assert_eq!(
            err.to_string(),
            "Operation cannot be executed because node has no parent defined: Cannot sync to parent"
        );
    }

    #[test]
    fn test_parent_not_set_blank_extra() {
        let err = SyncError::parent_not_set("   ");
        assert!(matches!(err, SyncError::ParentNotSet(None)));
    }

    #[test]
    fn test_is_retryable_collection() {
        let err = SyncError::Collection(CollectionError::new("connection reset"));
        assert!(err.is_retryable());
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_is_retryable_metadata() {
        let err = SyncError::Metadata(MetadataError::Config("bad path".to_string()));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_not_retryable_programmer_errors() {
        assert!(!SyncError::InvalidLimit(0).is_retryable());
        assert!(!SyncError::UnsortedItems.is_retryable());
        assert!(!SyncError::AlreadyExecuted.is_retryable());
        assert!(!SyncError::ParentNotSet(None).is_retryable());
        assert!(!SyncError::Config("x".to_string()).is_retryable());
        assert!(!SyncError::MissingTimestamp { id: DocId::from(1) }.is_retryable());
    }

    #[test]
    fn test_invalid_limit_formatting() {
        let msg = SyncError::InvalidLimit(0).to_string();
        assert!(msg.contains("0"));
        assert!(msg.contains("at least 1"));
    }

    #[test]
    fn test_metadata_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: SyncError = MetadataError::from(io).into();
        assert!(err.to_string().contains("gone"));
    }
}
