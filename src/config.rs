// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for synchronizable collections.
//!
//! Configuration is passed to
//! [`SynchronizableCollection::from_config()`](crate::SynchronizableCollection::from_config)
//! and can be constructed programmatically or deserialized from YAML/JSON.
//!
//! # Quick Start
//!
//! ```rust
//! use collection_sync::config::SyncConfig;
//! use collection_sync::ConflictStrategy;
//!
//! let config = SyncConfig {
//!     conflict_strategy: ConflictStrategy::SyncUntilConflict,
//!     ..Default::default()
//! };
//! assert_eq!(config.default_limit, 100);
//! ```
//!
//! # Configuration Structure
//!
//! ```text
//! SyncConfig
//! ├── default_limit: usize              # Batch size when none is given
//! ├── conflict_strategy: ConflictStrategy
//! ├── commit_retry: CommitRetryConfig   # Commit/rollback retry policy
//! ├── event_capacity: usize             # Event bus buffer per subscriber
//! └── metadata: MetadataStoreConfig     # Where watermarks live
//! ```
//!
//! # YAML Example
//!
//! ```yaml
//! default_limit: 500
//! conflict_strategy: Ignore
//! commit_retry:
//!   max_attempts: 5
//!   initial_delay: "10ms"
//!   max_delay: "1s"
//! metadata:
//!   type: sqlite
//!   path: "/var/lib/app/watermarks.db"
//! ```

use crate::conflict_policy::{ConflictStrategy, SyncOptions};
use crate::error::{MetadataError, SyncError};
use crate::metadata::{BasicSyncMetadata, CollectionSyncMetadata};
use crate::resilience::RetryConfig;
use crate::store::json_file::JsonFileSyncMetadata;
use crate::store::sqlite::SqliteSyncMetadata;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════════
// SyncConfig
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Maximum candidates per sync when the caller gives no limit.
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Strategy used when the caller gives no options.
    #[serde(default)]
    pub conflict_strategy: ConflictStrategy,

    #[serde(default)]
    pub commit_retry: CommitRetryConfig,

    /// Buffered events per subscriber before it starts lagging.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    #[serde(default)]
    pub metadata: MetadataStoreConfig,
}

fn default_limit() -> usize {
    100
}

fn default_event_capacity() -> usize {
    256
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            conflict_strategy: ConflictStrategy::default(),
            commit_retry: CommitRetryConfig::default(),
            event_capacity: default_event_capacity(),
            metadata: MetadataStoreConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Zero retry delays and in-memory watermarks.
    pub fn for_testing() -> Self {
        Self {
            commit_retry: CommitRetryConfig::no_delay(),
            metadata: MetadataStoreConfig::Memory,
            ..Default::default()
        }
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions::new(self.conflict_strategy)
    }

    /// Reject values no sync could run with.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.default_limit == 0 {
            return Err(SyncError::Config("default_limit must be at least 1".into()));
        }
        if self.commit_retry.max_attempts == 0 {
            return Err(SyncError::Config("commit_retry.max_attempts must be at least 1".into()));
        }
        self.commit_retry.initial_delay_duration()?;
        self.commit_retry.max_delay_duration()?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CommitRetryConfig
// ═══════════════════════════════════════════════════════════════════════════════

/// Retry policy for commit and rollback. Durations are humantime strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// e.g. "10ms", "1s".
    #[serde(default = "default_initial_delay")]
    pub initial_delay: String,

    #[serde(default = "default_max_delay")]
    pub max_delay: String,

    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

fn default_max_attempts() -> usize {
    5
}

fn default_initial_delay() -> String {
    "10ms".to_string()
}

fn default_max_delay() -> String {
    "1s".to_string()
}

fn default_backoff_factor() -> f64 {
    2.0
}

impl Default for CommitRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_factor: default_backoff_factor(),
        }
    }
}

impl CommitRetryConfig {
    pub fn no_delay() -> Self {
        Self {
            initial_delay: "0s".to_string(),
            max_delay: "0s".to_string(),
            ..Default::default()
        }
    }

    pub fn initial_delay_duration(&self) -> Result<Duration, SyncError> {
        parse_duration("commit_retry.initial_delay", &self.initial_delay)
    }

    pub fn max_delay_duration(&self) -> Result<Duration, SyncError> {
        parse_duration("commit_retry.max_delay", &self.max_delay)
    }

    pub fn to_retry_config(&self) -> Result<RetryConfig, SyncError> {
        Ok(RetryConfig {
            max_attempts: self.max_attempts,
            initial_delay: self.initial_delay_duration()?,
            max_delay: self.max_delay_duration()?,
            backoff_factor: self.backoff_factor,
        })
    }
}

fn parse_duration(field: &str, value: &str) -> Result<Duration, SyncError> {
    humantime::parse_duration(value)
        .map_err(|e| SyncError::Config(format!("invalid {} {:?}: {}", field, value, e)))
}

// ═══════════════════════════════════════════════════════════════════════════════
// MetadataStoreConfig
// ═══════════════════════════════════════════════════════════════════════════════

/// Where a collection keeps its watermarks.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetadataStoreConfig {
    /// Lost on restart.
    #[default]
    Memory,

    /// SQLite database shared by any number of collections.
    Sqlite { path: String },

    /// One JSON file per collection.
    JsonFile { path: String },
}

impl MetadataStoreConfig {
    /// Open the configured store for the collection called `collection`.
    ///
    /// `collection` keys rows in the SQLite store and is ignored otherwise.
    pub async fn open(
        &self,
        collection: &str,
    ) -> Result<Arc<dyn CollectionSyncMetadata>, MetadataError> {
        let store: Arc<dyn CollectionSyncMetadata> = match self {
            MetadataStoreConfig::Memory => Arc::new(BasicSyncMetadata::default()),
            MetadataStoreConfig::Sqlite { path } => {
                Arc::new(SqliteSyncMetadata::new(path, collection).await?)
            }
            MetadataStoreConfig::JsonFile { path } => Arc::new(JsonFileSyncMetadata::new(path)),
        };
        store.initialize().await?;
        Ok(store)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
