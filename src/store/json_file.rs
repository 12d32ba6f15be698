// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Watermark persistence in a JSON file.
//!
//! The file is read on every `get` and rewritten on every `set`:
//!
//! ```json
//! { "last_fetch_at": "2020-02-01T00:00:00Z", "last_post_at": null }
//! ```
//!
//! A missing file or content that does not parse reads as "no watermarks".
//! Writes go to a sibling temp file which is then renamed over the target.

use crate::item::Timestamp;
use crate::metadata::{CollectionSyncMetadata, MetadataFuture, MetadataResult, SyncOperation};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
struct Watermarks {
    #[serde(default)]
    last_fetch_at: Option<Timestamp>,
    #[serde(default)]
    last_post_at: Option<Timestamp>,
}

impl Watermarks {
    fn get(&self, op: SyncOperation) -> Option<Timestamp> {
        match op {
            SyncOperation::Fetch => self.last_fetch_at,
            SyncOperation::Post => self.last_post_at,
        }
    }

    fn set(&mut self, op: SyncOperation, at: Timestamp) {
        match op {
            SyncOperation::Fetch => self.last_fetch_at = Some(at),
            SyncOperation::Post => self.last_post_at = Some(at),
        }
    }
}

/// Watermarks of one collection, stored in a JSON file.
#[derive(Debug)]
pub struct JsonFileSyncMetadata {
    path: PathBuf,
    initial: Watermarks,
    /// Serializes read-modify-write cycles.
    write_lock: Mutex<()>,
}

impl JsonFileSyncMetadata {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            initial: Watermarks::default(),
            write_lock: Mutex::new(()),
        }
    }

    /// Values written by [`initialize`](CollectionSyncMetadata::initialize)
    /// when the file does not exist yet.
    pub fn with_initial(
        mut self,
        last_fetch_at: Option<Timestamp>,
        last_post_at: Option<Timestamp>,
    ) -> Self {
        self.initial = Watermarks {
            last_fetch_at,
            last_post_at,
        };
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> MetadataResult<Watermarks> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Watermarks::default()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&raw) {
            Ok(watermarks) => Ok(watermarks),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Unreadable watermark file, treating as empty");
                Ok(Watermarks::default())
            }
        }
    }

    async fn write(&self, watermarks: &Watermarks) -> MetadataResult<()> {
        let json = serde_json::to_string(watermarks)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn get(&self, op: SyncOperation) -> MetadataResult<Option<Timestamp>> {
        Ok(self.read().await?.get(op))
    }

    async fn set(&self, op: SyncOperation, at: Timestamp) -> MetadataResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut watermarks = self.read().await?;
        watermarks.set(op, at);
        self.write(&watermarks).await?;
        debug!(path = %self.path.display(), op = %op, at = %at, "Watermark written");
        Ok(())
    }
}

impl CollectionSyncMetadata for JsonFileSyncMetadata {
    /// Create the file with the initial values unless it already exists.
    fn initialize(&self) -> MetadataFuture<'_, ()> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            if tokio::fs::try_exists(&self.path).await? {
                return Ok(());
            }
            if let Some(parent) = self.path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
            self.write(&self.initial).await
        })
    }

    fn get_last_fetch_at(&self) -> MetadataFuture<'_, Option<Timestamp>> {
        Box::pin(self.get(SyncOperation::Fetch))
    }

    fn get_last_post_at(&self) -> MetadataFuture<'_, Option<Timestamp>> {
        Box::pin(self.get(SyncOperation::Post))
    }

    fn set_last_fetch_at(&self, at: Timestamp) -> MetadataFuture<'_, ()> {
        Box::pin(self.set(SyncOperation::Fetch, at))
    }

    fn set_last_post_at(&self, at: Timestamp) -> MetadataFuture<'_, ()> {
        Box::pin(self.set(SyncOperation::Post, at))
    }
}
