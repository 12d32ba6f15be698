// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Sync lifecycle events.
//!
//! Each [`SynchronizableCollection`](crate::SynchronizableCollection) owns an
//! [`EventBus`]. Subscribers get a `tokio::sync::broadcast` receiver; slow
//! receivers lag and lose the oldest events rather than blocking a sync.
//!
//! ```rust
//! # async fn example() {
//! use collection_sync::events::{EventBus, SyncEvent};
//! use collection_sync::metadata::SyncOperation;
//!
//! let bus = EventBus::new(16);
//! let mut rx = bus.subscribe();
//! bus.publish(SyncEvent::Started { op: SyncOperation::Fetch, candidates: 3 });
//! assert!(matches!(rx.recv().await, Ok(SyncEvent::Started { candidates: 3, .. })));
//! # }
//! ```

use crate::item::Timestamp;
use crate::metadata::SyncOperation;
use crate::synchronizer::SyncStatus;
use tokio::sync::broadcast;
use tracing::trace;

/// Something that happened during a sync attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// A synchronizer was built over `candidates` items.
    Started { op: SyncOperation, candidates: usize },

    /// Classification found conflicts.
    ConflictsDetected { op: SyncOperation, count: usize },

    /// Conflicting items were skipped under `Ignore`.
    ItemsIgnored { op: SyncOperation, count: usize },

    /// Items reached the destination (not yet committed).
    Transmitted { op: SyncOperation, count: usize },

    /// A destination call failed.
    TransmissionFailed { op: SyncOperation, errors: Vec<String> },

    Committed { op: SyncOperation },

    RolledBack { op: SyncOperation },

    /// A hook aborted the attempt before transmission.
    Aborted { op: SyncOperation },

    /// The direction's watermark moved forward.
    WatermarkAdvanced { op: SyncOperation, from: Option<Timestamp>, to: Timestamp },

    /// The attempt ended. Always the last event of an attempt.
    Finished { op: SyncOperation, status: SyncStatus, committed: bool },
}

impl SyncEvent {
    pub fn op(&self) -> SyncOperation {
        match self {
            SyncEvent::Started { op, .. }
            | SyncEvent::ConflictsDetected { op, .. }
            | SyncEvent::ItemsIgnored { op, .. }
            | SyncEvent::Transmitted { op, .. }
            | SyncEvent::TransmissionFailed { op, .. }
            | SyncEvent::Committed { op }
            | SyncEvent::RolledBack { op }
            | SyncEvent::Aborted { op }
            | SyncEvent::WatermarkAdvanced { op, .. }
            | SyncEvent::Finished { op, .. } => *op,
        }
    }
}

/// Broadcast channel for [`SyncEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    /// `capacity` is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    /// Publish to current subscribers. Having none is not an error.
    pub fn publish(&self, event: SyncEvent) {
        if self.sender.send(event).is_err() {
            trace!("No event subscribers");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
