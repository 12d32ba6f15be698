// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-memory collection.
//!
//! Deletes are kept as tombstones: a deleted id stays visible to
//! `find_by_ids` and `items_newer_than` so the deletion itself can be synced
//! onward, but it no longer counts as a live document.

use crate::collection::{BoxFuture, Collection};
use crate::item::{DocId, Document, SyncItem, Timestamp};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A [`Collection`] held in a map. Commit always succeeds, rollback does nothing.
#[derive(Debug)]
pub struct MemoryCollection<D> {
    records: RwLock<HashMap<DocId, SyncItem<D>>>,
}

impl<D: Document> Default for MemoryCollection<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Document> MemoryCollection<D> {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Collection preloaded with `items`. Later items win on duplicate ids.
    pub fn with_items(items: impl IntoIterator<Item = SyncItem<D>>) -> Self {
        let records = items
            .into_iter()
            .map(|item| (item.id().clone(), item))
            .collect();
        Self {
            records: RwLock::new(records),
        }
    }

    /// Write a record directly, as application code would.
    pub async fn upsert(&self, item: SyncItem<D>) {
        self.records.write().await.insert(item.id().clone(), item);
    }

    /// Live documents, oldest first.
    pub async fn documents(&self) -> Vec<SyncItem<D>> {
        let records = self.records.read().await;
        let mut live: Vec<_> = records.values().filter(|i| i.is_update()).cloned().collect();
        live.sort_by(|a, b| a.updated_at().cmp(&b.updated_at()).then_with(|| a.id().cmp(b.id())));
        live
    }

    /// Live record for `id`.
    pub async fn get(&self, id: impl Into<DocId>) -> Option<SyncItem<D>> {
        let id = id.into();
        let records = self.records.read().await;
        records.get(&id).filter(|i| i.is_update()).cloned()
    }

    fn apply(records: &mut HashMap<DocId, SyncItem<D>>, items: &[SyncItem<D>]) {
        for item in items {
            records.insert(item.id().clone(), item.clone());
        }
    }
}

impl<D: Document> Collection<D> for MemoryCollection<D> {
    fn count_all(&self) -> BoxFuture<'_, usize> {
        Box::pin(async move {
            Ok(self.records.read().await.values().filter(|i| i.is_update()).count())
        })
    }

    fn find_by_ids<'a>(&'a self, ids: &'a [DocId]) -> BoxFuture<'a, Vec<SyncItem<D>>> {
        Box::pin(async move {
            let records = self.records.read().await;
            Ok(ids.iter().filter_map(|id| records.get(id).cloned()).collect())
        })
    }

    fn sync_batch(&self, items: Vec<SyncItem<D>>) -> BoxFuture<'_, Vec<SyncItem<D>>> {
        Box::pin(async move {
            let mut records = self.records.write().await;
            Self::apply(&mut records, &items);
            Ok(items)
        })
    }

    fn items_newer_than(
        &self,
        after: Option<Timestamp>,
        limit: usize,
    ) -> BoxFuture<'_, Vec<SyncItem<D>>> {
        Box::pin(async move {
            let records = self.records.read().await;
            let mut newer: Vec<_> = records
                .values()
                .filter(|i| after.map_or(true, |after| i.updated_at() > after))
                .cloned()
                .collect();
            newer.sort_by(|a, b| {
                a.updated_at().cmp(&b.updated_at()).then_with(|| a.id().cmp(b.id()))
            });
            newer.truncate(limit);
            Ok(newer)
        })
    }

    fn latest_updated_item(&self) -> BoxFuture<'_, Option<SyncItem<D>>> {
        Box::pin(async move {
            let records = self.records.read().await;
            Ok(records
                .values()
                .max_by(|a, b| {
                    a.updated_at().cmp(&b.updated_at()).then_with(|| b.id().cmp(a.id()))
                })
                .cloned())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn ts(month: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2020, month, 1, 0, 0, 0).unwrap()
    }

    fn person(id: &str, month: u32) -> SyncItem<String> {
        SyncItem::new(id, format!("{} v{}", id, month), ts(month))
    }

    #[tokio::test]
    async fn test_upsert_and_count() {
        let c = MemoryCollection::new();
        c.upsert(person("chris123", 1)).await;
        c.upsert(person("marisel34", 6)).await;
        c.upsert(person("chris123", 7)).await;

        assert_eq!(c.count_all().await.unwrap(), 2);
        assert_eq!(c.get("chris123").await.unwrap().updated_at(), ts(7));
    }

    #[tokio::test]
    async fn test_items_newer_than_sorted_and_capped() {
        let c = MemoryCollection::with_items(vec![person("c", 9), person("a", 3), person("b", 5)]);

        let all = c.items_newer_than(None, 10).await.unwrap();
        let ids: Vec<_> = all.iter().map(|i| i.id().to_string()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        let newer = c.items_newer_than(Some(ts(3)), 1).await.unwrap();
        assert_eq!(newer.len(), 1);
        assert_eq!(newer[0].id(), &DocId::from("b"));

        assert!(c.items_newer_than(Some(ts(9)), 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_by_ids_omits_unknown() {
        let c = MemoryCollection::with_items(vec![person("a", 1)]);
        let ids = vec![DocId::from("a"), DocId::from("zzz")];
        let found = c.find_by_ids(&ids).await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_leaves_tombstone() {
        let c = MemoryCollection::with_items(vec![person("a", 1), person("b", 2)]);
        let applied = c
            .sync_batch(vec![SyncItem::deleted("a", String::new(), ts(4))])
            .await
            .unwrap();
        assert_eq!(applied.len(), 1);

        assert_eq!(c.count_all().await.unwrap(), 1);
        assert!(c.get("a").await.is_none());
        assert_eq!(c.documents().await.len(), 1);

        let found = c.find_by_ids(&[DocId::from("a")]).await.unwrap();
        assert!(found[0].is_delete());

        let newer = c.items_newer_than(Some(ts(2)), 10).await.unwrap();
        assert_eq!(newer.len(), 1);
        assert!(newer[0].is_delete());

        let latest = c.latest_updated_item().await.unwrap().unwrap();
        assert_eq!(latest.updated_at(), ts(4));
    }

    #[tokio::test]
    async fn test_latest_of_empty_is_none() {
        let c: MemoryCollection<String> = MemoryCollection::new();
        assert!(c.latest_updated_item().await.unwrap().is_none());
    }
}
