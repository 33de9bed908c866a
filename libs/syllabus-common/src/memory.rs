//! In-process document store, used by tests and local runs without Redis.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::store::{Collection, DocumentStore, StoreResult};

#[derive(Default)]
struct Inner {
    next_seq: u64,
    // (collection, id) -> (insertion sequence, payload)
    docs: HashMap<(Collection, String), (u64, String)>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self, collection: Collection) -> usize {
        let inner = self.inner.read().await;
        inner.docs.keys().filter(|(c, _)| *c == collection).count()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(&self, collection: Collection, id: &str) -> StoreResult<Option<String>> {
        let inner = self.inner.read().await;
        Ok(inner
            .docs
            .get(&(collection, id.to_string()))
            .map(|(_, payload)| payload.clone()))
    }

    async fn save(&self, collection: Collection, id: &str, payload: String) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let key = (collection, id.to_string());
        let seq = match inner.docs.get(&key) {
            Some((seq, _)) => *seq,
            None => {
                inner.next_seq += 1;
                inner.next_seq
            }
        };
        inner.docs.insert(key, (seq, payload));
        Ok(())
    }

    async fn remove(&self, collection: Collection, id: &str) -> StoreResult<Option<String>> {
        let mut inner = self.inner.write().await;
        Ok(inner
            .docs
            .remove(&(collection, id.to_string()))
            .map(|(_, payload)| payload))
    }

    async fn list(&self, collection: Collection) -> StoreResult<Vec<String>> {
        let inner = self.inner.read().await;
        let mut entries: Vec<&(u64, String)> = inner
            .docs
            .iter()
            .filter(|((c, _), _)| *c == collection)
            .map(|(_, entry)| entry)
            .collect();
        entries.sort_by_key(|(seq, _)| *seq);
        Ok(entries.into_iter().map(|(_, payload)| payload.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_keeps_insertion_order_across_overwrites() {
        let store = MemoryStore::new();
        store.save(Collection::Tests, "b", "1".into()).await.unwrap();
        store.save(Collection::Tests, "a", "2".into()).await.unwrap();
        store.save(Collection::Tests, "b", "3".into()).await.unwrap();
        store.save(Collection::Users, "u", "4".into()).await.unwrap();

        let listed = store.list(Collection::Tests).await.unwrap();
        assert_eq!(listed, vec!["3", "2"]);
        assert_eq!(store.len(Collection::Users).await, 1);
    }

    #[tokio::test]
    async fn test_remove_returns_payload() {
        let store = MemoryStore::new();
        store.save(Collection::Courses, "c", "{}".into()).await.unwrap();

        assert_eq!(store.remove(Collection::Courses, "c").await.unwrap(), Some("{}".into()));
        assert_eq!(store.remove(Collection::Courses, "c").await.unwrap(), None);
        assert!(store.find(Collection::Courses, "c").await.unwrap().is_none());
    }
}
