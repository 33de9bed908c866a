//! Document store seam.
//!
//! Backends only move raw JSON documents around, keyed by collection and id.
//! [`Documents`] layers typed access on top and provides the
//! find-one-and-update primitive used for relationship cascades and result
//! recording. Every read-modify-write on a single document runs under a
//! striped async lock, so two updates of the same document issued by this
//! process never interleave.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::types::{Course, Question, Test, User};

pub type StoreResult<T> = Result<T, StoreError>;

const LOCK_STRIPES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Tests,
    Questions,
    Users,
    Courses,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Tests => "tests",
            Collection::Questions => "questions",
            Collection::Users => "users",
            Collection::Courses => "courses",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed document living in one collection
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: Collection;

    fn id(&self) -> &str;
}

impl Document for Test {
    const COLLECTION: Collection = Collection::Tests;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Document for Question {
    const COLLECTION: Collection = Collection::Questions;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Document for User {
    const COLLECTION: Collection = Collection::Users;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Document for Course {
    const COLLECTION: Collection = Collection::Courses;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Raw document storage. `list` returns documents in insertion order.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(&self, collection: Collection, id: &str) -> StoreResult<Option<String>>;

    /// Insert or overwrite the whole document
    async fn save(&self, collection: Collection, id: &str, payload: String) -> StoreResult<()>;

    /// Delete a document, returning what was stored
    async fn remove(&self, collection: Collection, id: &str) -> StoreResult<Option<String>>;

    async fn list(&self, collection: Collection) -> StoreResult<Vec<String>>;
}

/// Typed access over any [`DocumentStore`]
#[derive(Clone)]
pub struct Documents {
    store: Arc<dyn DocumentStore>,
    locks: Arc<Vec<Mutex<()>>>,
}

impl Documents {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        let locks = (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect();
        Self {
            store,
            locks: Arc::new(locks),
        }
    }

    fn lock_for(&self, collection: Collection, id: &str) -> &Mutex<()> {
        let mut hasher = DefaultHasher::new();
        collection.hash(&mut hasher);
        id.hash(&mut hasher);
        let slot = (hasher.finish() as usize) % self.locks.len();
        &self.locks[slot]
    }

    pub async fn find_one<T: Document>(&self, id: &str) -> StoreResult<Option<T>> {
        match self.store.find(T::COLLECTION, id).await? {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    /// Resolve a list of ids, keeping their order and skipping dangling ones
    pub async fn find_many<T: Document>(&self, ids: &[String]) -> StoreResult<Vec<T>> {
        let mut docs = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(doc) = self.find_one::<T>(id).await? {
                docs.push(doc);
            }
        }
        Ok(docs)
    }

    pub async fn list<T: Document>(&self) -> StoreResult<Vec<T>> {
        self.store
            .list(T::COLLECTION)
            .await?
            .iter()
            .map(|payload| serde_json::from_str(payload).map_err(StoreError::from))
            .collect()
    }

    pub async fn insert<T: Document>(&self, doc: &T) -> StoreResult<()> {
        let payload = serde_json::to_string(doc)?;
        let _guard = self.lock_for(T::COLLECTION, doc.id()).lock().await;
        self.store.save(T::COLLECTION, doc.id(), payload).await
    }

    /// Find a document, apply `mutate` and persist the whole document.
    /// Returns the updated document, or `None` when it does not exist.
    pub async fn update<T, F>(&self, id: &str, mutate: F) -> StoreResult<Option<T>>
    where
        T: Document,
        F: FnOnce(&mut T) + Send,
    {
        let _guard = self.lock_for(T::COLLECTION, id).lock().await;

        let mut doc = match self.find_one::<T>(id).await? {
            Some(doc) => doc,
            None => return Ok(None),
        };
        mutate(&mut doc);

        let payload = serde_json::to_string(&doc)?;
        self.store.save(T::COLLECTION, id, payload).await?;
        Ok(Some(doc))
    }

    pub async fn remove<T: Document>(&self, id: &str) -> StoreResult<Option<T>> {
        let _guard = self.lock_for(T::COLLECTION, id).lock().await;
        match self.store.remove(T::COLLECTION, id).await? {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }
}

/// `$push`: append even if already present
pub fn push_id(ids: &mut Vec<String>, id: &str) {
    ids.push(id.to_string());
}

/// `$addToSet`: append only if absent
pub fn add_to_set(ids: &mut Vec<String>, id: &str) {
    if !ids.iter().any(|existing| existing == id) {
        ids.push(id.to_string());
    }
}

/// `$pull`: remove every occurrence
pub fn pull_id(ids: &mut Vec<String>, id: &str) {
    ids.retain(|existing| existing != id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::types::Course;

    fn course(id: &str) -> Course {
        Course {
            id: id.to_string(),
            title: format!("Course {}", id),
            tests: vec![],
            created_at: 0,
        }
    }

    #[test]
    fn test_set_operators() {
        let mut ids = vec!["a".to_string()];
        push_id(&mut ids, "a");
        assert_eq!(ids, vec!["a", "a"]);

        add_to_set(&mut ids, "a");
        add_to_set(&mut ids, "b");
        assert_eq!(ids, vec!["a", "a", "b"]);

        pull_id(&mut ids, "a");
        assert_eq!(ids, vec!["b"]);
    }

    #[test]
    fn test_collection_names() {
        assert_eq!(Collection::Tests.to_string(), "tests");
        assert_eq!(Collection::Users.as_str(), "users");
    }

    #[tokio::test]
    async fn test_update_missing_document_is_none() {
        let docs = Documents::new(Arc::new(MemoryStore::new()));
        let updated = docs
            .update::<Course, _>("nope", |c| c.tests.push("t".into()))
            .await
            .unwrap();
        assert!(updated.is_none());
    }

    #[tokio::test]
    async fn test_update_persists_whole_document() {
        let docs = Documents::new(Arc::new(MemoryStore::new()));
        docs.insert(&course("c1")).await.unwrap();

        docs.update::<Course, _>("c1", |c| push_id(&mut c.tests, "t1"))
            .await
            .unwrap();

        let stored: Course = docs.find_one("c1").await.unwrap().unwrap();
        assert_eq!(stored.tests, vec!["t1"]);
    }

    #[tokio::test]
    async fn test_concurrent_updates_do_not_lose_writes() {
        let docs = Documents::new(Arc::new(MemoryStore::new()));
        docs.insert(&course("c1")).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..32 {
            let docs = docs.clone();
            handles.push(tokio::spawn(async move {
                docs.update::<Course, _>("c1", move |c| push_id(&mut c.tests, &format!("t{}", i)))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let stored: Course = docs.find_one("c1").await.unwrap().unwrap();
        assert_eq!(stored.tests.len(), 32);
    }

    #[tokio::test]
    async fn test_find_many_skips_dangling_ids() {
        let docs = Documents::new(Arc::new(MemoryStore::new()));
        docs.insert(&course("c1")).await.unwrap();
        docs.insert(&course("c2")).await.unwrap();

        let found: Vec<Course> = docs
            .find_many(&["c2".to_string(), "gone".to_string(), "c1".to_string()])
            .await
            .unwrap();
        let ids: Vec<&str> = found.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c2", "c1"]);
    }

    #[tokio::test]
    async fn test_list_and_remove() {
        let docs = Documents::new(Arc::new(MemoryStore::new()));
        docs.insert(&course("c1")).await.unwrap();
        docs.insert(&course("c2")).await.unwrap();

        let removed: Option<Course> = docs.remove("c1").await.unwrap();
        assert_eq!(removed.map(|c| c.id), Some("c1".to_string()));

        let remaining: Vec<Course> = docs.list().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "c2");
    }
}
