use crate::store::{Collection, DocumentStore, StoreResult};
use crate::types::{Language, RunJob, RunReply};
use async_trait::async_trait;
use redis::{AsyncCommands, RedisResult};

/// Redis key semantics shared by the API and the workers.
/// Keys are deterministic so both sides never drift.

pub const DOC_PREFIX: &str = "syllabus";
pub const QUEUE_PREFIX: &str = "syllabus:queue";
pub const VERDICT_PREFIX: &str = "syllabus:verdict";

/// Key holding a document's JSON payload
pub fn document_key(collection: Collection, id: &str) -> String {
    format!("{}:{}:{}", DOC_PREFIX, collection, id)
}

/// Sorted set of a collection's ids, scored by insertion time
pub fn index_key(collection: Collection) -> String {
    format!("{}:{}:index", DOC_PREFIX, collection)
}

/// Generate deterministic queue name for a language
pub fn queue_name(language: &Language) -> String {
    format!("{}:{}", QUEUE_PREFIX, language)
}

/// Generate verdict key for a run job
pub fn verdict_key(job_id: &uuid::Uuid) -> String {
    format!("{}:{}", VERDICT_PREFIX, job_id)
}

fn encode_error(e: serde_json::Error) -> redis::RedisError {
    redis::RedisError::from((redis::ErrorKind::TypeError, "serialization error", e.to_string()))
}

fn decode_error(e: serde_json::Error) -> redis::RedisError {
    redis::RedisError::from((redis::ErrorKind::TypeError, "deserialization error", e.to_string()))
}

/// Push a run job to the language-specific queue
/// Uses RPUSH for FIFO semantics
pub async fn push_job(
    conn: &mut redis::aio::ConnectionManager,
    job: &RunJob,
) -> RedisResult<()> {
    let queue = queue_name(&job.language);
    let payload = serde_json::to_string(job).map_err(encode_error)?;

    conn.rpush(&queue, payload).await
}

/// Pop a run job from the language-specific queue
/// Uses BLPOP with timeout for graceful shutdown
pub async fn pop_job(
    conn: &mut redis::aio::ConnectionManager,
    language: &Language,
    timeout_seconds: f64,
) -> RedisResult<Option<RunJob>> {
    let queue = queue_name(language);
    let result: Option<(String, String)> = conn.blpop(&queue, timeout_seconds).await?;

    match result {
        Some((_key, payload)) => {
            let job: RunJob = serde_json::from_str(&payload).map_err(decode_error)?;
            Ok(Some(job))
        }
        None => Ok(None),
    }
}

/// Publish a worker reply for a job
pub async fn store_reply(
    conn: &mut redis::aio::ConnectionManager,
    job_id: &uuid::Uuid,
    reply: &RunReply,
) -> RedisResult<()> {
    let key = verdict_key(job_id);
    let payload = serde_json::to_string(reply).map_err(encode_error)?;

    // Unclaimed verdicts expire after an hour
    conn.set_ex(&key, payload, 3600).await
}

/// Take a worker reply if one has been published. The key is deleted on read.
pub async fn take_reply(
    conn: &mut redis::aio::ConnectionManager,
    job_id: &uuid::Uuid,
) -> RedisResult<Option<RunReply>> {
    let key = verdict_key(job_id);
    let payload: Option<String> = conn.get(&key).await?;

    match payload {
        Some(data) => {
            let _: () = conn.del(&key).await?;
            let reply: RunReply = serde_json::from_str(&data).map_err(decode_error)?;
            Ok(Some(reply))
        }
        None => Ok(None),
    }
}

/// Document store backed by Redis.
///
/// Each document is a JSON string under `syllabus:<collection>:<id>`; the
/// collection index is a sorted set so listings come back in insertion order.
#[derive(Clone)]
pub struct RedisStore {
    conn: redis::aio::ConnectionManager,
}

impl RedisStore {
    pub fn new(conn: redis::aio::ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl DocumentStore for RedisStore {
    async fn find(&self, collection: Collection, id: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn.get(document_key(collection, id)).await?;
        Ok(payload)
    }

    async fn save(&self, collection: Collection, id: &str, payload: String) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let score = chrono::Utc::now().timestamp_millis();

        // NX keeps the original insertion score when a document is rewritten
        let _: () = redis::pipe()
            .atomic()
            .set(document_key(collection, id), payload)
            .ignore()
            .cmd("ZADD")
            .arg(index_key(collection))
            .arg("NX")
            .arg(score)
            .arg(id)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn remove(&self, collection: Collection, id: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn.clone();
        let key = document_key(collection, id);

        let (payload,): (Option<String>,) = redis::pipe()
            .atomic()
            .get(&key)
            .del(&key)
            .ignore()
            .zrem(index_key(collection), id)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(payload)
    }

    async fn list(&self, collection: Collection) -> StoreResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn.zrange(index_key(collection), 0, -1).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids.iter().map(|id| document_key(collection, id)).collect();
        let payloads: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await?;

        Ok(payloads.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_queue_naming() {
        assert_eq!(queue_name(&Language::Python), "syllabus:queue:python");
        assert_eq!(queue_name(&Language::Java), "syllabus:queue:java");
        assert_eq!(queue_name(&Language::Rust), "syllabus:queue:rust");
    }

    #[test]
    fn test_verdict_key_deterministic() {
        let id = Uuid::new_v4();
        let key1 = verdict_key(&id);
        let key2 = verdict_key(&id);
        assert_eq!(key1, key2);
        assert!(key1.starts_with("syllabus:verdict:"));
        assert!(key1.contains(&id.to_string()));
    }

    #[test]
    fn test_document_keys() {
        assert_eq!(document_key(Collection::Users, "u1"), "syllabus:users:u1");
        assert_eq!(index_key(Collection::Questions), "syllabus:questions:index");
    }
}
