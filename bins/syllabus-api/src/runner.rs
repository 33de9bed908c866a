// Code runner client
//
// The API never executes submissions itself. A run job is queued for the
// language-specific worker and the verdict is picked up from Redis once the
// worker publishes it. Deadlines are enforced by the caller.

use async_trait::async_trait;
use std::time::Duration;
use syllabus_common::redis;
use syllabus_common::types::{now_millis, CodeSpec, RunJob, RunReply};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RunnerError {
    /// The runner refused or failed to execute the submission
    #[error("{0}")]
    Rejected(String),

    #[error("timeout")]
    Timeout,

    #[error("runner transport error: {0}")]
    Transport(#[from] ::redis::RedisError),
}

/// Executes a submission against a code question's checker.
/// Resolves to a JSON-encoded boolean verdict.
#[async_trait]
pub trait CodeRunner: Send + Sync {
    async fn run(&self, spec: &CodeSpec, source_code: &str) -> Result<String, RunnerError>;
}

/// Runner backed by the Redis job queue and the worker fleet
pub struct QueueRunner {
    conn: ::redis::aio::ConnectionManager,
    poll_interval: Duration,
    grace: Duration,
}

impl QueueRunner {
    pub fn new(conn: ::redis::aio::ConnectionManager, poll_interval: Duration, grace: Duration) -> Self {
        Self {
            conn,
            poll_interval,
            grace,
        }
    }
}

/// Upper bound on how long a verdict for `spec` may take
pub fn verdict_deadline(spec: &CodeSpec, grace: Duration) -> Duration {
    let cases = spec.test_cases.len().max(1) as u64;
    Duration::from_millis(spec.timeout_ms.saturating_mul(cases)).saturating_add(grace)
}

/// Epoch millis after which a job queued at `now_ms` is abandoned
pub fn expiry(now_ms: i64, deadline: Duration) -> i64 {
    let deadline_ms = i64::try_from(deadline.as_millis()).unwrap_or(i64::MAX);
    now_ms.saturating_add(deadline_ms)
}

#[async_trait]
impl CodeRunner for QueueRunner {
    async fn run(&self, spec: &CodeSpec, source_code: &str) -> Result<String, RunnerError> {
        let deadline = verdict_deadline(spec, self.grace);
        let job = RunJob {
            id: Uuid::new_v4(),
            language: spec.language,
            source_code: source_code.to_string(),
            test_cases: spec.test_cases.clone(),
            timeout_ms: spec.timeout_ms,
            expires_at: expiry(now_millis(), deadline),
        };

        let mut conn = self.conn.clone();
        redis::push_job(&mut conn, &job).await?;
        info!(
            job_id = %job.id,
            language = %job.language,
            test_cases = job.test_cases.len(),
            "Run job queued"
        );

        loop {
            match redis::take_reply(&mut conn, &job.id).await? {
                Some(RunReply::Verdict { payload }) => {
                    debug!(job_id = %job.id, payload = %payload, "Verdict received");
                    return Ok(payload);
                }
                Some(RunReply::Rejected { reason }) => {
                    debug!(job_id = %job.id, reason = %reason, "Run rejected");
                    return Err(RunnerError::Rejected(reason));
                }
                None => tokio::time::sleep(self.poll_interval).await,
            }
        }
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    enum Behaviour {
        Verdict(String),
        Reject(String),
        Hang,
    }

    /// Scripted runner for tests
    pub struct MockRunner {
        behaviour: Behaviour,
        calls: AtomicU32,
    }

    impl MockRunner {
        pub fn verdict(payload: &str) -> Self {
            Self::with(Behaviour::Verdict(payload.to_string()))
        }

        pub fn rejecting(reason: &str) -> Self {
            Self::with(Behaviour::Reject(reason.to_string()))
        }

        /// Never answers
        pub fn hanging() -> Self {
            Self::with(Behaviour::Hang)
        }

        fn with(behaviour: Behaviour) -> Self {
            Self {
                behaviour,
                calls: AtomicU32::new(0),
            }
        }

        pub fn call_count(&self) -> u32 {
            self.calls.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl CodeRunner for MockRunner {
        async fn run(&self, _spec: &CodeSpec, _source_code: &str) -> Result<String, RunnerError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            match &self.behaviour {
                Behaviour::Verdict(payload) => Ok(payload.clone()),
                Behaviour::Reject(reason) => Err(RunnerError::Rejected(reason.clone())),
                Behaviour::Hang => std::future::pending().await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syllabus_common::types::{Language, TestCase};

    fn spec(cases: usize, timeout_ms: u64) -> CodeSpec {
        CodeSpec {
            language: Language::Python,
            test_cases: (0..cases)
                .map(|i| TestCase {
                    input: i.to_string(),
                    expected_output: i.to_string(),
                })
                .collect(),
            timeout_ms,
        }
    }

    #[test]
    fn test_deadline_scales_with_test_cases() {
        let grace = Duration::from_secs(10);
        assert_eq!(verdict_deadline(&spec(3, 1000), grace), Duration::from_secs(13));
    }

    #[test]
    fn test_deadline_without_test_cases_still_covers_one_run() {
        let grace = Duration::from_millis(500);
        assert_eq!(verdict_deadline(&spec(0, 2000), grace), Duration::from_millis(2500));
    }

    #[test]
    fn test_expiry_never_wraps() {
        assert_eq!(expiry(1_000, Duration::from_millis(500)), 1_500);

        let huge = verdict_deadline(&spec(3, u64::MAX), Duration::from_secs(10));
        assert_eq!(expiry(1_000, huge), i64::MAX);
        assert_eq!(expiry(1_000, Duration::MAX), i64::MAX);
    }

    #[test]
    fn test_runner_error_messages() {
        assert_eq!(RunnerError::Timeout.to_string(), "timeout");
        assert_eq!(RunnerError::Rejected("compile error".into()).to_string(), "compile error");
    }
}
