// Run job execution: one sandbox run per test case, stop at the first failure
use crate::checker::{check_case, CaseStatus, Verdict};
use crate::engine::Sandbox;
use syllabus_common::types::{now_millis, RunJob, RunReply};
use tracing::{debug, info, warn};

pub async fn execute_job(job: &RunJob, sandbox: &dyn Sandbox) -> RunReply {
    if job.is_expired(now_millis()) {
        warn!(job_id = %job.id, "Job expired before execution");
        return rejected("job expired before execution");
    }
    if job.test_cases.is_empty() {
        return rejected("no test cases");
    }

    let mut verdict = Verdict::Accepted;
    for (idx, test_case) in job.test_cases.iter().enumerate() {
        let output = match sandbox
            .execute(&job.language, &job.source_code, &test_case.input, job.timeout_ms)
            .await
        {
            Ok(output) => output,
            Err(e) => {
                warn!(job_id = %job.id, test_num = idx + 1, error = %e, "Execution failed");
                return rejected(&e.to_string());
            }
        };

        let status = check_case(&output, test_case);
        debug!(
            job_id = %job.id,
            test_num = idx + 1,
            status = ?status,
            execution_ms = output.execution_time_ms,
            "Test case checked"
        );
        if status != CaseStatus::Passed {
            if let Some(stderr) = output.diagnostics() {
                info!(job_id = %job.id, test_num = idx + 1, stderr = %stderr, "Submission diagnostics");
            }
        }

        if let Some(terminal) = status.terminal_verdict() {
            verdict = terminal;
            break;
        }
    }

    info!(job_id = %job.id, verdict = ?verdict, "Job finished");
    match verdict.payload() {
        Some(payload) => RunReply::Verdict {
            payload: payload.to_string(),
        },
        None => rejected("timeout"),
    }
}

fn rejected(reason: &str) -> RunReply {
    RunReply::Rejected {
        reason: reason.to_string(),
    }
}
