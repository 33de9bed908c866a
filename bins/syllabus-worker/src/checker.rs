/// Output Checker - Language-Agnostic Verdict Logic
///
/// **Core Responsibility:**
/// Compare raw execution outputs against expected outputs and decide the
/// verdict for a run job.
///
/// **Critical Properties:**
/// - Knows nothing about Docker
/// - Knows nothing about Redis
/// - Pure function: (execution output, expected output) → case status
///
/// **Verdict Rules:**
/// - Every case passed → "true"
/// - A runtime error or an output mismatch → "false"
/// - An execution timeout → the job is rejected, no verdict
///
/// **Normalization Rules:**
/// - Leading and trailing whitespace trimmed (covers \n vs \r\n at the ends)
/// - Internal whitespace and case are significant

use syllabus_common::types::TestCase;

/// Raw output of one execution, produced by the sandbox
#[derive(Debug, Clone, Default)]
pub struct ExecutionOutput {
    pub stdout: String,
    pub stderr: String,
    pub execution_time_ms: u64,
    pub timed_out: bool,
    pub runtime_error: bool,
}

impl ExecutionOutput {
    /// Trimmed stderr, if the run wrote any
    pub fn diagnostics(&self) -> Option<&str> {
        let stderr = self.stderr.trim();
        (!stderr.is_empty()).then_some(stderr)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseStatus {
    Passed,
    WrongAnswer,
    RuntimeError,
    TimeLimitExceeded,
}

/// Final outcome of a job once every case has been checked (or one failed)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Failed,
    TimedOut,
}

impl Verdict {
    /// Wire payload for a decided verdict; `None` when the job must be rejected
    pub fn payload(&self) -> Option<&'static str> {
        match self {
            Verdict::Accepted => Some("true"),
            Verdict::Failed => Some("false"),
            Verdict::TimedOut => None,
        }
    }
}

pub fn normalize_output(output: &str) -> &str {
    output.trim()
}

/// Classify a single execution. Timeouts win over runtime errors since a
/// killed container also reports a non-zero exit.
pub fn check_case(output: &ExecutionOutput, test_case: &TestCase) -> CaseStatus {
    if output.timed_out {
        CaseStatus::TimeLimitExceeded
    } else if output.runtime_error {
        CaseStatus::RuntimeError
    } else if normalize_output(&output.stdout) == normalize_output(&test_case.expected_output) {
        CaseStatus::Passed
    } else {
        CaseStatus::WrongAnswer
    }
}

impl CaseStatus {
    /// Verdict this status forces on the whole job, if any
    pub fn terminal_verdict(self) -> Option<Verdict> {
        match self {
            CaseStatus::Passed => None,
            CaseStatus::WrongAnswer | CaseStatus::RuntimeError => Some(Verdict::Failed),
            CaseStatus::TimeLimitExceeded => Some(Verdict::TimedOut),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(expected: &str) -> TestCase {
        TestCase {
            input: String::new(),
            expected_output: expected.to_string(),
        }
    }

    fn output(stdout: &str) -> ExecutionOutput {
        ExecutionOutput {
            stdout: stdout.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_exact_match_passes() {
        assert_eq!(check_case(&output("42"), &case("42")), CaseStatus::Passed);
    }

    #[test]
    fn test_surrounding_whitespace_is_ignored() {
        assert_eq!(check_case(&output("  42\r\n"), &case("42\n")), CaseStatus::Passed);
    }

    #[test]
    fn test_internal_whitespace_and_case_matter() {
        assert_eq!(check_case(&output("4 2"), &case("42")), CaseStatus::WrongAnswer);
        assert_eq!(check_case(&output("Yes"), &case("yes")), CaseStatus::WrongAnswer);
    }

    #[test]
    fn test_runtime_error_beats_matching_output() {
        let out = ExecutionOutput {
            runtime_error: true,
            ..output("42")
        };
        assert_eq!(check_case(&out, &case("42")), CaseStatus::RuntimeError);
    }

    #[test]
    fn test_timeout_beats_runtime_error() {
        let out = ExecutionOutput {
            timed_out: true,
            runtime_error: true,
            ..Default::default()
        };
        assert_eq!(check_case(&out, &case("42")), CaseStatus::TimeLimitExceeded);
    }

    #[test]
    fn test_diagnostics_come_from_stderr() {
        assert_eq!(output("42").diagnostics(), None);

        let out = ExecutionOutput {
            stderr: "Traceback (most recent call last):\n  ZeroDivisionError\n".into(),
            runtime_error: true,
            ..Default::default()
        };
        assert_eq!(
            out.diagnostics(),
            Some("Traceback (most recent call last):\n  ZeroDivisionError")
        );
    }

    #[test]
    fn test_terminal_verdicts() {
        assert_eq!(CaseStatus::Passed.terminal_verdict(), None);
        assert_eq!(CaseStatus::WrongAnswer.terminal_verdict(), Some(Verdict::Failed));
        assert_eq!(CaseStatus::RuntimeError.terminal_verdict(), Some(Verdict::Failed));
        assert_eq!(CaseStatus::TimeLimitExceeded.terminal_verdict(), Some(Verdict::TimedOut));

        assert_eq!(Verdict::Accepted.payload(), Some("true"));
        assert_eq!(Verdict::Failed.payload(), Some("false"));
        assert_eq!(Verdict::TimedOut.payload(), None);
    }
}
