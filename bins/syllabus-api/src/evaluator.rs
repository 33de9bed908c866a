/// Answer Evaluator - Grades One Submitted Answer
///
/// **Core Responsibility:**
/// Turn a question plus a submitted answer into an `AnswerResult`.
///
/// **Critical Properties:**
/// - Knows nothing about Redis or documents
/// - Never persists anything; recording is the recorder's job
/// - Dispatches on the question variant, not on a type string
///
/// **Grading Rules:**
/// - Multiple choice: exact equality with `multiAnswer`, no normalization.
///   Only a JSON string can match; `1` never equals `"1"`.
/// - Code: the runner's verdict string must decode to a JSON boolean.
///   Runner rejection, transport failure, deadline expiry or a malformed
///   verdict are all `RunnerFailure`.

use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use syllabus_common::error::{ServiceError, ServiceResult};
use syllabus_common::types::{AnswerResult, CodeSpec, Question, QuestionKind, QuestionType, SubmittedAnswer};
use tracing::{debug, warn};

use crate::metrics;
use crate::runner::{verdict_deadline, CodeRunner, RunnerError};

#[derive(Clone)]
pub struct Evaluator {
    runner: Arc<dyn CodeRunner>,
    grace: Duration,
}

impl Evaluator {
    /// `grace` is added to the question's own execution budget when waiting for a verdict
    pub fn new(runner: Arc<dyn CodeRunner>, grace: Duration) -> Self {
        Self { runner, grace }
    }

    pub async fn evaluate(
        &self,
        question: &Question,
        submitted: &SubmittedAnswer,
    ) -> ServiceResult<AnswerResult> {
        match &question.kind {
            QuestionKind::MultipleChoice { multi_answer, .. } => Ok(grade_multiple_choice(
                &question.id,
                multi_answer,
                &submitted.answer,
            )),
            QuestionKind::Code(spec) => self.grade_code(&question.id, spec, &submitted.answer).await,
        }
    }

    async fn grade_code(
        &self,
        question_id: &str,
        spec: &CodeSpec,
        actual: &Value,
    ) -> ServiceResult<AnswerResult> {
        let source_code = actual.as_str().ok_or_else(|| {
            ServiceError::Validation("Code answers must be submitted as a string.".to_string())
        })?;

        let deadline = verdict_deadline(spec, self.grace);
        let start = Instant::now();
        let outcome = tokio::time::timeout(deadline, self.runner.run(spec, source_code)).await;
        metrics::RUNNER_DURATION_SECONDS.observe(start.elapsed().as_secs_f64());

        let payload = match outcome {
            Ok(Ok(payload)) => payload,
            Ok(Err(e)) => {
                warn!(question_id = %question_id, error = %e, "Code runner failed");
                return Err(ServiceError::RunnerFailure(e.to_string()));
            }
            Err(_) => {
                warn!(
                    question_id = %question_id,
                    deadline_ms = deadline.as_millis() as u64,
                    "Code runner exceeded deadline"
                );
                return Err(ServiceError::RunnerFailure(RunnerError::Timeout.to_string()));
            }
        };

        let correct = parse_verdict(&payload)?;
        debug!(question_id = %question_id, correct, "Code answer graded");

        Ok(AnswerResult {
            id: question_id.to_string(),
            kind: QuestionType::Code,
            expected: None,
            actual: actual.clone(),
            correct,
        })
    }
}

/// Grade a multiple-choice answer by exact comparison
pub fn grade_multiple_choice(question_id: &str, expected: &str, actual: &Value) -> AnswerResult {
    let correct = matches!(actual, Value::String(answer) if answer == expected);

    AnswerResult {
        id: question_id.to_string(),
        kind: QuestionType::MultipleChoice,
        expected: Some(expected.to_string()),
        actual: actual.clone(),
        correct,
    }
}

/// Decode a runner verdict, e.g. `"true"` or `" false\n"`
pub fn parse_verdict(payload: &str) -> ServiceResult<bool> {
    serde_json::from_str::<bool>(payload.trim()).map_err(|_| {
        ServiceError::RunnerFailure(format!("malformed verdict: {:?}", payload))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::mock::MockRunner;
    use serde_json::json;
    use syllabus_common::types::{Language, TestCase};

    fn multiple_choice(answer: &str) -> Question {
        Question {
            id: "Q1".to_string(),
            title: "Pick one".to_string(),
            prompt: String::new(),
            kind: QuestionKind::MultipleChoice {
                multi_answer: answer.to_string(),
                options: vec!["A".into(), "B".into()],
            },
            tests: vec![],
            created_at: 0,
        }
    }

    fn code_question() -> Question {
        Question {
            id: "Q2".to_string(),
            title: "Double it".to_string(),
            prompt: String::new(),
            kind: QuestionKind::Code(CodeSpec {
                language: Language::Python,
                test_cases: vec![TestCase {
                    input: "2".into(),
                    expected_output: "4".into(),
                }],
                timeout_ms: 1000,
            }),
            tests: vec![],
            created_at: 0,
        }
    }

    fn submission(question_id: &str, answer: Value) -> SubmittedAnswer {
        SubmittedAnswer {
            question_id: question_id.to_string(),
            answer,
        }
    }

    fn evaluator(runner: Arc<MockRunner>) -> Evaluator {
        Evaluator::new(runner, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_multiple_choice_correct() {
        let runner = Arc::new(MockRunner::verdict("true"));
        let result = evaluator(runner.clone())
            .evaluate(&multiple_choice("B"), &submission("Q1", json!("B")))
            .await
            .unwrap();

        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "id": "Q1",
                "type": "multiple choice",
                "expected": "B",
                "actual": "B",
                "correct": true
            })
        );
        assert_eq!(runner.call_count(), 0);
    }

    #[tokio::test]
    async fn test_multiple_choice_incorrect() {
        let runner = Arc::new(MockRunner::verdict("true"));
        let result = evaluator(runner)
            .evaluate(&multiple_choice("B"), &submission("Q1", json!("A")))
            .await
            .unwrap();

        assert!(!result.correct);
        assert_eq!(result.expected.as_deref(), Some("B"));
        assert_eq!(result.actual, json!("A"));
    }

    #[test]
    fn test_multiple_choice_is_exact() {
        assert!(!grade_multiple_choice("Q", "B", &json!("b")).correct);
        assert!(!grade_multiple_choice("Q", "B", &json!(" B")).correct);
        assert!(!grade_multiple_choice("Q", "1", &json!(1)).correct);
        assert!(!grade_multiple_choice("Q", "B", &Value::Null).correct);
        assert!(grade_multiple_choice("Q", "", &json!("")).correct);
    }

    #[tokio::test]
    async fn test_code_verdict_true() {
        let runner = Arc::new(MockRunner::verdict("true"));
        let result = evaluator(runner.clone())
            .evaluate(&code_question(), &submission("Q2", json!("print(int(input())*2)")))
            .await
            .unwrap();

        assert!(result.correct);
        assert_eq!(result.kind, QuestionType::Code);
        assert!(result.expected.is_none());
        assert_eq!(result.actual, json!("print(int(input())*2)"));
        assert_eq!(runner.call_count(), 1);
    }

    #[tokio::test]
    async fn test_code_verdict_false() {
        let runner = Arc::new(MockRunner::verdict("false\n"));
        let result = evaluator(runner)
            .evaluate(&code_question(), &submission("Q2", json!("print(0)")))
            .await
            .unwrap();

        assert!(!result.correct);
    }

    #[tokio::test]
    async fn test_code_runner_rejection_is_runner_failure() {
        let runner = Arc::new(MockRunner::rejecting("timeout"));
        let err = evaluator(runner)
            .evaluate(&code_question(), &submission("Q2", json!("while True: pass")))
            .await
            .unwrap_err();

        match err {
            ServiceError::RunnerFailure(msg) => assert_eq!(msg, "timeout"),
            other => panic!("expected RunnerFailure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_code_malformed_verdict() {
        let runner = Arc::new(MockRunner::verdict("passed"));
        let err = evaluator(runner)
            .evaluate(&code_question(), &submission("Q2", json!("print(4)")))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "runner_failure");
    }

    #[tokio::test]
    async fn test_code_answer_must_be_string() {
        let runner = Arc::new(MockRunner::verdict("true"));
        let err = evaluator(runner.clone())
            .evaluate(&code_question(), &submission("Q2", json!({ "code": "x" })))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "validation");
        assert_eq!(runner.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_runner_hits_deadline() {
        let runner = Arc::new(MockRunner::hanging());
        let err = evaluator(runner)
            .evaluate(&code_question(), &submission("Q2", json!("print(4)")))
            .await
            .unwrap_err();

        match err {
            ServiceError::RunnerFailure(msg) => assert_eq!(msg, "timeout"),
            other => panic!("expected RunnerFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_verdict() {
        assert!(parse_verdict("true").unwrap());
        assert!(!parse_verdict(" false ").unwrap());
        assert!(parse_verdict("\"true\"").is_err());
        assert!(parse_verdict("1").is_err());
        assert!(parse_verdict("").is_err());
    }
}
