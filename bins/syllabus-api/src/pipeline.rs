// Evaluation pipeline behind POST /v1/test/:id/evaluate
//
// Resolve test -> resolve question -> grade -> record. Recording only happens
// once grading has fully succeeded, so a failed evaluation never leaves a
// partial result on the user.

use serde::{Deserialize, Serialize};
use syllabus_common::error::{ServiceError, ServiceResult};
use syllabus_common::store::Documents;
use syllabus_common::types::{AnswerResult, Question, SubmittedAnswer, Test, UserView};
use tracing::{info, instrument, warn};

use crate::evaluator::Evaluator;
use crate::metrics;
use crate::recorder;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateRequest {
    pub user_id: Option<String>,
    pub answer: Option<SubmittedAnswer>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub user: UserView,
    pub result: AnswerResult,
}

#[instrument(skip(docs, evaluator, request), fields(test_id = %test_id))]
pub async fn evaluate_submission(
    docs: &Documents,
    evaluator: &Evaluator,
    test_id: &str,
    request: EvaluateRequest,
) -> ServiceResult<Evaluation> {
    let mut question_type = "unknown".to_string();
    let outcome = run(docs, evaluator, test_id, request, &mut question_type).await;

    match &outcome {
        Ok(evaluation) => {
            let label = if evaluation.result.correct { "correct" } else { "incorrect" };
            metrics::record_evaluation(&question_type, label);
            info!(
                user_id = %evaluation.user.id,
                question_id = %evaluation.result.id,
                correct = evaluation.result.correct,
                "Evaluation completed"
            );
        }
        Err(e) => {
            metrics::record_evaluation(&question_type, e.kind());
            warn!(error = %e, "Evaluation failed");
        }
    }

    outcome
}

async fn run(
    docs: &Documents,
    evaluator: &Evaluator,
    test_id: &str,
    request: EvaluateRequest,
    question_type: &mut String,
) -> ServiceResult<Evaluation> {
    let user_id = request
        .user_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ServiceError::Validation("Missing userId param.".to_string()))?;
    let answer = request
        .answer
        .ok_or_else(|| ServiceError::Validation("Missing answer param.".to_string()))?;

    docs.find_one::<Test>(test_id)
        .await?
        .ok_or_else(|| ServiceError::TestNotFound(test_id.to_string()))?;

    let question = docs
        .find_one::<Question>(&answer.question_id)
        .await?
        .ok_or_else(|| ServiceError::QuestionNotFound(answer.question_id.clone()))?;
    *question_type = question.kind.question_type().to_string();

    let result = evaluator.evaluate(&question, &answer).await?;
    let user = recorder::record_result(docs, test_id, &user_id, result.clone()).await?;

    Ok(Evaluation { user, result })
}
