// Result recording
//
// Appends a graded answer to `test_results[test_id].answers` and rewrites the
// user document. The typed map is persisted whole, so nested changes never
// need to be flagged to the store.

use syllabus_common::error::{ServiceError, ServiceResult};
use syllabus_common::store::Documents;
use syllabus_common::types::{now_millis, AnswerResult, User, UserView};
use tracing::info;

pub async fn record_result(
    docs: &Documents,
    test_id: &str,
    user_id: &str,
    result: AnswerResult,
) -> ServiceResult<UserView> {
    let question_id = result.id.clone();

    let user = docs
        .update::<User, _>(user_id, |user| {
            user.push_result(test_id, result);
            user.updated_at = Some(now_millis());
        })
        .await?
        .ok_or_else(|| ServiceError::UserNotFound(user_id.to_string()))?;

    let answers = user
        .test_results
        .get(test_id)
        .map(|record| record.answers.len())
        .unwrap_or(0);
    info!(
        user_id = %user_id,
        test_id = %test_id,
        question_id = %question_id,
        answers,
        "Answer recorded"
    );

    Ok(user.view())
}
