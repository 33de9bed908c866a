// HTTP route handlers for the Syllabus API
//
// Every failure is answered with 400 and `{ "error": "..." }`.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use syllabus_common::error::ServiceError;
use tracing::{error, warn};

use crate::catalog::{self, NewCourse, NewQuestion, NewUser};
use crate::metrics;
use crate::pipeline::{self, EvaluateRequest};
use crate::relations::{self, CreateTestRequest, TestPatch};
use crate::AppState;

pub struct ApiError(ServiceError);

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self.0 {
            ServiceError::Persistence(e) => error!(error = %e, "Store failure"),
            other => warn!(kind = other.kind(), error = %other, "Request failed"),
        }
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": self.0.public_message() })),
        )
            .into_response()
    }
}

type ApiResult = Result<Response, ApiError>;

/// Unwrap a JSON body, turning extractor rejections into validation errors
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError(ServiceError::Validation(rejection.body_text())))
}

fn ok(value: serde_json::Value) -> ApiResult {
    Ok((StatusCode::OK, Json(value)).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRef {
    pub question_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub user_id: Option<String>,
}

fn required(value: Option<String>, name: &str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError(ServiceError::Validation(format!("Missing {} param.", name))))
}

/// GET /status - Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /metrics - Prometheus exposition
pub async fn metrics_handler() -> Response {
    match metrics::render() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// POST /v1/test/:id/evaluate - Grade one answer and record it
pub async fn evaluate(
    State(state): State<Arc<AppState>>,
    Path(test_id): Path<String>,
    payload: Result<Json<EvaluateRequest>, JsonRejection>,
) -> ApiResult {
    let request = body(payload)?;
    let evaluation =
        pipeline::evaluate_submission(&state.docs, &state.evaluator, &test_id, request).await?;
    Ok((StatusCode::OK, Json(evaluation)).into_response())
}

/// POST /v1/test
pub async fn create_test(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateTestRequest>, JsonRejection>,
) -> ApiResult {
    let test = relations::create_test(&state.docs, body(payload)?).await?;
    ok(json!({ "test": test }))
}

/// GET /v1/test
pub async fn list_tests(State(state): State<Arc<AppState>>) -> ApiResult {
    let tests = relations::list_tests(&state.docs).await?;
    ok(json!({ "tests": tests }))
}

/// GET /v1/test/:id
pub async fn get_test(
    State(state): State<Arc<AppState>>,
    Path(test_id): Path<String>,
) -> ApiResult {
    let test = relations::get_test(&state.docs, &test_id).await?;
    ok(json!({ "test": test }))
}

/// PUT /v1/test/:id
pub async fn update_test(
    State(state): State<Arc<AppState>>,
    Path(test_id): Path<String>,
    payload: Result<Json<TestPatch>, JsonRejection>,
) -> ApiResult {
    let test = relations::update_test(&state.docs, &test_id, body(payload)?).await?;
    ok(json!({ "test": test }))
}

/// DELETE /v1/test/:id
pub async fn remove_test(
    State(state): State<Arc<AppState>>,
    Path(test_id): Path<String>,
) -> ApiResult {
    relations::remove_test(&state.docs, &test_id).await?;
    ok(json!({ "success": true }))
}

/// POST /v1/test/:id/question
pub async fn add_question(
    State(state): State<Arc<AppState>>,
    Path(test_id): Path<String>,
    payload: Result<Json<QuestionRef>, JsonRejection>,
) -> ApiResult {
    let question_id = required(body(payload)?.question_id, "questionId")?;
    let test = relations::add_question(&state.docs, &test_id, &question_id).await?;
    ok(json!({ "test": test }))
}

/// DELETE /v1/test/:id/question/:question_id
pub async fn remove_question(
    State(state): State<Arc<AppState>>,
    Path((test_id, question_id)): Path<(String, String)>,
) -> ApiResult {
    let test = relations::remove_question(&state.docs, &test_id, &question_id).await?;
    ok(json!({ "test": test }))
}

/// POST /v1/test/:id/user
pub async fn add_user(
    State(state): State<Arc<AppState>>,
    Path(test_id): Path<String>,
    payload: Result<Json<UserRef>, JsonRejection>,
) -> ApiResult {
    let user_id = required(body(payload)?.user_id, "userId")?;
    let test = relations::add_user(&state.docs, &test_id, &user_id).await?;
    ok(json!({ "test": test }))
}

/// GET /v1/classroom/:id/tests
pub async fn classroom_tests(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<String>,
) -> ApiResult {
    let tests = relations::tests_for_classroom(&state.docs, &course_id).await?;
    ok(json!({ "tests": tests }))
}

/// POST /v1/question
pub async fn create_question(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewQuestion>, JsonRejection>,
) -> ApiResult {
    let question = catalog::create_question(&state.docs, body(payload)?).await?;
    ok(json!({ "question": question }))
}

/// GET /v1/question
pub async fn list_questions(State(state): State<Arc<AppState>>) -> ApiResult {
    let questions = catalog::list_questions(&state.docs).await?;
    ok(json!({ "questions": questions }))
}

/// GET /v1/question/:id
pub async fn get_question(
    State(state): State<Arc<AppState>>,
    Path(question_id): Path<String>,
) -> ApiResult {
    let question = catalog::get_question(&state.docs, &question_id).await?;
    ok(json!({ "question": question }))
}

/// DELETE /v1/question/:id
pub async fn remove_question_document(
    State(state): State<Arc<AppState>>,
    Path(question_id): Path<String>,
) -> ApiResult {
    relations::remove_question_document(&state.docs, &question_id).await?;
    ok(json!({ "success": true }))
}

/// POST /v1/user
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> ApiResult {
    let user = catalog::create_user(&state.docs, body(payload)?).await?;
    ok(json!({ "user": user }))
}

/// GET /v1/user/:id
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> ApiResult {
    let user = catalog::get_user(&state.docs, &user_id).await?;
    ok(json!({ "user": user }))
}

/// POST /v1/course
pub async fn create_course(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewCourse>, JsonRejection>,
) -> ApiResult {
    let course = catalog::create_course(&state.docs, body(payload)?).await?;
    ok(json!({ "course": course }))
}

/// GET /v1/course/:id
pub async fn get_course(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<String>,
) -> ApiResult {
    let course = catalog::get_course(&state.docs, &course_id).await?;
    ok(json!({ "course": course }))
}
