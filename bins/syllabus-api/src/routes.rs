// Route table for the Syllabus API

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

use crate::handlers;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/v1/test", get(handlers::list_tests).post(handlers::create_test))
        .route(
            "/v1/test/:id",
            get(handlers::get_test)
                .put(handlers::update_test)
                .delete(handlers::remove_test),
        )
        .route("/v1/test/:id/evaluate", post(handlers::evaluate))
        .route("/v1/test/:id/question", post(handlers::add_question))
        .route(
            "/v1/test/:id/question/:question_id",
            delete(handlers::remove_question),
        )
        .route("/v1/test/:id/user", post(handlers::add_user))
        .route("/v1/classroom/:id/tests", get(handlers::classroom_tests))
        .route(
            "/v1/question",
            get(handlers::list_questions).post(handlers::create_question),
        )
        .route(
            "/v1/question/:id",
            get(handlers::get_question).delete(handlers::remove_question_document),
        )
        .route("/v1/user", post(handlers::create_user))
        .route("/v1/user/:id", get(handlers::get_user))
        .route("/v1/course", post(handlers::create_course))
        .route("/v1/course/:id", get(handlers::get_course))
}
