// Create/read operations for the documents the grading pipeline works on

use serde::Deserialize;
use syllabus_common::error::{ServiceError, ServiceResult};
use syllabus_common::store::Documents;
use syllabus_common::types::{
    new_id, now_millis, Course, Question, QuestionKind, User, UserView, MAX_TIMEOUT_MS,
};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct NewQuestion {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: Option<String>,
    #[serde(rename = "firstName")]
    pub first_name: Option<String>,
    #[serde(rename = "lastName")]
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCourse {
    #[serde(default)]
    pub title: String,
}

pub async fn create_question(docs: &Documents, new: NewQuestion) -> ServiceResult<Question> {
    if let QuestionKind::Code(spec) = &new.kind {
        if !(1..=MAX_TIMEOUT_MS).contains(&spec.timeout_ms) {
            return Err(ServiceError::Validation(format!(
                "timeoutMs must be between 1 and {}.",
                MAX_TIMEOUT_MS
            )));
        }
    }

    let question = Question {
        id: new_id(),
        title: new.title,
        prompt: new.prompt,
        kind: new.kind,
        tests: Vec::new(),
        created_at: now_millis(),
    };
    docs.insert(&question).await?;

    info!(
        question_id = %question.id,
        question_type = %question.kind.question_type(),
        "Question created"
    );
    Ok(question)
}

pub async fn list_questions(docs: &Documents) -> ServiceResult<Vec<Question>> {
    Ok(docs.list::<Question>().await?)
}

pub async fn get_question(docs: &Documents, question_id: &str) -> ServiceResult<Question> {
    docs.find_one::<Question>(question_id)
        .await?
        .ok_or_else(|| ServiceError::QuestionNotFound(question_id.to_string()))
}

pub async fn create_user(docs: &Documents, new: NewUser) -> ServiceResult<UserView> {
    let email = new
        .email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ServiceError::Validation("Missing email param.".to_string()))?;

    let user = User {
        id: new_id(),
        email,
        first_name: new.first_name,
        last_name: new.last_name,
        password: None,
        tests: Vec::new(),
        test_results: Default::default(),
        created_at: now_millis(),
        updated_at: None,
    };
    docs.insert(&user).await?;

    info!(user_id = %user.id, "User created");
    Ok(user.view())
}

pub async fn get_user(docs: &Documents, user_id: &str) -> ServiceResult<UserView> {
    docs.find_one::<User>(user_id)
        .await?
        .map(|user| user.view())
        .ok_or_else(|| ServiceError::UserNotFound(user_id.to_string()))
}

pub async fn create_course(docs: &Documents, new: NewCourse) -> ServiceResult<Course> {
    let course = Course {
        id: new_id(),
        title: new.title,
        tests: Vec::new(),
        created_at: now_millis(),
    };
    docs.insert(&course).await?;

    info!(course_id = %course.id, "Course created");
    Ok(course)
}

pub async fn get_course(docs: &Documents, course_id: &str) -> ServiceResult<Course> {
    docs.find_one::<Course>(course_id)
        .await?
        .ok_or_else(|| ServiceError::CourseNotFound(course_id.to_string()))
}
