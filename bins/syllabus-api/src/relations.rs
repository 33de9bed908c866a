// Test operations and the id cascades that keep tests, questions, courses
// and users pointing at each other.

use serde::{Deserialize, Serialize};
use syllabus_common::error::{ServiceError, ServiceResult};
use syllabus_common::store::{add_to_set, pull_id, push_id, Documents};
use syllabus_common::types::{new_id, now_millis, Course, Question, Test, User, UserSummary};
use tracing::{info, warn};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTest {
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub questions: Vec<String>,
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTestRequest {
    pub data: Option<NewTest>,
    pub course_id: Option<String>,
}

/// Fields of a test a client may overwrite. Ids and relations owned by
/// cascades (users, course) are not patchable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub questions: Option<Vec<String>>,
}

/// A test with its relations resolved to documents
#[derive(Debug, Clone, Serialize)]
pub struct TestView<Q, U> {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub questions: Vec<Q>,
    pub users: Vec<U>,
    pub course: Option<String>,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

fn view<Q, U>(test: Test, questions: Vec<Q>, users: Vec<U>) -> TestView<Q, U> {
    TestView {
        id: test.id,
        title: test.title,
        description: test.description,
        questions,
        users,
        course: test.course,
        created_at: test.created_at,
        created_by: test.created_by,
    }
}

/// Test with its questions populated
pub type PopulatedTest = TestView<Question, String>;

/// Test with its roster populated
pub type ClassroomTest = TestView<String, UserSummary>;

async fn populate_questions(docs: &Documents, test: Test) -> ServiceResult<PopulatedTest> {
    let questions = docs.find_many::<Question>(&test.questions).await?;
    let users = test.users.clone();
    Ok(view(test, questions, users))
}

async fn require_test(docs: &Documents, test_id: &str) -> ServiceResult<Test> {
    docs.find_one::<Test>(test_id)
        .await?
        .ok_or_else(|| ServiceError::TestNotFound(test_id.to_string()))
}

pub async fn create_test(docs: &Documents, request: CreateTestRequest) -> ServiceResult<Test> {
    let course_id = request
        .course_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ServiceError::Validation("Missing courseId param.".to_string()))?;
    let data = request.data.unwrap_or_default();

    let test = Test {
        id: new_id(),
        title: data.title,
        description: data.description,
        questions: data.questions,
        users: Vec::new(),
        course: Some(course_id.clone()),
        created_at: now_millis(),
        created_by: data.created_by,
    };
    docs.insert(&test).await?;

    let course = docs
        .update::<Course, _>(&course_id, |course| push_id(&mut course.tests, &test.id))
        .await?;
    if course.is_none() {
        warn!(test_id = %test.id, course_id = %course_id, "Course not found, no backlink written");
    }

    for question_id in &test.questions {
        docs.update::<Question, _>(question_id, |question| add_to_set(&mut question.tests, &test.id))
            .await?;
    }

    info!(test_id = %test.id, course_id = %course_id, "Test created");
    Ok(test)
}

pub async fn list_tests(docs: &Documents) -> ServiceResult<Vec<Test>> {
    Ok(docs.list::<Test>().await?)
}

pub async fn get_test(docs: &Documents, test_id: &str) -> ServiceResult<PopulatedTest> {
    let test = require_test(docs, test_id).await?;
    populate_questions(docs, test).await
}

/// Tests belonging to a course, with each enrolled user's results
pub async fn tests_for_classroom(docs: &Documents, course_id: &str) -> ServiceResult<Vec<ClassroomTest>> {
    let tests = docs.list::<Test>().await?;

    let mut populated = Vec::new();
    for test in tests
        .into_iter()
        .filter(|t| t.course.as_deref() == Some(course_id))
    {
        let users: Vec<UserSummary> = docs
            .find_many::<User>(&test.users)
            .await?
            .iter()
            .map(User::summary)
            .collect();
        let questions = test.questions.clone();
        populated.push(view(test, questions, users));
    }
    Ok(populated)
}

pub async fn update_test(docs: &Documents, test_id: &str, patch: TestPatch) -> ServiceResult<Test> {
    docs.update::<Test, _>(test_id, |test| {
        if let Some(title) = patch.title {
            test.title = title;
        }
        if let Some(description) = patch.description {
            test.description = Some(description);
        }
        if let Some(questions) = patch.questions {
            test.questions = questions;
        }
    })
    .await?
    .ok_or_else(|| ServiceError::TestNotFound(test_id.to_string()))
}

pub async fn add_question(docs: &Documents, test_id: &str, question_id: &str) -> ServiceResult<PopulatedTest> {
    require_test(docs, test_id).await?;
    docs.find_one::<Question>(question_id)
        .await?
        .ok_or_else(|| ServiceError::QuestionNotFound(question_id.to_string()))?;

    let test = docs
        .update::<Test, _>(test_id, |test| push_id(&mut test.questions, question_id))
        .await?
        .ok_or_else(|| ServiceError::TestNotFound(test_id.to_string()))?;
    docs.update::<Question, _>(question_id, |question| add_to_set(&mut question.tests, test_id))
        .await?;

    info!(test_id = %test_id, question_id = %question_id, "Question added to test");
    populate_questions(docs, test).await
}

pub async fn remove_question(docs: &Documents, test_id: &str, question_id: &str) -> ServiceResult<PopulatedTest> {
    let test = docs
        .update::<Test, _>(test_id, |test| pull_id(&mut test.questions, question_id))
        .await?
        .ok_or_else(|| ServiceError::TestNotFound(test_id.to_string()))?;
    docs.update::<Question, _>(question_id, |question| pull_id(&mut question.tests, test_id))
        .await?;

    info!(test_id = %test_id, question_id = %question_id, "Question removed from test");
    populate_questions(docs, test).await
}

pub async fn add_user(docs: &Documents, test_id: &str, user_id: &str) -> ServiceResult<Test> {
    require_test(docs, test_id).await?;
    docs.find_one::<User>(user_id)
        .await?
        .ok_or_else(|| ServiceError::UserNotFound(user_id.to_string()))?;

    let test = docs
        .update::<Test, _>(test_id, |test| add_to_set(&mut test.users, user_id))
        .await?
        .ok_or_else(|| ServiceError::TestNotFound(test_id.to_string()))?;
    docs.update::<User, _>(user_id, |user| add_to_set(&mut user.tests, test_id))
        .await?;

    info!(test_id = %test_id, user_id = %user_id, "User enrolled in test");
    Ok(test)
}

pub async fn remove_test(docs: &Documents, test_id: &str) -> ServiceResult<()> {
    let test = docs
        .remove::<Test>(test_id)
        .await?
        .ok_or_else(|| ServiceError::TestNotFound(test_id.to_string()))?;

    if let Some(course_id) = &test.course {
        docs.update::<Course, _>(course_id, |course| pull_id(&mut course.tests, test_id))
            .await?;
    }
    for question_id in &test.questions {
        docs.update::<Question, _>(question_id, |question| pull_id(&mut question.tests, test_id))
            .await?;
    }

    info!(test_id = %test_id, questions = test.questions.len(), "Test removed");
    Ok(())
}

/// Delete a question and drop it from every test that listed it
pub async fn remove_question_document(docs: &Documents, question_id: &str) -> ServiceResult<Question> {
    let question = docs
        .remove::<Question>(question_id)
        .await?
        .ok_or_else(|| ServiceError::QuestionNotFound(question_id.to_string()))?;

    for test_id in &question.tests {
        docs.update::<Test, _>(test_id, |test| pull_id(&mut test.questions, question_id))
            .await?;
    }

    info!(question_id = %question_id, tests = question.tests.len(), "Question removed");
    Ok(question)
}
