//! Read-only access to the admin-managed catalog.
//!
//! Snapshot queries (`list_active_*`) skip soft-deleted rows. Read-through lookups for an
//! existing attempt do not, so historical attempts keep resolving their questions.

use sqlx::PgExecutor;

use crate::db::models::{TestDefinition, TestQuestion, TestSection};

const DEFINITION_COLUMNS: &str = "\
    id, title, duration_minutes, correct_marks, negative_marks, passing_percentage, \
    is_free, is_active, shuffle_questions, deleted_at";

const SECTION_COLUMNS: &str = "id, test_definition_id, title, sequence";

const QUESTION_COLUMNS: &str = "\
    id, test_definition_id, section_id, sequence, question_text, options, right_answer, explanation";

pub(crate) async fn find_active_definition(
    executor: impl PgExecutor<'_>,
    id: &str,
) -> Result<Option<TestDefinition>, sqlx::Error> {
    sqlx::query_as::<_, TestDefinition>(&format!(
        "SELECT {DEFINITION_COLUMNS} FROM test_definitions \
         WHERE id = $1 AND is_active = TRUE AND deleted_at IS NULL"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn find_definition(
    executor: impl PgExecutor<'_>,
    id: &str,
) -> Result<Option<TestDefinition>, sqlx::Error> {
    sqlx::query_as::<_, TestDefinition>(&format!(
        "SELECT {DEFINITION_COLUMNS} FROM test_definitions WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn list_active_sections(
    executor: impl PgExecutor<'_>,
    test_definition_id: &str,
) -> Result<Vec<TestSection>, sqlx::Error> {
    sqlx::query_as::<_, TestSection>(&format!(
        "SELECT {SECTION_COLUMNS} FROM test_sections \
         WHERE test_definition_id = $1 AND deleted_at IS NULL \
         ORDER BY sequence, id"
    ))
    .bind(test_definition_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn list_active_questions(
    executor: impl PgExecutor<'_>,
    test_definition_id: &str,
) -> Result<Vec<TestQuestion>, sqlx::Error> {
    sqlx::query_as::<_, TestQuestion>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM test_questions \
         WHERE test_definition_id = $1 AND deleted_at IS NULL \
         ORDER BY sequence, id"
    ))
    .bind(test_definition_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn list_sections_by_ids(
    executor: impl PgExecutor<'_>,
    ids: &[String],
) -> Result<Vec<TestSection>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, TestSection>(&format!(
        "SELECT {SECTION_COLUMNS} FROM test_sections WHERE id = ANY($1)"
    ))
    .bind(ids)
    .fetch_all(executor)
    .await
}

pub(crate) async fn find_question(
    executor: impl PgExecutor<'_>,
    id: &str,
) -> Result<Option<TestQuestion>, sqlx::Error> {
    sqlx::query_as::<_, TestQuestion>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM test_questions WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn list_questions_by_ids(
    executor: impl PgExecutor<'_>,
    ids: &[String],
) -> Result<Vec<TestQuestion>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, TestQuestion>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM test_questions WHERE id = ANY($1)"
    ))
    .bind(ids)
    .fetch_all(executor)
    .await
}
