use sqlx::{PgExecutor, Postgres, QueryBuilder};
use time::PrimitiveDateTime;

use crate::db::models::AttemptQuestion;
use crate::db::types::QuestionStatus;
use crate::services::attempt_lifecycle::{AnswerChange, QuestionPatch};

pub(crate) const COLUMNS: &str = "\
    id, attempt_id, section_id, question_id, sequence, user_answer, is_correct, status, \
    is_marked_for_review, visit_count, time_spent_seconds, updated_at";

#[derive(Debug, Clone)]
pub(crate) struct NewAttemptQuestion {
    pub(crate) id: String,
    pub(crate) section_id: String,
    pub(crate) question_id: String,
    pub(crate) sequence: i32,
}

pub(crate) async fn insert_many(
    executor: impl PgExecutor<'_>,
    attempt_id: &str,
    rows: &[NewAttemptQuestion],
    now: PrimitiveDateTime,
) -> Result<u64, sqlx::Error> {
    if rows.is_empty() {
        return Ok(0);
    }

    let mut builder = QueryBuilder::<Postgres>::new(
        "INSERT INTO attempt_questions (id, attempt_id, section_id, question_id, sequence, status, updated_at) ",
    );
    builder.push_values(rows, |mut row, item| {
        row.push_bind(&item.id)
            .push_bind(attempt_id)
            .push_bind(&item.section_id)
            .push_bind(&item.question_id)
            .push_bind(item.sequence)
            .push_bind(QuestionStatus::Unattempted)
            .push_bind(now);
    });

    let result = builder.build().execute(executor).await?;
    Ok(result.rows_affected())
}

pub(crate) async fn find_by_id(
    executor: impl PgExecutor<'_>,
    attempt_id: &str,
    id: &str,
) -> Result<Option<AttemptQuestion>, sqlx::Error> {
    sqlx::query_as::<_, AttemptQuestion>(&format!(
        "SELECT {COLUMNS} FROM attempt_questions WHERE attempt_id = $1 AND id = $2"
    ))
    .bind(attempt_id)
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn list_by_attempt(
    executor: impl PgExecutor<'_>,
    attempt_id: &str,
) -> Result<Vec<AttemptQuestion>, sqlx::Error> {
    sqlx::query_as::<_, AttemptQuestion>(&format!(
        "SELECT {COLUMNS} FROM attempt_questions WHERE attempt_id = $1 ORDER BY sequence"
    ))
    .bind(attempt_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn list_by_section(
    executor: impl PgExecutor<'_>,
    attempt_id: &str,
    section_id: &str,
) -> Result<Vec<AttemptQuestion>, sqlx::Error> {
    sqlx::query_as::<_, AttemptQuestion>(&format!(
        "SELECT {COLUMNS} FROM attempt_questions \
         WHERE attempt_id = $1 AND section_id = $2 ORDER BY sequence"
    ))
    .bind(attempt_id)
    .bind(section_id)
    .fetch_all(executor)
    .await
}

/// Counts the first read only; later reads leave `visit_count` untouched.
pub(crate) async fn record_first_visit(
    executor: impl PgExecutor<'_>,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE attempt_questions
         SET visit_count = visit_count + 1, updated_at = $1
         WHERE id = $2 AND visit_count = 0",
    )
    .bind(now)
    .bind(id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn apply_patch(
    executor: impl PgExecutor<'_>,
    id: &str,
    patch: &QuestionPatch,
    now: PrimitiveDateTime,
) -> Result<AttemptQuestion, sqlx::Error> {
    let (set_answer, user_answer, is_correct) = match &patch.answer {
        AnswerChange::Keep => (false, None, None),
        AnswerChange::Set { answer, is_correct } => (true, Some(answer.as_str()), Some(*is_correct)),
    };

    sqlx::query_as::<_, AttemptQuestion>(&format!(
        "UPDATE attempt_questions
         SET user_answer = CASE WHEN $1 THEN $2 ELSE user_answer END,
             is_correct = CASE WHEN $1 THEN $3 ELSE is_correct END,
             status = COALESCE($4, status),
             is_marked_for_review = COALESCE($5, is_marked_for_review),
             time_spent_seconds = time_spent_seconds + $6,
             updated_at = $7
         WHERE id = $8
         RETURNING {COLUMNS}"
    ))
    .bind(set_answer)
    .bind(user_answer)
    .bind(is_correct)
    .bind(patch.status)
    .bind(patch.marked_for_review)
    .bind(patch.time_spent_delta)
    .bind(now)
    .bind(id)
    .fetch_one(executor)
    .await
}
