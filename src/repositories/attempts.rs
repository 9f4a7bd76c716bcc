use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};
use time::PrimitiveDateTime;

use crate::db::models::Attempt;
use crate::db::types::AttemptStatus;

pub(crate) const COLUMNS: &str = "\
    id, user_id, test_definition_id, status, question_seed, start_time, end_time, \
    total_questions, attempted_count, correct_count, wrong_count, skipped_count, \
    marked_for_review_count, total_score, max_score, percentage, rank, completed_at, \
    created_at, updated_at";

pub(crate) struct CreateAttempt<'a> {
    pub(crate) id: &'a str,
    pub(crate) user_id: &'a str,
    pub(crate) test_definition_id: &'a str,
    pub(crate) question_seed: i64,
    pub(crate) start_time: PrimitiveDateTime,
    pub(crate) deadline: PrimitiveDateTime,
    pub(crate) total_questions: i32,
    pub(crate) max_score: f64,
}

/// Aggregates written once, by the finalize transaction.
pub(crate) struct CompleteAttempt {
    pub(crate) attempted_count: i32,
    pub(crate) correct_count: i32,
    pub(crate) wrong_count: i32,
    pub(crate) skipped_count: i32,
    pub(crate) marked_for_review_count: i32,
    pub(crate) total_score: f64,
    pub(crate) max_score: f64,
    pub(crate) percentage: f64,
    pub(crate) rank: i32,
    pub(crate) finished_at: PrimitiveDateTime,
}

pub(crate) async fn find_by_id(
    executor: impl PgExecutor<'_>,
    id: &str,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!("SELECT {COLUMNS} FROM attempts WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn fetch_one_by_id(
    executor: impl PgExecutor<'_>,
    id: &str,
) -> Result<Attempt, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!("SELECT {COLUMNS} FROM attempts WHERE id = $1"))
        .bind(id)
        .fetch_one(executor)
        .await
}

/// Row lock held by finalize; serialises submit against auto-submit.
pub(crate) async fn lock_for_update(
    executor: impl PgExecutor<'_>,
    id: &str,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {COLUMNS} FROM attempts WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// Like `lock_for_update`, but yields `None` when another transaction holds the row.
pub(crate) async fn try_lock_for_update(
    executor: impl PgExecutor<'_>,
    id: &str,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {COLUMNS} FROM attempts WHERE id = $1 FOR UPDATE SKIP LOCKED"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// Shared lock held by question-level mutations so they cannot interleave with finalize.
pub(crate) async fn lock_for_share(
    executor: impl PgExecutor<'_>,
    id: &str,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!("SELECT {COLUMNS} FROM attempts WHERE id = $1 FOR SHARE"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn acquire_user_definition_lock(
    executor: impl PgExecutor<'_>,
    user_id: &str,
    test_definition_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(format!("attempt:{user_id}:{test_definition_id}"))
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn find_live(
    executor: impl PgExecutor<'_>,
    user_id: &str,
    test_definition_id: &str,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {COLUMNS} FROM attempts \
         WHERE user_id = $1 AND test_definition_id = $2 AND status = $3"
    ))
    .bind(user_id)
    .bind(test_definition_id)
    .bind(AttemptStatus::Started)
    .fetch_optional(executor)
    .await
}

/// Returns `false` when a live attempt for the same user and test already exists.
pub(crate) async fn create(
    executor: impl PgExecutor<'_>,
    attempt: CreateAttempt<'_>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO attempts (
            id, user_id, test_definition_id, status, question_seed, start_time, end_time,
            total_questions, max_score, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$6,$6)
        ON CONFLICT DO NOTHING",
    )
    .bind(attempt.id)
    .bind(attempt.user_id)
    .bind(attempt.test_definition_id)
    .bind(AttemptStatus::Started)
    .bind(attempt.question_seed)
    .bind(attempt.start_time)
    .bind(attempt.deadline)
    .bind(attempt.total_questions)
    .bind(attempt.max_score)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// STARTED -> COMPLETED. Returns `false` if the attempt was no longer started.
pub(crate) async fn complete(
    executor: impl PgExecutor<'_>,
    id: &str,
    params: CompleteAttempt,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE attempts
         SET status = $1,
             attempted_count = $2,
             correct_count = $3,
             wrong_count = $4,
             skipped_count = $5,
             marked_for_review_count = $6,
             total_score = $7,
             max_score = $8,
             percentage = $9,
             rank = $10,
             end_time = $11,
             completed_at = $11,
             updated_at = $11
         WHERE id = $12 AND status = $13",
    )
    .bind(AttemptStatus::Completed)
    .bind(params.attempted_count)
    .bind(params.correct_count)
    .bind(params.wrong_count)
    .bind(params.skipped_count)
    .bind(params.marked_for_review_count)
    .bind(params.total_score)
    .bind(params.max_score)
    .bind(params.percentage)
    .bind(params.rank)
    .bind(params.finished_at)
    .bind(id)
    .bind(AttemptStatus::Started)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub(crate) async fn count_completed_with_higher_score(
    executor: impl PgExecutor<'_>,
    test_definition_id: &str,
    exclude_attempt_id: &str,
    total_score: f64,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM attempts
         WHERE test_definition_id = $1 AND status = $2 AND id <> $3 AND total_score > $4",
    )
    .bind(test_definition_id)
    .bind(AttemptStatus::Completed)
    .bind(exclude_attempt_id)
    .bind(total_score)
    .fetch_one(executor)
    .await
}

pub(crate) async fn list_completed_scores(
    executor: impl PgExecutor<'_>,
    test_definition_id: &str,
) -> Result<Vec<f64>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT total_score FROM attempts
         WHERE test_definition_id = $1 AND status = $2 AND total_score IS NOT NULL",
    )
    .bind(test_definition_id)
    .bind(AttemptStatus::Completed)
    .fetch_all(executor)
    .await
}

/// Overdue live attempts, oldest deadline first.
pub(crate) async fn list_overdue_ids(
    executor: impl PgExecutor<'_>,
    now: PrimitiveDateTime,
    limit: i64,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT id FROM attempts
         WHERE status = $1 AND end_time <= $2
         ORDER BY end_time
         LIMIT $3",
    )
    .bind(AttemptStatus::Started)
    .bind(now)
    .bind(limit.max(1))
    .fetch_all(executor)
    .await
}

/// Pending deadlines for re-arming in-memory timers after a restart.
pub(crate) async fn list_live_deadlines(
    pool: &PgPool,
) -> Result<Vec<(String, PrimitiveDateTime)>, sqlx::Error> {
    sqlx::query_as::<_, (String, PrimitiveDateTime)>(
        "SELECT id, end_time FROM attempts WHERE status = $1 ORDER BY end_time",
    )
    .bind(AttemptStatus::Started)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_by_user(
    pool: &PgPool,
    user_id: &str,
    test_definition_id: Option<&str>,
    skip: i64,
    limit: i64,
) -> Result<Vec<Attempt>, sqlx::Error> {
    let mut builder =
        QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM attempts WHERE user_id = "));
    builder.push_bind(user_id);

    if let Some(test_definition_id) = test_definition_id {
        builder.push(" AND test_definition_id = ");
        builder.push_bind(test_definition_id);
    }

    builder.push(" ORDER BY start_time DESC OFFSET ");
    builder.push_bind(skip);
    builder.push(" LIMIT ");
    builder.push_bind(limit);

    builder.build_query_as::<Attempt>().fetch_all(pool).await
}

pub(crate) async fn count_by_user(
    pool: &PgPool,
    user_id: &str,
    test_definition_id: Option<&str>,
) -> Result<i64, sqlx::Error> {
    let mut builder =
        QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM attempts WHERE user_id = ");
    builder.push_bind(user_id);

    if let Some(test_definition_id) = test_definition_id {
        builder.push(" AND test_definition_id = ");
        builder.push_bind(test_definition_id);
    }

    builder.build_query_scalar::<i64>().fetch_one(pool).await
}
