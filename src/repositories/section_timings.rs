use sqlx::{PgExecutor, Postgres, QueryBuilder};
use time::PrimitiveDateTime;

use crate::db::models::SectionTiming;

const COLUMNS: &str =
    "attempt_id, section_id, sequence, start_time, end_time, total_time_spent_seconds";

pub(crate) async fn insert_many(
    executor: impl PgExecutor<'_>,
    attempt_id: &str,
    section_ids: &[String],
) -> Result<(), sqlx::Error> {
    if section_ids.is_empty() {
        return Ok(());
    }

    let mut builder = QueryBuilder::<Postgres>::new(
        "INSERT INTO attempt_section_timings (attempt_id, section_id, sequence) ",
    );
    builder.push_values(section_ids.iter().enumerate(), |mut row, (index, section_id)| {
        row.push_bind(attempt_id).push_bind(section_id).push_bind(index as i32 + 1);
    });

    builder.build().execute(executor).await?;
    Ok(())
}

pub(crate) async fn list_by_attempt(
    executor: impl PgExecutor<'_>,
    attempt_id: &str,
) -> Result<Vec<SectionTiming>, sqlx::Error> {
    sqlx::query_as::<_, SectionTiming>(&format!(
        "SELECT {COLUMNS} FROM attempt_section_timings WHERE attempt_id = $1 ORDER BY sequence"
    ))
    .bind(attempt_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn find(
    executor: impl PgExecutor<'_>,
    attempt_id: &str,
    section_id: &str,
) -> Result<Option<SectionTiming>, sqlx::Error> {
    sqlx::query_as::<_, SectionTiming>(&format!(
        "SELECT {COLUMNS} FROM attempt_section_timings WHERE attempt_id = $1 AND section_id = $2"
    ))
    .bind(attempt_id)
    .bind(section_id)
    .fetch_optional(executor)
    .await
}

/// Accumulates a heartbeat. `end_time` tracks the latest heartbeat, not a section close, and is
/// left alone when `refresh_end_time` is false.
pub(crate) async fn record_heartbeat(
    executor: impl PgExecutor<'_>,
    attempt_id: &str,
    section_id: &str,
    time_spent_delta: i64,
    refresh_end_time: bool,
    now: PrimitiveDateTime,
) -> Result<Option<SectionTiming>, sqlx::Error> {
    sqlx::query_as::<_, SectionTiming>(&format!(
        "UPDATE attempt_section_timings
         SET total_time_spent_seconds = total_time_spent_seconds + $1,
             start_time = COALESCE(start_time, $2),
             end_time = CASE WHEN $3 OR end_time IS NULL THEN $2 ELSE end_time END
         WHERE attempt_id = $4 AND section_id = $5
         RETURNING {COLUMNS}"
    ))
    .bind(time_spent_delta)
    .bind(now)
    .bind(refresh_end_time)
    .bind(attempt_id)
    .bind(section_id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn close_open(
    executor: impl PgExecutor<'_>,
    attempt_id: &str,
    now: PrimitiveDateTime,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE attempt_section_timings
         SET end_time = $1
         WHERE attempt_id = $2 AND start_time IS NOT NULL AND end_time IS NULL",
    )
    .bind(now)
    .bind(attempt_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}
