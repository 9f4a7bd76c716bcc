use sqlx::PgPool;

use crate::db::types::AttemptStatus;

/// Round-trips to the database and reports how many attempts are currently live.
pub(crate) async fn live_attempt_count(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM attempts WHERE status = $1")
        .bind(AttemptStatus::Started)
        .fetch_one(pool)
        .await
}
