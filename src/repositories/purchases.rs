use sqlx::PgExecutor;
use time::PrimitiveDateTime;

pub(crate) const ACTIVE_STATUS: &str = "active";

pub(crate) async fn has_active_purchase(
    executor: impl PgExecutor<'_>,
    user_id: &str,
    test_definition_id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (
            SELECT 1 FROM purchases
            WHERE user_id = $1
              AND test_definition_id = $2
              AND status = $3
              AND deleted_at IS NULL
              AND (expires_at IS NULL OR expires_at > $4)
        )",
    )
    .bind(user_id)
    .bind(test_definition_id)
    .bind(ACTIVE_STATUS)
    .bind(now)
    .fetch_one(executor)
    .await
}
