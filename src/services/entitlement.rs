use sqlx::PgExecutor;
use time::PrimitiveDateTime;

use crate::db::models::TestDefinition;
use crate::repositories;
use crate::services::attempt_lifecycle::AttemptError;

/// Free tests are open to everyone; paid tests need an active, unexpired purchase.
pub(crate) async fn ensure_entitled(
    executor: impl PgExecutor<'_>,
    user_id: &str,
    definition: &TestDefinition,
    now: PrimitiveDateTime,
) -> Result<(), AttemptError> {
    if definition.is_free {
        return Ok(());
    }

    if repositories::purchases::has_active_purchase(executor, user_id, &definition.id, now).await? {
        Ok(())
    } else {
        Err(AttemptError::EntitlementRequired)
    }
}
