use time::{Duration, PrimitiveDateTime};
use uuid::Uuid;

use crate::core::state::AppState;
use crate::db::models::Attempt;
use crate::repositories;
use crate::repositories::attempts::CreateAttempt;
use crate::services::attempt_lifecycle::AttemptError;
use crate::services::entitlement;
use crate::services::question_order;
use crate::services::scoring::{self, MarkingScheme};

#[derive(Debug)]
pub(crate) struct StartedAttempt {
    pub(crate) attempt: Attempt,
    pub(crate) resumed: bool,
}

/// Creates an attempt or resumes the caller's live one for the same test.
pub(crate) async fn start(
    state: &AppState,
    user_id: &str,
    test_definition_id: &str,
    now: PrimitiveDateTime,
) -> Result<StartedAttempt, AttemptError> {
    let mut tx = state.db().begin().await?;

    let definition = repositories::catalog::find_active_definition(&mut *tx, test_definition_id)
        .await?
        .ok_or(AttemptError::NotFound("Test definition"))?;

    entitlement::ensure_entitled(&mut *tx, user_id, &definition, now).await?;

    repositories::attempts::acquire_user_definition_lock(&mut *tx, user_id, test_definition_id)
        .await?;

    if let Some(existing) =
        repositories::attempts::find_live(&mut *tx, user_id, test_definition_id).await?
    {
        tx.commit().await?;
        metrics::counter!("attempts_resumed_total").increment(1);
        tracing::info!(attempt_id = %existing.id, user_id, "resumed live attempt");
        return Ok(StartedAttempt { attempt: existing, resumed: true });
    }

    let sections = repositories::catalog::list_active_sections(&mut *tx, test_definition_id).await?;
    let questions =
        repositories::catalog::list_active_questions(&mut *tx, test_definition_id).await?;

    let seed = definition.shuffle_questions.then(question_order::new_seed);
    let plan = question_order::plan(&sections, questions, seed);
    if plan.is_empty() {
        return Err(AttemptError::EmptyTest);
    }

    let total_questions = plan.questions.len() as i32;
    let scheme = MarkingScheme {
        correct_marks: definition.correct_marks,
        negative_marks: definition.negative_marks,
    };
    let attempt_id = Uuid::new_v4().to_string();
    let deadline = now + Duration::minutes(i64::from(definition.duration_minutes.max(0)));

    let created = repositories::attempts::create(
        &mut *tx,
        CreateAttempt {
            id: &attempt_id,
            user_id,
            test_definition_id,
            question_seed: seed.unwrap_or(0),
            start_time: now,
            deadline,
            total_questions,
            max_score: scoring::max_score(total_questions, scheme),
        },
    )
    .await?;

    if !created {
        // A concurrent start won the live-attempt slot despite the advisory lock.
        let existing = repositories::attempts::find_live(&mut *tx, user_id, test_definition_id)
            .await?
            .ok_or(AttemptError::NotFound("Attempt"))?;
        tx.commit().await?;
        metrics::counter!("attempts_resumed_total").increment(1);
        return Ok(StartedAttempt { attempt: existing, resumed: true });
    }

    repositories::attempt_questions::insert_many(&mut *tx, &attempt_id, &plan.questions, now)
        .await?;
    repositories::section_timings::insert_many(&mut *tx, &attempt_id, &plan.section_ids).await?;

    let attempt = repositories::attempts::fetch_one_by_id(&mut *tx, &attempt_id).await?;
    tx.commit().await?;

    state.auto_submit().schedule(state, &attempt.id, attempt.end_time);

    metrics::counter!("attempts_started_total").increment(1);
    tracing::info!(
        attempt_id = %attempt.id,
        user_id,
        test_definition_id,
        total_questions,
        deadline = %crate::core::time::format_primitive(deadline),
        "attempt started"
    );

    Ok(StartedAttempt { attempt, resumed: false })
}
