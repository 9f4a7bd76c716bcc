use time::PrimitiveDateTime;

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::repositories::attempts::CompleteAttempt;
use crate::services::attempt_lifecycle::{
    ensure_owner, finalize_decision, AttemptError, FinalizeDecision, FinalizeMode,
};
use crate::services::scoring::{self, MarkingScheme, ScoreCard};

#[derive(Debug, Clone)]
pub(crate) struct ScoredResult {
    pub(crate) attempt_id: String,
    pub(crate) total_questions: i32,
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

impl ScoredResult {
    fn new(attempt_id: String, card: ScoreCard, rank: i32, finished_at: PrimitiveDateTime) -> Self {
        Self {
            attempt_id,
            total_questions: card.tally.total,
            attempted_count: card.tally.attempted,
            correct_count: card.tally.correct,
            wrong_count: card.tally.wrong,
            skipped_count: card.tally.skipped,
            marked_for_review_count: card.tally.marked_for_review,
            total_score: card.total_score,
            max_score: card.max_score,
            percentage: card.percentage,
            rank,
            finished_at,
        }
    }
}

#[derive(Debug)]
pub(crate) enum FinalizeOutcome {
    Finalized(ScoredResult),
    /// Someone else completed the attempt first.
    AlreadyCompleted,
    /// The row was locked by a concurrent finalize; only returned to the sweep.
    Busy,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SweepReport {
    pub(crate) scanned: usize,
    pub(crate) finalized: usize,
    pub(crate) skipped: usize,
}

struct FinalizeRequest<'a> {
    attempt_id: &'a str,
    mode: FinalizeMode,
    owner: Option<&'a str>,
    skip_locked: bool,
    now: PrimitiveDateTime,
}

/// STARTED -> COMPLETED in one transaction under the attempt row lock.
async fn finalize(
    state: &AppState,
    request: FinalizeRequest<'_>,
) -> Result<FinalizeOutcome, AttemptError> {
    let FinalizeRequest { attempt_id, mode, owner, skip_locked, now } = request;
    let mut tx = state.db().begin().await?;

    let locked = if skip_locked {
        repositories::attempts::try_lock_for_update(&mut *tx, attempt_id).await?
    } else {
        repositories::attempts::lock_for_update(&mut *tx, attempt_id).await?
    };
    let attempt = match locked {
        Some(attempt) => attempt,
        None if skip_locked => return Ok(FinalizeOutcome::Busy),
        None => return Err(AttemptError::NotFound("Attempt")),
    };

    if let Some(owner) = owner {
        ensure_owner(&attempt, owner)?;
    }

    if finalize_decision(&attempt, mode)? == FinalizeDecision::NoOp {
        metrics::counter!("auto_submit_noop_total").increment(1);
        tracing::info!(attempt_id, "auto-submit skipped, attempt already completed");
        return Ok(FinalizeOutcome::AlreadyCompleted);
    }

    let definition =
        repositories::catalog::find_definition(&mut *tx, &attempt.test_definition_id)
            .await?
            .ok_or(AttemptError::NotFound("Test definition"))?;
    let scheme = MarkingScheme {
        correct_marks: definition.correct_marks,
        negative_marks: definition.negative_marks,
    };

    let items = repositories::attempt_questions::list_by_attempt(&mut *tx, attempt_id).await?;
    let card = scoring::score(scoring::tally(&items), scheme);

    let higher = repositories::attempts::count_completed_with_higher_score(
        &mut *tx,
        &attempt.test_definition_id,
        attempt_id,
        card.total_score,
    )
    .await?;
    let rank = scoring::rank_from_higher_count(higher);

    let completed = repositories::attempts::complete(
        &mut *tx,
        attempt_id,
        CompleteAttempt {
            attempted_count: card.tally.attempted,
            correct_count: card.tally.correct,
            wrong_count: card.tally.wrong,
            skipped_count: card.tally.skipped,
            marked_for_review_count: card.tally.marked_for_review,
            total_score: card.total_score,
            max_score: card.max_score,
            percentage: card.percentage,
            rank,
            finished_at: now,
        },
    )
    .await?;

    if !completed {
        return match mode {
            FinalizeMode::Manual => Err(AttemptError::AlreadyCompleted),
            FinalizeMode::Auto => Ok(FinalizeOutcome::AlreadyCompleted),
        };
    }

    let closed = repositories::section_timings::close_open(&mut *tx, attempt_id, now).await?;
    tx.commit().await?;

    state.auto_submit().cancel(attempt_id);

    metrics::counter!("attempts_finalized_total", "mode" => mode.as_str()).increment(1);
    tracing::info!(
        attempt_id,
        mode = mode.as_str(),
        total_score = card.total_score,
        percentage = card.percentage,
        rank,
        closed_sections = closed,
        "attempt finalized"
    );

    Ok(FinalizeOutcome::Finalized(ScoredResult::new(attempt.id, card, rank, now)))
}

/// User-initiated finalize.
pub(crate) async fn submit(
    state: &AppState,
    user_id: &str,
    attempt_id: &str,
    now: PrimitiveDateTime,
) -> Result<ScoredResult, AttemptError> {
    let request = FinalizeRequest {
        attempt_id,
        mode: FinalizeMode::Manual,
        owner: Some(user_id),
        skip_locked: false,
        now,
    };

    match finalize(state, request).await? {
        FinalizeOutcome::Finalized(result) => Ok(result),
        FinalizeOutcome::AlreadyCompleted | FinalizeOutcome::Busy => {
            Err(AttemptError::AlreadyCompleted)
        }
    }
}

/// System-initiated finalize. A completed attempt is a no-op.
pub(crate) async fn auto_submit(
    state: &AppState,
    attempt_id: &str,
) -> Result<FinalizeOutcome, AttemptError> {
    auto_submit_at(state, attempt_id, primitive_now_utc()).await
}

pub(crate) async fn auto_submit_at(
    state: &AppState,
    attempt_id: &str,
    now: PrimitiveDateTime,
) -> Result<FinalizeOutcome, AttemptError> {
    let request = FinalizeRequest {
        attempt_id,
        mode: FinalizeMode::Auto,
        owner: None,
        skip_locked: false,
        now,
    };
    finalize(state, request).await
}

/// Finalizes up to `batch` started attempts whose deadline is at or before `now`.
pub(crate) async fn sweep_overdue(
    state: &AppState,
    now: PrimitiveDateTime,
    batch: u32,
) -> Result<SweepReport, AttemptError> {
    let ids =
        repositories::attempts::list_overdue_ids(state.db(), now, i64::from(batch)).await?;
    let mut report = SweepReport { scanned: ids.len(), ..SweepReport::default() };

    for attempt_id in &ids {
        let request = FinalizeRequest {
            attempt_id,
            mode: FinalizeMode::Auto,
            owner: None,
            skip_locked: true,
            now,
        };
        match finalize(state, request).await {
            Ok(FinalizeOutcome::Finalized(_)) => {
                report.finalized += 1;
                metrics::counter!("auto_submit_sweep_finalized_total").increment(1);
            }
            Ok(FinalizeOutcome::AlreadyCompleted | FinalizeOutcome::Busy) => report.skipped += 1,
            Err(err) => {
                report.skipped += 1;
                tracing::error!(attempt_id = %attempt_id, error = %err, "sweep failed to finalize attempt");
            }
        }
    }

    Ok(report)
}
