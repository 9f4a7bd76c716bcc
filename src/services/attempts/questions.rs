use std::collections::HashMap;

use sqlx::{Postgres, Transaction};
use time::PrimitiveDateTime;

use crate::core::redis::section_heartbeat_key;
use crate::core::state::AppState;
use crate::core::time::remaining_seconds;
use crate::db::models::{Attempt, AttemptQuestion, SectionTiming, TestQuestion};
use crate::repositories;
use crate::services::attempt_lifecycle::{
    ensure_live, ensure_owner, validate_answer, validate_time_delta, AttemptError, QuestionPatch,
};

#[derive(Debug, Clone)]
pub(crate) struct QuestionView {
    pub(crate) item: AttemptQuestion,
    pub(crate) question: TestQuestion,
}

#[derive(Debug)]
pub(crate) struct SectionQuestions {
    pub(crate) attempt_id: String,
    pub(crate) section_id: String,
    pub(crate) questions: Vec<QuestionView>,
    pub(crate) remaining_seconds: i64,
}

#[derive(Debug, Clone)]
pub(crate) struct AnswerInput {
    pub(crate) answer: String,
    pub(crate) time_spent_delta: i64,
    pub(crate) marked_for_review: Option<bool>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct SkipInput {
    pub(crate) time_spent_delta: i64,
    pub(crate) marked_for_review: Option<bool>,
}

/// Opens a transaction holding a shared lock on a live attempt owned by `user_id`.
async fn begin_live(
    state: &AppState,
    user_id: &str,
    attempt_id: &str,
    now: PrimitiveDateTime,
) -> Result<(Transaction<'static, Postgres>, Attempt), AttemptError> {
    let mut tx = state.db().begin().await?;
    let attempt = repositories::attempts::lock_for_share(&mut *tx, attempt_id)
        .await?
        .ok_or(AttemptError::NotFound("Attempt"))?;
    ensure_owner(&attempt, user_id)?;
    ensure_live(&attempt, now)?;
    Ok((tx, attempt))
}

async fn load_item(
    tx: &mut Transaction<'static, Postgres>,
    attempt_id: &str,
    attempt_question_id: &str,
) -> Result<AttemptQuestion, AttemptError> {
    repositories::attempt_questions::find_by_id(&mut **tx, attempt_id, attempt_question_id)
        .await?
        .ok_or(AttemptError::NotFound("Question"))
}

async fn load_catalog_question(
    tx: &mut Transaction<'static, Postgres>,
    question_id: &str,
) -> Result<TestQuestion, AttemptError> {
    repositories::catalog::find_question(&mut **tx, question_id)
        .await?
        .ok_or(AttemptError::NotFound("Question"))
}

/// Questions of one section in sequence order. Opening a section counts as visiting its first
/// question. A section snapshotted without questions yields an empty list.
pub(crate) async fn get_section_questions(
    state: &AppState,
    user_id: &str,
    attempt_id: &str,
    section_id: &str,
    now: PrimitiveDateTime,
) -> Result<SectionQuestions, AttemptError> {
    let (mut tx, attempt) = begin_live(state, user_id, attempt_id, now).await?;

    let mut items =
        repositories::attempt_questions::list_by_section(&mut *tx, attempt_id, section_id).await?;
    match items.first_mut() {
        Some(first) => {
            if repositories::attempt_questions::record_first_visit(&mut *tx, &first.id, now).await? {
                first.visit_count += 1;
            }
        }
        None => {
            repositories::section_timings::find(&mut *tx, attempt_id, section_id)
                .await?
                .ok_or(AttemptError::NotFound("Section"))?;
        }
    }

    let question_ids: Vec<String> = items.iter().map(|item| item.question_id.clone()).collect();
    let mut catalog: HashMap<String, TestQuestion> =
        repositories::catalog::list_questions_by_ids(&mut *tx, &question_ids)
            .await?
            .into_iter()
            .map(|question| (question.id.clone(), question))
            .collect();

    tx.commit().await?;

    let mut questions = Vec::with_capacity(items.len());
    for item in items {
        let question =
            catalog.remove(&item.question_id).ok_or(AttemptError::NotFound("Question"))?;
        questions.push(QuestionView { item, question });
    }

    Ok(SectionQuestions {
        attempt_id: attempt.id,
        section_id: section_id.to_string(),
        questions,
        remaining_seconds: remaining_seconds(attempt.end_time, now),
    })
}

pub(crate) async fn get_question(
    state: &AppState,
    user_id: &str,
    attempt_id: &str,
    attempt_question_id: &str,
    now: PrimitiveDateTime,
) -> Result<(QuestionView, i64), AttemptError> {
    let (mut tx, attempt) = begin_live(state, user_id, attempt_id, now).await?;

    let mut item = load_item(&mut tx, attempt_id, attempt_question_id).await?;
    if repositories::attempt_questions::record_first_visit(&mut *tx, &item.id, now).await? {
        item.visit_count += 1;
    }
    let question = load_catalog_question(&mut tx, &item.question_id).await?;

    tx.commit().await?;

    Ok((QuestionView { item, question }, remaining_seconds(attempt.end_time, now)))
}

pub(crate) async fn answer(
    state: &AppState,
    user_id: &str,
    attempt_id: &str,
    attempt_question_id: &str,
    input: AnswerInput,
    now: PrimitiveDateTime,
) -> Result<AttemptQuestion, AttemptError> {
    validate_answer(&input.answer)?;
    validate_time_delta(input.time_spent_delta)?;
    let (mut tx, _attempt) = begin_live(state, user_id, attempt_id, now).await?;

    let item = load_item(&mut tx, attempt_id, attempt_question_id).await?;
    let question = load_catalog_question(&mut tx, &item.question_id).await?;
    let patch = QuestionPatch::answer(
        &input.answer,
        &question.right_answer,
        input.time_spent_delta,
        input.marked_for_review,
    )?;

    let updated =
        repositories::attempt_questions::apply_patch(&mut *tx, &item.id, &patch, now).await?;
    tx.commit().await?;

    tracing::debug!(attempt_id, attempt_question_id, "answer recorded");
    Ok(updated)
}

pub(crate) async fn skip(
    state: &AppState,
    user_id: &str,
    attempt_id: &str,
    attempt_question_id: &str,
    input: SkipInput,
    now: PrimitiveDateTime,
) -> Result<AttemptQuestion, AttemptError> {
    let patch = QuestionPatch::skip(input.time_spent_delta, input.marked_for_review)?;
    let (mut tx, _attempt) = begin_live(state, user_id, attempt_id, now).await?;

    let item = load_item(&mut tx, attempt_id, attempt_question_id).await?;
    let updated =
        repositories::attempt_questions::apply_patch(&mut *tx, &item.id, &patch, now).await?;
    tx.commit().await?;

    Ok(updated)
}

pub(crate) async fn mark_for_review(
    state: &AppState,
    user_id: &str,
    attempt_id: &str,
    attempt_question_id: &str,
    flag: bool,
    time_spent_delta: Option<i64>,
    now: PrimitiveDateTime,
) -> Result<AttemptQuestion, AttemptError> {
    let patch = QuestionPatch::review(flag, time_spent_delta)?;
    let (mut tx, _attempt) = begin_live(state, user_id, attempt_id, now).await?;

    let item = load_item(&mut tx, attempt_id, attempt_question_id).await?;
    let updated =
        repositories::attempt_questions::apply_patch(&mut *tx, &item.id, &patch, now).await?;
    tx.commit().await?;

    Ok(updated)
}

/// Section heartbeat. Returns the accumulated timing row.
///
/// Every delta is recorded. With a heartbeat window configured, `end_time` is refreshed at most
/// once per window; calls inside the window only accumulate.
pub(crate) async fn update_section_timing(
    state: &AppState,
    user_id: &str,
    attempt_id: &str,
    section_id: &str,
    time_spent_delta: i64,
    now: PrimitiveDateTime,
) -> Result<SectionTiming, AttemptError> {
    let time_spent_delta = validate_time_delta(time_spent_delta)?;
    let (mut tx, _attempt) = begin_live(state, user_id, attempt_id, now).await?;

    repositories::section_timings::find(&mut *tx, attempt_id, section_id)
        .await?
        .ok_or(AttemptError::NotFound("Section"))?;

    let refresh_end_time = heartbeat_window_open(state, attempt_id, section_id).await;
    let timing = repositories::section_timings::record_heartbeat(
        &mut *tx,
        attempt_id,
        section_id,
        time_spent_delta,
        refresh_end_time,
        now,
    )
    .await?
    .ok_or(AttemptError::NotFound("Section"))?;
    tx.commit().await?;

    if !refresh_end_time {
        tracing::debug!(attempt_id, section_id, "heartbeat inside window, end_time kept");
    }
    Ok(timing)
}

/// Redis errors and a disconnected handle count as an open window.
async fn heartbeat_window_open(state: &AppState, attempt_id: &str, section_id: &str) -> bool {
    let window = state.settings().exam().section_heartbeat_min_interval_seconds;
    if window == 0 {
        return true;
    }

    match state.redis().rate_limit(&section_heartbeat_key(attempt_id, section_id), 1, window).await {
        Ok(allowed) => allowed,
        Err(err) => {
            tracing::warn!(attempt_id, section_id, error = %err, "heartbeat limiter unavailable");
            true
        }
    }
}
