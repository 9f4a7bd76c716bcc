use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::api::pagination::{self, PaginatedResponse};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::schemas::attempt::{
    AnswerRequest, AttemptHistoryQuery, AttemptOverviewResponse, AttemptQuestionResponse,
    AttemptResponse, AttemptResultResponse, QuestionResponse, QuestionStateResponse,
    ReviewRequest, ScoredResultResponse, SectionQuestionsResponse, SectionTimingRequest,
    SectionTimingResponse, SkipRequest, StartAttemptRequest, StartAttemptResponse,
};
use crate::services::attempts::{self, AnswerInput, SkipInput};

fn validate_payload(payload: &impl Validate) -> Result<(), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))
}

pub(super) async fn start_attempt(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<StartAttemptRequest>,
) -> Result<(StatusCode, Json<StartAttemptResponse>), ApiError> {
    validate_payload(&payload)?;

    let started =
        attempts::start(&state, &user_id, &payload.test_definition_id, primitive_now_utc())
            .await?;

    let status = if started.resumed { StatusCode::OK } else { StatusCode::CREATED };
    Ok((
        status,
        Json(StartAttemptResponse { attempt: started.attempt.into(), resumed: started.resumed }),
    ))
}

pub(super) async fn list_attempts(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    Query(params): Query<AttemptHistoryQuery>,
) -> Result<Json<PaginatedResponse<AttemptResponse>>, ApiError> {
    let (skip, limit) = pagination::normalize(params.skip, params.limit);

    let (items, total_count) =
        attempts::history(&state, &user_id, params.test_definition_id.as_deref(), skip, limit)
            .await?;

    Ok(Json(PaginatedResponse {
        items: items.into_iter().map(Into::into).collect(),
        total_count,
        skip,
        limit,
    }))
}

pub(super) async fn get_overview(
    Path(attempt_id): Path<String>,
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<AttemptOverviewResponse>, ApiError> {
    let overview =
        attempts::overview(&state, &user_id, &attempt_id, primitive_now_utc()).await?;
    Ok(Json(overview.into()))
}

pub(super) async fn get_result(
    Path(attempt_id): Path<String>,
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<AttemptResultResponse>, ApiError> {
    let result = attempts::result(&state, &user_id, &attempt_id).await?;
    Ok(Json(result.into()))
}

pub(super) async fn submit_attempt(
    Path(attempt_id): Path<String>,
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ScoredResultResponse>, ApiError> {
    let result = attempts::submit(&state, &user_id, &attempt_id, primitive_now_utc()).await?;
    Ok(Json(result.into()))
}

pub(super) async fn get_section_questions(
    Path((attempt_id, section_id)): Path<(String, String)>,
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<SectionQuestionsResponse>, ApiError> {
    let section = attempts::get_section_questions(
        &state,
        &user_id,
        &attempt_id,
        &section_id,
        primitive_now_utc(),
    )
    .await?;
    Ok(Json(section.into()))
}

pub(super) async fn update_section_timing(
    Path((attempt_id, section_id)): Path<(String, String)>,
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<SectionTimingRequest>,
) -> Result<Json<SectionTimingResponse>, ApiError> {
    validate_payload(&payload)?;

    let timing = attempts::update_section_timing(
        &state,
        &user_id,
        &attempt_id,
        &section_id,
        payload.time_spent_delta,
        primitive_now_utc(),
    )
    .await?;
    Ok(Json(timing.into()))
}

pub(super) async fn get_question(
    Path((attempt_id, attempt_question_id)): Path<(String, String)>,
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<QuestionResponse>, ApiError> {
    let (view, remaining_seconds) = attempts::get_question(
        &state,
        &user_id,
        &attempt_id,
        &attempt_question_id,
        primitive_now_utc(),
    )
    .await?;

    Ok(Json(QuestionResponse {
        question: AttemptQuestionResponse::from(view),
        remaining_seconds,
    }))
}

pub(super) async fn answer(
    Path((attempt_id, attempt_question_id)): Path<(String, String)>,
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<AnswerRequest>,
) -> Result<Json<QuestionStateResponse>, ApiError> {
    validate_payload(&payload)?;

    let input = AnswerInput {
        answer: payload.answer,
        time_spent_delta: payload.time_spent_delta,
        marked_for_review: payload.marked_for_review,
    };
    let updated = attempts::answer(
        &state,
        &user_id,
        &attempt_id,
        &attempt_question_id,
        input,
        primitive_now_utc(),
    )
    .await?;
    Ok(Json(updated.into()))
}

pub(super) async fn skip(
    Path((attempt_id, attempt_question_id)): Path<(String, String)>,
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<SkipRequest>,
) -> Result<Json<QuestionStateResponse>, ApiError> {
    validate_payload(&payload)?;

    let input = SkipInput {
        time_spent_delta: payload.time_spent_delta,
        marked_for_review: payload.marked_for_review,
    };
    let updated = attempts::skip(
        &state,
        &user_id,
        &attempt_id,
        &attempt_question_id,
        input,
        primitive_now_utc(),
    )
    .await?;
    Ok(Json(updated.into()))
}

pub(super) async fn review(
    Path((attempt_id, attempt_question_id)): Path<(String, String)>,
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<ReviewRequest>,
) -> Result<Json<QuestionStateResponse>, ApiError> {
    validate_payload(&payload)?;

    let updated = attempts::mark_for_review(
        &state,
        &user_id,
        &attempt_id,
        &attempt_question_id,
        payload.marked_for_review,
        payload.time_spent_delta,
        primitive_now_utc(),
    )
    .await?;
    Ok(Json(updated.into()))
}
