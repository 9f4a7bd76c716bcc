mod handlers;

use axum::{routing::get, routing::post, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::start_attempt).get(handlers::list_attempts))
        .route("/:attempt_id", get(handlers::get_overview))
        .route("/:attempt_id/result", get(handlers::get_result))
        .route("/:attempt_id/submit", post(handlers::submit_attempt))
        .route(
            "/:attempt_id/sections/:section_id/questions",
            get(handlers::get_section_questions),
        )
        .route("/:attempt_id/sections/:section_id/timing", post(handlers::update_section_timing))
        .route("/:attempt_id/questions/:attempt_question_id", get(handlers::get_question))
        .route("/:attempt_id/questions/:attempt_question_id/answer", post(handlers::answer))
        .route("/:attempt_id/questions/:attempt_question_id/skip", post(handlers::skip))
        .route("/:attempt_id/questions/:attempt_question_id/review", post(handlers::review))
}

#[cfg(test)]
mod tests;
