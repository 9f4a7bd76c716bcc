//! Attempt orchestration over the store.
//!
//! Every operation takes `now` explicitly so deadlines are checked against one clock reading
//! per call.

mod finalize;
mod questions;
mod reports;
mod start;


pub(crate) use finalize::{auto_submit, submit, sweep_overdue, ScoredResult};
pub(crate) use questions::{
    answer, get_question, get_section_questions, mark_for_review, skip, update_section_timing,
    AnswerInput, QuestionView, SectionQuestions, SkipInput,
};
pub(crate) use reports::{
    history, overview, result, AttemptOverview, AttemptResult, PaletteEntry, ReviewEntry,
    SectionPalette,
};
pub(crate) use start::start;

use sqlx::PgExecutor;

use crate::db::models::Attempt;
use crate::repositories;
use crate::services::attempt_lifecycle::{ensure_owner, AttemptError};

/// Loads an attempt visible to `user_id`.
pub(crate) async fn load_owned(
    executor: impl PgExecutor<'_>,
    user_id: &str,
    attempt_id: &str,
) -> Result<Attempt, AttemptError> {
    let attempt = repositories::attempts::find_by_id(executor, attempt_id)
        .await?
        .ok_or(AttemptError::NotFound("Attempt"))?;
    ensure_owner(&attempt, user_id)?;
    Ok(attempt)
}
