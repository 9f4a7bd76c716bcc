use std::collections::HashMap;

use sqlx::types::Json;
use time::PrimitiveDateTime;

use crate::core::state::AppState;
use crate::core::time::remaining_seconds;
use crate::db::models::{Attempt, AttemptQuestion, TestQuestion, TestSection};
use crate::db::types::{AttemptStatus, QuestionStatus};
use crate::repositories;
use crate::services::attempt_lifecycle::AttemptError;
use crate::services::attempts::load_owned;
use crate::services::scoring;

#[derive(Debug, Clone)]
pub(crate) struct PaletteEntry {
    pub(crate) attempt_question_id: String,
    pub(crate) sequence: i32,
    pub(crate) status: QuestionStatus,
    pub(crate) is_marked_for_review: bool,
    pub(crate) visited: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct SectionPalette {
    pub(crate) section_id: String,
    pub(crate) title: String,
    pub(crate) sequence: i32,
    pub(crate) attempted: i32,
    pub(crate) skipped: i32,
    pub(crate) marked_for_review: i32,
    pub(crate) unvisited: i32,
    pub(crate) time_spent_seconds: i64,
    pub(crate) questions: Vec<PaletteEntry>,
}

#[derive(Debug)]
pub(crate) struct AttemptOverview {
    pub(crate) attempt: Attempt,
    pub(crate) remaining_seconds: i64,
    pub(crate) sections: Vec<SectionPalette>,
}

#[derive(Debug, Clone)]
pub(crate) struct ReviewEntry {
    pub(crate) item: AttemptQuestion,
    pub(crate) question_text: String,
    pub(crate) options: Json<serde_json::Value>,
    /// Revealed only once the attempt is completed.
    pub(crate) right_answer: Option<String>,
    pub(crate) explanation: Option<String>,
}

#[derive(Debug)]
pub(crate) struct AttemptResult {
    pub(crate) attempt: Attempt,
    pub(crate) percentile: Option<f64>,
    pub(crate) passed: Option<bool>,
    pub(crate) questions: Vec<ReviewEntry>,
}

/// Navigation palette of an attempt, grouped by section in delivery order.
pub(crate) async fn overview(
    state: &AppState,
    user_id: &str,
    attempt_id: &str,
    now: PrimitiveDateTime,
) -> Result<AttemptOverview, AttemptError> {
    let attempt = load_owned(state.db(), user_id, attempt_id).await?;
    let timings = repositories::section_timings::list_by_attempt(state.db(), attempt_id).await?;
    let items = repositories::attempt_questions::list_by_attempt(state.db(), attempt_id).await?;

    let section_ids: Vec<String> = timings.iter().map(|timing| timing.section_id.clone()).collect();
    let titles: HashMap<String, TestSection> =
        repositories::catalog::list_sections_by_ids(state.db(), &section_ids)
            .await?
            .into_iter()
            .map(|section| (section.id.clone(), section))
            .collect();

    let mut by_section: HashMap<String, Vec<AttemptQuestion>> = HashMap::new();
    for item in items {
        by_section.entry(item.section_id.clone()).or_default().push(item);
    }

    let sections = timings
        .into_iter()
        .map(|timing| {
            let items = by_section.remove(&timing.section_id).unwrap_or_default();
            let title = titles
                .get(&timing.section_id)
                .map(|section| section.title.clone())
                .unwrap_or_default();
            palette(timing.section_id, title, timing.sequence, timing.total_time_spent_seconds, items)
        })
        .collect();

    let remaining = match attempt.status {
        AttemptStatus::Started => remaining_seconds(attempt.end_time, now),
        AttemptStatus::Completed => 0,
    };

    Ok(AttemptOverview { attempt, remaining_seconds: remaining, sections })
}

fn palette(
    section_id: String,
    title: String,
    sequence: i32,
    time_spent_seconds: i64,
    items: Vec<AttemptQuestion>,
) -> SectionPalette {
    let mut section = SectionPalette {
        section_id,
        title,
        sequence,
        attempted: 0,
        skipped: 0,
        marked_for_review: 0,
        unvisited: 0,
        time_spent_seconds,
        questions: Vec::with_capacity(items.len()),
    };

    for item in items {
        match item.status {
            QuestionStatus::Attempted => section.attempted += 1,
            QuestionStatus::Skipped => section.skipped += 1,
            QuestionStatus::Unattempted => {}
        }
        if item.is_marked_for_review {
            section.marked_for_review += 1;
        }
        if item.visit_count == 0 {
            section.unvisited += 1;
        }
        section.questions.push(PaletteEntry {
            attempt_question_id: item.id,
            sequence: item.sequence,
            status: item.status,
            is_marked_for_review: item.is_marked_for_review,
            visited: item.visit_count > 0,
        });
    }

    section
}

/// Scorecard plus per-question review. Score fields stay empty until the attempt is completed.
pub(crate) async fn result(
    state: &AppState,
    user_id: &str,
    attempt_id: &str,
) -> Result<AttemptResult, AttemptError> {
    let attempt = load_owned(state.db(), user_id, attempt_id).await?;
    let completed = attempt.status == AttemptStatus::Completed;

    let (percentile, passed) = match (completed, attempt.total_score, attempt.percentage) {
        (true, Some(total_score), Some(percentage)) => {
            let scores = repositories::attempts::list_completed_scores(
                state.db(),
                &attempt.test_definition_id,
            )
            .await?;
            let definition =
                repositories::catalog::find_definition(state.db(), &attempt.test_definition_id)
                    .await?
                    .ok_or(AttemptError::NotFound("Test definition"))?;
            (
                Some(scoring::percentile(&scores, total_score)),
                Some(scoring::passed(percentage, definition.passing_percentage)),
            )
        }
        _ => (None, None),
    };

    let items = repositories::attempt_questions::list_by_attempt(state.db(), attempt_id).await?;
    let question_ids: Vec<String> = items.iter().map(|item| item.question_id.clone()).collect();
    let mut catalog: HashMap<String, TestQuestion> =
        repositories::catalog::list_questions_by_ids(state.db(), &question_ids)
            .await?
            .into_iter()
            .map(|question| (question.id.clone(), question))
            .collect();

    let mut questions = Vec::with_capacity(items.len());
    for item in items {
        let question =
            catalog.remove(&item.question_id).ok_or(AttemptError::NotFound("Question"))?;
        questions.push(ReviewEntry {
            item,
            question_text: question.question_text,
            options: question.options,
            right_answer: completed.then_some(question.right_answer),
            explanation: if completed { question.explanation } else { None },
        });
    }

    Ok(AttemptResult { attempt, percentile, passed, questions })
}

/// The caller's attempts, newest first.
pub(crate) async fn history(
    state: &AppState,
    user_id: &str,
    test_definition_id: Option<&str>,
    skip: i64,
    limit: i64,
) -> Result<(Vec<Attempt>, i64), AttemptError> {
    let items =
        repositories::attempts::list_by_user(state.db(), user_id, test_definition_id, skip, limit)
            .await?;
    let total = repositories::attempts::count_by_user(state.db(), user_id, test_definition_id)
        .await?;
    Ok((items, total))
}
