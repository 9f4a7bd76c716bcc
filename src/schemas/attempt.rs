use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::api::pagination::default_limit;
use crate::core::time::format_primitive;
use crate::db::models::{Attempt, AttemptQuestion, SectionTiming};
use crate::db::types::{AttemptStatus, QuestionStatus};
use crate::services::attempt_lifecycle::MAX_TIME_DELTA_SECONDS;
use crate::services::attempts::{
    AttemptOverview, AttemptResult, PaletteEntry, QuestionView, ReviewEntry, ScoredResult,
    SectionPalette, SectionQuestions,
};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct StartAttemptRequest {
    #[validate(length(min = 1, message = "test_definition_id must not be empty"))]
    pub(crate) test_definition_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AnswerRequest {
    #[validate(length(min = 1, message = "answer must not be empty"))]
    pub(crate) answer: String,
    #[serde(default)]
    #[validate(range(min = 0, max = MAX_TIME_DELTA_SECONDS, message = "time_spent_delta out of range"))]
    pub(crate) time_spent_delta: i64,
    #[serde(default)]
    pub(crate) marked_for_review: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SkipRequest {
    #[serde(default)]
    #[validate(range(min = 0, max = MAX_TIME_DELTA_SECONDS, message = "time_spent_delta out of range"))]
    pub(crate) time_spent_delta: i64,
    #[serde(default)]
    pub(crate) marked_for_review: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ReviewRequest {
    pub(crate) marked_for_review: bool,
    #[serde(default)]
    #[validate(range(min = 0, max = MAX_TIME_DELTA_SECONDS, message = "time_spent_delta out of range"))]
    pub(crate) time_spent_delta: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SectionTimingRequest {
    #[validate(range(min = 0, max = MAX_TIME_DELTA_SECONDS, message = "time_spent_delta out of range"))]
    pub(crate) time_spent_delta: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AttemptHistoryQuery {
    pub(crate) test_definition_id: Option<String>,
    #[serde(default)]
    pub(crate) skip: i64,
    #[serde(default = "default_limit")]
    pub(crate) limit: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptResponse {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) test_definition_id: String,
    pub(crate) status: AttemptStatus,
    pub(crate) start_time: String,
    pub(crate) end_time: String,
    pub(crate) total_questions: i32,
    pub(crate) attempted_count: Option<i32>,
    pub(crate) correct_count: Option<i32>,
    pub(crate) wrong_count: Option<i32>,
    pub(crate) skipped_count: Option<i32>,
    pub(crate) marked_for_review_count: Option<i32>,
    pub(crate) total_score: Option<f64>,
    pub(crate) max_score: f64,
    pub(crate) percentage: Option<f64>,
    pub(crate) rank: Option<i32>,
    pub(crate) completed_at: Option<String>,
}

impl From<Attempt> for AttemptResponse {
    fn from(attempt: Attempt) -> Self {
        Self {
            id: attempt.id,
            user_id: attempt.user_id,
            test_definition_id: attempt.test_definition_id,
            status: attempt.status,
            start_time: format_primitive(attempt.start_time),
            end_time: format_primitive(attempt.end_time),
            total_questions: attempt.total_questions,
            attempted_count: attempt.attempted_count,
            correct_count: attempt.correct_count,
            wrong_count: attempt.wrong_count,
            skipped_count: attempt.skipped_count,
            marked_for_review_count: attempt.marked_for_review_count,
            total_score: attempt.total_score,
            max_score: attempt.max_score,
            percentage: attempt.percentage,
            rank: attempt.rank,
            completed_at: attempt.completed_at.map(format_primitive),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct StartAttemptResponse {
    #[serde(flatten)]
    pub(crate) attempt: AttemptResponse,
    pub(crate) resumed: bool,
}

/// Question as shown during an attempt. Never carries the right answer.
#[derive(Debug, Serialize)]
pub(crate) struct AttemptQuestionResponse {
    pub(crate) id: String,
    pub(crate) section_id: String,
    pub(crate) question_id: String,
    pub(crate) sequence: i32,
    pub(crate) question_text: String,
    pub(crate) options: serde_json::Value,
    pub(crate) user_answer: Option<String>,
    pub(crate) status: QuestionStatus,
    pub(crate) is_marked_for_review: bool,
    pub(crate) visit_count: i32,
    pub(crate) time_spent_seconds: i64,
}

impl From<QuestionView> for AttemptQuestionResponse {
    fn from(view: QuestionView) -> Self {
        let QuestionView { item, question } = view;
        Self {
            id: item.id,
            section_id: item.section_id,
            question_id: item.question_id,
            sequence: item.sequence,
            question_text: question.question_text,
            options: question.options.0,
            user_answer: item.user_answer,
            status: item.status,
            is_marked_for_review: item.is_marked_for_review,
            visit_count: item.visit_count,
            time_spent_seconds: item.time_spent_seconds,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SectionQuestionsResponse {
    pub(crate) attempt_id: String,
    pub(crate) section_id: String,
    pub(crate) remaining_seconds: i64,
    pub(crate) questions: Vec<AttemptQuestionResponse>,
}

impl From<SectionQuestions> for SectionQuestionsResponse {
    fn from(section: SectionQuestions) -> Self {
        Self {
            attempt_id: section.attempt_id,
            section_id: section.section_id,
            remaining_seconds: section.remaining_seconds,
            questions: section.questions.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionResponse {
    #[serde(flatten)]
    pub(crate) question: AttemptQuestionResponse,
    pub(crate) remaining_seconds: i64,
}

/// Mutable state of one attempt question after answer, skip or review.
#[derive(Debug, Serialize)]
pub(crate) struct QuestionStateResponse {
    pub(crate) id: String,
    pub(crate) status: QuestionStatus,
    pub(crate) user_answer: Option<String>,
    pub(crate) is_marked_for_review: bool,
    pub(crate) time_spent_seconds: i64,
    pub(crate) updated_at: String,
}

impl From<AttemptQuestion> for QuestionStateResponse {
    fn from(item: AttemptQuestion) -> Self {
        Self {
            id: item.id,
            status: item.status,
            user_answer: item.user_answer,
            is_marked_for_review: item.is_marked_for_review,
            time_spent_seconds: item.time_spent_seconds,
            updated_at: format_primitive(item.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SectionTimingResponse {
    pub(crate) section_id: String,
    pub(crate) sequence: i32,
    pub(crate) start_time: Option<String>,
    pub(crate) end_time: Option<String>,
    pub(crate) total_time_spent_seconds: i64,
}

impl From<SectionTiming> for SectionTimingResponse {
    fn from(timing: SectionTiming) -> Self {
        Self {
            section_id: timing.section_id,
            sequence: timing.sequence,
            start_time: timing.start_time.map(format_primitive),
            end_time: timing.end_time.map(format_primitive),
            total_time_spent_seconds: timing.total_time_spent_seconds,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ScoredResultResponse {
    pub(crate) attempt_id: String,
    pub(crate) status: AttemptStatus,
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
    pub(crate) completed_at: String,
}

impl From<ScoredResult> for ScoredResultResponse {
    fn from(result: ScoredResult) -> Self {
        Self {
            attempt_id: result.attempt_id,
            status: AttemptStatus::Completed,
            total_questions: result.total_questions,
            attempted_count: result.attempted_count,
            correct_count: result.correct_count,
            wrong_count: result.wrong_count,
            skipped_count: result.skipped_count,
            marked_for_review_count: result.marked_for_review_count,
            total_score: result.total_score,
            max_score: result.max_score,
            percentage: result.percentage,
            rank: result.rank,
            completed_at: format_primitive(result.finished_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct PaletteEntryResponse {
    pub(crate) attempt_question_id: String,
    pub(crate) sequence: i32,
    pub(crate) status: QuestionStatus,
    pub(crate) is_marked_for_review: bool,
    pub(crate) visited: bool,
}

impl From<PaletteEntry> for PaletteEntryResponse {
    fn from(entry: PaletteEntry) -> Self {
        Self {
            attempt_question_id: entry.attempt_question_id,
            sequence: entry.sequence,
            status: entry.status,
            is_marked_for_review: entry.is_marked_for_review,
            visited: entry.visited,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SectionPaletteResponse {
    pub(crate) section_id: String,
    pub(crate) title: String,
    pub(crate) sequence: i32,
    pub(crate) attempted: i32,
    pub(crate) skipped: i32,
    pub(crate) marked_for_review: i32,
    pub(crate) unvisited: i32,
    pub(crate) time_spent_seconds: i64,
    pub(crate) questions: Vec<PaletteEntryResponse>,
}

impl From<SectionPalette> for SectionPaletteResponse {
    fn from(section: SectionPalette) -> Self {
        Self {
            section_id: section.section_id,
            title: section.title,
            sequence: section.sequence,
            attempted: section.attempted,
            skipped: section.skipped,
            marked_for_review: section.marked_for_review,
            unvisited: section.unvisited,
            time_spent_seconds: section.time_spent_seconds,
            questions: section.questions.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptOverviewResponse {
    pub(crate) attempt: AttemptResponse,
    pub(crate) remaining_seconds: i64,
    pub(crate) sections: Vec<SectionPaletteResponse>,
}

impl From<AttemptOverview> for AttemptOverviewResponse {
    fn from(overview: AttemptOverview) -> Self {
        Self {
            attempt: overview.attempt.into(),
            remaining_seconds: overview.remaining_seconds,
            sections: overview.sections.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ReviewQuestionResponse {
    pub(crate) id: String,
    pub(crate) section_id: String,
    pub(crate) sequence: i32,
    pub(crate) question_text: String,
    pub(crate) options: serde_json::Value,
    pub(crate) user_answer: Option<String>,
    pub(crate) is_correct: Option<bool>,
    pub(crate) status: QuestionStatus,
    pub(crate) is_marked_for_review: bool,
    pub(crate) time_spent_seconds: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) right_answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) explanation: Option<String>,
}

impl From<ReviewEntry> for ReviewQuestionResponse {
    fn from(entry: ReviewEntry) -> Self {
        let revealed = entry.right_answer.is_some();
        Self {
            id: entry.item.id,
            section_id: entry.item.section_id,
            sequence: entry.item.sequence,
            question_text: entry.question_text,
            options: entry.options.0,
            user_answer: entry.item.user_answer,
            is_correct: if revealed { entry.item.is_correct } else { None },
            status: entry.item.status,
            is_marked_for_review: entry.item.is_marked_for_review,
            time_spent_seconds: entry.item.time_spent_seconds,
            right_answer: entry.right_answer,
            explanation: entry.explanation,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptResultResponse {
    pub(crate) attempt: AttemptResponse,
    pub(crate) percentile: Option<f64>,
    pub(crate) passed: Option<bool>,
    pub(crate) questions: Vec<ReviewQuestionResponse>,
}

impl From<AttemptResult> for AttemptResultResponse {
    fn from(result: AttemptResult) -> Self {
        Self {
            attempt: result.attempt.into(),
            percentile: result.percentile,
            passed: result.passed,
            questions: result.questions.into_iter().map(Into::into).collect(),
        }
    }
}
