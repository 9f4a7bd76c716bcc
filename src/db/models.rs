use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{AttemptStatus, QuestionStatus};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct TestDefinition {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) duration_minutes: i32,
    pub(crate) correct_marks: f64,
    pub(crate) negative_marks: f64,
    pub(crate) passing_percentage: f64,
    pub(crate) is_free: bool,
    pub(crate) is_active: bool,
    pub(crate) shuffle_questions: bool,
    pub(crate) deleted_at: Option<PrimitiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct TestSection {
    pub(crate) id: String,
    pub(crate) test_definition_id: String,
    pub(crate) title: String,
    pub(crate) sequence: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct TestQuestion {
    pub(crate) id: String,
    pub(crate) test_definition_id: String,
    pub(crate) section_id: String,
    pub(crate) sequence: i32,
    pub(crate) question_text: String,
    pub(crate) options: Json<serde_json::Value>,
    pub(crate) right_answer: String,
    pub(crate) explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Attempt {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) test_definition_id: String,
    pub(crate) status: AttemptStatus,
    pub(crate) question_seed: i64,
    pub(crate) start_time: PrimitiveDateTime,
    /// Deadline while started, actual finish time once completed.
    pub(crate) end_time: PrimitiveDateTime,
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
    pub(crate) completed_at: Option<PrimitiveDateTime>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct AttemptQuestion {
    pub(crate) id: String,
    pub(crate) attempt_id: String,
    pub(crate) section_id: String,
    pub(crate) question_id: String,
    pub(crate) sequence: i32,
    pub(crate) user_answer: Option<String>,
    pub(crate) is_correct: Option<bool>,
    pub(crate) status: QuestionStatus,
    pub(crate) is_marked_for_review: bool,
    pub(crate) visit_count: i32,
    pub(crate) time_spent_seconds: i64,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct SectionTiming {
    pub(crate) attempt_id: String,
    pub(crate) section_id: String,
    pub(crate) sequence: i32,
    pub(crate) start_time: Option<PrimitiveDateTime>,
    pub(crate) end_time: Option<PrimitiveDateTime>,
    pub(crate) total_time_spent_seconds: i64,
}
