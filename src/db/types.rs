use serde::{Deserialize, Serialize};
use sqlx::Type;

/// Only two states are reachable: an attempt is live until it is scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "attemptstatus", rename_all = "lowercase")]
pub(crate) enum AttemptStatus {
    Started,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "questionstatus", rename_all = "lowercase")]
pub(crate) enum QuestionStatus {
    Unattempted,
    Attempted,
    Skipped,
}
