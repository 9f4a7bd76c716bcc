//! Transition rules of an attempt, independent of storage.
//!
//! An attempt is `Started` until it is finalized, then `Completed` forever. Question-level
//! operations are only legal while the attempt is started *and* its deadline has not passed;
//! the deadline check does not wait for the scheduler to run.

use thiserror::Error;
use time::PrimitiveDateTime;

use crate::db::models::Attempt;
use crate::db::types::{AttemptStatus, QuestionStatus};

/// Upper bound for a single time-spent delta reported by a client.
pub(crate) const MAX_TIME_DELTA_SECONDS: i64 = 24 * 60 * 60;

#[derive(Debug, Error)]
pub(crate) enum AttemptError {
    #[error("an active purchase is required for this test")]
    EntitlementRequired,
    #[error("test has no sections or questions")]
    EmptyTest,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("attempt belongs to another user")]
    Forbidden,
    #[error("attempt time is over")]
    AttemptExpired,
    #[error("attempt is already completed")]
    AttemptCompleted,
    #[error("attempt was already submitted")]
    AlreadyCompleted,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl AttemptError {
    pub(crate) fn code(&self) -> &'static str {
        match self {
            Self::EntitlementRequired => "ENTITLEMENT_REQUIRED",
            Self::EmptyTest => "EMPTY_TEST",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Forbidden => "FORBIDDEN",
            Self::AttemptExpired => "ATTEMPT_EXPIRED",
            Self::AttemptCompleted => "ATTEMPT_COMPLETED",
            Self::AlreadyCompleted => "ALREADY_COMPLETED",
            Self::Validation(_) => "VALIDATION",
            Self::Database(_) => "INTERNAL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FinalizeMode {
    Manual,
    Auto,
}

impl FinalizeMode {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Auto => "auto",
        }
    }
}

/// What a finalize call should do with the attempt it locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FinalizeDecision {
    Score,
    NoOp,
}

pub(crate) fn ensure_owner(attempt: &Attempt, user_id: &str) -> Result<(), AttemptError> {
    if attempt.user_id == user_id {
        Ok(())
    } else {
        Err(AttemptError::Forbidden)
    }
}

pub(crate) fn ensure_live(attempt: &Attempt, now: PrimitiveDateTime) -> Result<(), AttemptError> {
    match attempt.status {
        AttemptStatus::Completed => Err(AttemptError::AttemptCompleted),
        AttemptStatus::Started if now >= attempt.end_time => Err(AttemptError::AttemptExpired),
        AttemptStatus::Started => Ok(()),
    }
}

/// Manual submit of a completed attempt is an error; the scheduler just stands down.
pub(crate) fn finalize_decision(
    attempt: &Attempt,
    mode: FinalizeMode,
) -> Result<FinalizeDecision, AttemptError> {
    match (attempt.status, mode) {
        (AttemptStatus::Started, _) => Ok(FinalizeDecision::Score),
        (AttemptStatus::Completed, FinalizeMode::Manual) => Err(AttemptError::AlreadyCompleted),
        (AttemptStatus::Completed, FinalizeMode::Auto) => Ok(FinalizeDecision::NoOp),
    }
}

pub(crate) fn validate_time_delta(delta: i64) -> Result<i64, AttemptError> {
    if !(0..=MAX_TIME_DELTA_SECONDS).contains(&delta) {
        return Err(AttemptError::Validation(format!(
            "time_spent_delta must be between 0 and {MAX_TIME_DELTA_SECONDS} seconds"
        )));
    }
    Ok(delta)
}

pub(crate) fn validate_answer(answer: &str) -> Result<(), AttemptError> {
    if answer.trim().is_empty() {
        return Err(AttemptError::Validation("answer must not be empty".to_string()));
    }
    Ok(())
}

/// Plain equality with the catalog answer, no normalisation.
pub(crate) fn is_correct_answer(answer: &str, right_answer: &str) -> bool {
    answer == right_answer
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AnswerChange {
    Keep,
    Set { answer: String, is_correct: bool },
}

/// Field-wise update of one attempt question. `None` leaves the stored value alone.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct QuestionPatch {
    pub(crate) answer: AnswerChange,
    pub(crate) status: Option<QuestionStatus>,
    pub(crate) marked_for_review: Option<bool>,
    pub(crate) time_spent_delta: i64,
}

impl QuestionPatch {
    /// Re-answering is always allowed while live; the last answer wins.
    pub(crate) fn answer(
        answer: &str,
        right_answer: &str,
        time_spent_delta: i64,
        marked_for_review: Option<bool>,
    ) -> Result<Self, AttemptError> {
        validate_answer(answer)?;

        Ok(Self {
            answer: AnswerChange::Set {
                answer: answer.to_string(),
                is_correct: is_correct_answer(answer, right_answer),
            },
            status: Some(QuestionStatus::Attempted),
            marked_for_review,
            time_spent_delta: validate_time_delta(time_spent_delta)?,
        })
    }

    /// Skip overrides the status but keeps a previously recorded answer.
    pub(crate) fn skip(
        time_spent_delta: i64,
        marked_for_review: Option<bool>,
    ) -> Result<Self, AttemptError> {
        Ok(Self {
            answer: AnswerChange::Keep,
            status: Some(QuestionStatus::Skipped),
            marked_for_review,
            time_spent_delta: validate_time_delta(time_spent_delta)?,
        })
    }

    pub(crate) fn review(flag: bool, time_spent_delta: Option<i64>) -> Result<Self, AttemptError> {
        Ok(Self {
            answer: AnswerChange::Keep,
            status: None,
            marked_for_review: Some(flag),
            time_spent_delta: validate_time_delta(time_spent_delta.unwrap_or(0))?,
        })
    }
}
