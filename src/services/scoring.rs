//! Marking, rank and percentile arithmetic.
//!
//! `score = correct * correct_marks - wrong * negative_marks`, where `negative_marks` is a
//! non-negative magnitude. Only questions whose status is `Attempted` are marked; a question
//! that was answered and later skipped counts as skipped.

use crate::db::models::AttemptQuestion;
use crate::db::types::QuestionStatus;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct MarkingScheme {
    pub(crate) correct_marks: f64,
    pub(crate) negative_marks: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Tally {
    pub(crate) total: i32,
    pub(crate) attempted: i32,
    pub(crate) correct: i32,
    pub(crate) wrong: i32,
    pub(crate) skipped: i32,
    pub(crate) marked_for_review: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ScoreCard {
    pub(crate) tally: Tally,
    pub(crate) total_score: f64,
    pub(crate) max_score: f64,
    pub(crate) percentage: f64,
}

pub(crate) fn tally(questions: &[AttemptQuestion]) -> Tally {
    let mut tally = Tally { total: questions.len() as i32, ..Tally::default() };

    for question in questions {
        match question.status {
            QuestionStatus::Attempted => {
                tally.attempted += 1;
                match question.is_correct {
                    Some(true) => tally.correct += 1,
                    Some(false) => tally.wrong += 1,
                    None => {}
                }
            }
            QuestionStatus::Skipped => tally.skipped += 1,
            QuestionStatus::Unattempted => {}
        }
        if question.is_marked_for_review {
            tally.marked_for_review += 1;
        }
    }

    tally
}

pub(crate) fn max_score(total_questions: i32, scheme: MarkingScheme) -> f64 {
    f64::from(total_questions.max(0)) * scheme.correct_marks
}

pub(crate) fn score(tally: Tally, scheme: MarkingScheme) -> ScoreCard {
    let total_score = f64::from(tally.correct) * scheme.correct_marks
        - f64::from(tally.wrong) * scheme.negative_marks.abs();
    let max_score = max_score(tally.total, scheme);

    ScoreCard { tally, total_score, max_score, percentage: percentage(total_score, max_score) }
}

/// Share of `max_score`, rounded to two decimals. A zero maximum yields 0.
pub(crate) fn percentage(total_score: f64, max_score: f64) -> f64 {
    if !max_score.is_finite() || max_score <= 0.0 || !total_score.is_finite() {
        return 0.0;
    }
    round2(total_score / max_score * 100.0)
}

/// 1 + number of completed competitors with a strictly greater score.
pub(crate) fn rank_from_higher_count(higher: i64) -> i32 {
    i32::try_from(higher.max(0)).unwrap_or(i32::MAX - 1) + 1
}

/// Share of `scores` at or below `score`, 0..=100.
pub(crate) fn percentile(scores: &[f64], score: f64) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let at_or_below = scores.iter().filter(|candidate| **candidate <= score).count();
    round2(at_or_below as f64 / scores.len() as f64 * 100.0)
}

pub(crate) fn passed(percentage: f64, passing_percentage: f64) -> bool {
    percentage >= passing_percentage
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn question(status: QuestionStatus, is_correct: Option<bool>, marked: bool) -> AttemptQuestion {
        AttemptQuestion {
            id: uuid::Uuid::new_v4().to_string(),
            attempt_id: "attempt".to_string(),
            section_id: "section".to_string(),
            question_id: uuid::Uuid::new_v4().to_string(),
            sequence: 1,
            user_answer: is_correct.map(|_| "A".to_string()),
            is_correct,
            status,
            is_marked_for_review: marked,
            visit_count: 1,
            time_spent_seconds: 0,
            updated_at: datetime!(2025-01-01 0:00),
        }
    }

    fn sample_paper() -> Vec<AttemptQuestion> {
        let mut questions = Vec::new();
        for _ in 0..6 {
            questions.push(question(QuestionStatus::Attempted, Some(true), false));
        }
        for _ in 0..3 {
            questions.push(question(QuestionStatus::Attempted, Some(false), false));
        }
        questions.push(question(QuestionStatus::Skipped, None, true));
        questions
    }

    #[test]
    fn negative_marking_example() {
        let scheme = MarkingScheme { correct_marks: 2.0, negative_marks: 0.5 };
        let card = score(tally(&sample_paper()), scheme);

        assert_eq!(card.tally.total, 10);
        assert_eq!(card.tally.attempted, 9);
        assert_eq!(card.tally.correct, 6);
        assert_eq!(card.tally.wrong, 3);
        assert_eq!(card.tally.skipped, 1);
        assert_eq!(card.tally.marked_for_review, 1);
        assert_eq!(card.total_score, 10.5);
        assert_eq!(card.max_score, 20.0);
        assert_eq!(card.percentage, 52.5);
    }

    #[test]
    fn zero_correct_marks_yields_zero_percentage() {
        let scheme = MarkingScheme { correct_marks: 0.0, negative_marks: 1.0 };
        let card = score(tally(&sample_paper()), scheme);

        assert_eq!(card.max_score, 0.0);
        assert_eq!(card.total_score, -3.0);
        assert_eq!(card.percentage, 0.0);
        assert!(!card.percentage.is_nan());
    }

    #[test]
    fn empty_paper_yields_zero_percentage() {
        let scheme = MarkingScheme { correct_marks: 4.0, negative_marks: 1.0 };
        let card = score(tally(&[]), scheme);
        assert_eq!(card.max_score, 0.0);
        assert_eq!(card.percentage, 0.0);
    }

    #[test]
    fn score_may_go_negative() {
        let scheme = MarkingScheme { correct_marks: 1.0, negative_marks: 1.0 };
        let questions = vec![
            question(QuestionStatus::Attempted, Some(false), false),
            question(QuestionStatus::Attempted, Some(false), false),
            question(QuestionStatus::Unattempted, None, false),
        ];
        let card = score(tally(&questions), scheme);
        assert_eq!(card.total_score, -2.0);
        assert_eq!(card.percentage, -66.67);
    }

    #[test]
    fn skipped_question_with_prior_answer_is_not_marked() {
        let scheme = MarkingScheme { correct_marks: 1.0, negative_marks: 0.0 };
        let questions = vec![question(QuestionStatus::Skipped, Some(true), false)];
        let card = score(tally(&questions), scheme);

        assert_eq!(card.tally.correct, 0);
        assert_eq!(card.tally.skipped, 1);
        assert_eq!(card.total_score, 0.0);
    }

    #[test]
    fn rank_counts_strictly_higher_scores() {
        assert_eq!(rank_from_higher_count(0), 1);
        assert_eq!(rank_from_higher_count(4), 5);
        assert_eq!(rank_from_higher_count(-3), 1);
    }

    #[test]
    fn percentile_counts_ties_as_at_or_below() {
        let scores = [10.0, 20.0, 20.0, 30.0];
        assert_eq!(percentile(&scores, 20.0), 75.0);
        assert_eq!(percentile(&scores, 30.0), 100.0);
        assert_eq!(percentile(&scores, 5.0), 0.0);
        assert_eq!(percentile(&[], 5.0), 0.0);
    }

    #[test]
    fn pass_threshold_is_inclusive() {
        assert!(passed(40.0, 40.0));
        assert!(!passed(39.99, 40.0));
    }
}
