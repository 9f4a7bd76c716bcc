use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{seq::SliceRandom, SeedableRng};
use uuid::Uuid;

use crate::db::models::{TestQuestion, TestSection};
use crate::repositories::attempt_questions::NewAttemptQuestion;

/// Questions of an attempt in delivery order. Sections keep catalog order; `sequence` runs
/// 1..N across sections.
#[derive(Debug)]
pub(crate) struct QuestionPlan {
    pub(crate) section_ids: Vec<String>,
    pub(crate) questions: Vec<NewAttemptQuestion>,
}

impl QuestionPlan {
    pub(crate) fn is_empty(&self) -> bool {
        self.section_ids.is_empty() || self.questions.is_empty()
    }
}

pub(crate) fn new_seed() -> i64 {
    i64::from(rand::random::<u32>())
}

/// Groups `questions` under `sections`. Questions whose section is not in `sections` are dropped.
pub(crate) fn plan(
    sections: &[TestSection],
    questions: Vec<TestQuestion>,
    shuffle_seed: Option<i64>,
) -> QuestionPlan {
    let mut by_section: HashMap<&str, Vec<TestQuestion>> =
        sections.iter().map(|section| (section.id.as_str(), Vec::new())).collect();

    for question in questions {
        if let Some(bucket) = by_section.get_mut(question.section_id.as_str()) {
            bucket.push(question);
        }
    }

    let mut rng = shuffle_seed.map(|seed| StdRng::seed_from_u64(seed as u64));
    let mut ordered = Vec::new();
    let mut sequence = 0;

    for section in sections {
        let Some(mut bucket) = by_section.remove(section.id.as_str()) else {
            continue;
        };
        if let Some(rng) = rng.as_mut() {
            bucket.shuffle(rng);
        }
        for question in bucket {
            sequence += 1;
            ordered.push(NewAttemptQuestion {
                id: Uuid::new_v4().to_string(),
                section_id: question.section_id,
                question_id: question.id,
                sequence,
            });
        }
    }

    QuestionPlan {
        section_ids: sections.iter().map(|section| section.id.clone()).collect(),
        questions: ordered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::Json;

    fn section(id: &str, sequence: i32) -> TestSection {
        TestSection {
            id: id.to_string(),
            test_definition_id: "test".to_string(),
            title: id.to_string(),
            sequence,
        }
    }

    fn question(id: &str, section_id: &str, sequence: i32) -> TestQuestion {
        TestQuestion {
            id: id.to_string(),
            test_definition_id: "test".to_string(),
            section_id: section_id.to_string(),
            sequence,
            question_text: format!("Question {id}"),
            options: Json(serde_json::json!(["A", "B"])),
            right_answer: "A".to_string(),
            explanation: None,
        }
    }

    fn catalog() -> (Vec<TestSection>, Vec<TestQuestion>) {
        let sections = vec![section("s1", 1), section("s2", 2)];
        let questions = vec![
            question("q1", "s2", 1),
            question("q2", "s1", 2),
            question("q3", "s1", 3),
            question("q4", "s2", 4),
            question("q5", "s1", 5),
        ];
        (sections, questions)
    }

    #[test]
    fn sequences_run_section_then_position() {
        let (sections, questions) = catalog();
        let plan = plan(&sections, questions, None);

        let order: Vec<(&str, &str, i32)> = plan
            .questions
            .iter()
            .map(|item| (item.section_id.as_str(), item.question_id.as_str(), item.sequence))
            .collect();
        assert_eq!(
            order,
            vec![
                ("s1", "q2", 1),
                ("s1", "q3", 2),
                ("s1", "q5", 3),
                ("s2", "q1", 4),
                ("s2", "q4", 5),
            ]
        );
        assert_eq!(plan.section_ids, vec!["s1".to_string(), "s2".to_string()]);
    }

    #[test]
    fn shuffle_is_stable_per_seed_and_stays_within_sections() {
        let (sections, questions) = catalog();
        let first = plan(&sections, questions.clone(), Some(42));
        let second = plan(&sections, questions, Some(42));

        let ids = |plan: &QuestionPlan| -> Vec<String> {
            plan.questions.iter().map(|item| item.question_id.clone()).collect()
        };
        assert_eq!(ids(&first), ids(&second));

        let first_section: Vec<&str> =
            first.questions.iter().take(3).map(|item| item.section_id.as_str()).collect();
        assert_eq!(first_section, vec!["s1", "s1", "s1"]);
        let sequences: Vec<i32> = first.questions.iter().map(|item| item.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn orphaned_questions_are_dropped() {
        let sections = vec![section("s1", 1)];
        let questions = vec![question("q1", "s1", 1), question("q2", "gone", 2)];
        let plan = plan(&sections, questions, None);

        assert_eq!(plan.questions.len(), 1);
        assert_eq!(plan.questions[0].question_id, "q1");
    }

    #[test]
    fn empty_inputs_produce_an_empty_plan() {
        assert!(plan(&[], vec![question("q1", "s1", 1)], None).is_empty());
        assert!(plan(&[section("s1", 1)], Vec::new(), None).is_empty());
    }
}
