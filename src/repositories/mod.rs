pub(crate) mod attempt_questions;
pub(crate) mod attempts;
pub(crate) mod catalog;
pub(crate) mod health;
pub(crate) mod purchases;
pub(crate) mod section_timings;
