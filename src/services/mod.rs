pub(crate) mod attempt_lifecycle;
pub(crate) mod attempts;
pub(crate) mod auto_submit;
pub(crate) mod entitlement;
pub(crate) mod question_order;
pub(crate) mod scoring;
