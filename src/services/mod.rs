pub(crate) mod content_store;
pub(crate) mod exam_status;
pub(crate) mod ledger;
pub(crate) mod question_extraction;
pub(crate) mod reconciliation;
pub(crate) mod scoring;
pub(crate) mod voice;
