use std::collections::BTreeMap;

use serde::Serialize;

pub(crate) mod exam;
pub(crate) mod extract;
pub(crate) mod student;
pub(crate) mod submission;
pub(crate) mod voice;

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) service: String,
    pub(crate) status: String,
    pub(crate) components: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RootResponse {
    pub(crate) message: String,
    pub(crate) version: String,
    pub(crate) api_prefix: String,
}

/// Receipt of a confirmed contract write.
#[derive(Debug, Serialize)]
pub(crate) struct TransactionResponse {
    pub(crate) transaction_hash: String,
    pub(crate) status: Option<String>,
}

impl From<crate::services::ledger::TxReceipt> for TransactionResponse {
    fn from(receipt: crate::services::ledger::TxReceipt) -> Self {
        Self { transaction_hash: receipt.transaction_hash, status: receipt.status }
    }
}
