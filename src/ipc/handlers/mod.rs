pub mod core;
pub mod counters;
pub mod students;

use crate::admission::{AdmissionError, AdmissionRegistrar};
use crate::ipc::error::err;
use crate::store::SqliteDocumentStore;
use serde_json::json;

pub(crate) struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn bad_params(message: impl Into<String>) -> Self {
        Self {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<AdmissionError> for HandlerErr {
    fn from(e: AdmissionError) -> Self {
        let details = match &e {
            AdmissionError::TransactionConflict { attempts } => {
                Some(json!({ "attempts": attempts, "retryable": true }))
            }
            AdmissionError::StorageUnavailable(_) => Some(json!({ "retryable": true })),
            AdmissionError::CounterNotFound(key) | AdmissionError::CounterExists(key) => {
                Some(json!({ "collection": key.collection, "docId": key.doc_id }))
            }
            _ => None,
        };
        Self {
            code: e.code(),
            message: e.to_string(),
            details,
        }
    }
}

pub(crate) fn registrar(
    registrar: Option<&AdmissionRegistrar<SqliteDocumentStore>>,
) -> Result<&AdmissionRegistrar<SqliteDocumentStore>, HandlerErr> {
    registrar.ok_or_else(|| HandlerErr {
        code: "no_workspace",
        message: "select a workspace first".into(),
        details: None,
    })
}

pub(crate) fn get_required_str(
    params: &serde_json::Value,
    key: &str,
) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub(crate) fn get_object(
    params: &serde_json::Value,
    key: &str,
) -> Result<serde_json::Map<String, serde_json::Value>, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_object())
        .cloned()
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {} object", key)))
}
