use serde_json::Value;
use std::fmt;
use thiserror::Error;

use super::record::SequenceCounter;
use crate::store::{Document, StoreError, Transaction};

pub const ADMISSION_TRACKER_COLLECTION: &str = "ADMISSION_TRACKER";
pub const ADMISSION_TRACKER_DOC: &str = "admission_number_tracker";

/// Addresses one counter document. Separate sequences (per year, per program)
/// are separate keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey {
    pub collection: String,
    pub doc_id: String,
}

impl CounterKey {
    pub fn new(collection: impl Into<String>, doc_id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            doc_id: doc_id.into(),
        }
    }

    pub fn admission() -> Self {
        Self::new(ADMISSION_TRACKER_COLLECTION, ADMISSION_TRACKER_DOC)
    }
}

impl Default for CounterKey {
    fn default() -> Self {
        Self::admission()
    }
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.doc_id)
    }
}

#[derive(Debug, Error)]
pub enum AllocError {
    #[error("counter {0} not found")]
    CounterNotFound(CounterKey),
    #[error("counter {0} has no valid total_count")]
    Corrupt(CounterKey),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Stages `total_count + 1` on `tx` and returns the new value.
///
/// The value is provisional until `tx` commits. Two transactions that read the
/// same counter version cannot both commit; the store rejects the later one
/// and the caller decides whether to retry.
pub fn allocate_next(
    tx: &mut dyn Transaction,
    key: &CounterKey,
    now: &str,
) -> Result<u64, AllocError> {
    let Some(doc) = tx.get(&key.collection, &key.doc_id)? else {
        return Err(AllocError::CounterNotFound(key.clone()));
    };
    let Some(counter) = SequenceCounter::from_document(&doc) else {
        return Err(AllocError::Corrupt(key.clone()));
    };
    let Some(next) = counter.total_count.checked_add(1) else {
        return Err(AllocError::Corrupt(key.clone()));
    };

    let mut staged = Document::new();
    staged.insert("total_count".into(), Value::from(next));
    staged.insert("updated_at".into(), Value::String(now.to_string()));
    tx.update(&key.collection, &key.doc_id, staged)?;
    Ok(next)
}
