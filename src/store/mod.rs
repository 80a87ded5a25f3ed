//! Collection/id keyed JSON document store with optimistic transactions.
//!
//! Every document carries a `version` that is bumped on each write. A
//! [`Transaction`] remembers the version of everything it reads and only
//! buffers its writes; `commit` re-checks those versions under the store's
//! write lock and applies the buffered writes all at once, or nothing.

mod sqlite;

pub use sqlite::{SqliteDocumentStore, StoreConfig, DEFAULT_BUSY_TIMEOUT_MS};

use rusqlite::ErrorCode;
use serde_json::{Map, Value};
use thiserror::Error;

pub type Document = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub id: String,
    pub version: i64,
    pub body: Document,
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// A document read by the transaction changed before it committed.
    #[error("write conflict on {collection}/{id}")]
    Conflict { collection: String, id: String },
    #[error("document {collection}/{id} already exists")]
    AlreadyExists { collection: String, id: String },
    #[error("document {collection}/{id} not found")]
    NotFound { collection: String, id: String },
    /// The write lock could not be taken within the busy timeout.
    #[error("store busy: {0}")]
    Busy(String),
    #[error("store db error: {0}")]
    Db(String),
    #[error("invalid document {collection}/{id}: {message}")]
    Invalid {
        collection: String,
        id: String,
        message: String,
    },
}

impl StoreError {
    /// Conflicts and lock contention go away when the work is redone from fresh reads.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Conflict { .. } | StoreError::Busy(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                StoreError::Busy(e.to_string())
            }
            _ => StoreError::Db(e.to_string()),
        }
    }
}

pub trait DocumentStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Snapshot>, StoreError>;

    /// Creates or replaces the whole document. Last write wins.
    fn set(&self, collection: &str, id: &str, body: &Document) -> Result<(), StoreError>;

    /// Returns false when there was nothing to delete.
    fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError>;

    fn list(&self, collection: &str) -> Result<Vec<Snapshot>, StoreError>;

    fn server_timestamp(&self) -> String;

    fn begin(&self) -> Result<Box<dyn Transaction + '_>, StoreError>;
}

/// Writes are staged in memory until `commit`. Dropping a transaction without
/// committing discards them.
pub trait Transaction {
    fn get(&mut self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Stages creation of a document that must not exist at commit time.
    fn create(&mut self, collection: &str, id: &str, body: Document) -> Result<(), StoreError>;

    /// Stages a merge of `fields` into a document that must exist at commit time.
    fn update(&mut self, collection: &str, id: &str, fields: Document) -> Result<(), StoreError>;

    fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

pub fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub(crate) fn parse_body(collection: &str, id: &str, raw: &str) -> Result<Document, StoreError> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(StoreError::Invalid {
            collection: collection.to_string(),
            id: id.to_string(),
            message: "body is not a JSON object".into(),
        }),
        Err(e) => Err(StoreError::Invalid {
            collection: collection.to_string(),
            id: id.to_string(),
            message: e.to_string(),
        }),
    }
}
