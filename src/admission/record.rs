use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::store::Document;

pub const STUDENTS_COLLECTION: &str = "STUDENTS";

/// Flat key/value mapping submitted by the admission form.
pub type StudentFields = Map<String, Value>;

pub const REQUIRED_FIELDS: [&str; 3] = ["name", "dob", "class"];

/// Keys owned by the registrar. Submitted values for these are discarded.
pub const RESERVED_KEYS: [&str; 6] = [
    "id",
    "admission_no",
    "student_id",
    "student_pass",
    "created_at",
    "updated_at",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub id: String,
    pub admission_no: String,
    pub student_id: String,
    pub student_pass: String,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub fields: StudentFields,
}

impl StudentRecord {
    pub fn to_document(&self) -> Result<Document, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Err(serde::ser::Error::custom(
                "student record did not serialize to an object",
            )),
        }
    }

    pub fn from_document(doc: Document) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(doc))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceCounter {
    pub total_count: u64,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl SequenceCounter {
    pub fn from_document(doc: &Document) -> Option<Self> {
        serde_json::from_value(Value::Object(doc.clone())).ok()
    }

    pub fn to_document(&self) -> Document {
        let mut doc = Map::new();
        doc.insert("total_count".into(), Value::from(self.total_count));
        doc.insert(
            "updated_at".into(),
            self.updated_at
                .as_ref()
                .map(|s| Value::String(s.clone()))
                .unwrap_or(Value::Null),
        );
        doc
    }
}

fn is_present(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

/// Names of required fields that are absent, null or blank.
pub fn missing_required(fields: &StudentFields) -> Vec<&'static str> {
    REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|k| !is_present(fields.get(*k)))
        .collect()
}

pub fn strip_reserved(mut fields: StudentFields) -> StudentFields {
    for k in RESERVED_KEYS {
        fields.remove(k);
    }
    fields
}

/// Text form of a field value; strings are used verbatim, other primitives via JSON.
pub fn field_text(fields: &StudentFields, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.trim().to_string()),
        other => Some(other.to_string()),
    }
}
