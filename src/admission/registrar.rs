use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::allocator::{self, AllocError, CounterKey};
use super::credentials::{self, DEFAULT_LOGIN_DOMAIN, DEFAULT_PROGRAM_TAG};
use super::error::AdmissionError;
use super::record::{
    field_text, missing_required, strip_reserved, SequenceCounter, StudentFields, StudentRecord,
    STUDENTS_COLLECTION,
};
use crate::assets::{ImageProcessor, ImageUpload};
use crate::store::{DocumentStore, StoreError};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 10;

/// Patch keys that never change after enrollment.
const IMMUTABLE_KEYS: [&str; 3] = ["id", "admission_no", "created_at"];

#[derive(Debug, Clone)]
pub struct RegistrarConfig {
    pub program_tag: String,
    pub login_domain: String,
    pub counter_key: CounterKey,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
}

impl Default for RegistrarConfig {
    fn default() -> Self {
        Self {
            program_tag: DEFAULT_PROGRAM_TAG.to_string(),
            login_domain: DEFAULT_LOGIN_DOMAIN.to_string(),
            counter_key: CounterKey::admission(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
        }
    }
}

pub struct AdmissionRegistrar<S> {
    store: S,
    images: Box<dyn ImageProcessor>,
    config: RegistrarConfig,
}

fn storage(e: StoreError) -> AdmissionError {
    AdmissionError::StorageUnavailable(e.to_string())
}

impl<S: DocumentStore> AdmissionRegistrar<S> {
    pub fn new(store: S, images: Box<dyn ImageProcessor>, config: RegistrarConfig) -> Self {
        Self {
            store,
            images,
            config,
        }
    }

    /// Allocates the next admission number and creates the student record in
    /// one transaction. Either both happen or neither does.
    pub fn enroll(&self, fields: StudentFields) -> Result<StudentRecord, AdmissionError> {
        let missing = missing_required(&fields);
        if !missing.is_empty() {
            return Err(AdmissionError::Validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }

        let id = Uuid::new_v4().simple().to_string();
        let fields = strip_reserved(fields);
        let max_attempts = self.config.max_attempts.max(1);

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.try_enroll(&id, &fields, attempt) {
                Ok(record) => {
                    info!(
                        id = %record.id,
                        admission_no = %record.admission_no,
                        attempts = attempt,
                        "student enrolled"
                    );
                    return Ok(record);
                }
                Err(AdmissionError::TransactionConflict { .. }) if attempt < max_attempts => {
                    warn!(attempt, max_attempts, "admission counter moved underneath us; retrying");
                    std::thread::sleep(self.config.retry_backoff * attempt);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn try_enroll(
        &self,
        id: &str,
        fields: &StudentFields,
        attempt: u32,
    ) -> Result<StudentRecord, AdmissionError> {
        let now = self.store.server_timestamp();
        let key = &self.config.counter_key;
        let mut tx = self.store.begin().map_err(storage)?;

        let seq = match allocator::allocate_next(tx.as_mut(), key, &now) {
            Ok(v) => v,
            Err(AllocError::CounterNotFound(k)) => return Err(AdmissionError::CounterNotFound(k)),
            Err(AllocError::Corrupt(k)) => {
                return Err(AdmissionError::StorageUnavailable(format!(
                    "admission counter {} is corrupt",
                    k
                )))
            }
            Err(AllocError::Store(e)) if e.is_retryable() => {
                return Err(AdmissionError::TransactionConflict { attempts: attempt })
            }
            Err(AllocError::Store(e)) => return Err(storage(e)),
        };

        let tag = &self.config.program_tag;
        let record = StudentRecord {
            id: id.to_string(),
            admission_no: credentials::admission_no(tag, seq),
            student_id: credentials::login_id(tag, seq, &self.config.login_domain),
            student_pass: credentials::initial_password(
                &field_text(fields, "dob").unwrap_or_default(),
            ),
            created_at: now,
            updated_at: None,
            fields: fields.clone(),
        };
        let doc = record
            .to_document()
            .map_err(|e| AdmissionError::StorageUnavailable(e.to_string()))?;

        tx.create(STUDENTS_COLLECTION, id, doc).map_err(storage)?;

        match tx.commit() {
            Ok(()) => Ok(record),
            Err(e) if e.is_retryable() => {
                debug!(attempt, error = %e, "enrollment commit rejected");
                Err(AdmissionError::TransactionConflict { attempts: attempt })
            }
            Err(StoreError::AlreadyExists { collection, id }) if collection == STUDENTS_COLLECTION => {
                Err(AdmissionError::IdCollision(id))
            }
            Err(e) => Err(storage(e)),
        }
    }

    /// Deleting never touches the counter, so admission numbers are not reused.
    pub fn remove(&self, id: &str) -> Result<(), AdmissionError> {
        if !self.store.delete(STUDENTS_COLLECTION, id).map_err(storage)? {
            return Err(AdmissionError::NotFound(id.to_string()));
        }
        info!(id, "student removed");
        Ok(())
    }

    /// Merges `patch` into the stored record and stamps `updated_at`. An image,
    /// when given, goes through the image processor and its reference is stored
    /// as `profil_url`.
    pub fn update(
        &self,
        id: &str,
        patch: StudentFields,
        image: Option<&ImageUpload>,
    ) -> Result<StudentRecord, AdmissionError> {
        let mut record = self.get(id)?;

        for (k, v) in patch {
            if IMMUTABLE_KEYS.contains(&k.as_str()) || k == "updated_at" {
                continue;
            }
            if k == "student_id" || k == "student_pass" {
                if let Value::String(s) = v {
                    if k == "student_id" {
                        record.student_id = s;
                    } else {
                        record.student_pass = s;
                    }
                }
                continue;
            }
            record.fields.insert(k, v);
        }

        if let Some(upload) = image {
            let url = self.images.process(id, upload)?;
            record.fields.insert("profil_url".into(), Value::String(url));
        }

        record.updated_at = Some(self.store.server_timestamp());
        let doc = record
            .to_document()
            .map_err(|e| AdmissionError::StorageUnavailable(e.to_string()))?;
        self.store
            .set(STUDENTS_COLLECTION, id, &doc)
            .map_err(storage)?;
        info!(id, image = image.is_some(), "student updated");
        Ok(record)
    }

    pub fn get(&self, id: &str) -> Result<StudentRecord, AdmissionError> {
        let Some(snapshot) = self.store.get(STUDENTS_COLLECTION, id).map_err(storage)? else {
            return Err(AdmissionError::NotFound(id.to_string()));
        };
        StudentRecord::from_document(snapshot.body).map_err(|e| {
            AdmissionError::StorageUnavailable(format!("student {} is unreadable: {}", id, e))
        })
    }

    /// Newest first.
    pub fn list(&self) -> Result<Vec<StudentRecord>, AdmissionError> {
        let mut out = Vec::new();
        for snapshot in self.store.list(STUDENTS_COLLECTION).map_err(storage)? {
            let id = snapshot.id.clone();
            match StudentRecord::from_document(snapshot.body) {
                Ok(r) => out.push(r),
                Err(e) => warn!(id = %id, error = %e, "skipping unreadable student record"),
            }
        }
        out.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.admission_no.cmp(&a.admission_no))
        });
        Ok(out)
    }

    pub fn counter(&self, key: &CounterKey) -> Result<SequenceCounter, AdmissionError> {
        let Some(snapshot) = self
            .store
            .get(&key.collection, &key.doc_id)
            .map_err(storage)?
        else {
            return Err(AdmissionError::CounterNotFound(key.clone()));
        };
        SequenceCounter::from_document(&snapshot.body).ok_or_else(|| {
            AdmissionError::StorageUnavailable(format!("admission counter {} is corrupt", key))
        })
    }

    /// Creates a tracker document. Refuses to touch one that already exists.
    pub fn provision_counter(
        &self,
        key: &CounterKey,
        initial_total: u64,
    ) -> Result<SequenceCounter, AdmissionError> {
        let counter = SequenceCounter {
            total_count: initial_total,
            updated_at: Some(self.store.server_timestamp()),
        };
        let mut tx = self.store.begin().map_err(storage)?;
        if tx
            .get(&key.collection, &key.doc_id)
            .map_err(storage)?
            .is_some()
        {
            return Err(AdmissionError::CounterExists(key.clone()));
        }
        tx.create(&key.collection, &key.doc_id, counter.to_document())
            .map_err(storage)?;
        match tx.commit() {
            Ok(()) => {
                info!(counter = %key, total_count = initial_total, "admission counter provisioned");
                Ok(counter)
            }
            Err(StoreError::AlreadyExists { .. }) | Err(StoreError::Conflict { .. }) => {
                Err(AdmissionError::CounterExists(key.clone()))
            }
            Err(e) => Err(storage(e)),
        }
    }
}
