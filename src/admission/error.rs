use thiserror::Error;

use super::allocator::CounterKey;
use crate::assets::AssetError;

#[derive(Debug, Error)]
pub enum AdmissionError {
    /// Caller input; re-prompt.
    #[error("{0}")]
    Validation(String),
    /// The tracker has to be provisioned out-of-band. Never retried.
    #[error("admission counter {0} not found; provision it before enrolling")]
    CounterNotFound(CounterKey),
    #[error("admission counter {0} already exists")]
    CounterExists(CounterKey),
    #[error("enrollment conflicted with concurrent admissions {attempts} times; try again")]
    TransactionConflict { attempts: u32 },
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("student {0} not found")]
    NotFound(String),
    /// A freshly generated record id was already taken. Never retried.
    #[error("generated student id {0} already exists")]
    IdCollision(String),
    #[error("profile image failed: {0}")]
    Asset(#[from] AssetError),
}

impl AdmissionError {
    pub fn code(&self) -> &'static str {
        match self {
            AdmissionError::Validation(_) => "validation_failed",
            AdmissionError::CounterNotFound(_) => "counter_not_found",
            AdmissionError::CounterExists(_) => "counter_exists",
            AdmissionError::TransactionConflict { .. } => "tx_conflict",
            AdmissionError::StorageUnavailable(_) => "storage_unavailable",
            AdmissionError::NotFound(_) => "not_found",
            AdmissionError::IdCollision(_) => "id_collision",
            AdmissionError::Asset(_) => "asset_failed",
        }
    }
}
