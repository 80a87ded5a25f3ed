//! Admission workflow: allocate the next admission number and create the
//! student record bound to it, atomically.

pub mod allocator;
pub mod credentials;
pub mod error;
pub mod record;
pub mod registrar;

pub use allocator::CounterKey;
pub use error::AdmissionError;
pub use record::{SequenceCounter, StudentFields, StudentRecord};
pub use registrar::{AdmissionRegistrar, RegistrarConfig};
