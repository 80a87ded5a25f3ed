//! Profile image handling for `students.update`.
//!
//! Resizing is left to an external processor; the workspace implementation
//! stores the payload as-is under a content hash and returns its path.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const PROFILE_IMAGES_DIR: &str = "profile_images";

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("image payload is empty")]
    Empty,
    #[error("image io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn from_path(path: &Path) -> Result<Self, AssetError> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("upload")
            .to_string();
        Ok(Self { file_name, bytes })
    }

    fn extension(&self) -> String {
        Path::new(&self.file_name)
            .extension()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|s| s.to_ascii_lowercase())
            .unwrap_or_else(|| "bin".to_string())
    }
}

pub trait ImageProcessor {
    /// Stores the image for `student_id` and returns a retrievable reference.
    fn process(&self, student_id: &str, upload: &ImageUpload) -> Result<String, AssetError>;
}

pub struct WorkspaceImageStore {
    root: PathBuf,
}

impl WorkspaceImageStore {
    pub fn new(workspace: &Path) -> Self {
        Self {
            root: workspace.join(PROFILE_IMAGES_DIR),
        }
    }
}

impl ImageProcessor for WorkspaceImageStore {
    fn process(&self, student_id: &str, upload: &ImageUpload) -> Result<String, AssetError> {
        if upload.bytes.is_empty() {
            return Err(AssetError::Empty);
        }
        let digest = format!("{:x}", Sha256::digest(&upload.bytes));
        let dir = self.root.join(student_id);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.{}", digest, upload.extension()));
        // Same bytes map to the same file, so re-uploads are no-ops.
        if !path.is_file() {
            std::fs::write(&path, &upload.bytes)?;
        }
        Ok(path.to_string_lossy().to_string())
    }
}
