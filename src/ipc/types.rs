use std::path::PathBuf;

use serde::Deserialize;
use tracing::info;

use crate::admission::AdmissionRegistrar;
use crate::assets::WorkspaceImageStore;
use crate::config::Settings;
use crate::store::SqliteDocumentStore;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub registrar: Option<AdmissionRegistrar<SqliteDocumentStore>>,
    pub settings: Settings,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        Self {
            workspace: None,
            registrar: None,
            settings,
        }
    }

    /// Replaces the current workspace only once the new one opened cleanly.
    pub fn open_workspace(&mut self, path: PathBuf) -> anyhow::Result<()> {
        let store = SqliteDocumentStore::open(&path, &self.settings.store)?;
        let images = WorkspaceImageStore::new(&path);
        self.registrar = Some(AdmissionRegistrar::new(
            store,
            Box::new(images),
            self.settings.registrar.clone(),
        ));
        info!(workspace = %path.to_string_lossy(), "workspace opened");
        self.workspace = Some(path);
        Ok(())
    }
}
