//! Load/save port for the persisted history document

use std::path::{Path, PathBuf};

use super::HistoryState;

/// Storage for the serialized `HistoryState`
pub trait HistoryPersistence: Send + Sync {
    /// Read the stored state. `Ok(None)` when nothing has been stored yet.
    fn load(&self) -> Result<Option<HistoryState>, PersistenceError>;

    /// Overwrite the stored state in full
    fn save(&self, state: &HistoryState) -> Result<(), PersistenceError>;
}

/// Single JSON document on the local filesystem, rewritten wholesale
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl HistoryPersistence for JsonFileStore {
    fn load(&self) -> Result<Option<HistoryState>, PersistenceError> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let state = serde_json::from_slice(&data)
            .map_err(|e| PersistenceError::Deserialization(e.to_string()))?;
        Ok(Some(state))
    }

    fn save(&self, state: &HistoryState) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let data = serde_json::to_vec_pretty(state)
            .map_err(|e| PersistenceError::Serialization(e.to_string()))?;
        std::fs::write(&self.path, data)?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}
