use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::errors::StoreError;

use super::ThresholdState;

/// Persistence seam for adapted thresholds.
pub trait ThresholdStore: Send + Sync {
    /// `Ok(None)` when nothing has been persisted yet.
    fn load(&self) -> Result<Option<ThresholdState>, StoreError>;
    fn save(&self, state: &ThresholdState) -> Result<(), StoreError>;
}

/// JSON file store. Writes go to a sibling temp file and are renamed into
/// place so a crash never leaves a half-written state file.
#[derive(Debug, Clone)]
pub struct FileThresholdStore {
    path: PathBuf,
}

impl FileThresholdStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Expands a leading `~` before building the store.
    pub fn from_config_path(raw: &str) -> Self {
        Self::new(shellexpand::tilde(raw).into_owned())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl ThresholdStore for FileThresholdStore {
    fn load(&self) -> Result<Option<ThresholdState>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_err(e)),
        };
        let state = serde_json::from_str(&raw).map_err(StoreError::Decode)?;
        Ok(Some(state))
    }

    fn save(&self, state: &ThresholdState) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
            }
        }
        let body = serde_json::to_string_pretty(state).map_err(StoreError::Encode)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(|e| self.io_err(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))?;
        Ok(())
    }
}

/// Process-local store, used when no state path is configured and in tests.
#[derive(Debug, Default)]
pub struct MemoryThresholdStore {
    state: Mutex<Option<ThresholdState>>,
}

impl MemoryThresholdStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: ThresholdState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
        }
    }
}

impl ThresholdStore for MemoryThresholdStore {
    fn load(&self) -> Result<Option<ThresholdState>, StoreError> {
        Ok(self.state.lock().clone())
    }

    fn save(&self, state: &ThresholdState) -> Result<(), StoreError> {
        *self.state.lock() = Some(state.clone());
        Ok(())
    }
}
