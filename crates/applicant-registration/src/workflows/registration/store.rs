use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::domain::{ApplicantRecord, Step, VerificationRecord};

/// Durable storage key holding the serialized form session.
pub const STORAGE_KEY: &str = "applicantRegistrationData";

/// Everything persisted between page loads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub step: Step,
    pub verification: VerificationRecord,
    pub applicant: ApplicantRecord,
}

/// Load/save boundary for the form session.
///
/// Implementations hold serialized snapshots only, so attached files come
/// back as descriptors without content.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<Option<SessionSnapshot>, SessionStoreError>;
    fn save(&self, snapshot: &SessionSnapshot) -> Result<(), SessionStoreError>;
    fn clear(&self) -> Result<(), SessionStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("session storage unavailable: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored session is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Key-value JSON document on disk, shaped like browser local storage.
#[derive(Debug, Clone)]
pub struct JsonFileSessionStore {
    path: PathBuf,
}

impl JsonFileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, Value>, SessionStoreError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    fn write_entries(&self, entries: &BTreeMap<String, Value>) -> Result<(), SessionStoreError> {
        if entries.is_empty() {
            return match fs::remove_file(&self.path) {
                Err(err) if err.kind() != ErrorKind::NotFound => Err(err.into()),
                _ => Ok(()),
            };
        }

        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let staging = self.path.with_extension("tmp");
        fs::write(&staging, serde_json::to_vec_pretty(entries)?)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

impl SessionStore for JsonFileSessionStore {
    fn load(&self) -> Result<Option<SessionSnapshot>, SessionStoreError> {
        let mut entries = self.read_entries()?;
        match entries.remove(STORAGE_KEY) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    fn save(&self, snapshot: &SessionSnapshot) -> Result<(), SessionStoreError> {
        let mut entries = self.read_entries()?;
        entries.insert(STORAGE_KEY.to_string(), serde_json::to_value(snapshot)?);
        self.write_entries(&entries)
    }

    fn clear(&self) -> Result<(), SessionStoreError> {
        let mut entries = self.read_entries()?;
        if entries.remove(STORAGE_KEY).is_some() {
            self.write_entries(&entries)?;
        }
        Ok(())
    }
}

/// In-process store that still round-trips through JSON.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    serialized: Mutex<Option<String>>,
}

impl MemorySessionStore {
    pub fn raw(&self) -> Option<String> {
        self.serialized
            .lock()
            .expect("session store mutex poisoned")
            .clone()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<SessionSnapshot>, SessionStoreError> {
        let guard = self.serialized.lock().expect("session store mutex poisoned");
        guard
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(SessionStoreError::from)
    }

    fn save(&self, snapshot: &SessionSnapshot) -> Result<(), SessionStoreError> {
        let serialized = serde_json::to_string(snapshot)?;
        *self.serialized.lock().expect("session store mutex poisoned") = Some(serialized);
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionStoreError> {
        *self.serialized.lock().expect("session store mutex poisoned") = None;
        Ok(())
    }
}
