//! Persistence boundary.
//!
//! The core never touches storage directly: everything goes through a
//! [`Gateway`], picked once at startup from config and the environment.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::io::config_io::data_home;
use crate::io::local_store::LocalStore;
use crate::io::lock::{LockError, StoreGuard};
use crate::io::portable_store::PortableStore;
use crate::io::recovery::atomic_write;
use crate::model::config::{AppConfig, StorageBackend};
use crate::model::project::Project;
use crate::model::settings::{AdminUser, Settings, SettingsPatch};
use crate::ops::import::sanitize_projects;

/// Error type for store reads and writes
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("stored data in {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("could not serialize data: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("cannot locate the {0} data directory")]
    NoLocation(&'static str),
    #[error("background writer has stopped")]
    WriterStopped,
}

/// Durable storage for projects and settings.
///
/// Loads never fail on a missing store: absent data is an empty list or
/// default settings.
pub trait Gateway: Send + Sync {
    fn mode(&self) -> StorageBackend;

    /// Directory holding the data files
    fn location(&self) -> &Path;

    fn load_projects(&self) -> Result<Vec<Project>, StoreError>;

    /// Replace the stored project list with `projects`
    fn save_projects(&self, projects: &[Project]) -> Result<(), StoreError>;

    fn load_settings(&self) -> Result<Settings, StoreError>;

    /// Merge `patch` into the stored settings
    fn save_settings(&self, patch: &SettingsPatch) -> Result<(), StoreError>;

    fn delete_custom_admin_user(&self) -> Result<(), StoreError>;
}

/// Open the configured backend, auto-detecting when config leaves it unset.
pub fn open_gateway(config: &AppConfig) -> Result<Box<dyn Gateway>, StoreError> {
    let backend = config.storage.backend.unwrap_or_else(detect_backend);
    let dir = match &config.storage.data_dir {
        Some(dir) => dir.clone(),
        None => default_dir(backend)?,
    };
    tracing::debug!(backend = backend.as_str(), dir = %dir.display(), "opening store");
    Ok(match backend {
        StorageBackend::Local => Box::new(LocalStore::new(dir)),
        StorageBackend::Portable => Box::new(PortableStore::new(dir)),
    })
}

/// Portable when a `data/` directory sits next to the executable.
pub fn detect_backend() -> StorageBackend {
    match portable_dir() {
        Some(dir) if dir.is_dir() => StorageBackend::Portable,
        _ => StorageBackend::Local,
    }
}

fn default_dir(backend: StorageBackend) -> Result<PathBuf, StoreError> {
    match backend {
        StorageBackend::Local => Ok(data_home()),
        StorageBackend::Portable => portable_dir().ok_or(StoreError::NoLocation("portable")),
    }
}

fn portable_dir() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    Some(exe.parent()?.join("data"))
}

// ---------------------------------------------------------------------------
// Helpers shared by the file-backed stores
// ---------------------------------------------------------------------------

/// Parse a JSON file without a nesting limit. `Ok(None)` when it does not exist.
pub(crate) fn read_json(path: &Path) -> Result<Option<Value>, StoreError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };
    let mut de = serde_json::Deserializer::from_str(&text);
    de.disable_recursion_limit();
    let value = Value::deserialize(&mut de)
        .and_then(|v| de.end().map(|()| v))
        .map_err(|e| StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    Ok(Some(value))
}

/// Serialize `value` and replace `path` atomically. The caller already holds
/// `guard` on the directory; this never locks again.
pub(crate) fn write_json(guard: &StoreGuard, path: &Path, value: &Value) -> Result<(), StoreError> {
    debug_assert!(path.starts_with(guard.dir()));
    let text = serde_json::to_string_pretty(value)?;
    atomic_write(path, text.as_bytes()).map_err(|e| StoreError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    tracing::debug!(path = %path.display(), bytes = text.len(), "store written");
    Ok(())
}

/// Run a stored project list through the import sanitizer.
pub(crate) fn projects_from_value(path: &Path, value: Option<&Value>) -> Result<Vec<Project>, StoreError> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(v) => sanitize_projects(v).map_err(|e| StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

/// Lenient read of a stored custom admin; an unreadable record is dropped.
pub(crate) fn admin_from_value(value: Option<&Value>) -> Option<AdminUser> {
    let value = value.filter(|v| !v.is_null())?;
    match AdminUser::deserialize(value) {
        Ok(user) => Some(user),
        Err(e) => {
            tracing::warn!(error = %e, "ignoring unreadable custom admin record");
            None
        }
    }
}
