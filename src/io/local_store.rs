use std::path::{Path, PathBuf};

use serde_json::{Map, Value, json};

use crate::io::gateway::{Gateway, StoreError, admin_from_value, projects_from_value, read_json, write_json};
use crate::io::lock::with_store_lock;
use crate::model::config::StorageBackend;
use crate::model::project::Project;
use crate::model::settings::{Settings, SettingsPatch};

const STORE_FILE: &str = "store.json";
const PROJECTS_STORE: &str = "projects_os";
const PROJECTS_KEY: &str = "allProjects";
const SETTINGS_STORE: &str = "settings_os";
const ADMIN_STATUS_KEY: &str = "adminStatus";
const CUSTOM_ADMIN_KEY: &str = "customAdminUser";

/// Per-user store: one `store.json` holding named object stores.
///
/// ```json
/// { "projects_os": { "allProjects": [...] },
///   "settings_os": { "adminStatus": true, "customAdminUser": {...} } }
/// ```
pub struct LocalStore {
    dir: PathBuf,
    path: PathBuf,
}

impl LocalStore {
    pub fn new(dir: PathBuf) -> Self {
        let path = dir.join(STORE_FILE);
        LocalStore { dir, path }
    }

    fn read_store(&self) -> Result<Map<String, Value>, StoreError> {
        match read_json(&self.path)? {
            None => Ok(Map::new()),
            Some(Value::Object(map)) => Ok(map),
            Some(_) => Err(StoreError::Corrupt {
                path: self.path.clone(),
                reason: "top level is not an object".to_string(),
            }),
        }
    }

    /// Read-modify-write of one object store inside the file. The directory
    /// stays locked from the read until the write lands, so a projects save
    /// and a settings save never drop each other's half.
    fn update_store(
        &self,
        store: &str,
        f: impl FnOnce(&mut Map<String, Value>) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        with_store_lock(&self.dir, |guard| {
            let mut root = self.read_store()?;
            let entry = root
                .entry(store.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(map) = entry {
                f(map)?;
            }
            write_json(guard, &self.path, &Value::Object(root))
        })
    }
}

impl Gateway for LocalStore {
    fn mode(&self) -> StorageBackend {
        StorageBackend::Local
    }

    fn location(&self) -> &Path {
        &self.dir
    }

    fn load_projects(&self) -> Result<Vec<Project>, StoreError> {
        let root = self.read_store()?;
        let stored = root.get(PROJECTS_STORE).and_then(|s| s.get(PROJECTS_KEY));
        let projects = projects_from_value(&self.path, stored)?;
        tracing::debug!(count = projects.len(), "loaded projects from local store");
        Ok(projects)
    }

    fn save_projects(&self, projects: &[Project]) -> Result<(), StoreError> {
        let value = serde_json::to_value(projects)?;
        self.update_store(PROJECTS_STORE, |store| {
            store.insert(PROJECTS_KEY.to_string(), value);
            Ok(())
        })
    }

    fn load_settings(&self) -> Result<Settings, StoreError> {
        let root = self.read_store()?;
        let store = root.get(SETTINGS_STORE);
        Ok(Settings {
            admin_status: store
                .and_then(|s| s.get(ADMIN_STATUS_KEY))
                .and_then(Value::as_bool)
                .unwrap_or(false),
            custom_admin_user: admin_from_value(store.and_then(|s| s.get(CUSTOM_ADMIN_KEY))),
        })
    }

    fn save_settings(&self, patch: &SettingsPatch) -> Result<(), StoreError> {
        self.update_store(SETTINGS_STORE, |store| {
            if let Some(status) = patch.admin_status {
                store.insert(ADMIN_STATUS_KEY.to_string(), json!(status));
            }
            if let Some(user) = &patch.custom_admin_user {
                store.insert(CUSTOM_ADMIN_KEY.to_string(), serde_json::to_value(user)?);
            }
            Ok(())
        })
    }

    fn delete_custom_admin_user(&self) -> Result<(), StoreError> {
        self.update_store(SETTINGS_STORE, |store| {
            store.remove(CUSTOM_ADMIN_KEY);
            Ok(())
        })
    }
}
