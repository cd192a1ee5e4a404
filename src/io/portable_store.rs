use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::io::gateway::{Gateway, StoreError, admin_from_value, projects_from_value, read_json, write_json};
use crate::io::lock::with_store_lock;
use crate::model::config::StorageBackend;
use crate::model::project::Project;
use crate::model::settings::{Settings, SettingsPatch};

/// File store in a `data/` folder: `projects.json` and `settings.json`.
pub struct PortableStore {
    dir: PathBuf,
}

impl PortableStore {
    pub fn new(dir: PathBuf) -> Self {
        PortableStore { dir }
    }

    fn projects_path(&self) -> PathBuf {
        self.dir.join("projects.json")
    }

    fn settings_path(&self) -> PathBuf {
        self.dir.join("settings.json")
    }

    /// Load settings, apply `f`, write them back, all under one lock.
    fn update_settings(&self, f: impl FnOnce(&mut Settings)) -> Result<(), StoreError> {
        with_store_lock(&self.dir, |guard| {
            let mut settings = self.load_settings()?;
            f(&mut settings);
            let value = serde_json::to_value(&settings)?;
            write_json(guard, &self.settings_path(), &value)
        })
    }
}

impl Gateway for PortableStore {
    fn mode(&self) -> StorageBackend {
        StorageBackend::Portable
    }

    fn location(&self) -> &Path {
        &self.dir
    }

    fn load_projects(&self) -> Result<Vec<Project>, StoreError> {
        let path = self.projects_path();
        let stored = read_json(&path)?;
        let projects = projects_from_value(&path, stored.as_ref())?;
        tracing::debug!(count = projects.len(), "loaded projects from portable store");
        Ok(projects)
    }

    fn save_projects(&self, projects: &[Project]) -> Result<(), StoreError> {
        let value = serde_json::to_value(projects)?;
        with_store_lock(&self.dir, |guard| write_json(guard, &self.projects_path(), &value))
    }

    fn load_settings(&self) -> Result<Settings, StoreError> {
        let Some(stored) = read_json(&self.settings_path())? else {
            return Ok(Settings::default());
        };
        Ok(Settings {
            admin_status: stored
                .get("adminStatus")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            custom_admin_user: admin_from_value(stored.get("customAdminUser")),
        })
    }

    fn save_settings(&self, patch: &SettingsPatch) -> Result<(), StoreError> {
        self.update_settings(|settings| patch.apply_to(settings))
    }

    fn delete_custom_admin_user(&self) -> Result<(), StoreError> {
        self.update_settings(|settings| settings.custom_admin_user = None)
    }
}
