//! The application shell: current projects, admin session, persistence.
//!
//! State lives here and nowhere else. Every mutation runs one of the pure
//! tree operations over the current forest, swaps in the result, and hands
//! a full snapshot to the debounced writer.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};

use crate::io::debounce::DebouncedWriter;
use crate::io::gateway::{Gateway, StoreError};
use crate::io::recovery::{RecoveryCategory, RecoveryEntry, log_recovery};
use crate::model::config::AppConfig;
use crate::model::document::ExportDocument;
use crate::model::project::Project;
use crate::model::settings::SettingsPatch;
use crate::model::task::{FileData, Task, TaskStatus, TaskUpdate};
use crate::ops::admin::{AdminError, authenticate, new_admin};
use crate::ops::attach::{AttachError, encode_file};
use crate::ops::export::build_document;
use crate::ops::import::{ImportError, import_backup};
use crate::ops::project_ops::{self, ProjectOpError, find_project, find_project_mut};
use crate::ops::sample::sample_project;
use crate::ops::sort::sort_projects_by_created;
use crate::ops::task_ops;

/// Error type for shell operations
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error("admin login required")]
    NotAdmin,
    #[error("task name cannot be empty")]
    EmptyTaskName,
    #[error(transparent)]
    Project(#[from] ProjectOpError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Attach(#[from] AttachError),
    #[error(transparent)]
    Admin(#[from] AdminError),
}

/// Editable task fields as entered by a user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDraft {
    pub name: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub department: Option<String>,
    pub assigned_to: Option<String>,
}

impl TaskDraft {
    pub fn named(name: &str) -> Self {
        TaskDraft {
            name: name.to_string(),
            ..TaskDraft::default()
        }
    }

    /// Prefill from an existing task, for partial edits
    pub fn from_task(task: &Task) -> Self {
        TaskDraft {
            name: task.name.clone(),
            description: task.description.clone(),
            status: task.status,
            start_date: task.start_date,
            due_date: task.due_date,
            department: task.department.clone(),
            assigned_to: task.assigned_to.clone(),
        }
    }

    /// Trim text fields; blank optionals become absent, a blank name is an error.
    fn normalized(&self) -> Result<TaskDraft, ShellError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ShellError::EmptyTaskName);
        }
        let clean = |s: &Option<String>| {
            s.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Ok(TaskDraft {
            name: name.to_string(),
            description: clean(&self.description),
            status: self.status,
            start_date: self.start_date,
            due_date: self.due_date,
            department: clean(&self.department),
            assigned_to: clean(&self.assigned_to),
        })
    }
}

pub struct Workspace {
    gateway: Arc<dyn Gateway>,
    writer: DebouncedWriter,
    projects: Vec<Project>,
    admin: bool,
    max_upload_bytes: u64,
}

impl Workspace {
    /// Load projects and the admin flag from `gateway`.
    pub fn open(gateway: Arc<dyn Gateway>, config: &AppConfig) -> Result<Self, ShellError> {
        let mut projects = gateway.load_projects()?;
        sort_projects_by_created(&mut projects);
        let settings = gateway.load_settings()?;
        let writer = DebouncedWriter::spawn(
            gateway.clone(),
            Duration::from_millis(config.storage.debounce_ms),
        );
        Ok(Workspace {
            gateway,
            writer,
            projects,
            admin: settings.admin_status,
            max_upload_bytes: config.files.max_upload_bytes,
        })
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn project(&self, project_id: &str) -> Option<&Project> {
        find_project(&self.projects, project_id)
    }

    pub fn is_admin(&self) -> bool {
        self.admin
    }

    pub fn gateway(&self) -> &dyn Gateway {
        self.gateway.as_ref()
    }

    /// Block until every committed change is durable.
    pub fn flush(&self) -> Result<(), ShellError> {
        Ok(self.writer.flush()?)
    }

    // -----------------------------------------------------------------------
    // Projects
    // -----------------------------------------------------------------------

    pub fn add_project(&mut self, name: &str, description: &str) -> Result<String, ShellError> {
        self.require_admin()?;
        let id = project_ops::add_project(&mut self.projects, name, description)?;
        tracing::info!(project = %id, "project added");
        self.commit();
        Ok(id)
    }

    pub fn edit_project(&mut self, project_id: &str, name: &str, description: &str) -> Result<(), ShellError> {
        self.require_admin()?;
        project_ops::edit_project(&mut self.projects, project_id, name, description)?;
        self.commit();
        Ok(())
    }

    /// Delete a project with all its tasks and files.
    pub fn delete_project(&mut self, project_id: &str) -> Result<Project, ShellError> {
        self.require_admin()?;
        let removed = project_ops::delete_project(&mut self.projects, project_id)?;
        self.record_removal(
            RecoveryEntry::new(RecoveryCategory::Delete, format!("project \"{}\" deleted", removed.name))
                .field("Project", &removed.id),
            &removed,
        );
        tracing::info!(project = %removed.id, "project deleted");
        self.commit();
        Ok(removed)
    }

    /// Seed the demo project.
    pub fn add_sample_project(&mut self) -> Result<String, ShellError> {
        self.require_admin()?;
        let project = sample_project(Utc::now().date_naive());
        let id = project.id.clone();
        self.projects.insert(0, project);
        sort_projects_by_created(&mut self.projects);
        self.commit();
        Ok(id)
    }

    // -----------------------------------------------------------------------
    // Tasks
    // -----------------------------------------------------------------------

    /// Add a task at the root of a project or under `parent_id`.
    ///
    /// Returns the new task's id, or `None` when the parent does not exist.
    pub fn add_task(
        &mut self,
        project_id: &str,
        draft: &TaskDraft,
        parent_id: Option<&str>,
    ) -> Result<Option<String>, ShellError> {
        self.require_admin()?;
        let draft = draft.normalized()?;
        let project = self.project_mut(project_id)?;

        let parent = match parent_id.filter(|p| !p.is_empty()) {
            Some(pid) => match task_ops::find_task(&project.tasks, pid) {
                Some(parent) => Some(parent),
                None => return Ok(None),
            },
            None => None,
        };

        let mut task = Task::new(draft.name.clone(), draft.status);
        let mut update = TaskUpdate::from_task(&task);
        fill_update(&mut update, &draft);
        update.apply_to(&mut task);
        task.place_under(parent);
        let id = task.id.clone();

        let forest = std::mem::take(&mut project.tasks);
        project.tasks = task_ops::add_task(forest, task, parent_id);
        tracing::info!(project = project_id, task = %id, "task added");
        self.commit();
        Ok(Some(id))
    }

    /// Replace a task's editable fields. Children and files are kept.
    pub fn edit_task(&mut self, project_id: &str, task_id: &str, draft: &TaskDraft) -> Result<bool, ShellError> {
        self.require_admin()?;
        let draft = draft.normalized()?;
        let project = self.project_mut(project_id)?;
        let Some(existing) = task_ops::find_task(&project.tasks, task_id) else {
            return Ok(false);
        };
        let mut update = TaskUpdate::from_task(existing);
        fill_update(&mut update, &draft);

        let forest = std::mem::take(&mut project.tasks);
        project.tasks = task_ops::update_task(forest, &update);
        self.commit();
        Ok(true)
    }

    /// Delete a task and its subtree.
    pub fn delete_task(&mut self, project_id: &str, task_id: &str) -> Result<bool, ShellError> {
        self.require_admin()?;
        let project = self.project_mut(project_id)?;
        let Some(removed) = task_ops::find_task(&project.tasks, task_id).cloned() else {
            return Ok(false);
        };
        let forest = std::mem::take(&mut project.tasks);
        project.tasks = task_ops::delete_task(forest, task_id);
        self.record_removal(
            RecoveryEntry::new(RecoveryCategory::Delete, format!("task \"{}\" deleted", removed.name))
                .field("Project", project_id)
                .field("Task", &removed.id),
            &removed,
        );
        self.commit();
        Ok(true)
    }

    /// Change one task's status in place; sibling order is untouched.
    pub fn set_task_status(&mut self, project_id: &str, task_id: &str, status: TaskStatus) -> Result<bool, ShellError> {
        self.require_admin()?;
        let project = self.project_mut(project_id)?;
        if task_ops::find_task(&project.tasks, task_id).is_none() {
            return Ok(false);
        }
        let forest = std::mem::take(&mut project.tasks);
        project.tasks = task_ops::set_status(forest, task_id, status);
        self.commit();
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Files
    // -----------------------------------------------------------------------

    /// Encode `bytes` and attach them to a task. `None` when the task does not exist.
    pub fn attach_file(
        &mut self,
        project_id: &str,
        task_id: &str,
        name: &str,
        bytes: &[u8],
    ) -> Result<Option<FileData>, ShellError> {
        self.require_admin()?;
        let limit = self.max_upload_bytes;
        let project = self.project_mut(project_id)?;
        if task_ops::find_task(&project.tasks, task_id).is_none() {
            return Ok(None);
        }
        let file = encode_file(name, bytes, limit, Utc::now())?;
        let forest = std::mem::take(&mut project.tasks);
        project.tasks = task_ops::attach_file(forest, task_id, file.clone());
        self.commit();
        Ok(Some(file))
    }

    pub fn detach_file(&mut self, project_id: &str, task_id: &str, file_id: &str) -> Result<bool, ShellError> {
        self.require_admin()?;
        let project = self.project_mut(project_id)?;
        let present = task_ops::find_task(&project.tasks, task_id)
            .is_some_and(|t| t.files.iter().any(|f| f.id == file_id));
        if !present {
            return Ok(false);
        }
        let forest = std::mem::take(&mut project.tasks);
        project.tasks = task_ops::detach_file(forest, task_id, file_id);
        self.commit();
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Backup
    // -----------------------------------------------------------------------

    /// Replace every project with the contents of a backup file.
    ///
    /// Nothing changes unless the whole document validates. The new list is
    /// written through before returning. The backup's admin flag is ignored.
    pub fn import_document(&mut self, text: &str) -> Result<usize, ShellError> {
        self.require_admin()?;
        let backup = import_backup(text)?;
        let previous = std::mem::replace(&mut self.projects, backup.projects);
        if !previous.is_empty() {
            let body = serde_json::to_string_pretty(&previous).unwrap_or_default();
            log_recovery(
                self.gateway.location(),
                RecoveryEntry::new(RecoveryCategory::Import, "projects replaced by import")
                    .field("Exported", &backup.exported_at)
                    .body(body),
            );
        }
        tracing::info!(projects = self.projects.len(), "backup imported");
        self.commit();
        self.flush()?;
        Ok(self.projects.len())
    }

    pub fn export_document(&self) -> Result<ExportDocument, ShellError> {
        self.require_admin()?;
        Ok(build_document(&self.projects, self.admin, Utc::now()))
    }

    // -----------------------------------------------------------------------
    // Session
    // -----------------------------------------------------------------------

    pub fn login(&mut self, username: &str, password: &str) -> Result<(), ShellError> {
        let settings = self.gateway.load_settings()?;
        authenticate(settings.custom_admin_user.as_ref(), username, password)?;
        self.gateway.save_settings(&SettingsPatch::admin_status(true))?;
        self.admin = true;
        tracing::info!(username, "logged in");
        Ok(())
    }

    pub fn logout(&mut self) -> Result<(), ShellError> {
        self.gateway.save_settings(&SettingsPatch::admin_status(false))?;
        self.admin = false;
        Ok(())
    }

    /// Wipe all projects and install a new custom admin, who is logged in.
    pub fn reset(&mut self, username: &str, password: &str, confirm: &str) -> Result<(), ShellError> {
        self.require_admin()?;
        let user = new_admin(username, password, confirm)?;
        self.projects.clear();
        self.commit();
        self.flush()?;
        self.gateway.delete_custom_admin_user()?;
        self.gateway.save_settings(&SettingsPatch {
            admin_status: Some(true),
            custom_admin_user: Some(user),
        })?;
        self.admin = true;
        tracing::info!("workspace reset");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn require_admin(&self) -> Result<(), ShellError> {
        if self.admin { Ok(()) } else { Err(ShellError::NotAdmin) }
    }

    fn project_mut(&mut self, project_id: &str) -> Result<&mut Project, ShellError> {
        find_project_mut(&mut self.projects, project_id)
            .ok_or_else(|| ProjectOpError::NotFound(project_id.to_string()).into())
    }

    fn commit(&self) {
        self.writer.commit(self.projects.clone());
    }

    fn record_removal<T: serde::Serialize>(&self, entry: RecoveryEntry, removed: &T) {
        let body = serde_json::to_string_pretty(removed).unwrap_or_default();
        log_recovery(self.gateway.location(), entry.body(body));
    }
}

fn fill_update(update: &mut TaskUpdate, draft: &TaskDraft) {
    update.name = draft.name.clone();
    update.description = draft.description.clone();
    update.status = draft.status;
    update.start_date = draft.start_date;
    update.due_date = draft.due_date;
    update.department = draft.department.clone();
    update.assigned_to = draft.assigned_to.clone();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::portable_store::PortableStore;
    use crate::io::recovery::read_recovery_entries;
    use crate::model::config::StorageBackend;
    use tempfile::TempDir;

    fn open(tmp: &TempDir) -> Workspace {
        let gw: Arc<dyn Gateway> = Arc::new(PortableStore::new(tmp.path().to_path_buf()));
        let mut config = AppConfig::default();
        config.storage.backend = Some(StorageBackend::Portable);
        config.storage.debounce_ms = 10;
        config.files.max_upload_bytes = 16;
        Workspace::open(gw, &config).unwrap()
    }

    fn admin_workspace(tmp: &TempDir) -> Workspace {
        let mut ws = open(tmp);
        ws.login("admin", "password123").unwrap();
        ws
    }

    fn dated(name: &str, y: i32, m: u32, d: u32) -> TaskDraft {
        TaskDraft {
            start_date: NaiveDate::from_ymd_opt(y, m, d),
            ..TaskDraft::named(name)
        }
    }

    #[test]
    fn mutations_require_admin() {
        let tmp = TempDir::new().unwrap();
        let mut ws = open(&tmp);
        assert!(matches!(ws.add_project("P", ""), Err(ShellError::NotAdmin)));
        assert!(matches!(ws.export_document(), Err(ShellError::NotAdmin)));
        assert!(matches!(ws.import_document("{}"), Err(ShellError::NotAdmin)));
    }

    #[test]
    fn login_persists_and_logout_clears() {
        let tmp = TempDir::new().unwrap();
        {
            let mut ws = open(&tmp);
            assert!(matches!(
                ws.login("admin", "nope"),
                Err(ShellError::Admin(AdminError::InvalidCredentials))
            ));
            ws.login("editor", "editpass").unwrap();
        }
        let mut ws = open(&tmp);
        assert!(ws.is_admin());
        ws.logout().unwrap();
        assert!(!open(&tmp).is_admin());
    }

    #[test]
    fn add_task_computes_level_and_parent() {
        let tmp = TempDir::new().unwrap();
        let mut ws = admin_workspace(&tmp);
        let pid = ws.add_project("P", "").unwrap();

        let a = ws.add_task(&pid, &dated("A", 2024, 1, 10), None).unwrap().unwrap();
        ws.add_task(&pid, &TaskDraft::named("B"), None).unwrap();
        let c = ws.add_task(&pid, &TaskDraft::named("  C  "), Some(&a)).unwrap().unwrap();

        let tasks = &ws.project(&pid).unwrap().tasks;
        let names: Vec<&str> = tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(tasks[0].level, 0);
        let child = &tasks[0].sub_tasks[0];
        assert_eq!(child.id, c);
        assert_eq!(child.name, "C");
        assert_eq!(child.level, 1);
        assert_eq!(child.parent_id.as_deref(), Some(a.as_str()));
    }

    #[test]
    fn unknown_ids_are_reported_not_errors() {
        let tmp = TempDir::new().unwrap();
        let mut ws = admin_workspace(&tmp);
        let pid = ws.add_project("P", "").unwrap();
        assert_eq!(ws.add_task(&pid, &TaskDraft::named("X"), Some("ghost")).unwrap(), None);
        assert!(!ws.delete_task(&pid, "ghost").unwrap());
        assert!(!ws.set_task_status(&pid, "ghost", TaskStatus::Done).unwrap());
        assert!(!ws.detach_file(&pid, "ghost", "f").unwrap());
        assert!(ws.project(&pid).unwrap().tasks.is_empty());
        assert!(matches!(
            ws.add_task("no-project", &TaskDraft::named("X"), None),
            Err(ShellError::Project(ProjectOpError::NotFound(_)))
        ));
    }

    #[test]
    fn blank_task_name_rejected() {
        let tmp = TempDir::new().unwrap();
        let mut ws = admin_workspace(&tmp);
        let pid = ws.add_project("P", "").unwrap();
        assert!(matches!(
            ws.add_task(&pid, &TaskDraft::named("   "), None),
            Err(ShellError::EmptyTaskName)
        ));
    }

    #[test]
    fn edit_keeps_children_and_resorts() {
        let tmp = TempDir::new().unwrap();
        let mut ws = admin_workspace(&tmp);
        let pid = ws.add_project("P", "").unwrap();
        let a = ws.add_task(&pid, &dated("A", 2024, 1, 1), None).unwrap().unwrap();
        ws.add_task(&pid, &dated("B", 2024, 1, 5), None).unwrap();
        ws.add_task(&pid, &TaskDraft::named("child"), Some(&a)).unwrap();

        let existing = task_ops::find_task(&ws.project(&pid).unwrap().tasks, &a).unwrap();
        let mut draft = TaskDraft::from_task(existing);
        draft.start_date = NaiveDate::from_ymd_opt(2024, 2, 1);
        assert!(ws.edit_task(&pid, &a, &draft).unwrap());

        let tasks = &ws.project(&pid).unwrap().tasks;
        assert_eq!(tasks[0].name, "B");
        assert_eq!(tasks[1].name, "A");
        assert_eq!(tasks[1].sub_tasks.len(), 1);
    }

    #[test]
    fn attach_respects_limit_and_detach_restores() {
        let tmp = TempDir::new().unwrap();
        let mut ws = admin_workspace(&tmp);
        let pid = ws.add_project("P", "").unwrap();
        let t = ws.add_task(&pid, &TaskDraft::named("T"), None).unwrap().unwrap();

        assert!(matches!(
            ws.attach_file(&pid, &t, "big.bin", &[0u8; 17]),
            Err(ShellError::Attach(AttachError::TooLarge { .. }))
        ));
        let file = ws.attach_file(&pid, &t, "a.txt", b"hi").unwrap().unwrap();
        assert_eq!(ws.project(&pid).unwrap().tasks[0].files.len(), 1);
        assert!(ws.detach_file(&pid, &t, &file.id).unwrap());
        assert!(ws.project(&pid).unwrap().tasks[0].files.is_empty());
    }

    #[test]
    fn delete_goes_to_recovery_log() {
        let tmp = TempDir::new().unwrap();
        let mut ws = admin_workspace(&tmp);
        let pid = ws.add_project("P", "").unwrap();
        let t = ws.add_task(&pid, &TaskDraft::named("Doomed"), None).unwrap().unwrap();
        assert!(ws.delete_task(&pid, &t).unwrap());
        ws.delete_project(&pid).unwrap();

        let entries = read_recovery_entries(tmp.path(), None);
        assert_eq!(entries.len(), 2);
        assert!(entries[0].description.contains("project \"P\""));
        assert!(entries[1].body.contains("Doomed"));
    }

    #[test]
    fn changes_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        {
            let mut ws = admin_workspace(&tmp);
            let pid = ws.add_project("Durable", "").unwrap();
            ws.add_task(&pid, &TaskDraft::named("T"), None).unwrap();
        }
        let ws = open(&tmp);
        assert_eq!(ws.projects().len(), 1);
        assert_eq!(ws.projects()[0].tasks[0].name, "T");
    }

    #[test]
    fn failed_import_leaves_state_untouched() {
        let tmp = TempDir::new().unwrap();
        let mut ws = admin_workspace(&tmp);
        ws.add_project("Keep", "").unwrap();
        let before = ws.projects().to_vec();

        let doc = r#"{"version":"2.0","exportedAt":"x","adminLoggedIn":true,"projects":[]}"#;
        assert!(matches!(
            ws.import_document(doc),
            Err(ShellError::Import(ImportError::UnsupportedVersion { .. }))
        ));
        assert_eq!(ws.projects(), before.as_slice());
    }

    #[test]
    fn import_replaces_and_saves_immediately() {
        let tmp = TempDir::new().unwrap();
        let mut ws = admin_workspace(&tmp);
        ws.add_project("Old", "").unwrap();

        let doc = r#"{"version":"1.0","exportedAt":"2024-01-01T00:00:00Z","adminLoggedIn":false,
            "projects":[{"id":"p1","name":"Imported","createdAt":"2024-01-01T00:00:00Z","tasks":[]}]}"#;
        assert_eq!(ws.import_document(doc).unwrap(), 1);
        assert!(ws.is_admin());

        let stored = PortableStore::new(tmp.path().to_path_buf()).load_projects().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].name, "Imported");
        let entries = read_recovery_entries(tmp.path(), None);
        assert_eq!(entries[0].category, RecoveryCategory::Import);
    }

    #[test]
    fn reset_wipes_and_installs_admin() {
        let tmp = TempDir::new().unwrap();
        let mut ws = admin_workspace(&tmp);
        ws.add_project("Gone", "").unwrap();

        assert!(matches!(
            ws.reset("ops", "short", "short"),
            Err(ShellError::Admin(AdminError::PasswordTooShort))
        ));
        assert_eq!(ws.projects().len(), 1);

        ws.reset("ops", "longenough", "longenough").unwrap();
        assert!(ws.projects().is_empty());
        ws.logout().unwrap();
        ws.login("ops", "longenough").unwrap();
        assert!(ws.is_admin());
    }

    #[test]
    fn sample_project_added_first() {
        let tmp = TempDir::new().unwrap();
        let mut ws = admin_workspace(&tmp);
        let id = ws.add_sample_project().unwrap();
        assert_eq!(ws.projects()[0].id, id);
        assert_eq!(ws.projects()[0].name, "TE OSAT");
    }
}
