use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Task progress state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "To Do")]
    ToDo,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Done")]
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [TaskStatus::ToDo, TaskStatus::InProgress, TaskStatus::Done];

    /// The wire label used in stored and exported documents
    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::ToDo => "To Do",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Done => "Done",
        }
    }

    /// Match a wire label exactly
    pub fn from_label(s: &str) -> Option<TaskStatus> {
        TaskStatus::ALL.into_iter().find(|st| st.label() == s)
    }

    /// Lenient parse for command-line input (`todo`, `in-progress`, `done`, ...)
    pub fn parse_status(s: &str) -> Option<TaskStatus> {
        if let Some(st) = TaskStatus::from_label(s) {
            return Some(st);
        }
        let key: String = s
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "todo" => Some(TaskStatus::ToDo),
            "inprogress" | "active" | "wip" => Some(TaskStatus::InProgress),
            "done" => Some(TaskStatus::Done),
            _ => None,
        }
    }

    /// The character shown inside the checkbox `[ ]`
    pub fn checkbox_char(self) -> char {
        match self {
            TaskStatus::ToDo => ' ',
            TaskStatus::InProgress => '>',
            TaskStatus::Done => 'x',
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A file attached to a task, carried inline as a data URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    pub id: String,
    pub name: String,
    /// Content-type tag, e.g. `application/pdf`
    #[serde(rename = "type")]
    pub content_type: String,
    /// Size of the decoded payload in bytes
    pub size: u64,
    /// `data:<type>;base64,<payload>`
    pub data_url: String,
    pub uploaded_at: DateTime<Utc>,
}

/// A node in a project's task tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    /// Owning task, `None` for roots of the project forest
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Nesting depth (0 = root)
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub sub_tasks: Vec<Task>,
    #[serde(default)]
    pub files: Vec<FileData>,
}

impl Task {
    /// Create a root task with a fresh id and no optional fields
    pub fn new(name: impl Into<String>, status: TaskStatus) -> Self {
        Task {
            id: new_id(),
            name: name.into(),
            description: None,
            status,
            start_date: None,
            due_date: None,
            department: None,
            assigned_to: None,
            parent_id: None,
            level: 0,
            sub_tasks: Vec::new(),
            files: Vec::new(),
        }
    }

    /// Builder-style start date setter
    pub fn starting(mut self, date: NaiveDate) -> Self {
        self.start_date = Some(date);
        self
    }

    /// Attach this task under `parent`: sets `parentId` and `level`
    pub fn place_under(&mut self, parent: Option<&Task>) {
        match parent {
            Some(p) => {
                self.parent_id = Some(p.id.clone());
                self.level = p.level + 1;
            }
            None => {
                self.parent_id = None;
                self.level = 0;
            }
        }
    }
}

/// Replacement payload for an existing task.
///
/// `sub_tasks` and `files` of `None` keep whatever the existing node has.
/// `id` selects the node; `level` and `parent_id` are never taken from here.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskUpdate {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub department: Option<String>,
    pub assigned_to: Option<String>,
    pub sub_tasks: Option<Vec<Task>>,
    pub files: Option<Vec<FileData>>,
}

impl TaskUpdate {
    /// Start an update from the current state of `task`, leaving children and files untouched
    pub fn from_task(task: &Task) -> Self {
        TaskUpdate {
            id: task.id.clone(),
            name: task.name.clone(),
            description: task.description.clone(),
            status: task.status,
            start_date: task.start_date,
            due_date: task.due_date,
            department: task.department.clone(),
            assigned_to: task.assigned_to.clone(),
            sub_tasks: None,
            files: None,
        }
    }

    /// Overwrite the replaceable fields of `task`
    pub fn apply_to(&self, task: &mut Task) {
        task.name = self.name.clone();
        task.description = self.description.clone();
        task.status = self.status;
        task.start_date = self.start_date;
        task.due_date = self.due_date;
        task.department = self.department.clone();
        task.assigned_to = self.assigned_to.clone();
        if let Some(subs) = &self.sub_tasks {
            task.sub_tasks = subs.clone();
        }
        if let Some(files) = &self.files {
            task.files = files.clone();
        }
    }
}

/// Fresh opaque identifier for projects, tasks and files
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
