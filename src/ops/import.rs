//! Backup import: validation and sanitization of untrusted JSON.
//!
//! Projects and tasks missing their identity fields are rejected and abort
//! the whole import. Missing or malformed cosmetic fields are repaired:
//! ids are regenerated, enums fall back to defaults, timestamps default to
//! now. The same sanitizer runs over project lists read back from storage.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::model::document::EXPORT_VERSION;
use crate::model::project::Project;
use crate::model::task::{FileData, Task, TaskStatus, new_id};
use crate::ops::sort::{sort_chronologically, sort_files_by_upload};

/// Content type given to files that do not declare one
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Name given to files that do not declare one
const UNKNOWN_FILE_NAME: &str = "unknown_file";

/// Error type for import operations
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("invalid backup file format: {0}")]
    InvalidFormat(String),
    #[error("unsupported backup version: {found}. Expected {expected}.", expected = EXPORT_VERSION)]
    UnsupportedVersion { found: String },
    #[error("invalid project at index {index}: {reason}")]
    InvalidProject { index: usize, reason: String },
    #[error("invalid task at {path}: {reason}")]
    InvalidTask { path: String, reason: String },
}

/// A backup that passed validation
#[derive(Debug, Clone)]
pub struct ImportedBackup {
    pub version: String,
    pub exported_at: String,
    pub admin_logged_in: bool,
    pub projects: Vec<Project>,
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Parse and validate backup text in one step.
pub fn import_backup(text: &str) -> Result<ImportedBackup, ImportError> {
    let doc = parse_json(text)?;
    validate_document(&doc)
}

/// Parse raw JSON without a nesting limit, so arbitrarily deep task trees load.
pub fn parse_json(text: &str) -> Result<Value, ImportError> {
    let mut de = serde_json::Deserializer::from_str(text);
    de.disable_recursion_limit();
    let value = Value::deserialize(&mut de)
        .map_err(|e| ImportError::InvalidFormat(format!("not valid JSON ({})", e)))?;
    de.end()
        .map_err(|e| ImportError::InvalidFormat(format!("trailing data after document ({})", e)))?;
    Ok(value)
}

/// Validate a parsed backup document top-down, failing on the first problem.
pub fn validate_document(doc: &Value) -> Result<ImportedBackup, ImportError> {
    let obj = doc.as_object().ok_or_else(|| {
        ImportError::InvalidFormat("top level must be an object".to_string())
    })?;

    let version = obj.get("version").and_then(Value::as_str);
    let exported_at = obj.get("exportedAt").and_then(Value::as_str);
    let admin_logged_in = obj.get("adminLoggedIn").and_then(Value::as_bool);
    let projects = obj.get("projects").filter(|p| p.is_array());

    let (Some(version), Some(exported_at), Some(admin_logged_in), Some(projects)) =
        (version, exported_at, admin_logged_in, projects)
    else {
        return Err(ImportError::InvalidFormat(
            "core structure is missing or incorrect (need version, exportedAt, adminLoggedIn, projects)"
                .to_string(),
        ));
    };

    if version != EXPORT_VERSION {
        return Err(ImportError::UnsupportedVersion {
            found: version.to_string(),
        });
    }

    let projects = sanitize_projects(projects)?;
    tracing::debug!(projects = projects.len(), "backup validated");

    Ok(ImportedBackup {
        version: version.to_string(),
        exported_at: exported_at.to_string(),
        admin_logged_in,
        projects,
    })
}

/// Rebuild a list of projects from untrusted JSON.
pub fn sanitize_projects(value: &Value) -> Result<Vec<Project>, ImportError> {
    let items = value.as_array().ok_or_else(|| {
        ImportError::InvalidFormat("projects data must be an array".to_string())
    })?;
    items
        .iter()
        .enumerate()
        .map(|(index, item)| sanitize_project(index, item))
        .collect()
}

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

fn sanitize_project(index: usize, value: &Value) -> Result<Project, ImportError> {
    let invalid = |reason: &str| ImportError::InvalidProject {
        index,
        reason: reason.to_string(),
    };
    let obj = value.as_object().ok_or_else(|| invalid("not an object"))?;

    let id = obj
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("missing string id"))?;
    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("missing string name"))?;
    let created_at = obj
        .get("createdAt")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("missing string createdAt"))?;
    let created_at = parse_created_at(created_at).unwrap_or_else(|| {
        tracing::warn!(project = id, value = created_at, "unreadable createdAt, using now");
        Utc::now()
    });

    let description = obj
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let base_path = format!("project {:?}", name);
    let tasks = sanitize_task_list(obj.get("tasks"), &base_path)?;

    Ok(Project {
        id: id.to_string(),
        name: name.to_string(),
        description,
        tasks,
        created_at,
    })
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Sanitize a sibling list; anything but an array counts as empty.
fn sanitize_task_list(value: Option<&Value>, path: &str) -> Result<Vec<Task>, ImportError> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Ok(Vec::new());
    };
    let tasks = items
        .iter()
        .enumerate()
        .map(|(i, item)| sanitize_task(item, &format!("{} > task[{}]", path, i)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(sort_chronologically(tasks))
}

fn sanitize_task(value: &Value, path: &str) -> Result<Task, ImportError> {
    let invalid = |reason: &str| ImportError::InvalidTask {
        path: path.to_string(),
        reason: reason.to_string(),
    };
    let obj = value.as_object().ok_or_else(|| invalid("not an object"))?;

    let id = match obj.get("id") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => return Err(invalid("id must be a string")),
    };
    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("missing string name"))?;
    let status = obj
        .get("status")
        .filter(|s| is_truthy(s))
        .ok_or_else(|| invalid("missing status"))?;

    let id = id.unwrap_or_else(|| {
        let fresh = new_id();
        tracing::warn!(task = name, id = %fresh, "task without id, generated a new one");
        fresh
    });

    let status = match status.as_str().and_then(TaskStatus::from_label) {
        Some(st) => st,
        None => {
            tracing::warn!(task = %id, status = %status, "unknown task status, using To Do");
            TaskStatus::ToDo
        }
    };

    let level = obj
        .get("level")
        .and_then(Value::as_u64)
        .and_then(|l| u32::try_from(l).ok())
        .unwrap_or(0);

    let parent_id = obj
        .get("parentId")
        .and_then(Value::as_str)
        .map(str::to_string);

    let child_path = format!("{} > {:?}", path, name);
    let sub_tasks = sanitize_task_list(obj.get("subTasks"), &child_path)?;

    let now = Utc::now();
    let mut files: Vec<FileData> = obj
        .get("files")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(|f| sanitize_file(f, now)).collect())
        .unwrap_or_default();
    sort_files_by_upload(&mut files);

    Ok(Task {
        id,
        name: name.to_string(),
        description: optional_string(obj, "description"),
        status,
        start_date: optional_date(obj, "startDate"),
        due_date: optional_date(obj, "dueDate"),
        department: optional_string(obj, "department"),
        assigned_to: optional_string(obj, "assignedTo"),
        parent_id,
        level,
        sub_tasks,
        files,
    })
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// Files are never rejected: a malformed entry gets a fresh id and defaults.
fn sanitize_file(value: &Value, now: DateTime<Utc>) -> FileData {
    let empty = Map::new();
    let obj = value.as_object().unwrap_or(&empty);
    let text = |key: &str| obj.get(key).and_then(Value::as_str);

    let well_formed = text("id").is_some() && text("name").is_some() && text("dataUrl").is_some();
    let id = match text("id") {
        Some(id) if well_formed && !id.is_empty() => id.to_string(),
        _ => {
            tracing::warn!(file = ?text("name"), "malformed file entry, generated a new id");
            new_id()
        }
    };

    FileData {
        id,
        name: text("name")
            .filter(|n| !n.is_empty())
            .unwrap_or(UNKNOWN_FILE_NAME)
            .to_string(),
        content_type: text("type")
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string(),
        size: obj.get("size").and_then(Value::as_u64).unwrap_or(0),
        data_url: text("dataUrl").unwrap_or_default().to_string(),
        uploaded_at: text("uploadedAt").and_then(parse_timestamp).unwrap_or(now),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// JSON truthiness: null, false, 0 and "" are falsy.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn optional_string(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp; anything else is dropped.
fn optional_date(obj: &Map<String, Value>, key: &str) -> Option<NaiveDate> {
    let raw = obj.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())?;
    let parsed = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(raw).map(|dt| dt.date_naive()));
    if parsed.is_none() {
        tracing::warn!(field = key, value = raw, "unreadable date dropped");
    }
    parsed
}

pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// RFC 3339, or a bare `YYYY-MM-DD` taken as midnight UTC.
fn parse_created_at(raw: &str) -> Option<DateTime<Utc>> {
    parse_timestamp(raw).or_else(|| {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::task_ops::{collect_ids, find_task};
    use chrono::TimeZone;
    use serde_json::json;

    fn backup(projects: Value) -> Value {
        json!({
            "version": "1.0",
            "exportedAt": "2024-05-01T10:00:00.000Z",
            "adminLoggedIn": true,
            "projects": projects,
        })
    }

    fn project(id: &str, tasks: Value) -> Value {
        json!({
            "id": id,
            "name": format!("Project {}", id),
            "createdAt": "2024-01-01T00:00:00.000Z",
            "tasks": tasks,
        })
    }

    #[test]
    fn accepts_minimal_backup() {
        let doc = backup(json!([project("p1", json!([]))]));
        let imported = validate_document(&doc).unwrap();
        assert_eq!(imported.projects.len(), 1);
        assert_eq!(imported.projects[0].description, "");
        assert!(imported.admin_logged_in);
        assert_eq!(imported.exported_at, "2024-05-01T10:00:00.000Z");
    }

    #[test]
    fn rejects_non_object_top_level() {
        let err = validate_document(&json!([1, 2])).unwrap_err();
        assert!(matches!(err, ImportError::InvalidFormat(_)));
    }

    #[test]
    fn rejects_missing_top_level_fields() {
        let doc = json!({"version": "1.0", "projects": []});
        assert!(matches!(
            validate_document(&doc).unwrap_err(),
            ImportError::InvalidFormat(_)
        ));

        let doc = json!({"version": "1.0", "exportedAt": "x", "adminLoggedIn": "yes", "projects": []});
        assert!(matches!(
            validate_document(&doc).unwrap_err(),
            ImportError::InvalidFormat(_)
        ));
    }

    #[test]
    fn rejects_projects_not_array() {
        let doc = json!({"version": "1.0", "exportedAt": "x", "adminLoggedIn": false, "projects": {}});
        assert!(matches!(
            validate_document(&doc).unwrap_err(),
            ImportError::InvalidFormat(_)
        ));
    }

    #[test]
    fn rejects_other_versions() {
        let mut doc = backup(json!([]));
        doc["version"] = json!("2.0");
        let err = validate_document(&doc).unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedVersion { ref found } if found == "2.0"));
        assert_eq!(
            err.to_string(),
            "unsupported backup version: 2.0. Expected 1.0."
        );
    }

    #[test]
    fn format_checked_before_version() {
        let doc = json!({"version": "2.0"});
        assert!(matches!(
            validate_document(&doc).unwrap_err(),
            ImportError::InvalidFormat(_)
        ));
    }

    #[test]
    fn project_missing_name_aborts_everything() {
        let doc = backup(json!([
            project("good", json!([])),
            {"id": "bad", "createdAt": "2024-01-01T00:00:00Z", "tasks": []},
        ]));
        let err = validate_document(&doc).unwrap_err();
        match err {
            ImportError::InvalidProject { index, reason } => {
                assert_eq!(index, 1);
                assert!(reason.contains("name"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn project_with_date_only_created_at_imports() {
        let doc = backup(json!([
            {"id": "p", "name": "P", "createdAt": "2024-01-01", "tasks": []}
        ]));
        let imported = validate_document(&doc).unwrap();
        assert_eq!(
            imported.projects[0].created_at,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn unreadable_created_at_is_repaired_not_rejected() {
        let before = Utc::now();
        let doc = backup(json!([
            {"id": "p", "name": "P", "createdAt": "last tuesday", "tasks": []},
            project("q", json!([])),
        ]));
        let imported = validate_document(&doc).unwrap();
        assert_eq!(imported.projects.len(), 2);
        assert!(imported.projects[0].created_at >= before);
    }

    #[test]
    fn project_with_non_string_created_at_is_rejected() {
        let doc = backup(json!([
            {"id": "p", "name": "P", "createdAt": 1704067200, "tasks": []}
        ]));
        assert!(matches!(
            validate_document(&doc).unwrap_err(),
            ImportError::InvalidProject { index: 0, .. }
        ));
    }

    #[test]
    fn task_missing_id_gets_fresh_one() {
        let doc = backup(json!([project("p1", json!([{"name": "X", "status": "Done"}]))]));
        let imported = validate_document(&doc).unwrap();
        let task = &imported.projects[0].tasks[0];
        assert_eq!(task.name, "X");
        assert_eq!(task.status, TaskStatus::Done);
        assert!(!task.id.is_empty());
        assert!(uuid::Uuid::parse_str(&task.id).is_ok());
    }

    #[test]
    fn task_missing_name_is_rejected() {
        let doc = backup(json!([project("p1", json!([{"id": "t1", "status": "Done"}]))]));
        assert!(matches!(
            validate_document(&doc).unwrap_err(),
            ImportError::InvalidTask { .. }
        ));
    }

    #[test]
    fn task_with_empty_status_is_rejected() {
        let doc = backup(json!([project("p1", json!([{"id": "t1", "name": "T", "status": ""}]))]));
        assert!(matches!(
            validate_document(&doc).unwrap_err(),
            ImportError::InvalidTask { .. }
        ));
    }

    #[test]
    fn task_with_numeric_id_is_rejected() {
        let doc = backup(json!([project("p1", json!([{"id": 7, "name": "T", "status": "Done"}]))]));
        assert!(matches!(
            validate_document(&doc).unwrap_err(),
            ImportError::InvalidTask { .. }
        ));
    }

    #[test]
    fn invalid_nested_task_aborts_and_names_its_path() {
        let doc = backup(json!([project(
            "p1",
            json!([{
                "id": "t1", "name": "Parent", "status": "To Do",
                "subTasks": [{"id": "t2", "status": "Done"}]
            }])
        )]));
        let err = validate_document(&doc).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Parent"), "{}", msg);
        assert!(msg.contains("missing string name"), "{}", msg);
    }

    #[test]
    fn unknown_status_coerced_to_todo() {
        let doc = backup(json!([project(
            "p1",
            json!([{"id": "t1", "name": "T", "status": "Blocked"}])
        )]));
        let imported = validate_document(&doc).unwrap();
        assert_eq!(imported.projects[0].tasks[0].status, TaskStatus::ToDo);
    }

    #[test]
    fn repairs_optional_task_fields() {
        let doc = backup(json!([project(
            "p1",
            json!([{
                "id": "t1", "name": "T", "status": "In Progress",
                "level": "deep", "startDate": "not a date", "dueDate": "2024-03-04",
                "department": "", "assignedTo": "Wendy"
            }])
        )]));
        let imported = validate_document(&doc).unwrap();
        let task = &imported.projects[0].tasks[0];
        assert_eq!(task.level, 0);
        assert!(task.parent_id.is_none());
        assert!(task.start_date.is_none());
        assert_eq!(task.due_date, NaiveDate::from_ymd_opt(2024, 3, 4));
        assert!(task.department.is_none());
        assert_eq!(task.assigned_to.as_deref(), Some("Wendy"));
        assert!(task.sub_tasks.is_empty());
        assert!(task.files.is_empty());
    }

    #[test]
    fn sorts_every_level() {
        let doc = backup(json!([project(
            "p1",
            json!([
                {"id": "undated", "name": "U", "status": "To Do"},
                {"id": "dated", "name": "D", "status": "To Do", "startDate": "2024-01-01",
                 "subTasks": [
                    {"id": "c2", "name": "C2", "status": "To Do", "level": 1, "parentId": "dated"},
                    {"id": "c1", "name": "C1", "status": "To Do", "level": 1, "parentId": "dated",
                     "startDate": "2024-01-02"}
                 ]}
            ])
        )]));
        let imported = validate_document(&doc).unwrap();
        let tasks = &imported.projects[0].tasks;
        assert_eq!(collect_ids(tasks), vec!["dated", "c1", "c2", "undated"]);
        let c1 = find_task(tasks, "c1").unwrap();
        assert_eq!(c1.parent_id.as_deref(), Some("dated"));
        assert_eq!(c1.level, 1);
    }

    #[test]
    fn files_repaired_and_sorted() {
        let doc = backup(json!([project(
            "p1",
            json!([{
                "id": "t1", "name": "T", "status": "Done",
                "files": [
                    {"id": "old", "name": "a.txt", "dataUrl": "data:text/plain;base64,YQ==",
                     "type": "text/plain", "size": 1, "uploadedAt": "2024-01-01T00:00:00Z"},
                    {"name": "no-id.pdf", "uploadedAt": "2024-02-01T00:00:00Z"},
                    {"id": "new", "name": "b.txt", "dataUrl": "",
                     "uploadedAt": "2024-03-01T00:00:00Z"}
                ]
            }])
        )]));
        let imported = validate_document(&doc).unwrap();
        let files = &imported.projects[0].tasks[0].files;
        assert_eq!(files.len(), 3);
        assert_eq!(files[0].id, "new");
        assert_eq!(files[0].content_type, DEFAULT_CONTENT_TYPE);
        assert_eq!(files[0].size, 0);
        assert_eq!(files[1].name, "no-id.pdf");
        assert!(uuid::Uuid::parse_str(&files[1].id).is_ok());
        assert_eq!(files[1].data_url, "");
        assert_eq!(files[2].id, "old");
        assert_eq!(files[2].size, 1);
    }

    #[test]
    fn non_object_file_gets_defaults() {
        let doc = backup(json!([project(
            "p1",
            json!([{"id": "t1", "name": "T", "status": "Done", "files": [null]}])
        )]));
        let imported = validate_document(&doc).unwrap();
        let file = &imported.projects[0].tasks[0].files[0];
        assert_eq!(file.name, "unknown_file");
        assert_eq!(file.content_type, DEFAULT_CONTENT_TYPE);
    }

    #[test]
    fn parse_json_reports_invalid_format() {
        assert!(matches!(
            parse_json("{not json").unwrap_err(),
            ImportError::InvalidFormat(_)
        ));
        assert!(matches!(
            parse_json("{} {}").unwrap_err(),
            ImportError::InvalidFormat(_)
        ));
    }

    #[test]
    fn parse_json_accepts_deep_nesting() {
        let mut task = json!({"id": "leaf", "name": "leaf", "status": "Done"});
        for i in 0..150 {
            task = json!({"id": format!("n{}", i), "name": "n", "status": "Done", "subTasks": [task]});
        }
        let text = backup(json!([project("p1", json!([task]))])).to_string();
        let imported = import_backup(&text).unwrap();
        assert!(find_task(&imported.projects[0].tasks, "leaf").is_some());
    }
}
