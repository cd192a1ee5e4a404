use chrono::{DateTime, NaiveDateTime, Utc};

use crate::model::document::{EXPORT_VERSION, ExportDocument};
use crate::model::project::Project;

/// Snapshot every project into a backup document.
pub fn build_document(
    projects: &[Project],
    admin_logged_in: bool,
    exported_at: DateTime<Utc>,
) -> ExportDocument {
    ExportDocument {
        version: EXPORT_VERSION.to_string(),
        exported_at,
        admin_logged_in,
        projects: projects.to_vec(),
    }
}

/// Pretty-printed JSON with two-space indentation.
pub fn to_json(doc: &ExportDocument) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(doc)
}

/// `zentrack_backup_YYYY-MM-DD_HH-MM-SS.json` for the given local wall-clock time.
pub fn backup_file_name(local_now: NaiveDateTime) -> String {
    format!(
        "zentrack_backup_{}.json",
        local_now.format("%Y-%m-%d_%H-%M-%S")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::{Task, TaskStatus};
    use crate::ops::import::import_backup;
    use chrono::{NaiveDate, TimeZone};

    #[test]
    fn file_name_is_zero_padded() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_opt(9, 5, 2)
            .unwrap();
        assert_eq!(backup_file_name(at), "zentrack_backup_2024-03-07_09-05-02.json");
    }

    #[test]
    fn exported_document_reimports() {
        let mut project = Project::new("Launch", "Ship it");
        project.created_at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let mut task = Task::new("Plan", TaskStatus::InProgress);
        task.start_date = NaiveDate::from_ymd_opt(2024, 1, 2);
        project.tasks.push(task);

        let doc = build_document(
            std::slice::from_ref(&project),
            true,
            Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
        );
        let text = to_json(&doc).unwrap();
        assert!(text.contains("\"version\": \"1.0\""));
        assert!(text.contains("\"exportedAt\""));
        assert!(text.contains("\"adminLoggedIn\": true"));

        let imported = import_backup(&text).unwrap();
        assert_eq!(imported.projects, vec![project]);
    }
}
