use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::project::Project;

/// The only backup format version accepted on import
pub const EXPORT_VERSION: &str = "1.0";

/// A full backup of all projects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub admin_logged_in: bool,
    pub projects: Vec<Project>,
}
