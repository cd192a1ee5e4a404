use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::task::{Task, new_id};

/// A project and the task forest it owns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Root tasks, kept in chronological order
    #[serde(default)]
    pub tasks: Vec<Task>,
    pub created_at: DateTime<Utc>,
}

impl Project {
    /// Create an empty project stamped with the current time
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Project {
            id: new_id(),
            name: name.into(),
            description: description.into(),
            tasks: Vec::new(),
            created_at: Utc::now(),
        }
    }
}
