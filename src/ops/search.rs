use std::ops::Range;

use regex::Regex;

use crate::model::project::Project;
use crate::model::task::Task;

/// Which field of a task matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchField {
    Name,
    Description,
    Department,
    AssignedTo,
    /// Name of an attached file
    File,
}

impl MatchField {
    pub fn label(self) -> &'static str {
        match self {
            MatchField::Name => "name",
            MatchField::Description => "description",
            MatchField::Department => "department",
            MatchField::AssignedTo => "assignee",
            MatchField::File => "file",
        }
    }
}

/// A search hit for a task field
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub project_id: String,
    pub task_id: String,
    pub field: MatchField,
    /// The text that matched, so callers can highlight `spans` without a lookup
    pub text: String,
    pub spans: Vec<Range<usize>>,
}

/// Collect all non-overlapping match byte-ranges for a regex in the given text.
fn find_matches(re: &Regex, text: &str) -> Vec<Range<usize>> {
    re.find_iter(text).map(|m| m.start()..m.end()).collect()
}

/// Search every task of every project, or only `project_filter` when given.
///
/// Hits come back in project order, then depth-first task order.
pub fn search_tasks(projects: &[Project], re: &Regex, project_filter: Option<&str>) -> Vec<SearchHit> {
    let mut hits = Vec::new();
    for project in projects {
        if project_filter.is_some_and(|id| id != project.id) {
            continue;
        }
        for task in &project.tasks {
            search_task(re, task, &project.id, &mut hits);
        }
    }
    hits
}

/// Search a single task (and its subtasks recursively).
fn search_task(re: &Regex, task: &Task, project_id: &str, hits: &mut Vec<SearchHit>) {
    let mut check = |field: MatchField, text: &str| {
        let spans = find_matches(re, text);
        if !spans.is_empty() {
            hits.push(SearchHit {
                project_id: project_id.to_string(),
                task_id: task.id.clone(),
                field,
                text: text.to_string(),
                spans,
            });
        }
    };

    check(MatchField::Name, &task.name);
    if let Some(desc) = &task.description {
        check(MatchField::Description, desc);
    }
    if let Some(dept) = &task.department {
        check(MatchField::Department, dept);
    }
    if let Some(who) = &task.assigned_to {
        check(MatchField::AssignedTo, who);
    }
    for file in &task.files {
        check(MatchField::File, &file.name);
    }

    for sub in &task.sub_tasks {
        search_task(re, sub, project_id, hits);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
