use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::model::project::Project;
use crate::model::task::{FileData, Task, TaskStatus};
use crate::ops::search::SearchHit;
use crate::ops::task_ops::{count_tasks, for_each_task};
use crate::util::unicode::{fit_to_width, truncate_to_width};

/// Ids are shown abbreviated to this many characters
pub const SHORT_ID_LEN: usize = 8;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummaryJson {
    pub id: String,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub task_count: usize,
    pub done_count: usize,
}

/// File metadata without the payload
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummaryJson {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHitJson {
    pub project_id: String,
    pub task_id: String,
    pub field: &'static str,
    pub text: String,
    pub spans: Vec<[usize; 2]>,
}

pub fn project_summary_json(project: &Project) -> ProjectSummaryJson {
    let (total, done) = progress(project);
    ProjectSummaryJson {
        id: project.id.clone(),
        name: project.name.clone(),
        description: project.description.clone(),
        created_at: project.created_at,
        task_count: total,
        done_count: done,
    }
}

pub fn file_summary_json(file: &FileData) -> FileSummaryJson {
    FileSummaryJson {
        id: file.id.clone(),
        name: file.name.clone(),
        content_type: file.content_type.clone(),
        size: file.size,
        uploaded_at: file.uploaded_at,
    }
}

pub fn search_hit_json(hit: &SearchHit) -> SearchHitJson {
    SearchHitJson {
        project_id: hit.project_id.clone(),
        task_id: hit.task_id.clone(),
        field: hit.field.label(),
        text: hit.text.clone(),
        spans: hit.spans.iter().map(|r| [r.start, r.end]).collect(),
    }
}

// ---------------------------------------------------------------------------
// Value formatting
// ---------------------------------------------------------------------------

/// `Jan 5, 2024`, or `N/A` when absent
pub fn format_date(date: Option<NaiveDate>) -> String {
    match date {
        Some(d) => d.format("%b %-d, %Y").to_string(),
        None => "N/A".to_string(),
    }
}

/// Human-readable byte count in powers of 1024, at most two decimals
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let mut text = format!("{:.2}", value);
    while text.ends_with('0') {
        text.pop();
    }
    if text.ends_with('.') {
        text.pop();
    }
    format!("{} {}", text, UNITS[unit])
}

pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

fn progress(project: &Project) -> (usize, usize) {
    let mut done = 0;
    for_each_task(&project.tasks, &mut |t: &Task| {
        if t.status == TaskStatus::Done {
            done += 1;
        }
    });
    (count_tasks(&project.tasks), done)
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

/// One-line summary: status box, short id, name, then whichever details are set
pub fn format_task_line(task: &Task) -> String {
    let mut details = Vec::new();
    if task.start_date.is_some() || task.due_date.is_some() {
        details.push(format!(
            "{} -> {}",
            format_date(task.start_date),
            format_date(task.due_date)
        ));
    }
    if let Some(dept) = &task.department {
        details.push(dept.clone());
    }
    if let Some(who) = &task.assigned_to {
        details.push(format!("@{}", who));
    }
    match task.files.len() {
        0 => {}
        1 => details.push("1 file".to_string()),
        n => details.push(format!("{} files", n)),
    }

    let mut line = format!(
        "[{}] {} {}",
        task.status.checkbox_char(),
        short_id(&task.id),
        task.name
    );
    if !details.is_empty() {
        line.push_str(" | ");
        line.push_str(&details.join(" | "));
    }
    line
}

/// Format a task with its subtasks, indented
pub fn format_task_tree(task: &Task, indent: usize) -> Vec<String> {
    let mut lines = vec![format!("{}{}", "  ".repeat(indent), format_task_line(task))];
    for sub in &task.sub_tasks {
        lines.extend(format_task_tree(sub, indent + 1));
    }
    lines
}

/// Project header followed by its whole task tree
pub fn format_project_detail(project: &Project) -> Vec<String> {
    let (total, done) = progress(project);
    let mut lines = vec![format!("== {} ({}) ==", project.name, short_id(&project.id))];
    if !project.description.is_empty() {
        lines.push(project.description.clone());
    }
    lines.push(format!(
        "created {} | {}/{} done",
        format_date(Some(project.created_at.date_naive())),
        done,
        total
    ));
    lines.push(String::new());
    if project.tasks.is_empty() {
        lines.push("(no tasks)".to_string());
    }
    for task in &project.tasks {
        lines.extend(format_task_tree(task, 0));
    }
    lines
}

/// Table of projects, one per line
pub fn format_project_listing(projects: &[Project]) -> Vec<String> {
    projects
        .iter()
        .map(|p| {
            let (total, done) = progress(p);
            format!(
                "{}  {}  {:>7}  {}",
                fit_to_width(short_id(&p.id), SHORT_ID_LEN),
                fit_to_width(&p.name, 32),
                format!("{}/{}", done, total),
                format_date(Some(p.created_at.date_naive()))
            )
        })
        .collect()
}

/// Full view of one task
pub fn format_task_detail(task: &Task) -> Vec<String> {
    let mut lines = vec![
        format!("[{}] {} {}", task.status.checkbox_char(), task.id, task.name),
        format!("status: {}", task.status),
        format!("start: {}", format_date(task.start_date)),
        format!("due: {}", format_date(task.due_date)),
    ];
    if let Some(dept) = &task.department {
        lines.push(format!("department: {}", dept));
    }
    if let Some(who) = &task.assigned_to {
        lines.push(format!("assigned to: {}", who));
    }
    lines.push(format!(
        "parent: {}",
        task.parent_id.as_deref().unwrap_or("(root)")
    ));
    lines.push(format!("level: {}", task.level));

    if let Some(desc) = &task.description {
        lines.push("description:".to_string());
        for line in desc.lines() {
            lines.push(format!("  {}", line));
        }
    }

    if !task.files.is_empty() {
        lines.push("files:".to_string());
        for file in &task.files {
            lines.push(format!("  {}", format_file_line(file)));
        }
    }

    if !task.sub_tasks.is_empty() {
        lines.push("subtasks:".to_string());
        for sub in &task.sub_tasks {
            lines.extend(format_task_tree(sub, 1));
        }
    }
    lines
}

pub fn format_file_line(file: &FileData) -> String {
    format!(
        "{} {} ({}, {}, uploaded {})",
        short_id(&file.id),
        file.name,
        file.content_type,
        format_file_size(file.size),
        format_date(Some(file.uploaded_at.date_naive()))
    )
}

/// `project/task field: text`, with the matched text truncated for the terminal
pub fn format_search_hit(hit: &SearchHit, project_name: &str) -> String {
    format!(
        "{} / {} {}: {}",
        project_name,
        short_id(&hit.task_id),
        hit.field.label(),
        truncate_to_width(&hit.text, 60)
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
