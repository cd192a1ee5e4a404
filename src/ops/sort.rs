//! Ordering rules for sibling lists.
//!
//! Sibling tasks run by ascending start date, undated tasks last and ordered
//! by name among themselves. All sorts are stable: tasks sharing a start date
//! keep their relative order.

use std::cmp::Ordering;

use crate::model::project::Project;
use crate::model::task::{FileData, Task};

/// Return `tasks` in chronological order.
pub fn sort_chronologically(mut tasks: Vec<Task>) -> Vec<Task> {
    tasks.sort_by(compare_chronologically);
    tasks
}

/// Ordering between two siblings.
pub fn compare_chronologically(a: &Task, b: &Task) -> Ordering {
    match (a.start_date, b.start_date) {
        (Some(da), Some(db)) => da.cmp(&db),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => compare_names(&a.name, &b.name),
    }
}

/// Case-insensitive name ordering. Names equal up to case put the
/// lowercase spelling first.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    let folded = a
        .chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase));
    folded.then_with(|| {
        a.chars()
            .map(char::is_uppercase)
            .cmp(b.chars().map(char::is_uppercase))
    })
}

/// Newest upload first.
pub fn sort_files_by_upload(files: &mut [FileData]) {
    files.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
}

/// Newest project first.
pub fn sort_projects_by_created(projects: &mut [Project]) {
    projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// True when every dated task precedes every undated one and dates never decrease.
pub fn is_chronological(tasks: &[Task]) -> bool {
    tasks
        .windows(2)
        .all(|w| compare_chronologically(&w[0], &w[1]) != Ordering::Greater)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::TaskStatus;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn task(name: &str, start: Option<(i32, u32, u32)>) -> Task {
        let mut t = Task::new(name, TaskStatus::ToDo);
        t.id = name.to_string();
        t.start_date = start.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d));
        t
    }

    fn names(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn dated_tasks_precede_undated() {
        let sorted = sort_chronologically(vec![
            task("b", None),
            task("late", Some((2024, 3, 1))),
            task("a", None),
            task("early", Some((2024, 1, 1))),
        ]);
        assert_eq!(names(&sorted), vec!["early", "late", "a", "b"]);
        assert!(is_chronological(&sorted));
    }

    #[test]
    fn equal_dates_keep_input_order() {
        let sorted = sort_chronologically(vec![
            task("second", Some((2024, 1, 1))),
            task("first", Some((2024, 1, 1))),
        ]);
        assert_eq!(names(&sorted), vec!["second", "first"]);
    }

    #[test]
    fn undated_names_compare_case_insensitively() {
        let sorted = sort_chronologically(vec![
            task("banana", None),
            task("Apple", None),
            task("cherry", None),
        ]);
        assert_eq!(names(&sorted), vec!["Apple", "banana", "cherry"]);
    }

    #[test]
    fn lowercase_first_on_case_only_difference() {
        assert_eq!(compare_names("alpha", "Alpha"), Ordering::Less);
        assert_eq!(compare_names("Alpha", "alpha"), Ordering::Greater);
        assert_eq!(compare_names("same", "same"), Ordering::Equal);
    }

    #[test]
    fn empty_and_single_lists() {
        assert!(sort_chronologically(Vec::new()).is_empty());
        let one = sort_chronologically(vec![task("only", None)]);
        assert_eq!(names(&one), vec!["only"]);
    }

    #[test]
    fn files_newest_first() {
        let file = |id: &str, day: u32| FileData {
            id: id.to_string(),
            name: format!("{}.txt", id),
            content_type: "text/plain".into(),
            size: 1,
            data_url: "data:text/plain;base64,YQ==".into(),
            uploaded_at: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
        };
        let mut files = vec![file("old", 1), file("new", 9), file("mid", 5)];
        sort_files_by_upload(&mut files);
        let ids: Vec<&str> = files.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }
}
