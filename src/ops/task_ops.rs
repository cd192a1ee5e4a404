//! Task tree mutations.
//!
//! Every operation takes the whole forest by value and returns the new
//! forest. Nodes are addressed by id and found by depth-first pre-order
//! search. An id that matches nothing leaves the forest unchanged; that is
//! not an error, since callers only ever hold ids they have already seen.

use std::mem;

use crate::model::task::{FileData, Task, TaskStatus, TaskUpdate};
use crate::ops::sort::{sort_chronologically, sort_files_by_upload};

// ---------------------------------------------------------------------------
// Structural mutations
// ---------------------------------------------------------------------------

/// Insert `new_task` at the front of the root list (`parent_id` absent or
/// empty) or of the children of `parent_id`, then re-sort that list.
pub fn add_task(forest: Vec<Task>, new_task: Task, parent_id: Option<&str>) -> Vec<Task> {
    match parent_id.filter(|p| !p.is_empty()) {
        None => sort_chronologically(prepend(new_task, forest)),
        Some(parent_id) => {
            let mut pending = Some(new_task);
            insert_under(forest, parent_id, &mut pending)
        }
    }
}

fn insert_under(tasks: Vec<Task>, parent_id: &str, pending: &mut Option<Task>) -> Vec<Task> {
    tasks
        .into_iter()
        .map(|mut task| {
            if task.id == parent_id {
                if let Some(new_task) = pending.take() {
                    let children = mem::take(&mut task.sub_tasks);
                    task.sub_tasks = sort_chronologically(prepend(new_task, children));
                }
            } else if !task.sub_tasks.is_empty() && pending.is_some() {
                let children = mem::take(&mut task.sub_tasks);
                task.sub_tasks = insert_under(children, parent_id, pending);
            }
            task
        })
        .collect()
}

/// Replace the fields of the node matching `update.id`.
///
/// `id`, `level` and `parentId` of the existing node survive; children and
/// files survive unless the update carries its own. Every list the walk
/// visits is re-sorted, since a start date or name may have changed.
pub fn update_task(forest: Vec<Task>, update: &TaskUpdate) -> Vec<Task> {
    let list: Vec<Task> = forest
        .into_iter()
        .map(|mut task| {
            if task.id == update.id {
                update.apply_to(&mut task);
            }
            if !task.sub_tasks.is_empty() {
                let children = mem::take(&mut task.sub_tasks);
                task.sub_tasks = update_task(children, update);
            }
            task
        })
        .collect();
    sort_chronologically(list)
}

/// Remove the node with `task_id` together with its whole subtree.
pub fn delete_task(forest: Vec<Task>, task_id: &str) -> Vec<Task> {
    forest
        .into_iter()
        .filter(|task| task.id != task_id)
        .map(|mut task| {
            if !task.sub_tasks.is_empty() {
                let children = mem::take(&mut task.sub_tasks);
                task.sub_tasks = delete_task(children, task_id);
            }
            task
        })
        .collect()
}

/// Change only the status of the node with `task_id`. Order is untouched.
pub fn set_status(forest: Vec<Task>, task_id: &str, status: TaskStatus) -> Vec<Task> {
    map_task(forest, task_id, &mut |task: &mut Task| task.status = status)
}

// ---------------------------------------------------------------------------
// File attachments
// ---------------------------------------------------------------------------

/// Append `file` to the files of `task_id`, newest upload first.
pub fn attach_file(forest: Vec<Task>, task_id: &str, file: FileData) -> Vec<Task> {
    let mut pending = Some(file);
    map_task(forest, task_id, &mut |task: &mut Task| {
        if let Some(file) = pending.take() {
            task.files.push(file);
            sort_files_by_upload(&mut task.files);
        }
    })
}

/// Remove file `file_id` from `task_id`. Remaining files keep their order.
pub fn detach_file(forest: Vec<Task>, task_id: &str, file_id: &str) -> Vec<Task> {
    map_task(forest, task_id, &mut |task: &mut Task| {
        task.files.retain(|f| f.id != file_id);
    })
}

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

/// Find a task by id anywhere in the forest.
pub fn find_task<'a>(tasks: &'a [Task], task_id: &str) -> Option<&'a Task> {
    for task in tasks {
        if task.id == task_id {
            return Some(task);
        }
        if let Some(t) = find_task(&task.sub_tasks, task_id) {
            return Some(t);
        }
    }
    None
}

/// Total number of tasks in the forest, nested ones included.
pub fn count_tasks(tasks: &[Task]) -> usize {
    tasks.iter().map(|t| 1 + count_tasks(&t.sub_tasks)).sum()
}

/// Visit every task depth-first, parents before children.
pub fn for_each_task<'a>(tasks: &'a [Task], f: &mut dyn FnMut(&'a Task)) {
    for task in tasks {
        f(task);
        for_each_task(&task.sub_tasks, f);
    }
}

/// All task ids in pre-order.
pub fn collect_ids(tasks: &[Task]) -> Vec<String> {
    let mut ids = Vec::new();
    for_each_task(tasks, &mut |t: &Task| ids.push(t.id.clone()));
    ids
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn prepend(task: Task, rest: Vec<Task>) -> Vec<Task> {
    let mut list = Vec::with_capacity(rest.len() + 1);
    list.push(task);
    list.extend(rest);
    list
}

/// Apply `f` to the first node with `task_id`; siblings and their subtrees
/// are passed through without reordering.
fn map_task(tasks: Vec<Task>, task_id: &str, f: &mut dyn FnMut(&mut Task)) -> Vec<Task> {
    tasks
        .into_iter()
        .map(|mut task| {
            if task.id == task_id {
                f(&mut task);
            } else if !task.sub_tasks.is_empty() {
                let children = mem::take(&mut task.sub_tasks);
                task.sub_tasks = map_task(children, task_id, f);
            }
            task
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
