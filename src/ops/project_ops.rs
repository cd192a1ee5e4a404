use crate::model::project::Project;
use crate::ops::sort::sort_projects_by_created;

/// Error type for project list operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProjectOpError {
    #[error("project name cannot be empty")]
    EmptyName,
    #[error("project not found: {0}")]
    NotFound(String),
}

/// Create a project with trimmed fields and put it at the front of the list.
///
/// The list stays ordered newest first. Returns the new project's id.
pub fn add_project(
    projects: &mut Vec<Project>,
    name: &str,
    description: &str,
) -> Result<String, ProjectOpError> {
    let name = non_empty_name(name)?;
    let project = Project::new(name, description.trim());
    let id = project.id.clone();
    projects.insert(0, project);
    sort_projects_by_created(projects);
    Ok(id)
}

/// Rename a project and replace its description. Tasks are untouched.
pub fn edit_project(
    projects: &mut [Project],
    project_id: &str,
    name: &str,
    description: &str,
) -> Result<(), ProjectOpError> {
    let name = non_empty_name(name)?;
    let project = find_project_mut(projects, project_id)
        .ok_or_else(|| ProjectOpError::NotFound(project_id.to_string()))?;
    project.name = name.to_string();
    project.description = description.trim().to_string();
    Ok(())
}

/// Remove a project and its whole task forest.
pub fn delete_project(
    projects: &mut Vec<Project>,
    project_id: &str,
) -> Result<Project, ProjectOpError> {
    let idx = projects
        .iter()
        .position(|p| p.id == project_id)
        .ok_or_else(|| ProjectOpError::NotFound(project_id.to_string()))?;
    Ok(projects.remove(idx))
}

pub fn find_project<'a>(projects: &'a [Project], project_id: &str) -> Option<&'a Project> {
    projects.iter().find(|p| p.id == project_id)
}

pub fn find_project_mut<'a>(
    projects: &'a mut [Project],
    project_id: &str,
) -> Option<&'a mut Project> {
    projects.iter_mut().find(|p| p.id == project_id)
}

fn non_empty_name(name: &str) -> Result<&str, ProjectOpError> {
    let name = name.trim();
    if name.is_empty() {
        Err(ProjectOpError::EmptyName)
    } else {
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn add_puts_newest_first_and_trims() {
        let mut old = Project::new("Old", "");
        old.created_at = Utc::now() - Duration::days(3);
        let mut projects = vec![old];

        let id = add_project(&mut projects, "  Fresh  ", " notes ").unwrap();
        assert_eq!(projects[0].id, id);
        assert_eq!(projects[0].name, "Fresh");
        assert_eq!(projects[0].description, "notes");
        assert_eq!(projects[1].name, "Old");
    }

    #[test]
    fn add_rejects_blank_name() {
        let mut projects = Vec::new();
        assert_eq!(
            add_project(&mut projects, "   ", "x"),
            Err(ProjectOpError::EmptyName)
        );
        assert!(projects.is_empty());
    }

    #[test]
    fn edit_keeps_tasks() {
        let mut projects = Vec::new();
        let id = add_project(&mut projects, "P", "").unwrap();
        projects[0]
            .tasks
            .push(crate::model::task::Task::new("T", Default::default()));

        edit_project(&mut projects, &id, "Renamed", "desc").unwrap();
        assert_eq!(projects[0].name, "Renamed");
        assert_eq!(projects[0].tasks.len(), 1);

        assert_eq!(
            edit_project(&mut projects, "nope", "x", ""),
            Err(ProjectOpError::NotFound("nope".into()))
        );
    }

    #[test]
    fn delete_removes_only_target() {
        let mut projects = Vec::new();
        let a = add_project(&mut projects, "A", "").unwrap();
        let b = add_project(&mut projects, "B", "").unwrap();
        let removed = delete_project(&mut projects, &a).unwrap();
        assert_eq!(removed.name, "A");
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].id, b);
        assert!(delete_project(&mut projects, &a).is_err());
    }
}
