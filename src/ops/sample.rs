//! Demo project with a three-level task tree, dated relative to today.

use chrono::{Days, NaiveDate};

use crate::model::project::Project;
use crate::model::task::{Task, TaskStatus};
use crate::ops::sort::sort_chronologically;

use TaskStatus::{Done, InProgress, ToDo};

/// name, status, start offset, due offset, department, assignee, description
type Row = (&'static str, TaskStatus, u64, u64, &'static str, &'static str, &'static str);

const PHASES: &[(Row, &[Row])] = &[
    (
        ("NPI & Setup", InProgress, 0, 7, "NPI Engineering", "Alice Wonderland",
         "New Product Introduction phase including scope definition, resource allocation, and system setup."),
        &[
            ("Define Scope & Specifications", Done, 0, 2, "NPI Eng.", "Alice W.",
             "Finalize product requirements and technical specifications."),
            ("Resource Allocation", InProgress, 1, 4, "Management", "Cheshire Cat",
             "Assign personnel, equipment, and budget."),
            ("System Configuration & Calibration", ToDo, 3, 7, "IT/Ops", "Mad Hatter",
             "Set up and calibrate all necessary manufacturing and test systems."),
        ],
    ),
    (
        ("Wafer Bumping & Probe", ToDo, 5, 15, "Fab Operations", "Bob The Builder",
         "Processing wafers, including bumping and initial electrical probe testing."),
        &[
            ("Material Procurement (Wafers & Consumables)", InProgress, 5, 10, "Procurement", "Wendy",
             "Order and receive silicon wafers and other necessary consumables."),
            ("Wafer Bumping Process", ToDo, 10, 13, "Fab Ops", "Bob T.B.",
             "Apply solder bumps to wafer bond pads."),
            ("Wafer Sort & Electrical Probe", ToDo, 13, 15, "Test Eng.", "Scoop",
             "Perform initial electrical tests on individual dies."),
        ],
    ),
    (
        ("Assembly & Packaging", ToDo, 16, 28, "Assembly Line", "Charlie Chaplin",
         "Die attach, wire bonding, encapsulation, and final package assembly."),
        &[
            ("Die Preparation & Attach", ToDo, 16, 19, "Assembly", "Charlie C.",
             "Prepare dies and attach them to substrates."),
            ("Wire Bonding / Flip Chip", ToDo, 19, 22, "Assembly", "Paulette G.",
             "Connect die pads to package leads."),
            ("Molding & Encapsulation", ToDo, 22, 25, "Assembly", "Charlie C.",
             "Encapsulate the assembled die."),
            ("Marking & Singulation", ToDo, 25, 28, "Assembly", "Paulette G.",
             "Mark packages and separate them into individual units."),
        ],
    ),
    (
        ("Final Test & Burn-in", ToDo, 29, 38, "Test Engineering", "Dorothy Gale",
         "Comprehensive final testing and reliability stress (burn-in)."),
        &[
            ("Automated Test Equipment (ATE) Setup", ToDo, 29, 30, "Test Eng.", "Scarecrow",
             "Configure ATE for final test programs."),
            ("Final Electrical Test", ToDo, 30, 34, "Test Ops", "Tin Man",
             "Perform full functional and parametric tests."),
            ("Burn-in Process", ToDo, 34, 37, "Reliability Lab", "Cowardly Lion",
             "Stress test devices to screen for early failures."),
            ("Post Burn-in Test", ToDo, 37, 38, "Test Ops", "Toto",
             "Re-test devices after burn-in."),
        ],
    ),
    (
        ("Quality Assurance & Release", ToDo, 39, 45, "Quality Assurance", "Glinda Goodwitch",
         "Final quality checks, documentation, and preparation for shipment."),
        &[
            ("Outgoing Quality Inspection (OQA)", ToDo, 39, 41, "QA", "Glinda G.",
             "Perform final visual and AQL inspections."),
            ("Documentation Review & Packaging", ToDo, 41, 43, "Logistics", "Wizard of Oz",
             "Verify all documents and package for shipment."),
            ("Customer Release & Shipment", ToDo, 43, 45, "Shipping", "Flying Monkeys",
             "Release product to customer and arrange shipment."),
        ],
    ),
];

/// Third level, hung under the procurement task of the wafer phase
const PROCUREMENT_STEPS: &[Row] = &[
    ("Vendor Qualification & Selection", Done, 5, 6, "Procurement", "Wendy",
     "Select and qualify wafer suppliers."),
    ("Issue Purchase Orders", InProgress, 6, 7, "Procurement", "Wendy",
     "Place orders for wafers."),
    ("Incoming Material Inspection", ToDo, 9, 10, "QA", "Spud",
     "Inspect received materials for quality."),
];

const PROCUREMENT_TASK: &str = "Material Procurement (Wafers & Consumables)";

/// Build the demo project with dates counted from `today`.
pub fn sample_project(today: NaiveDate) -> Project {
    let mut project = Project::new(
        "TE OSAT",
        "Full lifecycle management for the assembly, test, and packaging of the NextGen \
         System-on-Chip. This project covers all stages from NPI to final shipment.",
    );

    let mut roots = Vec::new();
    for (phase, steps) in PHASES {
        let mut root = task_from_row(phase, today, None);
        let mut children = Vec::new();
        for step in *steps {
            let mut child = task_from_row(step, today, Some(&root));
            if child.name == PROCUREMENT_TASK {
                let grandchildren = PROCUREMENT_STEPS
                    .iter()
                    .map(|row| task_from_row(row, today, Some(&child)))
                    .collect();
                child.sub_tasks = sort_chronologically(grandchildren);
            }
            children.push(child);
        }
        root.sub_tasks = sort_chronologically(children);
        roots.push(root);
    }
    project.tasks = sort_chronologically(roots);
    project
}

fn task_from_row(row: &Row, today: NaiveDate, parent: Option<&Task>) -> Task {
    let &(name, status, start, due, department, assignee, description) = row;
    let mut task = Task::new(name, status);
    task.description = Some(description.to_string());
    task.start_date = today.checked_add_days(Days::new(start));
    task.due_date = today.checked_add_days(Days::new(due));
    task.department = Some(department.to_string());
    task.assigned_to = Some(assignee.to_string());
    task.place_under(parent);
    task
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::sort::is_chronological;
    use crate::ops::task_ops::{count_tasks, for_each_task};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn builds_three_levels() {
        let project = sample_project(today());
        assert_eq!(project.name, "TE OSAT");
        assert_eq!(project.tasks.len(), 5);
        assert_eq!(count_tasks(&project.tasks), 5 + 17 + 3);

        let wafer = &project.tasks[1];
        assert_eq!(wafer.name, "Wafer Bumping & Probe");
        let procurement = &wafer.sub_tasks[0];
        assert_eq!(procurement.name, PROCUREMENT_TASK);
        assert_eq!(procurement.sub_tasks.len(), 3);
        assert_eq!(procurement.sub_tasks[0].level, 2);
        assert_eq!(procurement.sub_tasks[0].parent_id.as_deref(), Some(procurement.id.as_str()));
    }

    #[test]
    fn dates_are_relative_and_lists_sorted() {
        let project = sample_project(today());
        assert_eq!(project.tasks[0].start_date, Some(today()));
        assert_eq!(
            project.tasks[4].due_date,
            NaiveDate::from_ymd_opt(2024, 7, 16)
        );

        let mut all_sorted = is_chronological(&project.tasks);
        for_each_task(&project.tasks, &mut |t: &Task| {
            all_sorted &= is_chronological(&t.sub_tasks);
        });
        assert!(all_sorted);
    }
}
