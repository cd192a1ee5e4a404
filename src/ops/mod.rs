pub mod admin;
pub mod attach;
pub mod export;
pub mod import;
pub mod project_ops;
pub mod sample;
pub mod search;
pub mod sort;
pub mod task_ops;
