pub mod task;
pub mod project;
pub mod settings;
pub mod config;
pub mod document;

pub use task::*;
pub use project::*;
pub use settings::*;
pub use config::*;
pub use document::*;
