use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "zt", about = concat!("zentrack v", env!("CARGO_PKG_VERSION"), " - projects, nested tasks and attachments"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Use a different storage directory for this run
    #[arg(long = "data-dir", global = true)]
    pub data_dir: Option<String>,

    /// Storage backend for this run (local, portable)
    #[arg(long, global = true)]
    pub backend: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List projects, newest first
    Projects,
    /// Create, edit or delete a project
    Project(ProjectCmd),
    /// Show a project's task tree, or one task in detail
    Show(ShowArgs),
    /// Add a task to a project, optionally under a parent task
    Add(AddArgs),
    /// Edit a task's fields
    Edit(EditArgs),
    /// Change task status
    Status(StatusArgs),
    /// Delete a task and its subtasks
    Rm(RmArgs),
    /// Attach a file to a task
    Attach(AttachArgs),
    /// Remove an attached file
    Detach(DetachArgs),
    /// Write an attached file back to disk
    Fetch(FetchArgs),
    /// Search tasks by regex
    Search(SearchArgs),
    /// Export all projects to a JSON backup
    Export(ExportArgs),
    /// Replace all projects with a JSON backup
    Import(ImportArgs),
    /// Enter admin mode
    Login(LoginArgs),
    /// Leave admin mode
    Logout,
    /// Delete all projects and install a new admin account
    Reset(ResetArgs),
    /// Add the demonstration project
    Sample,
    /// Show or choose the storage backend
    Storage(StorageCmd),
    /// View or manage the recovery log
    Recovery(RecoveryCmd),
}

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ProjectCmd {
    #[command(subcommand)]
    pub action: ProjectAction,
}

#[derive(Subcommand)]
pub enum ProjectAction {
    /// Create a project
    Add(ProjectAddArgs),
    /// Rename a project or change its description
    Edit(ProjectEditArgs),
    /// Delete a project with all its tasks
    Rm(ProjectRmArgs),
}

#[derive(Args)]
pub struct ProjectAddArgs {
    /// Project name
    pub name: String,
    /// Project description
    #[arg(long, short = 'd', default_value = "")]
    pub desc: String,
}

#[derive(Args)]
pub struct ProjectEditArgs {
    /// Project ID (or unique prefix)
    pub id: String,
    /// New name
    #[arg(long)]
    pub name: Option<String>,
    /// New description
    #[arg(long, short = 'd')]
    pub desc: Option<String>,
}

#[derive(Args)]
pub struct ProjectRmArgs {
    /// Project ID (or unique prefix)
    pub id: String,
}

// ---------------------------------------------------------------------------
// Read command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ShowArgs {
    /// Project or task ID (or unique prefix)
    pub id: String,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Regex pattern to search for
    pub pattern: String,
    /// Limit search to one project
    #[arg(long)]
    pub project: Option<String>,
}

// ---------------------------------------------------------------------------
// Task command args
// ---------------------------------------------------------------------------

/// Task fields shared by `add` and `edit`. Dates are YYYY-MM-DD; an empty
/// value clears the field.
#[derive(Args)]
pub struct TaskFieldArgs {
    /// Task description
    #[arg(long, short = 'd')]
    pub desc: Option<String>,
    /// Status (todo, in-progress, done)
    #[arg(long)]
    pub status: Option<String>,
    /// Start date (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<String>,
    /// Due date (YYYY-MM-DD)
    #[arg(long)]
    pub due: Option<String>,
    /// Department
    #[arg(long)]
    pub dept: Option<String>,
    /// Person assigned
    #[arg(long)]
    pub assignee: Option<String>,
}

#[derive(Args)]
pub struct AddArgs {
    /// Project ID (or unique prefix)
    pub project: String,
    /// Task name
    pub name: String,
    /// Parent task ID (or unique prefix)
    #[arg(long)]
    pub parent: Option<String>,
    #[command(flatten)]
    pub fields: TaskFieldArgs,
}

#[derive(Args)]
pub struct EditArgs {
    /// Task ID (or unique prefix)
    pub id: String,
    /// New name
    #[arg(long)]
    pub name: Option<String>,
    #[command(flatten)]
    pub fields: TaskFieldArgs,
}

#[derive(Args)]
pub struct StatusArgs {
    /// Task ID (or unique prefix)
    pub id: String,
    /// New status (todo, in-progress, done)
    pub status: String,
}

#[derive(Args)]
pub struct RmArgs {
    /// Task ID (or unique prefix)
    pub id: String,
}

// ---------------------------------------------------------------------------
// Attachments
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct AttachArgs {
    /// Task ID (or unique prefix)
    pub id: String,
    /// File to attach
    pub path: String,
    /// Name to store instead of the file's own
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Args)]
pub struct DetachArgs {
    /// Task ID (or unique prefix)
    pub id: String,
    /// File ID (or unique prefix)
    pub file: String,
}

#[derive(Args)]
pub struct FetchArgs {
    /// Task ID (or unique prefix)
    pub id: String,
    /// File ID (or unique prefix)
    pub file: String,
    /// Output path, `-` for stdout (default: the file's name)
    #[arg(long, short = 'o')]
    pub output: Option<String>,
}

// ---------------------------------------------------------------------------
// Backup
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ExportArgs {
    /// Output path, `-` for stdout (default: zentrack_backup_<timestamp>.json)
    #[arg(long, short = 'o')]
    pub output: Option<String>,
}

#[derive(Args)]
pub struct ImportArgs {
    /// Backup file to import
    pub file: String,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct LoginArgs {
    pub username: String,
    pub password: String,
}

#[derive(Args)]
pub struct ResetArgs {
    /// Username for the new admin account
    pub username: String,
    /// Password (at least 6 characters)
    pub password: String,
    /// Password again
    pub confirm: String,
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct StorageCmd {
    #[command(subcommand)]
    pub action: Option<StorageAction>,
}

#[derive(Subcommand)]
pub enum StorageAction {
    /// Pin the backend in config.toml (local, portable)
    Use(StorageUseArgs),
}

#[derive(Args)]
pub struct StorageUseArgs {
    pub backend: String,
}

// ---------------------------------------------------------------------------
// Recovery log
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct RecoveryCmd {
    #[command(subcommand)]
    pub action: Option<RecoveryAction>,
    /// Maximum number of entries to show (default: 10)
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Subcommand)]
pub enum RecoveryAction {
    /// Remove old entries
    Prune(RecoveryPruneArgs),
    /// Print the absolute path to the recovery log
    Path,
}

#[derive(Args)]
pub struct RecoveryPruneArgs {
    /// Remove entries older than this timestamp (default: 30 days ago)
    #[arg(long)]
    pub before: Option<String>,
    /// Remove all entries
    #[arg(long)]
    pub all: bool,
}
