use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, Utc};
use regex::Regex;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::config_io;
use crate::io::gateway::{Gateway, open_gateway};
use crate::io::recovery::{prune_recovery, read_recovery_entries, recovery_log_path};
use crate::model::config::{AppConfig, StorageBackend};
use crate::model::project::Project;
use crate::model::task::{Task, TaskStatus};
use crate::ops::attach::decode_data_url;
use crate::ops::export::{backup_file_name, to_json};
use crate::ops::search::search_tasks;
use crate::ops::task_ops::{collect_ids, find_task};
use crate::workspace::{TaskDraft, Workspace};

type CmdResult = Result<(), Box<dyn std::error::Error>>;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    let json = cli.json;
    let config = load_config(&cli)?;

    match cli.command {
        // No workspace needed
        Commands::Storage(args) => cmd_storage(args, &config),
        Commands::Recovery(args) => cmd_recovery(args, &config, json),

        cmd => {
            let mut ws = open_workspace(&config)?;
            run(&mut ws, cmd, json)?;
            ws.flush()?;
            Ok(())
        }
    }
}

fn run(ws: &mut Workspace, cmd: Commands, json: bool) -> CmdResult {
    match cmd {
        // Read commands
        Commands::Projects => cmd_projects(ws, json),
        Commands::Show(args) => cmd_show(ws, args, json),
        Commands::Search(args) => cmd_search(ws, args, json),
        Commands::Fetch(args) => cmd_fetch(ws, args),

        // Write commands
        Commands::Project(args) => cmd_project(ws, args, json),
        Commands::Add(args) => cmd_add(ws, args, json),
        Commands::Edit(args) => cmd_edit(ws, args),
        Commands::Status(args) => cmd_status(ws, args),
        Commands::Rm(args) => cmd_rm(ws, args),
        Commands::Attach(args) => cmd_attach(ws, args, json),
        Commands::Detach(args) => cmd_detach(ws, args),
        Commands::Sample => cmd_sample(ws, json),

        // Backup
        Commands::Export(args) => cmd_export(ws, args),
        Commands::Import(args) => cmd_import(ws, args),

        // Session
        Commands::Login(args) => {
            ws.login(&args.username, &args.password)?;
            println!("logged in as {}", args.username);
            Ok(())
        }
        Commands::Logout => {
            ws.logout()?;
            println!("logged out");
            Ok(())
        }
        Commands::Reset(args) => {
            ws.reset(&args.username, &args.password, &args.confirm)?;
            println!("all projects deleted; logged in as {}", args.username.trim());
            Ok(())
        }

        Commands::Storage(_) | Commands::Recovery(_) => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Config file plus the one-run overrides from global flags
fn load_config(cli: &Cli) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let mut config = config_io::read_config()?;
    if let Some(dir) = &cli.data_dir {
        config.storage.data_dir = Some(PathBuf::from(dir));
    }
    if let Some(name) = &cli.backend {
        config.storage.backend = Some(parse_backend_arg(name)?);
    }
    Ok(config)
}

fn open_workspace(config: &AppConfig) -> Result<Workspace, Box<dyn std::error::Error>> {
    let gateway: Arc<dyn Gateway> = Arc::from(open_gateway(config)?);
    Ok(Workspace::open(gateway, config)?)
}

fn parse_backend_arg(s: &str) -> Result<StorageBackend, String> {
    StorageBackend::parse_backend(s)
        .ok_or_else(|| format!("unknown backend '{}' (expected local or portable)", s))
}

fn parse_status_arg(s: &str) -> Result<TaskStatus, String> {
    TaskStatus::parse_status(s)
        .ok_or_else(|| format!("unknown status '{}' (expected todo, in-progress or done)", s))
}

/// `YYYY-MM-DD`; an empty value clears the date
fn parse_date_arg(s: &str) -> Result<Option<NaiveDate>, String> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| format!("invalid date '{}' (expected YYYY-MM-DD)", s))
}

/// Pick the one id equal to `prefix`, or the only id starting with it.
fn resolve_unique<'a>(
    kind: &str,
    prefix: &str,
    ids: impl IntoIterator<Item = &'a str>,
) -> Result<String, String> {
    let mut matches = Vec::new();
    for id in ids {
        if id == prefix {
            return Ok(id.to_string());
        }
        if id.starts_with(prefix) {
            matches.push(id);
        }
    }
    match matches.as_slice() {
        [] => Err(format!("{} not found: {}", kind, prefix)),
        [only] => Ok(only.to_string()),
        many => Err(format!(
            "ambiguous {} id '{}' matches: {}",
            kind,
            prefix,
            many.iter().map(|id| short_id(id)).collect::<Vec<_>>().join(", ")
        )),
    }
}

fn resolve_project(ws: &Workspace, prefix: &str) -> Result<String, String> {
    resolve_unique("project", prefix, ws.projects().iter().map(|p| p.id.as_str()))
}

/// Task ids are unique across projects; returns `(project_id, task_id)`.
fn resolve_task(ws: &Workspace, prefix: &str) -> Result<(String, String), String> {
    let owners: Vec<(&str, String)> = ws
        .projects()
        .iter()
        .flat_map(|p| collect_ids(&p.tasks).into_iter().map(move |id| (p.id.as_str(), id)))
        .collect();
    let task_id = resolve_unique("task", prefix, owners.iter().map(|(_, id)| id.as_str()))?;
    let project_id = owners
        .iter()
        .find(|(_, id)| *id == task_id)
        .map(|(p, _)| p.to_string())
        .unwrap_or_default();
    Ok((project_id, task_id))
}

fn lookup_task<'a>(ws: &'a Workspace, project_id: &str, task_id: &str) -> Option<&'a Task> {
    ws.project(project_id).and_then(|p| find_task(&p.tasks, task_id))
}

fn resolve_file(task: &Task, prefix: &str) -> Result<String, String> {
    resolve_unique("file", prefix, task.files.iter().map(|f| f.id.as_str()))
}

fn report_change(changed: bool, what: &str) {
    if changed {
        println!("{}", what);
    } else {
        println!("nothing changed");
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Write to `path`, or stdout for `-`
fn write_output(path: &str, bytes: &[u8]) -> CmdResult {
    if path == "-" {
        let mut out = std::io::stdout().lock();
        out.write_all(bytes)?;
        out.flush()?;
    } else {
        std::fs::write(path, bytes).map_err(|e| format!("could not write {}: {}", path, e))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn cmd_projects(ws: &Workspace, json: bool) -> CmdResult {
    if json {
        let summaries: Vec<_> = ws.projects().iter().map(project_summary_json).collect();
        return print_json(&summaries);
    }
    if ws.projects().is_empty() {
        println!("no projects");
    }
    for line in format_project_listing(ws.projects()) {
        println!("{}", line);
    }
    Ok(())
}

fn cmd_show(ws: &Workspace, args: ShowArgs, json: bool) -> CmdResult {
    if let Ok(project_id) = resolve_project(ws, &args.id)
        && let Some(project) = ws.project(&project_id)
    {
        return show_project(project, json);
    }
    let (project_id, task_id) = resolve_task(ws, &args.id)?;
    let task = lookup_task(ws, &project_id, &task_id).ok_or_else(|| format!("task not found: {}", args.id))?;
    if json {
        return print_json(task);
    }
    for line in format_task_detail(task) {
        println!("{}", line);
    }
    Ok(())
}

fn show_project(project: &Project, json: bool) -> CmdResult {
    if json {
        return print_json(project);
    }
    for line in format_project_detail(project) {
        println!("{}", line);
    }
    Ok(())
}

fn cmd_search(ws: &Workspace, args: SearchArgs, json: bool) -> CmdResult {
    let re = Regex::new(&args.pattern)?;
    let filter = match &args.project {
        Some(prefix) => Some(resolve_project(ws, prefix)?),
        None => None,
    };
    let hits = search_tasks(ws.projects(), &re, filter.as_deref());

    if json {
        let out: Vec<_> = hits.iter().map(search_hit_json).collect();
        return print_json(&out);
    }
    for hit in &hits {
        let name = ws.project(&hit.project_id).map(|p| p.name.as_str()).unwrap_or("?");
        println!("{}", format_search_hit(hit, name));
    }
    Ok(())
}

fn cmd_fetch(ws: &Workspace, args: FetchArgs) -> CmdResult {
    let (project_id, task_id) = resolve_task(ws, &args.id)?;
    let task = lookup_task(ws, &project_id, &task_id).ok_or_else(|| format!("task not found: {}", args.id))?;
    let file_id = resolve_file(task, &args.file)?;
    let Some(file) = task.files.iter().find(|f| f.id == file_id) else {
        return Err(format!("file not found: {}", args.file).into());
    };
    let (_, bytes) = decode_data_url(&file.data_url)?;
    let target = args.output.unwrap_or_else(|| file.name.clone());
    write_output(&target, &bytes)?;
    if target != "-" {
        println!("wrote {} ({})", target, format_file_size(bytes.len() as u64));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

fn cmd_project(ws: &mut Workspace, args: ProjectCmd, json: bool) -> CmdResult {
    match args.action {
        ProjectAction::Add(a) => {
            let id = ws.add_project(&a.name, &a.desc)?;
            if json {
                return print_json(&serde_json::json!({ "id": id }));
            }
            println!("{}", id);
        }
        ProjectAction::Edit(a) => {
            let id = resolve_project(ws, &a.id)?;
            let Some(current) = ws.project(&id) else {
                return Err(format!("project not found: {}", a.id).into());
            };
            let name = a.name.unwrap_or_else(|| current.name.clone());
            let desc = a.desc.unwrap_or_else(|| current.description.clone());
            ws.edit_project(&id, &name, &desc)?;
            println!("project {} updated", short_id(&id));
        }
        ProjectAction::Rm(a) => {
            let id = resolve_project(ws, &a.id)?;
            let removed = ws.delete_project(&id)?;
            println!("deleted project \"{}\"", removed.name);
        }
    }
    Ok(())
}

/// Overlay the given flags on `draft`
fn apply_fields(draft: &mut TaskDraft, fields: &TaskFieldArgs) -> Result<(), String> {
    if let Some(desc) = &fields.desc {
        draft.description = Some(desc.clone());
    }
    if let Some(status) = &fields.status {
        draft.status = parse_status_arg(status)?;
    }
    if let Some(start) = &fields.start {
        draft.start_date = parse_date_arg(start)?;
    }
    if let Some(due) = &fields.due {
        draft.due_date = parse_date_arg(due)?;
    }
    if let Some(dept) = &fields.dept {
        draft.department = Some(dept.clone());
    }
    if let Some(who) = &fields.assignee {
        draft.assigned_to = Some(who.clone());
    }
    Ok(())
}

fn cmd_add(ws: &mut Workspace, args: AddArgs, json: bool) -> CmdResult {
    let project_id = resolve_project(ws, &args.project)?;
    let parent_id = match &args.parent {
        Some(prefix) => {
            let (owner, task_id) = resolve_task(ws, prefix)?;
            if owner != project_id {
                return Err(format!("task {} is not in project {}", prefix, short_id(&project_id)).into());
            }
            Some(task_id)
        }
        None => None,
    };

    let mut draft = TaskDraft::named(&args.name);
    apply_fields(&mut draft, &args.fields)?;
    let Some(id) = ws.add_task(&project_id, &draft, parent_id.as_deref())? else {
        return Err("parent task not found".into());
    };
    if json {
        return print_json(&serde_json::json!({ "id": id, "projectId": project_id }));
    }
    println!("{}", id);
    Ok(())
}

fn cmd_edit(ws: &mut Workspace, args: EditArgs) -> CmdResult {
    let (project_id, task_id) = resolve_task(ws, &args.id)?;
    let Some(task) = lookup_task(ws, &project_id, &task_id) else {
        return Err(format!("task not found: {}", args.id).into());
    };
    let mut draft = TaskDraft::from_task(task);
    if let Some(name) = &args.name {
        draft.name = name.clone();
    }
    apply_fields(&mut draft, &args.fields)?;
    let changed = ws.edit_task(&project_id, &task_id, &draft)?;
    report_change(changed, &format!("task {} updated", short_id(&task_id)));
    Ok(())
}

fn cmd_status(ws: &mut Workspace, args: StatusArgs) -> CmdResult {
    let status = parse_status_arg(&args.status)?;
    let (project_id, task_id) = resolve_task(ws, &args.id)?;
    let changed = ws.set_task_status(&project_id, &task_id, status)?;
    report_change(changed, &format!("{} -> {}", short_id(&task_id), status));
    Ok(())
}

fn cmd_rm(ws: &mut Workspace, args: RmArgs) -> CmdResult {
    let (project_id, task_id) = resolve_task(ws, &args.id)?;
    let changed = ws.delete_task(&project_id, &task_id)?;
    report_change(changed, &format!("deleted task {}", short_id(&task_id)));
    Ok(())
}

fn cmd_attach(ws: &mut Workspace, args: AttachArgs, json: bool) -> CmdResult {
    let (project_id, task_id) = resolve_task(ws, &args.id)?;
    let path = Path::new(&args.path);
    let bytes = std::fs::read(path).map_err(|e| format!("could not read {}: {}", args.path, e))?;
    let name = match &args.name {
        Some(name) => name.clone(),
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| args.path.clone()),
    };

    let Some(file) = ws.attach_file(&project_id, &task_id, &name, &bytes)? else {
        return Err(format!("task not found: {}", args.id).into());
    };
    if json {
        return print_json(&file_summary_json(&file));
    }
    println!("{}", format_file_line(&file));
    Ok(())
}

fn cmd_detach(ws: &mut Workspace, args: DetachArgs) -> CmdResult {
    let (project_id, task_id) = resolve_task(ws, &args.id)?;
    let Some(task) = lookup_task(ws, &project_id, &task_id) else {
        return Err(format!("task not found: {}", args.id).into());
    };
    let file_id = resolve_file(task, &args.file)?;
    let changed = ws.detach_file(&project_id, &task_id, &file_id)?;
    report_change(changed, &format!("removed file {}", short_id(&file_id)));
    Ok(())
}

fn cmd_sample(ws: &mut Workspace, json: bool) -> CmdResult {
    let id = ws.add_sample_project()?;
    if json {
        return print_json(&serde_json::json!({ "id": id }));
    }
    println!("{}", id);
    Ok(())
}

// ---------------------------------------------------------------------------
// Backup
// ---------------------------------------------------------------------------

fn cmd_export(ws: &Workspace, args: ExportArgs) -> CmdResult {
    let doc = ws.export_document()?;
    let text = to_json(&doc)?;
    let target = args
        .output
        .unwrap_or_else(|| backup_file_name(Local::now().naive_local()));
    write_output(&target, text.as_bytes())?;
    if target != "-" {
        eprintln!("exported {} projects to {}", doc.projects.len(), target);
    }
    Ok(())
}

fn cmd_import(ws: &mut Workspace, args: ImportArgs) -> CmdResult {
    let text = std::fs::read_to_string(&args.file)
        .map_err(|e| format!("could not read {}: {}", args.file, e))?;
    let count = ws.import_document(&text)?;
    println!("imported {} projects", count);
    Ok(())
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

fn cmd_storage(args: StorageCmd, config: &AppConfig) -> CmdResult {
    match args.action {
        None => {
            let gateway = open_gateway(config)?;
            println!("backend: {}", gateway.mode().as_str());
            println!("location: {}", gateway.location().display());
            println!("config: {}", config_io::config_path().display());
        }
        Some(StorageAction::Use(a)) => {
            let backend = parse_backend_arg(&a.backend)?;
            let path = config_io::config_path();
            let mut doc = config_io::read_config_doc(&path)?;
            config_io::set_backend(&mut doc, backend);
            config_io::write_config_doc(&path, &doc)?;
            println!("storage backend set to {}", backend.as_str());
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Recovery log
// ---------------------------------------------------------------------------

fn cmd_recovery(args: RecoveryCmd, config: &AppConfig, json: bool) -> CmdResult {
    let gateway = open_gateway(config)?;
    let dir = gateway.location();

    match args.action {
        Some(RecoveryAction::Path) => {
            println!("{}", recovery_log_path(dir).display());
        }
        Some(RecoveryAction::Prune(a)) => {
            let before = match &a.before {
                Some(ts) => Some(
                    DateTime::parse_from_rfc3339(ts)
                        .map_err(|_| format!("invalid timestamp '{}' (expected RFC 3339)", ts))?
                        .with_timezone(&Utc),
                ),
                None => None,
            };
            let removed = prune_recovery(dir, before, a.all)?;
            println!("removed {} entries", removed);
        }
        None => {
            let entries = read_recovery_entries(dir, Some(args.limit.unwrap_or(10)));
            if json {
                let out: Vec<_> = entries.iter().map(|e| e.to_json()).collect();
                return print_json(&out);
            }
            if entries.is_empty() {
                println!("recovery log is empty");
            }
            for entry in &entries {
                println!(
                    "{} [{}] {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    entry.category,
                    entry.description
                );
                for (key, value) in &entry.fields {
                    println!("  {}: {}", key, value);
                }
            }
        }
    }
    Ok(())
}
