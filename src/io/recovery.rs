//! Append-only recovery log kept next to the stored data.
//!
//! Snapshots that could not be written and anything removed by a delete or
//! replaced by an import are appended here as JSON, so no data disappears
//! without a trace.

use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use tempfile::NamedTempFile;

use super::lock::StoreGuard;

/// Size above which old entries are trimmed on append (1 MB).
const MAX_LOG_SIZE: u64 = 1_048_576;

/// Entries older than this many days are prunable.
pub const PRUNE_AGE_DAYS: i64 = 30;

const FILE_HEADER: &str = "\
<!-- zentrack recovery log
     Data that was deleted, replaced by an import, or could not be saved.
     View with: zt recovery
     Prune old entries: zt recovery --prune
     Safe to delete if stale. -->

---
";

/// Why an entry was recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryCategory {
    /// A store write failed; the body is the snapshot that was lost
    Write,
    /// A project or task was deleted; the body is what was removed
    Delete,
    /// An import replaced the project list; the body is the old list
    Import,
}

impl fmt::Display for RecoveryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecoveryCategory::Write => "write",
            RecoveryCategory::Delete => "delete",
            RecoveryCategory::Import => "import",
        })
    }
}

impl RecoveryCategory {
    pub fn parse_category(s: &str) -> Option<Self> {
        match s {
            "write" => Some(RecoveryCategory::Write),
            "delete" => Some(RecoveryCategory::Delete),
            "import" => Some(RecoveryCategory::Import),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryEntry {
    pub timestamp: DateTime<Utc>,
    pub category: RecoveryCategory,
    pub description: String,
    pub fields: Vec<(String, String)>,
    /// JSON payload
    pub body: String,
}

impl RecoveryEntry {
    pub fn new(category: RecoveryCategory, description: impl Into<String>) -> Self {
        RecoveryEntry {
            timestamp: Utc::now(),
            category,
            description: description.into(),
            fields: Vec::new(),
            body: String::new(),
        }
    }

    pub fn field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields.push((key.to_string(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    fn to_markdown(&self) -> String {
        let mut out = format!(
            "## {} [{}] {}\n\n",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.category,
            self.description,
        );
        for (key, value) in &self.fields {
            out.push_str(&format!("{}: {}\n", key, value));
        }
        if !self.body.is_empty() {
            out.push_str("\n```json\n");
            out.push_str(&self.body);
            if !self.body.ends_with('\n') {
                out.push('\n');
            }
            out.push_str("```\n");
        }
        out.push_str("\n---\n");
        out
    }

    /// JSON form for `zt recovery --json`
    pub fn to_json(&self) -> serde_json::Value {
        let fields: serde_json::Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        serde_json::json!({
            "timestamp": self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            "category": self.category.to_string(),
            "description": self.description,
            "fields": fields,
            "body": self.body,
        })
    }
}

pub fn recovery_log_path(dir: &Path) -> PathBuf {
    dir.join(".recovery.log")
}

/// Write `content` to `path` atomically using a temp file + rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Appending
// ---------------------------------------------------------------------------

/// Append an entry. Failure to log is reported but never propagated.
pub fn log_recovery(dir: &Path, entry: RecoveryEntry) {
    if let Err(e) = append_entry(dir, &entry) {
        tracing::warn!(dir = %dir.display(), error = %e, "could not write to recovery log");
    }
}

fn append_entry(dir: &Path, entry: &RecoveryEntry) -> io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let path = recovery_log_path(dir);

    if let Ok(meta) = std::fs::metadata(&path)
        && meta.len() > MAX_LOG_SIZE
    {
        let cutoff = Utc::now() - Duration::days(PRUNE_AGE_DAYS);
        let content = std::fs::read_to_string(&path)?;
        atomic_write(&path, retain_since(&content, cutoff).as_bytes())?;
    }

    let needs_header = std::fs::metadata(&path).map_or(true, |m| m.len() == 0);
    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    if needs_header {
        file.write_all(FILE_HEADER.as_bytes())?;
    }
    file.write_all(entry.to_markdown().as_bytes())?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Entries newest first, at most `limit` of them.
pub fn read_recovery_entries(dir: &Path, limit: Option<usize>) -> Vec<RecoveryEntry> {
    let Ok(content) = std::fs::read_to_string(recovery_log_path(dir)) else {
        return Vec::new();
    };
    let mut entries = parse_entries(&content);
    entries.reverse();
    if let Some(n) = limit {
        entries.truncate(n);
    }
    entries
}

fn parse_entries(content: &str) -> Vec<RecoveryEntry> {
    let mut entries = Vec::new();
    let mut current: Option<RecoveryEntry> = None;
    let mut in_body = false;

    for line in content.lines() {
        if in_body {
            if line == "```" {
                in_body = false;
            } else if let Some(entry) = current.as_mut() {
                entry.body.push_str(line);
                entry.body.push('\n');
            }
            continue;
        }
        if let Some(header) = line.strip_prefix("## ") {
            entries.extend(current.take());
            current = parse_header(header);
        } else if line.starts_with("```") {
            in_body = current.is_some();
        } else if line == "---" {
            entries.extend(current.take());
        } else if let Some(entry) = current.as_mut()
            && let Some((key, value)) = line.split_once(": ")
        {
            entry.fields.push((key.to_string(), value.to_string()));
        }
    }
    entries.extend(current);
    entries
}

/// `<timestamp> [<category>] <description>`
fn parse_header(header: &str) -> Option<RecoveryEntry> {
    let (timestamp, rest) = header.split_once(" [")?;
    let (category, description) = rest.split_once("] ")?;
    Some(RecoveryEntry {
        timestamp: DateTime::parse_from_rfc3339(timestamp)
            .ok()?
            .with_timezone(&Utc),
        category: RecoveryCategory::parse_category(category)?,
        description: description.to_string(),
        fields: Vec::new(),
        body: String::new(),
    })
}

// ---------------------------------------------------------------------------
// Pruning
// ---------------------------------------------------------------------------

/// Drop entries older than `before` (default: [`PRUNE_AGE_DAYS`] ago), or
/// everything when `all` is set. Returns the number removed.
pub fn prune_recovery(
    dir: &Path,
    before: Option<DateTime<Utc>>,
    all: bool,
) -> Result<usize, Box<dyn std::error::Error>> {
    let path = recovery_log_path(dir);
    if !path.exists() {
        return Ok(0);
    }
    let _guard = StoreGuard::acquire_default(dir)?;
    let content = std::fs::read_to_string(&path)?;
    let original = parse_entries(&content).len();

    let kept = if all {
        FILE_HEADER.to_string()
    } else {
        let cutoff = before.unwrap_or_else(|| Utc::now() - Duration::days(PRUNE_AGE_DAYS));
        retain_since(&content, cutoff)
    };
    let remaining = parse_entries(&kept).len();
    atomic_write(&path, kept.as_bytes())?;
    Ok(original - remaining)
}

/// Rebuild the log keeping only entries at or after `cutoff`.
fn retain_since(content: &str, cutoff: DateTime<Utc>) -> String {
    let mut out = FILE_HEADER.to_string();
    for entry in parse_entries(content) {
        if entry.timestamp >= cutoff {
            out.push_str(&entry.to_markdown());
        }
    }
    out
}
