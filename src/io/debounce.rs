//! Background writer that coalesces project-list saves.
//!
//! Every commit carries the full list. A new commit supersedes whatever is
//! still pending and restarts the quiet window; only the last snapshot of a
//! burst reaches the store.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::io::gateway::{Gateway, StoreError};
use crate::io::recovery::{RecoveryCategory, RecoveryEntry, log_recovery};
use crate::model::project::Project;

enum Command {
    Snapshot(Vec<Project>),
    Flush(mpsc::Sender<Result<(), StoreError>>),
}

pub struct DebouncedWriter {
    tx: Option<mpsc::Sender<Command>>,
    handle: Option<JoinHandle<()>>,
}

impl DebouncedWriter {
    /// Start the writer thread. Snapshots are written once `window` passes
    /// without a newer commit.
    pub fn spawn(gateway: Arc<dyn Gateway>, window: Duration) -> Self {
        let (tx, rx) = mpsc::channel();
        let handle = thread::spawn(move || run(gateway, window, rx));
        DebouncedWriter {
            tx: Some(tx),
            handle: Some(handle),
        }
    }

    /// Queue `projects` as the latest state to persist.
    pub fn commit(&self, projects: Vec<Project>) {
        if let Some(tx) = &self.tx
            && tx.send(Command::Snapshot(projects)).is_err()
        {
            tracing::error!("debounced writer has stopped; snapshot dropped");
        }
    }

    /// Write any pending snapshot now and report how that went.
    pub fn flush(&self) -> Result<(), StoreError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        let sent = self
            .tx
            .as_ref()
            .is_some_and(|tx| tx.send(Command::Flush(reply_tx)).is_ok());
        if !sent {
            return Err(StoreError::WriterStopped);
        }
        reply_rx.recv().unwrap_or(Err(StoreError::WriterStopped))
    }
}

impl Drop for DebouncedWriter {
    fn drop(&mut self) {
        // Closing the channel makes the thread write what it holds and exit
        self.tx.take();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::error!("debounced writer thread panicked");
        }
    }
}

fn run(gateway: Arc<dyn Gateway>, window: Duration, rx: mpsc::Receiver<Command>) {
    let mut pending: Option<Vec<Project>> = None;
    let mut deadline: Option<Instant> = None;

    loop {
        let received = match deadline {
            Some(at) => rx.recv_timeout(at.saturating_duration_since(Instant::now())),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok(Command::Snapshot(projects)) => {
                if pending.is_some() {
                    tracing::trace!("pending snapshot superseded");
                }
                pending = Some(projects);
                deadline = Some(Instant::now() + window);
            }
            Ok(Command::Flush(reply)) => {
                deadline = None;
                let _ = reply.send(write_pending(gateway.as_ref(), pending.take()));
            }
            Err(RecvTimeoutError::Timeout) => {
                deadline = None;
                let _ = write_pending(gateway.as_ref(), pending.take());
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = write_pending(gateway.as_ref(), pending.take());
                break;
            }
        }
    }
}

/// Save `snapshot` if there is one. A failed save is logged and the snapshot
/// goes to the recovery log.
fn write_pending(gateway: &dyn Gateway, snapshot: Option<Vec<Project>>) -> Result<(), StoreError> {
    let Some(projects) = snapshot else {
        return Ok(());
    };
    match gateway.save_projects(&projects) {
        Ok(()) => {
            tracing::debug!(count = projects.len(), "snapshot saved");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "saving projects failed");
            let body = serde_json::to_string_pretty(&projects).unwrap_or_default();
            log_recovery(
                gateway.location(),
                RecoveryEntry::new(RecoveryCategory::Write, "project list could not be saved")
                    .field("Error", e.to_string())
                    .body(body),
            );
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::recovery::read_recovery_entries;
    use crate::model::config::StorageBackend;
    use crate::model::settings::{Settings, SettingsPatch};
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct RecordingGateway {
        dir: PathBuf,
        saves: Mutex<Vec<Vec<String>>>,
        fail: bool,
    }

    impl RecordingGateway {
        fn new(dir: &Path, fail: bool) -> Arc<Self> {
            Arc::new(RecordingGateway {
                dir: dir.to_path_buf(),
                saves: Mutex::new(Vec::new()),
                fail,
            })
        }

        fn saved_names(&self) -> Vec<Vec<String>> {
            self.saves.lock().unwrap().clone()
        }
    }

    impl Gateway for RecordingGateway {
        fn mode(&self) -> StorageBackend {
            StorageBackend::Local
        }
        fn location(&self) -> &Path {
            &self.dir
        }
        fn load_projects(&self) -> Result<Vec<Project>, StoreError> {
            Ok(Vec::new())
        }
        fn save_projects(&self, projects: &[Project]) -> Result<(), StoreError> {
            if self.fail {
                return Err(StoreError::Io {
                    path: self.dir.clone(),
                    source: std::io::Error::other("disk full"),
                });
            }
            let names = projects.iter().map(|p| p.name.clone()).collect();
            self.saves.lock().unwrap().push(names);
            Ok(())
        }
        fn load_settings(&self) -> Result<Settings, StoreError> {
            Ok(Settings::default())
        }
        fn save_settings(&self, _patch: &SettingsPatch) -> Result<(), StoreError> {
            Ok(())
        }
        fn delete_custom_admin_user(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn named(names: &[&str]) -> Vec<Project> {
        names.iter().map(|n| Project::new(*n, "")).collect()
    }

    #[test]
    fn burst_coalesces_to_last_snapshot() {
        let tmp = TempDir::new().unwrap();
        let gw = RecordingGateway::new(tmp.path(), false);
        let writer = DebouncedWriter::spawn(gw.clone(), Duration::from_millis(50));

        writer.commit(named(&["a"]));
        writer.commit(named(&["a", "b"]));
        writer.commit(named(&["a", "b", "c"]));
        thread::sleep(Duration::from_millis(400));

        assert_eq!(gw.saved_names(), vec![vec!["a", "b", "c"]]);
        drop(writer);
        assert_eq!(gw.saved_names().len(), 1);
    }

    #[test]
    fn flush_writes_immediately_once() {
        let tmp = TempDir::new().unwrap();
        let gw = RecordingGateway::new(tmp.path(), false);
        let writer = DebouncedWriter::spawn(gw.clone(), Duration::from_secs(60));

        writer.commit(named(&["x"]));
        writer.flush().unwrap();
        assert_eq!(gw.saved_names(), vec![vec!["x"]]);

        writer.flush().unwrap();
        assert_eq!(gw.saved_names().len(), 1);
    }

    #[test]
    fn drop_flushes_pending() {
        let tmp = TempDir::new().unwrap();
        let gw = RecordingGateway::new(tmp.path(), false);
        let writer = DebouncedWriter::spawn(gw.clone(), Duration::from_secs(60));
        writer.commit(named(&["late"]));
        drop(writer);
        assert_eq!(gw.saved_names(), vec![vec!["late"]]);
    }

    #[test]
    fn failed_save_reported_and_recovered() {
        let tmp = TempDir::new().unwrap();
        let gw = RecordingGateway::new(tmp.path(), true);
        let writer = DebouncedWriter::spawn(gw.clone(), Duration::from_secs(60));
        writer.commit(named(&["lost"]));

        assert!(writer.flush().is_err());
        let entries = read_recovery_entries(tmp.path(), None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].category, RecoveryCategory::Write);
        assert!(entries[0].body.contains("\"lost\""));
    }
}
