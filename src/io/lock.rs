use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

const LOCK_FILE: &str = ".lock";

/// Lock files currently held by this process. `flock` alone does not
/// exclude threads on platforms without it, and a thread that already
/// holds a directory must time out instead of succeeding twice.
static HELD: Mutex<BTreeSet<PathBuf>> = Mutex::new(BTreeSet::new());

/// Exclusive hold on a storage directory for one read-modify-write cycle.
///
/// Take the guard before reading the file you are about to rewrite and keep
/// it until the write lands. Other threads and other `zt` processes wait on
/// the same directory. The lock file stays on disk; only the lock is
/// released on drop.
#[derive(Debug)]
pub struct StoreGuard {
    _file: File,
    path: PathBuf,
}

/// Error type for lock operations
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("could not create lock file at {path}: {source}")]
    CreateError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not acquire lock on {path}: another zt process may be writing")]
    Timeout { path: PathBuf },
}

impl StoreGuard {
    /// Lock `dir`, creating it if needed, waiting up to `timeout`.
    pub fn acquire(dir: &Path, timeout: Duration) -> Result<Self, LockError> {
        let lock_path = dir.join(LOCK_FILE);
        let create_err = |e| LockError::CreateError {
            path: lock_path.clone(),
            source: e,
        };
        std::fs::create_dir_all(dir).map_err(create_err)?;
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(create_err)?;

        let start = Instant::now();
        loop {
            if claim(&lock_path, &file) {
                tracing::trace!(path = %lock_path.display(), "store locked");
                return Ok(StoreGuard {
                    _file: file,
                    path: lock_path,
                });
            }
            if start.elapsed() >= timeout {
                tracing::warn!(path = %lock_path.display(), "store lock timed out");
                return Err(LockError::Timeout { path: lock_path });
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    /// Acquire with the default 5 second timeout
    pub fn acquire_default(dir: &Path) -> Result<Self, LockError> {
        Self::acquire(dir, Duration::from_secs(5))
    }

    /// The directory this guard holds.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("."))
    }
}

impl Drop for StoreGuard {
    fn drop(&mut self) {
        // flock goes with the file handle
        held().remove(&self.path);
    }
}

/// Run `f` with `dir` locked for its whole duration.
pub fn with_store_lock<T, E>(
    dir: &Path,
    f: impl FnOnce(&StoreGuard) -> Result<T, E>,
) -> Result<T, E>
where
    E: From<LockError>,
{
    let guard = StoreGuard::acquire_default(dir)?;
    f(&guard)
}

fn held() -> MutexGuard<'static, BTreeSet<PathBuf>> {
    HELD.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Register `path` for this process and take the file lock, or neither.
fn claim(path: &Path, file: &File) -> bool {
    let mut held = held();
    if held.contains(path) {
        return false;
    }
    if try_lock(file).is_err() {
        return false;
    }
    held.insert(path.to_path_buf());
    true
}

#[cfg(unix)]
fn try_lock(file: &File) -> Result<(), std::io::Error> {
    use std::os::unix::io::AsRawFd;
    let fd = file.as_raw_fd();
    let result = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
    if result == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn try_lock(_file: &File) -> Result<(), std::io::Error> {
    Ok(())
}
