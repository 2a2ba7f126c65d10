//! Writer lock and atomic document replacement for the record store.
//!
//! Writers serialize on an advisory `fs2` lock over `store.lock`, polling
//! until a deadline. Readers never lock: documents are swapped in by rename,
//! so a reader sees either the previous document or the next one.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::{Error, Result};

/// Default lock timeout in milliseconds
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5000;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Exclusive hold on the store lock, released on drop.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
    path: PathBuf,
}

impl StoreLock {
    /// Wait up to `timeout_ms` for the lock, creating the lock file if needed.
    pub fn acquire(path: impl AsRef<Path>, timeout_ms: u64) -> Result<Self> {
        let path = path.as_ref();
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let file = open_lock_file(path)?;

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    tracing::trace!(path = %path.display(), "store lock acquired");
                    return Ok(Self {
                        file,
                        path: path.to_path_buf(),
                    });
                }
                Err(err) if !is_contended(&err) => return Err(err.into()),
                Err(_) if Instant::now() >= deadline => {
                    tracing::warn!(path = %path.display(), timeout_ms, "store lock timed out");
                    return Err(Error::LockFailed(path.to_path_buf()));
                }
                Err(_) => thread::sleep(POLL_INTERVAL),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    Ok(file)
}

fn is_contended(err: &io::Error) -> bool {
    // fs2 reports Windows sharing violations (32, 33) as `Other`.
    err.kind() == io::ErrorKind::WouldBlock
        || (cfg!(windows) && matches!(err.raw_os_error(), Some(32 | 33)))
}

/// Run `f` while holding the store lock at `lock_path`.
pub fn with_lock<T>(lock_path: impl AsRef<Path>, timeout_ms: u64, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let _guard = StoreLock::acquire(lock_path, timeout_ms)?;
    f()
}

/// Replace `path` with `bytes` via a sibling temp file and a rename.
///
/// Takes no lock of its own.
pub fn write_atomic(path: impl AsRef<Path>, bytes: &[u8]) -> Result<()> {
    let path = path.as_ref();
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }

    let mut staged = path.as_os_str().to_owned();
    staged.push(format!(".{}.tmp", std::process::id()));
    let staged = PathBuf::from(staged);

    let mut file = File::create(&staged)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);

    if let Err(err) = fs::rename(&staged, path) {
        let _ = fs::remove_file(&staged);
        return Err(err.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn second_writer_times_out_while_held() {
        let dir = TempDir::new().unwrap();
        let lock_path = dir.path().join(".tally").join("store.lock");

        let held = StoreLock::acquire(&lock_path, 1000).unwrap();
        assert_eq!(held.path(), lock_path.as_path());
        assert!(matches!(
            StoreLock::acquire(&lock_path, 40),
            Err(Error::LockFailed(path)) if path == lock_path
        ));

        drop(held);
        assert!(StoreLock::acquire(&lock_path, 40).is_ok());
    }

    #[test]
    fn write_atomic_leaves_no_staging_file() {
        let dir = TempDir::new().unwrap();
        let doc = dir.path().join("store").join("tasks.json");

        write_atomic(&doc, b"{\"records\":[]}").unwrap();
        write_atomic(&doc, b"{\"records\":[1]}").unwrap();

        assert_eq!(fs::read_to_string(&doc).unwrap(), "{\"records\":[1]}");
        let entries: Vec<_> = fs::read_dir(doc.parent().unwrap()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn with_lock_admits_one_writer_at_a_time() {
        let dir = TempDir::new().unwrap();
        let lock_path = dir.path().join("store.lock");
        let inside = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let writers: Vec<_> = (0..6)
            .map(|_| {
                let lock_path = lock_path.clone();
                let inside = Arc::clone(&inside);
                let peak = Arc::clone(&peak);
                thread::spawn(move || {
                    with_lock(&lock_path, 5000, || {
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(5));
                        inside.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    })
                })
            })
            .collect();

        for writer in writers {
            writer.join().unwrap().unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }
}
