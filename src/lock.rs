//! Single instance guard, one per flavor id.

use crate::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Exclusive `flock` on a per-flavor lock file, released on drop
#[derive(Debug)]
pub struct ProgramLock {
    file: File,
    path: PathBuf,
}

impl ProgramLock {
    /// Take the lock in the system temp directory
    pub fn acquire(flavor: &str) -> Result<Self> {
        Self::acquire_in(&std::env::temp_dir(), flavor)
    }

    pub fn acquire_in(dir: &Path, flavor: &str) -> Result<Self> {
        let path = dir.join(lock_file_name(flavor));
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;

        // SAFETY: the descriptor belongs to `file`, which outlives the call.
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            return match err.kind() {
                ErrorKind::WouldBlock => Err(Error::LockHeld {
                    flavor: flavor.to_string(),
                }),
                _ => Err(err.into()),
            };
        }

        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        debug!("Acquired program lock {}", path.display());
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ProgramLock {
    fn drop(&mut self) {
        // SAFETY: the descriptor is still open; closing it would also release the lock.
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
    }
}

fn lock_file_name(flavor: &str) -> String {
    let flavor: String = flavor
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("mongo_db_dump{}.lock", flavor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_lock_is_refused() -> Result<()> {
        let temp_dir = TempDir::new()?;

        let first = ProgramLock::acquire_in(temp_dir.path(), "nightly")?;
        let second = ProgramLock::acquire_in(temp_dir.path(), "nightly");
        assert!(matches!(second, Err(Error::LockHeld { .. })));

        // A different flavor is independent.
        let _other = ProgramLock::acquire_in(temp_dir.path(), "hourly")?;

        drop(first);
        let _again = ProgramLock::acquire_in(temp_dir.path(), "nightly")?;
        Ok(())
    }

    #[test]
    fn test_lock_file_name() {
        assert_eq!(lock_file_name(""), "mongo_db_dump.lock");
        assert_eq!(lock_file_name("a/b"), "mongo_db_dumpa_b.lock");
    }
}
