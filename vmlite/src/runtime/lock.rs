//! Per-VM lock held by the controller process for as long as the VM runs.
//!
//! Uses POSIX record locks (`fcntl`) rather than `flock` so that other
//! processes can ask the kernel which PID holds the lock. That PID is how
//! `vmlite stop` and `vmlite ls` find a running VM without a pid file.

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use vmlite_shared::errors::{VmliteError, VmliteResult};

/// Guard holding an exclusive write lock on a VM's config file.
///
/// Released when dropped, or by the kernel when the process exits.
#[derive(Debug)]
pub struct VmLock {
    file: File,
    path: PathBuf,
}

fn whole_file_lock(lock_type: libc::c_short) -> libc::flock {
    let mut lock: libc::flock = unsafe { std::mem::zeroed() };
    lock.l_type = lock_type;
    lock.l_whence = libc::SEEK_SET as libc::c_short;
    lock.l_start = 0;
    lock.l_len = 0;
    lock
}

fn open_lock_file(path: &Path) -> VmliteResult<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| {
            VmliteError::Storage(format!(
                "failed to open lock file {}: {}",
                path.display(),
                e
            ))
        })
}

impl VmLock {
    /// Take the lock without blocking.
    ///
    /// # Arguments
    /// * `path` - Existing file to lock, normally the VM's `config.json`
    ///
    /// # Returns
    /// A guard that holds the lock until dropped. Fails with `InvalidState`
    /// (naming the holder's PID when known) if another process holds it, or
    /// `Storage` if the file cannot be opened or locked.
    pub fn acquire(path: &Path) -> VmliteResult<Self> {
        let file = open_lock_file(path)?;
        let lock = whole_file_lock(libc::F_WRLCK as libc::c_short);

        let result = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_SETLK, &lock) };
        if result != 0 {
            let err = std::io::Error::last_os_error();
            return match err.raw_os_error() {
                Some(libc::EACCES) | Some(libc::EAGAIN) => {
                    let holder = Self::holder_pid(path).ok().flatten();
                    Err(VmliteError::InvalidState(match holder {
                        Some(pid) => format!("vm is already running, pid={}", pid),
                        None => "vm is already running".to_string(),
                    }))
                }
                _ => Err(VmliteError::Storage(format!(
                    "failed to lock {}: {}",
                    path.display(),
                    err
                ))),
            };
        }

        tracing::debug!(lock_path = %path.display(), "acquired vm lock");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// PID of the process holding the lock, if any.
    ///
    /// # Arguments
    /// * `path` - File to query
    ///
    /// # Returns
    /// `Some(pid)` of the holder, or `None` when the file is unlocked.
    /// Locks held by the calling process itself are not reported, since
    /// `F_GETLK` never conflicts with the caller's own locks.
    pub fn holder_pid(path: &Path) -> VmliteResult<Option<i32>> {
        let file = open_lock_file(path)?;
        let mut lock = whole_file_lock(libc::F_WRLCK as libc::c_short);

        let result = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_GETLK, &mut lock) };
        if result != 0 {
            return Err(VmliteError::Storage(format!(
                "failed to query lock on {}: {}",
                path.display(),
                std::io::Error::last_os_error()
            )));
        }

        if lock.l_type as libc::c_int == libc::F_UNLCK as libc::c_int {
            Ok(None)
        } else {
            Ok(Some(lock.l_pid))
        }
    }

    /// Path of the locked file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for VmLock {
    fn drop(&mut self) {
        let lock = whole_file_lock(libc::F_UNLCK as libc::c_short);
        unsafe {
            libc::fcntl(self.file.as_raw_fd(), libc::F_SETLK, &lock);
        }
        tracing::debug!(lock_path = %self.path.display(), "released vm lock");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_unlocked_file_has_no_holder() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(&path, "{}").unwrap();

        assert_eq!(VmLock::holder_pid(&path).unwrap(), None);
    }

    #[test]
    fn test_acquire_and_release() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(&path, "{}").unwrap();

        let lock = VmLock::acquire(&path).unwrap();
        assert_eq!(lock.path(), path.as_path());
        drop(lock);

        assert_eq!(VmLock::holder_pid(&path).unwrap(), None);
    }

    #[test]
    fn test_missing_file_is_storage_error() {
        let temp = TempDir::new().unwrap();
        let err = VmLock::acquire(&temp.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, VmliteError::Storage(_)));
    }
}
