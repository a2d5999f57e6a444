//! Single controller instance per app id, guarded by a Unix socket.
//!
//! The OS drops the socket when the process dies, so a crashed controller
//! never leaves a lock behind that blocks the next start.

use std::io;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InstanceLockError {
    #[error("another controller is already running as {0}")]
    AlreadyRunning(String),

    #[error("failed to acquire instance lock: {0}")]
    Io(#[from] io::Error),
}

/// Held for as long as the controller runs; the socket file is removed on drop.
pub struct InstanceLock {
    _listener: UnixListener,
    path: PathBuf,
}

impl InstanceLock {
    /// Acquire the lock for `app_id` in the user's runtime directory.
    pub fn acquire(app_id: &str) -> Result<Self, InstanceLockError> {
        Self::acquire_in(&runtime_dir(), app_id)
    }

    /// Acquire the lock for `app_id` inside `dir`.
    pub fn acquire_in(dir: &Path, app_id: &str) -> Result<Self, InstanceLockError> {
        let path = socket_path(dir, app_id);

        if path.exists() {
            // A live listener answers; a stale socket from a SIGKILL'd run does not.
            if UnixStream::connect(&path).is_ok() {
                return Err(InstanceLockError::AlreadyRunning(app_id.to_string()));
            }
            let _ = std::fs::remove_file(&path);
        }

        match UnixListener::bind(&path) {
            Ok(listener) => Ok(Self {
                _listener: listener,
                path,
            }),
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                Err(InstanceLockError::AlreadyRunning(app_id.to_string()))
            }
            Err(e) => Err(InstanceLockError::Io(e)),
        }
    }

    #[cfg(test)]
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn runtime_dir() -> PathBuf {
    std::env::var("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

/// Socket file used to guard `app_id`.
pub fn socket_path(dir: &Path, app_id: &str) -> PathBuf {
    dir.join(format!("home-alarm-{app_id}.sock"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_path_includes_app_id() {
        let path = socket_path(Path::new("/run/user/1000"), "basic_alarm");
        assert_eq!(
            path,
            PathBuf::from("/run/user/1000/home-alarm-basic_alarm.sock")
        );
    }

    #[test]
    fn test_second_instance_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let first = InstanceLock::acquire_in(dir.path(), "alarm").unwrap();

        let second = InstanceLock::acquire_in(dir.path(), "alarm");
        assert!(matches!(second, Err(InstanceLockError::AlreadyRunning(_))));

        // Different app ids do not contend.
        let other = InstanceLock::acquire_in(dir.path(), "other_alarm");
        assert!(other.is_ok());

        drop(first);
        assert!(InstanceLock::acquire_in(dir.path(), "alarm").is_ok());
    }

    #[test]
    fn test_drop_removes_socket_file() {
        let dir = tempfile::tempdir().unwrap();
        let lock = InstanceLock::acquire_in(dir.path(), "alarm").unwrap();
        let path = lock.path().to_path_buf();
        assert!(path.exists());
        drop(lock);
        assert!(!path.exists());
    }
}
