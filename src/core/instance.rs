//! Single-instance lock file
//!
//! The lock file is created exclusively and holds the owning PID. It is
//! removed on release or drop.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::config::{executable_dir, ConfigResult};
use super::error::ConfigError;

/// Lock file name, placed next to the executable
pub const LOCK_FILE_NAME: &str = "motionsaver.app.lock";

/// Held single-instance lock
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    released: bool,
}

impl InstanceLock {
    /// Acquire the lock next to the executable
    pub fn acquire_default() -> ConfigResult<Self> {
        Self::acquire(&executable_dir().join(LOCK_FILE_NAME))
    }

    /// Acquire the lock at `path`; fails if the file already exists
    pub fn acquire(path: &Path) -> ConfigResult<Self> {
        create_lock_file(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            released: false,
        })
    }

    /// Take a released lock back. A no-op while still held.
    pub fn reacquire(&mut self) -> ConfigResult<()> {
        if !self.released {
            return Ok(());
        }
        create_lock_file(&self.path)?;
        self.released = false;
        Ok(())
    }

    pub fn is_held(&self) -> bool {
        !self.released
    }

    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the lock file. Safe to call more than once.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::info!("Lock file released"),
            Err(e) => tracing::error!("Error removing lock file {:?}: {}", self.path, e),
        }
    }
}

fn create_lock_file(path: &Path) -> ConfigResult<()> {
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            tracing::warn!(
                "Lock file {:?} already exists. Another instance may be running.",
                path
            );
            return Err(ConfigError::AlreadyRunning(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    write!(file, "{}", std::process::id())?;

    tracing::info!("Lock acquired at {:?}", path);
    Ok(())
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        self.release();
    }
}
