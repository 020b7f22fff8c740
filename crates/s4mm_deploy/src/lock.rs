//! Exclusive per-root deployment lock.
//!
//! The lock file sits next to the output root rather than inside it, so
//! backups and restores never see it. If the root was never created while
//! the lock was held, the lock file and any parent folders made for it are
//! removed again on release.

use crate::error::{DeployError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use fs2::FileExt;
use std::fs::{File, OpenOptions};

/// Held for the duration of a deployment; released on drop.
#[derive(Debug)]
pub struct OutputRootLock {
    file: File,
    path: Utf8PathBuf,
    root: Utf8PathBuf,
    created_file: bool,
    /// Missing ancestors made for the lock file, innermost first.
    created_dirs: Vec<Utf8PathBuf>,
}

impl OutputRootLock {
    /// Take the lock for `root` without waiting.
    ///
    /// Fails with [`DeployError::DeployInProgress`] if another deployment,
    /// in this process or another, holds it.
    pub fn acquire(root: &Utf8Path) -> Result<Self> {
        let path = lock_path(root);
        let mut created_dirs = Vec::new();
        if let Some(parent) = path.parent() {
            created_dirs = parent
                .ancestors()
                .take_while(|p| !p.as_str().is_empty() && !p.exists())
                .map(Utf8Path::to_path_buf)
                .collect();
            std::fs::create_dir_all(parent).map_err(|e| DeployError::io(parent, e))?;
        }
        let created_file = !path.exists();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| DeployError::io(&path, e))?;

        let mut lock = Self {
            file,
            path,
            root: root.to_path_buf(),
            created_file,
            created_dirs,
        };
        if let Err(err) = lock.file.try_lock_exclusive() {
            // someone else owns the file now
            lock.created_file = false;
            lock.created_dirs.clear();
            if err.kind() == fs2::lock_contended_error().kind() {
                return Err(DeployError::DeployInProgress {
                    output_root: root.to_path_buf(),
                });
            }
            return Err(DeployError::io(&lock.path, err));
        }

        tracing::debug!("Locked {}", lock.path);
        Ok(lock)
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl Drop for OutputRootLock {
    fn drop(&mut self) {
        // Unlink while still holding the lock so no one else locks the old file.
        let remove = self.created_file && !self.root.exists();
        if remove {
            let _ = std::fs::remove_file(&self.path);
        }
        if let Err(err) = FileExt::unlock(&self.file) {
            tracing::warn!("Failed to release {}: {}", self.path, err);
        }
        if remove {
            for dir in &self.created_dirs {
                if std::fs::remove_dir(dir).is_err() {
                    break;
                }
            }
        }
    }
}

/// `<parent>/.<root name>.deploy.lock`
pub fn lock_path(root: &Utf8Path) -> Utf8PathBuf {
    let name = root.file_name().unwrap_or("root");
    let parent = root.parent().unwrap_or(root);
    parent.join(format!(".{name}.deploy.lock"))
}
