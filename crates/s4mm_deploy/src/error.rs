//! Error types for load ordering and deployment.
//!
//! Deployment returns [`Result<T>`], which uses [`DeployError`]. Load-order
//! operations that can run outside a deployment use [`LoadOrderError`], and
//! backup providers report [`BackupError`](crate::BackupError). Both convert
//! into [`DeployError`] via `From`.

use crate::backup::{BackupError, BackupId};
use camino::{Utf8Path, Utf8PathBuf};
use s4mm_dbpf::ResourceId;
use std::io;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DeployError>;

/// Errors raised while deploying a mod set.
///
/// Every variant except [`RollbackFailed`](Self::RollbackFailed) leaves the
/// output root either untouched or restored to its pre-deploy state, so the
/// same call can be retried once the cause is fixed.
#[derive(Error, Debug)]
pub enum DeployError {
    /// Conflicts remain after applying the chosen policy.
    #[error("Unresolved conflicts on {} resource(s) between: {}", .resources.len(), .mods.join(", "))]
    ConflictUnresolved {
        resources: Vec<ResourceId>,
        mods: Vec<String>,
    },

    /// A destination path exceeds the host's path length limit.
    #[error("Path exceeds {limit} characters ({length}): {path}")]
    PathTooLong {
        path: Utf8PathBuf,
        length: usize,
        limit: usize,
    },

    /// A mod would land somewhere the host will not load it from.
    #[error("Invalid placement for '{path}': {reason}")]
    InvalidPlacement { path: Utf8PathBuf, reason: String },

    /// The game is running and holds its mod files open.
    #[error("The game is running; close it before deploying")]
    HostRunning,

    #[error("Permission denied: {path}")]
    PermissionDenied { path: Utf8PathBuf },

    #[error("Disk full while writing {path}")]
    DiskFull { path: Utf8PathBuf },

    /// A copied file does not hash to the value recorded for its source.
    #[error("Hash mismatch for {path}: expected {expected:016x}, found {actual:016x}")]
    HashMismatch {
        path: Utf8PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("Backup error: {0}")]
    Backup(#[from] BackupError),

    /// Restoring the pre-deploy snapshot failed. The output root may be
    /// partially deployed; restore `backup_id` by hand.
    #[error("Rollback failed after '{cause}'; restore backup {backup_id} manually: {source}")]
    RollbackFailed {
        backup_id: BackupId,
        cause: String,
        #[source]
        source: Box<DeployError>,
    },

    /// Another deployment holds the lock on this output root.
    #[error("A deployment to {output_root} is already in progress")]
    DeployInProgress { output_root: Utf8PathBuf },

    #[error("IO error at {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DeployError {
    /// Map an IO failure at `path` onto the matching variant.
    ///
    /// Permission and storage exhaustion errors get their own variants so
    /// callers can tell the user what to fix.
    pub fn io(path: impl AsRef<Utf8Path>, source: io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        match source.kind() {
            io::ErrorKind::PermissionDenied => DeployError::PermissionDenied { path },
            io::ErrorKind::StorageFull => DeployError::DiskFull { path },
            _ => DeployError::Io { path, source },
        }
    }

    /// Whether the output root is guaranteed consistent after this error.
    pub fn is_retriable(&self) -> bool {
        !matches!(self, DeployError::RollbackFailed { .. })
    }
}

/// Errors from slot assignment and structure generation.
#[derive(Error, Debug)]
pub enum LoadOrderError {
    #[error("Path exceeds {limit} characters ({length}): {path}")]
    PathTooLong {
        path: Utf8PathBuf,
        length: usize,
        limit: usize,
    },

    #[error("Invalid placement for '{path}': {reason}")]
    InvalidPlacement { path: Utf8PathBuf, reason: String },

    /// A slot name or number outside the allowed range.
    #[error("Invalid slot: {0}")]
    InvalidSlot(String),

    #[error("Mod not found: {0}")]
    NotFound(Utf8PathBuf),

    #[error("IO error at {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
}

impl LoadOrderError {
    pub(crate) fn io(path: impl AsRef<Utf8Path>, source: io::Error) -> Self {
        LoadOrderError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<LoadOrderError> for DeployError {
    fn from(err: LoadOrderError) -> Self {
        match err {
            LoadOrderError::PathTooLong {
                path,
                length,
                limit,
            } => DeployError::PathTooLong {
                path,
                length,
                limit,
            },
            LoadOrderError::InvalidPlacement { path, reason } => {
                DeployError::InvalidPlacement { path, reason }
            }
            LoadOrderError::InvalidSlot(slot) => DeployError::InvalidPlacement {
                path: Utf8PathBuf::from(slot.clone()),
                reason: format!("invalid slot '{slot}'"),
            },
            LoadOrderError::NotFound(path) => DeployError::Io {
                path,
                source: io::Error::from(io::ErrorKind::NotFound),
            },
            LoadOrderError::Io { path, source } => DeployError::io(path, source),
        }
    }
}

/// Invalid deployment configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Range '{name}' is empty: {start:#010X} > {end:#010X}")]
    EmptyRange { name: String, start: u32, end: u32 },

    #[error("Severity ranges '{first}' and '{second}' overlap")]
    OverlappingRanges { first: String, second: String },

    #[error("Directive priority {0} is below the minimum of {min}", min = crate::directive::MIN_DIRECTIVE_PRIORITY)]
    PriorityTooLow(u32),

    #[error("Terminal category must be ASCII letters, digits or underscores, got '{0}'")]
    InvalidTerminalCategory(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_are_classified_by_kind() {
        let err = DeployError::io(
            "/mods/a.package",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(err, DeployError::PermissionDenied { .. }));

        let err = DeployError::io("/mods/a.package", io::Error::from(io::ErrorKind::StorageFull));
        assert!(matches!(err, DeployError::DiskFull { .. }));

        let err = DeployError::io("/mods/a.package", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, DeployError::Io { .. }));
    }

    #[test]
    fn only_rollback_failure_is_not_retriable() {
        assert!(DeployError::HostRunning.is_retriable());
        let err = DeployError::RollbackFailed {
            backup_id: BackupId::new("backup_x"),
            cause: "copy failed".into(),
            source: Box::new(DeployError::HostRunning),
        };
        assert!(!err.is_retriable());
    }
}
