//! Snapshots of an output root taken before deployment.
//!
//! [`ZipBackupManager`] stores each snapshot as one zip archive. File content
//! goes under `files/`, and `manifest.json` records every file's xxh3 hash,
//! every directory, every symlink target and whether the root existed at all.
//! Symlinks live only in the manifest so restoring never follows them.
//!
//! Archives are written to a temporary name and renamed into place, so a
//! crash mid-backup never leaves a truncated archive behind.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use s4mm_core::{format_hash, hash_bytes};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};
use thiserror::Error;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const FILES_PREFIX: &str = "files/";
const ARCHIVE_EXTENSION: &str = "zip";
const MANIFEST_VERSION: u32 = 1;

/// Opaque identifier of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackupId(String);

impl BackupId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Backup not found: {0}")]
    NotFound(BackupId),

    #[error("Backup {id} is corrupt: {reason}")]
    Corrupt { id: BackupId, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Path is not valid UTF-8: {0}")]
    NonUtf8Path(String),
}

/// Takes and restores snapshots of an output root.
pub trait BackupManager: Send + Sync {
    /// Snapshot the tree under `path`. A missing `path` is a valid, empty snapshot.
    fn create(&self, path: &Utf8Path) -> Result<BackupId, BackupError>;

    /// Put the snapshotted tree back exactly as it was.
    fn restore(&self, id: &BackupId) -> Result<(), BackupError>;

    /// Check the snapshot is intact, with a human readable explanation.
    fn verify(&self, id: &BackupId) -> (bool, String);
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackupManifest {
    version: u32,
    source_root: Utf8PathBuf,
    root_existed: bool,
    created_at: chrono::DateTime<Utc>,
    #[serde(default)]
    dirs: Vec<Utf8PathBuf>,
    #[serde(default)]
    files: Vec<BackupFileEntry>,
    #[serde(default)]
    symlinks: Vec<BackupSymlinkEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackupFileEntry {
    path: Utf8PathBuf,
    size: u64,
    #[serde(with = "hex_hash")]
    hash: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackupSymlinkEntry {
    path: Utf8PathBuf,
    target: Utf8PathBuf,
}

/// Summary of one archive in the backup directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupInfo {
    pub id: BackupId,
    pub source_root: Utf8PathBuf,
    pub created_at: chrono::DateTime<Utc>,
    pub file_count: usize,
    pub total_size: u64,
}

/// [`BackupManager`] that writes zip archives into a backup directory.
#[derive(Debug, Clone)]
pub struct ZipBackupManager {
    backup_dir: Utf8PathBuf,
    retention: Option<usize>,
}

impl ZipBackupManager {
    pub fn new(backup_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            backup_dir: backup_dir.into(),
            retention: None,
        }
    }

    /// Keep at most `count` archives; older ones are deleted after each backup.
    pub fn with_retention(mut self, count: usize) -> Self {
        self.retention = Some(count.max(1));
        self
    }

    pub fn backup_dir(&self) -> &Utf8Path {
        &self.backup_dir
    }

    pub fn archive_path(&self, id: &BackupId) -> Utf8PathBuf {
        self.backup_dir
            .join(format!("{}.{ARCHIVE_EXTENSION}", id.as_str()))
    }

    /// Archive ids in the backup directory, oldest first.
    ///
    /// Ordered by the creation time in each manifest, then by id. Archives
    /// whose manifest cannot be read sort first.
    pub fn list(&self) -> Result<Vec<BackupId>, BackupError> {
        if !self.backup_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut ids: Vec<BackupId> = self
            .backup_dir
            .read_dir_utf8()?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let path = entry.path();
                (path.extension() == Some(ARCHIVE_EXTENSION))
                    .then(|| path.file_stem().map(BackupId::new))
                    .flatten()
            })
            .collect();
        ids.sort_by_cached_key(|id| (self.info(id).ok().map(|info| info.created_at), id.clone()));
        Ok(ids)
    }

    /// Read an archive's manifest without touching its content.
    pub fn info(&self, id: &BackupId) -> Result<BackupInfo, BackupError> {
        let mut archive = self.open(id)?;
        let manifest = read_manifest(&mut archive, id)?;
        Ok(BackupInfo {
            id: id.clone(),
            source_root: manifest.source_root,
            created_at: manifest.created_at,
            file_count: manifest.files.len(),
            total_size: manifest.files.iter().map(|f| f.size).sum(),
        })
    }

    pub fn delete(&self, id: &BackupId) -> Result<(), BackupError> {
        let path = self.archive_path(id);
        if !path.exists() {
            return Err(BackupError::NotFound(id.clone()));
        }
        std::fs::remove_file(&path)?;
        Ok(())
    }

    fn open(&self, id: &BackupId) -> Result<ZipArchive<File>, BackupError> {
        let path = self.archive_path(id);
        let file = File::open(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => BackupError::NotFound(id.clone()),
            _ => BackupError::Io(e),
        })?;
        Ok(ZipArchive::new(file)?)
    }

    fn next_id(&self) -> BackupId {
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        BackupId(format!(
            "backup_{}_{}",
            Utc::now().format("%Y-%m-%d_%H%M%S"),
            &uuid[..8]
        ))
    }

    fn write_archive(&self, root: &Utf8Path, target: &Utf8Path) -> Result<BackupManifest, BackupError> {
        let mut manifest = BackupManifest {
            version: MANIFEST_VERSION,
            source_root: root.to_path_buf(),
            root_existed: root.is_dir(),
            created_at: Utc::now(),
            dirs: Vec::new(),
            files: Vec::new(),
            symlinks: Vec::new(),
        };

        let mut zip = ZipWriter::new(File::create(target)?);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        if manifest.root_existed {
            for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
                let entry = entry.map_err(io::Error::from)?;
                let path = Utf8Path::from_path(entry.path())
                    .ok_or_else(|| BackupError::NonUtf8Path(entry.path().display().to_string()))?;
                let relative = relative_to(root, path)?;
                let file_type = entry.file_type();

                if file_type.is_symlink() {
                    let target = std::fs::read_link(path)?;
                    let target = Utf8PathBuf::from_path_buf(target)
                        .map_err(|p| BackupError::NonUtf8Path(p.display().to_string()))?;
                    manifest.symlinks.push(BackupSymlinkEntry {
                        path: relative,
                        target,
                    });
                } else if file_type.is_dir() {
                    manifest.dirs.push(relative);
                } else {
                    let bytes = std::fs::read(path)?;
                    zip.start_file(format!("{FILES_PREFIX}{}", zip_name(&relative)), options)?;
                    zip.write_all(&bytes)?;
                    manifest.files.push(BackupFileEntry {
                        path: relative,
                        size: bytes.len() as u64,
                        hash: hash_bytes(&bytes),
                    });
                }
            }
        }

        zip.start_file(MANIFEST_ENTRY, options)?;
        zip.write_all(&serde_json::to_vec_pretty(&manifest)?)?;
        zip.finish()?.sync_all()?;
        Ok(manifest)
    }

    fn prune(&self) -> Result<(), BackupError> {
        let Some(keep) = self.retention else {
            return Ok(());
        };
        let ids = self.list()?;
        if ids.len() <= keep {
            return Ok(());
        }
        for id in &ids[..ids.len() - keep] {
            tracing::info!("Removing old backup {}", id);
            std::fs::remove_file(self.archive_path(id))?;
        }
        Ok(())
    }
}

impl BackupManager for ZipBackupManager {
    fn create(&self, path: &Utf8Path) -> Result<BackupId, BackupError> {
        std::fs::create_dir_all(&self.backup_dir)?;
        let id = self.next_id();
        let archive = self.archive_path(&id);
        let partial = archive.with_extension(format!("{ARCHIVE_EXTENSION}.partial"));

        let manifest = match self.write_archive(path, &partial) {
            Ok(manifest) => manifest,
            Err(err) => {
                let _ = std::fs::remove_file(&partial);
                return Err(err);
            }
        };
        std::fs::rename(&partial, &archive)?;

        tracing::info!(
            "Backed up {} ({} files, {} dirs, {} links) to {}",
            path,
            manifest.files.len(),
            manifest.dirs.len(),
            manifest.symlinks.len(),
            archive
        );

        if let Err(err) = self.prune() {
            tracing::warn!("Failed to prune old backups: {}", err);
        }
        Ok(id)
    }

    fn restore(&self, id: &BackupId) -> Result<(), BackupError> {
        let mut archive = self.open(id)?;
        let manifest = read_manifest(&mut archive, id)?;
        let root = manifest.source_root.as_path();

        tracing::info!("Restoring {} from backup {}", root, id);

        // read everything first so a corrupt archive leaves the root untouched
        let mut contents = Vec::with_capacity(manifest.files.len());
        for file in &manifest.files {
            let bytes = read_entry(&mut archive, id, file)?;
            contents.push((file.path.as_path(), bytes));
        }

        clear_root(root)?;
        if !manifest.root_existed {
            return Ok(());
        }

        std::fs::create_dir_all(root)?;
        for dir in &manifest.dirs {
            std::fs::create_dir_all(root.join(dir))?;
        }
        for (relative, bytes) in contents {
            let path = root.join(relative);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, bytes)?;
        }
        for link in &manifest.symlinks {
            let path = root.join(&link.path);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            create_symlink(&link.target, &path)?;
        }
        Ok(())
    }

    fn verify(&self, id: &BackupId) -> (bool, String) {
        let check = || -> Result<usize, BackupError> {
            let mut archive = self.open(id)?;
            let manifest = read_manifest(&mut archive, id)?;
            for file in &manifest.files {
                read_entry(&mut archive, id, file)?;
            }
            Ok(manifest.files.len())
        };
        match check() {
            Ok(count) => (true, format!("{count} files verified")),
            Err(err) => (false, err.to_string()),
        }
    }
}

fn read_manifest(archive: &mut ZipArchive<File>, id: &BackupId) -> Result<BackupManifest, BackupError> {
    let mut entry = archive.by_name(MANIFEST_ENTRY).map_err(|_| BackupError::Corrupt {
        id: id.clone(),
        reason: "missing manifest".to_string(),
    })?;
    let mut contents = Vec::new();
    entry.read_to_end(&mut contents)?;
    let manifest: BackupManifest = serde_json::from_slice(&contents)?;
    if manifest.version != MANIFEST_VERSION {
        return Err(BackupError::Corrupt {
            id: id.clone(),
            reason: format!("unsupported manifest version {}", manifest.version),
        });
    }
    Ok(manifest)
}

fn read_entry(
    archive: &mut ZipArchive<File>,
    id: &BackupId,
    file: &BackupFileEntry,
) -> Result<Vec<u8>, BackupError> {
    let corrupt = |reason: String| BackupError::Corrupt {
        id: id.clone(),
        reason,
    };
    let name = format!("{FILES_PREFIX}{}", zip_name(&file.path));
    let mut entry = archive
        .by_name(&name)
        .map_err(|_| corrupt(format!("missing entry {}", file.path)))?;
    let mut bytes = Vec::with_capacity(entry.size() as usize);
    entry
        .read_to_end(&mut bytes)
        .map_err(|e| corrupt(format!("unreadable entry {}: {e}", file.path)))?;

    let actual = hash_bytes(&bytes);
    if actual != file.hash {
        return Err(corrupt(format!(
            "hash mismatch for {}: expected {}, found {}",
            file.path,
            format_hash(file.hash),
            format_hash(actual)
        )));
    }
    Ok(bytes)
}

/// Remove everything under `root` and the root itself, without following links.
fn clear_root(root: &Utf8Path) -> io::Result<()> {
    match std::fs::symlink_metadata(root) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(root),
        Ok(_) => std::fs::remove_file(root),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

fn relative_to(root: &Utf8Path, path: &Utf8Path) -> Result<Utf8PathBuf, BackupError> {
    path.strip_prefix(root)
        .map(Utf8Path::to_path_buf)
        .map_err(|_| BackupError::NonUtf8Path(path.to_string()))
}

/// Zip entry names always use forward slashes.
fn zip_name(relative: &Utf8Path) -> String {
    relative
        .components()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(unix)]
fn create_symlink(target: &Utf8Path, link: &Utf8Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_symlink(target: &Utf8Path, link: &Utf8Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(not(any(unix, windows)))]
fn create_symlink(_target: &Utf8Path, _link: &Utf8Path) -> io::Result<()> {
    Err(io::ErrorKind::Unsupported.into())
}

mod hex_hash {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(hash: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&s4mm_core::format_hash(*hash))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let s = String::deserialize(deserializer)?;
        u64::from_str_radix(&s, 16).map_err(serde::de::Error::custom)
    }
}
