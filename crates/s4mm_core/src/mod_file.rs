use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hash::hash_file;

/// Content type of a discovered mod file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentType {
    /// A `.package` resource container.
    Package,
    /// A compiled script archive (`.ts4script`).
    Script,
    /// A plain-text Python script (`.py`).
    PlainTextScript,
}

impl ContentType {
    /// Classify a path by its extension (case-insensitive).
    pub fn from_path(path: &Utf8Path) -> Option<Self> {
        match path.extension()?.to_ascii_lowercase().as_str() {
            "package" => Some(Self::Package),
            "ts4script" => Some(Self::Script),
            "py" => Some(Self::PlainTextScript),
            _ => None,
        }
    }

    /// Scripts are loaded by the game's module loader and must sit at the
    /// root of the mods folder.
    pub fn is_script(self) -> bool {
        matches!(self, Self::Script | Self::PlainTextScript)
    }
}

/// Immutable descriptor of one discovered mod file.
///
/// Produced by the scanner; the deployment pipeline only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModFile {
    /// Absolute path of the source file.
    pub path: Utf8PathBuf,
    /// Display name, normally the file name.
    pub name: String,
    pub content_type: ContentType,
    /// Size in bytes.
    pub size: u64,
    /// xxHash3 of the file content at scan time.
    pub hash: u64,
    /// Detected content category, e.g. `"CAS"`, `"BuildBuy"`, `"ScriptMods"`.
    pub category: String,
    /// Slot directory name from an earlier deployment, e.g. `"040_CC"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_slot: Option<String>,
    /// Last modification time recorded by the scanner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
}

impl ModFile {
    /// Describe the file at `path`, hashing its content.
    ///
    /// Returns `Ok(None)` for files whose extension is not a mod content type.
    pub fn from_path(path: &Utf8Path, category: impl Into<String>) -> io::Result<Option<Self>> {
        let Some(content_type) = ContentType::from_path(path) else {
            return Ok(None);
        };

        let metadata = std::fs::metadata(path.as_std_path())?;
        let name = path
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| path.to_string());

        Ok(Some(Self {
            path: path.to_path_buf(),
            name,
            content_type,
            size: metadata.len(),
            hash: hash_file(path)?,
            category: category.into(),
            assigned_slot: None,
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        }))
    }

    pub fn with_assigned_slot(mut self, slot: impl Into<String>) -> Self {
        self.assigned_slot = Some(slot.into());
        self
    }

    pub fn is_script(&self) -> bool {
        self.content_type.is_script()
    }

    /// Modification time, falling back to the file system when the scanner
    /// did not record one.
    pub fn modified_or_mtime(&self) -> Option<DateTime<Utc>> {
        self.modified.or_else(|| {
            std::fs::metadata(self.path.as_std_path())
                .and_then(|m| m.modified())
                .ok()
                .map(DateTime::<Utc>::from)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_from_extension() {
        assert_eq!(
            ContentType::from_path(Utf8Path::new("a/b/Hair.package")),
            Some(ContentType::Package)
        );
        assert_eq!(
            ContentType::from_path(Utf8Path::new("mc_cmd_center.TS4SCRIPT")),
            Some(ContentType::Script)
        );
        assert_eq!(
            ContentType::from_path(Utf8Path::new("injector.py")),
            Some(ContentType::PlainTextScript)
        );
        assert_eq!(ContentType::from_path(Utf8Path::new("readme.txt")), None);
        assert_eq!(ContentType::from_path(Utf8Path::new("noext")), None);
    }

    #[test]
    fn test_is_script() {
        assert!(ContentType::Script.is_script());
        assert!(ContentType::PlainTextScript.is_script());
        assert!(!ContentType::Package.is_script());
    }

    #[test]
    fn test_from_path_describes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("Sofa.package")).unwrap();
        std::fs::write(&path, b"DBPF....").unwrap();

        let mod_file = ModFile::from_path(&path, "BuildBuy").unwrap().unwrap();
        assert_eq!(mod_file.name, "Sofa.package");
        assert_eq!(mod_file.size, 8);
        assert_eq!(mod_file.hash, crate::hash_bytes(b"DBPF...."));
        assert_eq!(mod_file.category, "BuildBuy");
        assert!(mod_file.modified.is_some());
        assert!(mod_file.assigned_slot.is_none());
    }

    #[test]
    fn test_from_path_skips_unknown_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("notes.txt")).unwrap();
        std::fs::write(&path, b"hi").unwrap();

        assert!(ModFile::from_path(&path, "Misc").unwrap().is_none());
    }

    #[test]
    fn test_serialization_format() {
        let mod_file = ModFile {
            path: Utf8PathBuf::from("/mods/a.py"),
            name: "a.py".to_string(),
            content_type: ContentType::PlainTextScript,
            size: 1,
            hash: 2,
            category: "ScriptMods".to_string(),
            assigned_slot: None,
            modified: None,
        };
        let json = serde_json::to_string(&mod_file).unwrap();

        assert!(json.contains("\"contentType\":\"plain-text-script\""));
        assert!(!json.contains("assignedSlot"));
    }
}
