//! Deployment state machine and the per-root deployment manifest.
//!
//! After a successful deployment a [`DeployManifest`] is written to
//! `.s4mm-deploy.json` in the output root. The next deployment reads it to
//! find files it placed earlier that are no longer wanted.

use crate::placement::PlacementMethod;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::io;

pub const MANIFEST_FILE_NAME: &str = ".s4mm-deploy.json";
const MANIFEST_VERSION: u32 = 1;

/// Phase of a deployment.
///
/// The happy path is `Validating -> BackingUp -> Deploying -> Verifying ->
/// Complete`. Once a backup exists, a failure moves to `RollingBack` and then
/// `Failed`; a failure before that goes straight to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeployState {
    Validating,
    BackingUp,
    Deploying,
    Verifying,
    Complete,
    RollingBack,
    Failed,
}

impl DeployState {
    pub fn can_transition_to(self, next: DeployState) -> bool {
        use DeployState::*;
        matches!(
            (self, next),
            (Validating, BackingUp)
                | (BackingUp, Deploying)
                | (Deploying, Verifying)
                | (Verifying, Complete)
                | (BackingUp | Deploying | Verifying, RollingBack)
                | (Validating | BackingUp | RollingBack, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DeployState::Complete | DeployState::Failed)
    }
}

impl fmt::Display for DeployState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeployState::Validating => "validating",
            DeployState::BackingUp => "backing up",
            DeployState::Deploying => "deploying",
            DeployState::Verifying => "verifying",
            DeployState::Complete => "complete",
            DeployState::RollingBack => "rolling back",
            DeployState::Failed => "failed",
        })
    }
}

/// Record of what the last successful deployment placed.
///
/// # JSON format
///
/// ```json
/// {
///   "version": 1,
///   "backupId": "backup_2026-01-01_120000_1a2b3c4d",
///   "entries": [
///     { "name": "hair.package", "relativePath": "040_CC/hair.package", "method": "directoryLink", "hash": "..." }
///   ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployManifest {
    pub version: u32,
    /// Backup taken before the deployment that wrote this manifest.
    pub backup_id: Option<String>,
    pub entries: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub name: String,
    /// Path relative to the output root.
    pub relative_path: Utf8PathBuf,
    pub method: PlacementMethod,
    pub hash: String,
}

impl Default for DeployManifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            backup_id: None,
            entries: Vec::new(),
        }
    }
}

impl DeployManifest {
    pub fn path_in(root: &Utf8Path) -> Utf8PathBuf {
        root.join(MANIFEST_FILE_NAME)
    }

    /// Load the manifest from `root`.
    ///
    /// Returns `Ok(None)` if there is none.
    pub fn load(root: &Utf8Path) -> io::Result<Option<Self>> {
        let path = Self::path_in(root);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err),
        };
        let manifest = serde_json::from_str(&contents)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(Some(manifest))
    }

    /// Write the manifest into `root`, replacing any previous one.
    pub fn save(&self, root: &Utf8Path) -> io::Result<Utf8PathBuf> {
        let path = Self::path_in(root);
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    /// Entries not in `planned`, which holds paths relative to the root.
    pub fn stale_entries<'a>(
        &'a self,
        planned: &'a BTreeSet<Utf8PathBuf>,
    ) -> impl Iterator<Item = &'a ManifestEntry> + 'a {
        self.entries
            .iter()
            .filter(move |entry| !planned.contains(&entry.relative_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::TestDir;

    #[test]
    fn happy_path_transitions() {
        use DeployState::*;
        let path = [Validating, BackingUp, Deploying, Verifying, Complete];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{:?}", pair);
        }
    }

    #[test]
    fn rollback_only_after_backup() {
        use DeployState::*;
        assert!(!Validating.can_transition_to(RollingBack));
        assert!(Deploying.can_transition_to(RollingBack));
        assert!(RollingBack.can_transition_to(Failed));
        assert!(!RollingBack.can_transition_to(Complete));
        assert!(!Complete.can_transition_to(Failed));
        assert!(!Deploying.can_transition_to(Failed));
        assert!(Complete.is_terminal() && Failed.is_terminal());
    }

    #[test]
    fn manifest_round_trip_and_stale_entries() {
        let dir = TestDir::new();
        assert!(DeployManifest::load(dir.path()).unwrap().is_none());

        let manifest = DeployManifest {
            backup_id: Some("backup_x".into()),
            entries: vec![
                ManifestEntry {
                    name: "a.package".into(),
                    relative_path: "040_CC/a.package".into(),
                    method: PlacementMethod::Copy,
                    hash: "00".into(),
                },
                ManifestEntry {
                    name: "b.ts4script".into(),
                    relative_path: "b.ts4script".into(),
                    method: PlacementMethod::Symlink,
                    hash: "01".into(),
                },
            ],
            ..Default::default()
        };
        manifest.save(dir.path()).unwrap();
        let loaded = DeployManifest::load(dir.path()).unwrap().unwrap();
        assert_eq!(loaded, manifest);

        let planned = BTreeSet::from([Utf8PathBuf::from("b.ts4script")]);
        let stale: Vec<&str> = loaded
            .stale_entries(&planned)
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(stale, vec!["a.package"]);
    }

    #[test]
    fn corrupt_manifest_is_an_error() {
        let dir = TestDir::new();
        std::fs::write(DeployManifest::path_in(dir.path()), "{ not json").unwrap();
        let err = DeployManifest::load(dir.path()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
