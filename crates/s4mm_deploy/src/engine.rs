//! Transactional deployment of a mod set into an output root.
//!
//! [`DeployEngine::deploy`] runs the whole pipeline under an exclusive lock on
//! the output root.
//!
//! # Deployment Algorithm
//!
//! 1. Validate: refuse while the game is running, then check that the output
//!    root (or its nearest existing ancestor) is writable.
//! 2. Detect conflicts across all packages and apply the [`ConflictPolicy`].
//! 3. Snapshot the output root through the [`BackupManager`].
//! 4. Create the slot folders and derive the [`DeploymentPlan`].
//! 5. Remove files placed by the previous deployment that are no longer
//!    planned, then place every planned file, falling back from directory
//!    link to symlink to copy. Write `resource.cfg` and the manifest.
//! 6. Re-hash every copied file against the hash recorded for its source.
//!
//! Failures in steps 1 to 3 leave the output root and its parent folders as
//! they were and are returned as `Err`.
//! From step 4 on, every path created is journaled; on failure the journal is
//! undone in reverse, the snapshot is restored, and the run reports
//! `success = false`. Only a failed restore is returned as
//! [`DeployError::RollbackFailed`].

use crate::backup::{BackupId, BackupManager};
use crate::config::DeployConfig;
use crate::conflict::ConflictDetector;
use crate::directive::write_directive;
use crate::error::{DeployError, Result};
use crate::load_order::LoadOrderEngine;
use crate::lock::OutputRootLock;
use crate::placement::{place_with_fallback, remove_entry, FsLinker, Linker, PlacementMethod};
use crate::policy::{resolve, ConflictPolicy, ConflictResolution};
use crate::slot::Slot;
use crate::state::{DeployManifest, DeployState, ManifestEntry};
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use s4mm_core::{format_hash, hash_file, ModFile, ProcessManager};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Progress information emitted during deployment.
///
/// Sent on every state change, and once per placed file while
/// [`Deploying`](DeployState::Deploying).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployProgress {
    pub state: DeployState,
    /// Name of the mod being placed.
    pub current_file: Option<String>,
    /// 1-based index of the mod being placed.
    pub current: u32,
    /// Number of mods in the plan.
    pub total: u32,
}

/// One mod and where it goes. Built once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMod {
    pub mod_file: ModFile,
    pub slot: Slot,
    pub destination: Utf8PathBuf,
}

/// Every mod of a run mapped to its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentPlan {
    output_root: Utf8PathBuf,
    entries: Vec<PlannedMod>,
}

impl DeploymentPlan {
    pub fn output_root(&self) -> &Utf8Path {
        &self.output_root
    }

    pub fn entries(&self) -> &[PlannedMod] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn relative_paths(&self) -> BTreeSet<Utf8PathBuf> {
        self.entries
            .iter()
            .filter_map(|e| e.destination.strip_prefix(&self.output_root).ok())
            .map(Utf8Path::to_path_buf)
            .collect()
    }
}

/// A mod that was placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedMod {
    pub mod_file: ModFile,
    pub destination: Utf8PathBuf,
    pub method: PlacementMethod,
}

/// Why a run failed, and which mod it was working on if any.
#[derive(Debug)]
pub struct DeployFailure {
    pub mod_file: Option<ModFile>,
    pub error: DeployError,
}

impl DeployFailure {
    fn general(error: impl Into<DeployError>) -> Self {
        Self {
            mod_file: None,
            error: error.into(),
        }
    }

    fn for_mod(mod_file: &ModFile, error: impl Into<DeployError>) -> Self {
        Self {
            mod_file: Some(mod_file.clone()),
            error: error.into(),
        }
    }
}

/// Summary returned by [`DeployEngine::deploy`].
#[derive(Debug)]
pub struct DeploymentResult {
    pub success: bool,
    /// `Complete` on success, `Failed` after a rollback.
    pub state: DeployState,
    /// Placed mods. Empty after a rollback.
    pub deployed: Vec<DeployedMod>,
    pub failures: Vec<DeployFailure>,
    pub conflicts: ConflictResolution,
    pub backup_id: BackupId,
    pub output_root: Utf8PathBuf,
    pub elapsed: Duration,
}

type ProgressCallback = Arc<dyn Fn(DeployProgress) + Send + Sync>;

/// Deploys mod sets with backup and rollback.
///
/// ```no_run
/// use camino::Utf8Path;
/// use s4mm_core::{ProcessConfig, SysinfoProcessManager};
/// use s4mm_deploy::{ConflictPolicy, DeployEngine, ZipBackupManager};
/// use std::sync::Arc;
///
/// let engine = DeployEngine::new(
///     Arc::new(ZipBackupManager::new("backups")),
///     Arc::new(SysinfoProcessManager::new(ProcessConfig::default())),
/// )
/// .with_progress(|p| println!("{}: {}/{}", p.state, p.current, p.total));
///
/// let result = engine.deploy(&[], Utf8Path::new("Mods"), &ConflictPolicy::AutoNewest)?;
/// assert!(result.success);
/// # Ok::<(), s4mm_deploy::DeployError>(())
/// ```
pub struct DeployEngine {
    backup: Arc<dyn BackupManager>,
    process: Arc<dyn ProcessManager>,
    linker: Arc<dyn Linker>,
    config: DeployConfig,
    load_order: LoadOrderEngine,
    detector: ConflictDetector,
    progress_callback: Option<ProgressCallback>,
}

impl DeployEngine {
    pub fn new(backup: Arc<dyn BackupManager>, process: Arc<dyn ProcessManager>) -> Self {
        let config = DeployConfig::default();
        Self {
            backup,
            process,
            linker: Arc::new(FsLinker),
            load_order: LoadOrderEngine::new().with_terminal_category(&config.terminal_category),
            detector: ConflictDetector::from_config(&config),
            config,
            progress_callback: None,
        }
    }

    /// Replace the configuration. Call [`DeployConfig::validate`] first.
    pub fn with_config(mut self, config: DeployConfig) -> Self {
        self.load_order = LoadOrderEngine::new().with_terminal_category(&config.terminal_category);
        self.detector = ConflictDetector::from_config(&config);
        self.config = config;
        self
    }

    /// Replace the placement primitives.
    pub fn with_linker(mut self, linker: Arc<dyn Linker>) -> Self {
        self.linker = linker;
        self
    }

    /// Register a progress callback.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(DeployProgress) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    pub fn config(&self) -> &DeployConfig {
        &self.config
    }

    pub fn load_order(&self) -> &LoadOrderEngine {
        &self.load_order
    }

    pub fn detector(&self) -> &ConflictDetector {
        &self.detector
    }

    /// Deploy `mods` into `output_root`. See the module docs for the algorithm.
    pub fn deploy(
        &self,
        mods: &[ModFile],
        output_root: &Utf8Path,
        policy: &ConflictPolicy,
    ) -> Result<DeploymentResult> {
        let start = Instant::now();
        let _lock = OutputRootLock::acquire(output_root)?;
        let mut tracker = StateTracker::new(self.progress_callback.as_ref());

        tracing::info!("Deploying {} mods to {}", mods.len(), output_root);

        if let Err(err) = self.validate(output_root) {
            tracker.advance(DeployState::Failed);
            return Err(err);
        }

        let report = self.detector.detect(mods);
        let (selected, resolution) = match resolve(policy, mods, report) {
            Ok(resolved) => resolved,
            Err(err) => {
                tracker.advance(DeployState::Failed);
                return Err(err);
            }
        };
        tracing::info!(
            "{} conflicts, {} mods excluded, {} to deploy",
            resolution.conflicts.len(),
            resolution.excluded.len(),
            selected.len()
        );

        tracker.advance(DeployState::BackingUp);
        let backup_id = match self.backup.create(output_root) {
            Ok(id) => id,
            Err(err) => {
                tracker.advance(DeployState::Failed);
                return Err(err.into());
            }
        };

        let mut journal = Journal::default();
        match self.run_transaction(&selected, output_root, &backup_id, &mut journal, &mut tracker) {
            Ok(deployed) => {
                tracker.advance(DeployState::Complete);
                tracing::info!(
                    "Deployed {} mods to {} in {:?}",
                    deployed.len(),
                    output_root,
                    start.elapsed()
                );
                Ok(DeploymentResult {
                    success: true,
                    state: tracker.state,
                    deployed,
                    failures: Vec::new(),
                    conflicts: resolution,
                    backup_id,
                    output_root: output_root.to_path_buf(),
                    elapsed: start.elapsed(),
                })
            }
            Err(failure) => {
                tracing::error!("Deployment failed: {}", failure.error);
                tracker.advance(DeployState::RollingBack);
                if let Err(rollback_err) = self.rollback(&journal, &backup_id) {
                    tracing::error!("Rollback failed: {}", rollback_err);
                    tracker.advance(DeployState::Failed);
                    return Err(DeployError::RollbackFailed {
                        backup_id,
                        cause: failure.error.to_string(),
                        source: Box::new(rollback_err),
                    });
                }
                tracker.advance(DeployState::Failed);
                tracing::info!("Rolled back {} to backup {}", output_root, backup_id);
                Ok(DeploymentResult {
                    success: false,
                    state: tracker.state,
                    deployed: Vec::new(),
                    failures: vec![failure],
                    conflicts: resolution,
                    backup_id,
                    output_root: output_root.to_path_buf(),
                    elapsed: start.elapsed(),
                })
            }
        }
    }

    /// Derive where every mod goes, checking placement rules.
    pub fn plan(&self, mods: &[ModFile], output_root: &Utf8Path) -> Result<DeploymentPlan> {
        self.build_plan(mods, output_root)
            .map_err(|failure| failure.error)
    }

    fn build_plan(
        &self,
        mods: &[ModFile],
        output_root: &Utf8Path,
    ) -> std::result::Result<DeploymentPlan, DeployFailure> {
        let mut claimed: BTreeMap<Utf8PathBuf, &str> = BTreeMap::new();
        let mut entries = Vec::with_capacity(mods.len());

        for mod_file in mods {
            let (slot, destination) = self
                .load_order
                .checked_destination(mod_file, output_root)
                .map_err(|e| DeployFailure::for_mod(mod_file, e))?;

            if let Some(other) = claimed.get(&destination) {
                return Err(DeployFailure::for_mod(
                    mod_file,
                    DeployError::InvalidPlacement {
                        reason: format!("destination is also claimed by {other}"),
                        path: destination,
                    },
                ));
            }

            claimed.insert(destination.clone(), mod_file.path.as_str());
            entries.push(PlannedMod {
                mod_file: mod_file.clone(),
                slot,
                destination,
            });
        }

        Ok(DeploymentPlan {
            output_root: output_root.to_path_buf(),
            entries,
        })
    }

    fn validate(&self, output_root: &Utf8Path) -> Result<()> {
        if self.process.is_host_game_running() {
            return Err(DeployError::HostRunning);
        }

        let writable_dir = output_root
            .ancestors()
            .map(|p| if p.as_str().is_empty() { Utf8Path::new(".") } else { p })
            .find(|p| p.exists())
            .unwrap_or(output_root);
        if !writable_dir.is_dir() {
            return Err(DeployError::InvalidPlacement {
                path: writable_dir.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }
        tempfile::Builder::new()
            .prefix(".s4mm-write-check")
            .tempfile_in(writable_dir)
            .map_err(|e| DeployError::io(writable_dir, e))?;
        Ok(())
    }

    fn run_transaction(
        &self,
        mods: &[ModFile],
        output_root: &Utf8Path,
        backup_id: &BackupId,
        journal: &mut Journal,
        tracker: &mut StateTracker<'_>,
    ) -> std::result::Result<Vec<DeployedMod>, DeployFailure> {
        let mut by_category: BTreeMap<String, Vec<ModFile>> = BTreeMap::new();
        for mod_file in mods {
            by_category
                .entry(mod_file.category.clone())
                .or_default()
                .push(mod_file.clone());
        }
        self.load_order
            .generate_structure_tracked(&by_category, output_root, &mut journal.dirs)
            .map_err(DeployFailure::general)?;

        let plan = self.build_plan(mods, output_root)?;
        let total = plan.len() as u32;
        tracker.total = total;
        tracker.advance(DeployState::Deploying);

        self.remove_stale(&plan)?;

        let mut deployed = Vec::with_capacity(plan.len());
        for (idx, entry) in plan.entries().iter().enumerate() {
            tracker.emit(DeployProgress {
                state: DeployState::Deploying,
                current_file: Some(entry.mod_file.name.clone()),
                current: idx as u32 + 1,
                total,
            });

            let fail = |e: std::io::Error| {
                DeployFailure::for_mod(&entry.mod_file, DeployError::io(&entry.destination, e))
            };
            remove_entry(&entry.destination).map_err(fail)?;
            journal.files.push(entry.destination.clone());

            let method = place_with_fallback(
                self.linker.as_ref(),
                &entry.mod_file.path,
                &entry.destination,
            )
            .map_err(fail)?;

            tracing::debug!("Placed {} ({})", entry.destination, method);
            deployed.push(DeployedMod {
                mod_file: entry.mod_file.clone(),
                destination: entry.destination.clone(),
                method,
            });
        }

        let directive = output_root.join(crate::directive::DIRECTIVE_FILE_NAME);
        journal.files.push(directive.clone());
        write_directive(output_root, self.config.directive_priority)
            .map_err(|e| DeployFailure::general(DeployError::io(&directive, e)))?;

        let manifest_path = DeployManifest::path_in(output_root);
        journal.files.push(manifest_path.clone());
        self.write_manifest(&plan, &deployed, backup_id)
            .map_err(|e| DeployFailure::general(DeployError::io(&manifest_path, e)))?;

        tracker.advance(DeployState::Verifying);
        for placed in deployed.iter().filter(|d| !d.method.is_link()) {
            let actual = hash_file(&placed.destination).map_err(|e| {
                DeployFailure::for_mod(&placed.mod_file, DeployError::io(&placed.destination, e))
            })?;
            if actual != placed.mod_file.hash {
                return Err(DeployFailure::for_mod(
                    &placed.mod_file,
                    DeployError::HashMismatch {
                        path: placed.destination.clone(),
                        expected: placed.mod_file.hash,
                        actual,
                    },
                ));
            }
        }

        Ok(deployed)
    }

    /// Remove files the previous deployment placed that this plan does not.
    fn remove_stale(&self, plan: &DeploymentPlan) -> std::result::Result<(), DeployFailure> {
        let root = plan.output_root();
        let previous = match DeployManifest::load(root) {
            Ok(Some(manifest)) => manifest,
            Ok(None) => return Ok(()),
            Err(err) => {
                tracing::warn!("Ignoring unreadable deployment manifest in {}: {}", root, err);
                return Ok(());
            }
        };

        let planned = plan.relative_paths();
        for entry in previous.stale_entries(&planned) {
            if !is_contained(&entry.relative_path) {
                tracing::warn!("Ignoring manifest entry outside the root: {}", entry.relative_path);
                continue;
            }
            let path = root.join(&entry.relative_path);
            tracing::info!("Removing stale {}", path);
            remove_entry(&path)
                .map_err(|e| DeployFailure::general(DeployError::io(&path, e)))?;
        }
        Ok(())
    }

    fn write_manifest(
        &self,
        plan: &DeploymentPlan,
        deployed: &[DeployedMod],
        backup_id: &BackupId,
    ) -> std::io::Result<Utf8PathBuf> {
        let root = plan.output_root();
        let manifest = DeployManifest {
            backup_id: Some(backup_id.to_string()),
            entries: deployed
                .iter()
                .filter_map(|d| {
                    Some(ManifestEntry {
                        name: d.mod_file.name.clone(),
                        relative_path: d.destination.strip_prefix(root).ok()?.to_path_buf(),
                        method: d.method,
                        hash: format_hash(d.mod_file.hash),
                    })
                })
                .collect(),
            ..Default::default()
        };
        manifest.save(root)
    }

    /// Undo the journal in reverse, then restore the snapshot.
    fn rollback(&self, journal: &Journal, backup_id: &BackupId) -> Result<()> {
        let files = journal.files.iter().rev();
        let dirs = journal.dirs.iter().rev();
        for path in files.chain(dirs) {
            // directories are removed recursively without following links
            if let Err(err) = remove_entry(path) {
                // the restore below rewrites the whole root anyway
                tracing::warn!("Rollback could not remove {}: {}", path, err);
            }
        }
        self.backup.restore(backup_id)?;
        Ok(())
    }
}

fn is_contained(relative: &Utf8Path) -> bool {
    relative
        .components()
        .all(|c| matches!(c, Utf8Component::Normal(_) | Utf8Component::CurDir))
}

/// Paths created since the backup.
///
/// Directories all come from structure generation, before any file is placed,
/// so undoing files newest first and then directories newest first reverses
/// creation order.
#[derive(Debug, Default)]
struct Journal {
    dirs: Vec<Utf8PathBuf>,
    /// Files and links placed or overwritten.
    files: Vec<Utf8PathBuf>,
}

/// Tracks the current [`DeployState`] and reports each change.
struct StateTracker<'a> {
    state: DeployState,
    total: u32,
    callback: Option<&'a ProgressCallback>,
}

impl<'a> StateTracker<'a> {
    fn new(callback: Option<&'a ProgressCallback>) -> Self {
        let tracker = Self {
            state: DeployState::Validating,
            total: 0,
            callback,
        };
        tracker.emit(DeployProgress {
            state: DeployState::Validating,
            current_file: None,
            current: 0,
            total: 0,
        });
        tracker
    }

    fn advance(&mut self, next: DeployState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::debug!("Deploy state: {} -> {}", self.state, next);
        self.state = next;
        self.emit(DeployProgress {
            state: next,
            current_file: None,
            current: 0,
            total: self.total,
        });
    }

    fn emit(&self, progress: DeployProgress) {
        if let Some(callback) = self.callback {
            callback(progress);
        }
    }
}
