//! Conflict detection, load ordering and transactional deployment for Sims 4 mods.
//!
//! This crate turns a set of scanned [`ModFile`](s4mm_core::ModFile)s into a
//! loadable `Mods` folder:
//!
//! - **Conflict detection**: cross-reference package resource indexes and rank
//!   each clash by severity
//! - **Load order slots**: numbered folders (`000_Core`, `040_CC`) that fix the
//!   order the game reads packages in, with scripts kept at the root
//! - **Transactional deployment**: snapshot, place, verify, and roll back to the
//!   snapshot on any failure
//!
//! # Example
//!
//! ```no_run
//! use camino::Utf8Path;
//! use s4mm_core::{ModFile, ProcessConfig, SysinfoProcessManager};
//! use s4mm_deploy::{ConflictPolicy, DeployEngine, ZipBackupManager};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mods: Vec<ModFile> = ModFile::from_path(Utf8Path::new("Downloads/CAS/hair.package"), "CAS")?
//!     .into_iter()
//!     .collect();
//!
//! let engine = DeployEngine::new(
//!     Arc::new(ZipBackupManager::new("backups").with_retention(10)),
//!     Arc::new(SysinfoProcessManager::new(ProcessConfig::default())),
//! )
//! .with_progress(|progress| {
//!     println!("{}: {}/{}", progress.state, progress.current, progress.total);
//! });
//!
//! let result = engine.deploy(&mods, Utf8Path::new("Mods"), &ConflictPolicy::AutoNewest)?;
//! println!("Deployed {} mods, backup {}", result.deployed.len(), result.backup_id);
//! # Ok(())
//! # }
//! ```

pub mod backup;
pub mod config;
pub mod conflict;
pub mod directive;
pub mod engine;
pub mod error;
pub mod load_order;
pub mod lock;
pub mod placement;
pub mod policy;
pub mod slot;
pub mod state;


pub use backup::{BackupError, BackupId, BackupInfo, BackupManager, ZipBackupManager};
pub use config::{DeployConfig, SeverityConfig, TypeIdRange};
pub use conflict::{ConflictDetector, ConflictEntry, ConflictReport, ScanWarning, Severity};
pub use engine::{
    DeployEngine, DeployFailure, DeployProgress, DeployedMod, DeploymentPlan, DeploymentResult,
    PlannedMod,
};
pub use error::{ConfigError, DeployError, LoadOrderError, Result};
pub use load_order::{LoadOrderEngine, StructureWarning, MAX_NESTING_DEPTH, MAX_PATH_LENGTH};
pub use placement::{FsLinker, Linker, PlacementMethod};
pub use policy::{ConflictPolicy, ConflictResolution};
pub use slot::{Slot, SlotDefinition, SLOT_TABLE};
pub use state::{DeployManifest, DeployState};
