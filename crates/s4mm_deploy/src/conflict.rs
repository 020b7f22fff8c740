//! Resource-level conflict detection across package mods.
//!
//! Two mods conflict when their packages declare the same [`ResourceId`]; the
//! game would load only one of them. Scripts carry no index and never conflict.
//! A package that fails to parse is reported as a warning and contributes no
//! resources, so one bad download cannot block detection for the rest.

use crate::config::{DeployConfig, SeverityConfig};
use camino::Utf8PathBuf;
use rayon::prelude::*;
use s4mm_core::{ContentType, ModFile};
use s4mm_dbpf::{PackageError, ResourceId, ResourceIndexParser};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// How much a conflict is likely to matter in game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        })
    }
}

/// One resource declared by two or more mods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictEntry {
    pub resource: ResourceId,
    /// Names of every mod declaring the resource.
    pub mods: BTreeSet<String>,
    pub severity: Severity,
}

/// A package that could not be scanned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanWarning {
    pub mod_name: String,
    pub path: Utf8PathBuf,
    pub message: String,
}

impl fmt::Display for ScanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.mod_name, self.path, self.message)
    }
}

/// Output of [`ConflictDetector::detect`].
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictReport {
    pub conflicts: BTreeMap<ResourceId, ConflictEntry>,
    pub warnings: Vec<ScanWarning>,
    /// Resources each successfully scanned package declares, keyed by mod name.
    pub resources_by_mod: BTreeMap<String, BTreeSet<ResourceId>>,
}

impl ConflictReport {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    /// Every mod involved in at least one conflict.
    pub fn conflicting_mods(&self) -> BTreeSet<String> {
        self.conflicts
            .values()
            .flat_map(|entry| entry.mods.iter().cloned())
            .collect()
    }

    /// Conflict counts per severity, highest first.
    pub fn severity_counts(&self) -> BTreeMap<Severity, usize> {
        let mut counts = BTreeMap::new();
        for entry in self.conflicts.values() {
            *counts.entry(entry.severity).or_insert(0) += 1;
        }
        counts
    }
}

/// Scans package indexes and cross-references them.
#[derive(Debug, Clone)]
pub struct ConflictDetector {
    severity: SeverityConfig,
    parallel: bool,
}

impl Default for ConflictDetector {
    fn default() -> Self {
        Self::new(SeverityConfig::default())
    }
}

impl ConflictDetector {
    pub fn new(severity: SeverityConfig) -> Self {
        Self {
            severity,
            parallel: true,
        }
    }

    pub fn from_config(config: &DeployConfig) -> Self {
        Self::new(config.severity).with_parallel(config.parallel_scan)
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Severity of a conflict on a resource of this type.
    pub fn classify(&self, type_id: u32) -> Severity {
        if self.severity.tuning.contains(type_id) {
            Severity::High
        } else if self.severity.script.contains(type_id) {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    /// Find every resource id declared by two or more of `mods`.
    ///
    /// Only [`ContentType::Package`] files are scanned. The result is the same
    /// whether scanning runs in parallel or not.
    pub fn detect(&self, mods: &[ModFile]) -> ConflictReport {
        let scans = self.scan_packages(mods);
        let mut report = ConflictReport::default();
        let mut owners: BTreeMap<ResourceId, BTreeSet<String>> = BTreeMap::new();

        for (mod_file, scan) in scans {
            match scan {
                Ok(resources) => {
                    tracing::debug!(
                        "Scanned {} ({} resources)",
                        mod_file.name,
                        resources.len()
                    );
                    for resource in &resources {
                        owners
                            .entry(*resource)
                            .or_default()
                            .insert(mod_file.name.clone());
                    }
                    report
                        .resources_by_mod
                        .entry(mod_file.name.clone())
                        .or_default()
                        .extend(resources);
                }
                Err(err) => {
                    tracing::warn!("Skipping unreadable package {}: {}", mod_file.path, err);
                    report.warnings.push(ScanWarning {
                        mod_name: mod_file.name.clone(),
                        path: mod_file.path.clone(),
                        message: err.to_string(),
                    });
                }
            }
        }

        for (resource, mods) in owners {
            if mods.len() < 2 {
                continue;
            }
            let severity = self.classify(resource.type_id);
            report.conflicts.insert(
                resource,
                ConflictEntry {
                    resource,
                    mods,
                    severity,
                },
            );
        }

        if report.has_conflicts() {
            tracing::info!(
                "Found {} conflicting resources across {} mods",
                report.conflicts.len(),
                report.conflicting_mods().len()
            );
        }

        report
    }

    /// Names of mods in `existing` that share at least one resource with `candidate`.
    ///
    /// Used to warn before adding a single mod to an already deployed set.
    pub fn check_mod_conflicts(&self, candidate: &ModFile, existing: &[ModFile]) -> Vec<String> {
        if candidate.content_type != ContentType::Package {
            return Vec::new();
        }
        let candidate_resources = match ResourceIndexParser::parse(&candidate.path) {
            Ok(resources) => resources,
            Err(err) => {
                tracing::warn!("Cannot scan {}: {}", candidate.path, err);
                return Vec::new();
            }
        };

        let others: Vec<ModFile> = existing
            .iter()
            .filter(|m| m.path != candidate.path)
            .cloned()
            .collect();

        let mut names: Vec<String> = self
            .scan_packages(&others)
            .into_iter()
            .filter_map(|(mod_file, scan)| {
                let resources = scan.ok()?;
                (!resources.is_disjoint(&candidate_resources)).then(|| mod_file.name.clone())
            })
            .collect();
        names.sort();
        names.dedup();
        names
    }

    fn scan_packages<'a>(
        &self,
        mods: &'a [ModFile],
    ) -> Vec<(&'a ModFile, Result<BTreeSet<ResourceId>, PackageError>)> {
        let is_package = |m: &&ModFile| m.content_type == ContentType::Package;
        if self.parallel {
            mods.par_iter()
                .filter(is_package)
                .map(|m| (m, ResourceIndexParser::parse(&m.path)))
                .collect()
        } else {
            mods.iter()
                .filter(is_package)
                .map(|m| (m, ResourceIndexParser::parse(&m.path)))
                .collect()
        }
    }
}
