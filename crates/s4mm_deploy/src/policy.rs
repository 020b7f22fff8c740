//! Conflict policies applied before anything is written.

use crate::conflict::{ConflictEntry, ConflictReport, ScanWarning};
use crate::error::{DeployError, Result};
use chrono::{DateTime, Utc};
use s4mm_core::ModFile;
use s4mm_dbpf::ResourceId;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

/// How conflicting mods are handled during a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "policy")]
pub enum ConflictPolicy {
    /// Keep the most recently modified mod for each conflicting resource.
    #[default]
    AutoNewest,
    /// Leave out every mod involved in any conflict.
    SkipConflicting,
    /// Leave out the named mods; fail if any conflict is still left.
    Manual { excluded: BTreeSet<String> },
}

/// What a policy decided, reported back in the deployment result.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictResolution {
    pub policy: ConflictPolicy,
    /// Every conflict found before the policy was applied.
    pub conflicts: BTreeMap<ResourceId, ConflictEntry>,
    /// Mods left out of the deployment.
    pub excluded: BTreeSet<String>,
    /// Packages that could not be scanned.
    pub warnings: Vec<ScanWarning>,
}

/// Apply `policy` and return the mods to deploy, in their original order.
pub(crate) fn resolve(
    policy: &ConflictPolicy,
    mods: &[ModFile],
    report: ConflictReport,
) -> Result<(Vec<ModFile>, ConflictResolution)> {
    let excluded = match policy {
        ConflictPolicy::AutoNewest => newest_wins(mods, &report),
        ConflictPolicy::SkipConflicting => report.conflicting_mods(),
        ConflictPolicy::Manual { excluded } => {
            let remaining: Vec<&ConflictEntry> = report
                .conflicts
                .values()
                .filter(|entry| entry.mods.difference(excluded).count() > 1)
                .collect();
            if !remaining.is_empty() {
                let mods: BTreeSet<String> = remaining
                    .iter()
                    .flat_map(|entry| entry.mods.difference(excluded).cloned())
                    .collect();
                return Err(DeployError::ConflictUnresolved {
                    resources: remaining.iter().map(|entry| entry.resource).collect(),
                    mods: mods.into_iter().collect(),
                });
            }
            excluded.clone()
        }
    };

    for name in &excluded {
        tracing::info!("Excluding {} from deployment", name);
    }

    let selected = mods
        .iter()
        .filter(|m| !excluded.contains(&m.name))
        .cloned()
        .collect();

    Ok((
        selected,
        ConflictResolution {
            policy: policy.clone(),
            conflicts: report.conflicts,
            excluded,
            warnings: report.warnings,
        },
    ))
}

/// Greedy claim over conflicting resources, newest mod first.
///
/// A mod is kept only if none of its conflicting resources were already
/// claimed by a newer mod. Equal timestamps fall back to name order.
fn newest_wins(mods: &[ModFile], report: &ConflictReport) -> BTreeSet<String> {
    let conflicting = report.conflicting_mods();
    if conflicting.is_empty() {
        return BTreeSet::new();
    }

    let mut newest: BTreeMap<&str, Option<DateTime<Utc>>> = BTreeMap::new();
    for mod_file in mods.iter().filter(|m| conflicting.contains(&m.name)) {
        let modified = mod_file.modified_or_mtime();
        let slot = newest.entry(mod_file.name.as_str()).or_insert(modified);
        if modified > *slot {
            *slot = modified;
        }
    }

    let mut candidates: Vec<(&str, Option<DateTime<Utc>>)> = newest.into_iter().collect();
    candidates.sort_by_key(|(name, modified)| (Reverse(*modified), *name));

    let mut claimed: BTreeSet<ResourceId> = BTreeSet::new();
    let mut excluded = BTreeSet::new();
    for (name, _) in candidates {
        let contested: BTreeSet<ResourceId> = report
            .resources_by_mod
            .get(name)
            .map(|resources| {
                resources
                    .iter()
                    .filter(|r| report.conflicts.contains_key(*r))
                    .copied()
                    .collect()
            })
            .unwrap_or_default();

        if contested.is_disjoint(&claimed) {
            claimed.extend(contested);
        } else {
            excluded.insert(name.to_string());
        }
    }
    excluded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::ConflictDetector;
    use crate::tests::{package_mod, TestDir};
    use chrono::TimeZone;

    const SHARED: ResourceId = ResourceId::new(0x0333_406C, 0, 1);
    const OTHER: ResourceId = ResourceId::new(0x0333_406C, 0, 2);

    fn at(mut m: ModFile, secs: i64) -> ModFile {
        m.modified = Utc.timestamp_opt(secs, 0).single();
        m
    }

    fn names(mods: &[ModFile]) -> Vec<&str> {
        mods.iter().map(|m| m.name.as_str()).collect()
    }

    #[test]
    fn auto_newest_keeps_latest() {
        let dir = TestDir::new();
        let old = at(package_mod(&dir, "old.package", "CAS", &[SHARED]), 100);
        let new = at(package_mod(&dir, "new.package", "CAS", &[SHARED]), 200);
        let mods = vec![old, new];
        let report = ConflictDetector::default().detect(&mods);

        let (selected, resolution) = resolve(&ConflictPolicy::AutoNewest, &mods, report).unwrap();

        assert_eq!(names(&selected), vec!["new.package"]);
        assert_eq!(resolution.excluded, BTreeSet::from(["old.package".to_string()]));
        assert_eq!(resolution.conflicts.len(), 1);
    }

    #[test]
    fn auto_newest_breaks_ties_by_name() {
        let dir = TestDir::new();
        let b = at(package_mod(&dir, "b.package", "CAS", &[SHARED]), 100);
        let a = at(package_mod(&dir, "a.package", "CAS", &[SHARED]), 100);
        let mods = vec![b, a];
        let report = ConflictDetector::default().detect(&mods);

        let (selected, _) = resolve(&ConflictPolicy::AutoNewest, &mods, report).unwrap();
        assert_eq!(names(&selected), vec!["a.package"]);
    }

    #[test]
    fn auto_newest_keeps_disjoint_older_mods() {
        let dir = TestDir::new();
        // newest claims SHARED, middle loses, oldest only contests OTHER with middle
        let newest = at(package_mod(&dir, "newest.package", "CAS", &[SHARED]), 300);
        let middle = at(package_mod(&dir, "middle.package", "CAS", &[SHARED, OTHER]), 200);
        let oldest = at(package_mod(&dir, "oldest.package", "CAS", &[OTHER]), 100);
        let mods = vec![oldest, middle, newest];
        let report = ConflictDetector::default().detect(&mods);

        let (selected, resolution) = resolve(&ConflictPolicy::AutoNewest, &mods, report).unwrap();

        assert_eq!(names(&selected), vec!["oldest.package", "newest.package"]);
        assert_eq!(resolution.excluded, BTreeSet::from(["middle.package".to_string()]));
    }

    #[test]
    fn skip_conflicting_drops_every_party() {
        let dir = TestDir::new();
        let a = package_mod(&dir, "a.package", "CAS", &[SHARED]);
        let b = package_mod(&dir, "b.package", "CAS", &[SHARED]);
        let c = package_mod(&dir, "c.package", "CAS", &[OTHER]);
        let mods = vec![a, b, c];
        let report = ConflictDetector::default().detect(&mods);

        let (selected, resolution) =
            resolve(&ConflictPolicy::SkipConflicting, &mods, report).unwrap();

        assert_eq!(names(&selected), vec!["c.package"]);
        assert_eq!(resolution.excluded.len(), 2);
    }

    #[test]
    fn manual_fails_while_conflicts_remain() {
        let dir = TestDir::new();
        let a = package_mod(&dir, "a.package", "CAS", &[SHARED]);
        let b = package_mod(&dir, "b.package", "CAS", &[SHARED]);
        let c = package_mod(&dir, "c.package", "CAS", &[SHARED]);
        let mods = vec![a, b, c];

        let policy = ConflictPolicy::Manual {
            excluded: BTreeSet::from(["a.package".to_string()]),
        };
        let report = ConflictDetector::default().detect(&mods);
        match resolve(&policy, &mods, report) {
            Err(DeployError::ConflictUnresolved { resources, mods }) => {
                assert_eq!(resources, vec![SHARED]);
                assert_eq!(mods, vec!["b.package".to_string(), "c.package".to_string()]);
            }
            other => panic!("expected unresolved conflict, got {other:?}"),
        }

        let policy = ConflictPolicy::Manual {
            excluded: BTreeSet::from(["a.package".to_string(), "c.package".to_string()]),
        };
        let report = ConflictDetector::default().detect(&mods);
        let (selected, _) = resolve(&policy, &mods, report).unwrap();
        assert_eq!(names(&selected), vec!["b.package"]);
    }

    #[test]
    fn no_conflicts_selects_everything() {
        let dir = TestDir::new();
        let a = package_mod(&dir, "a.package", "CAS", &[SHARED]);
        let b = package_mod(&dir, "b.package", "CAS", &[OTHER]);
        let mods = vec![a, b];

        for policy in [ConflictPolicy::AutoNewest, ConflictPolicy::SkipConflicting] {
            let report = ConflictDetector::default().detect(&mods);
            let (selected, resolution) = resolve(&policy, &mods, report).unwrap();
            assert_eq!(selected.len(), 2);
            assert!(resolution.excluded.is_empty());
        }
    }
}
