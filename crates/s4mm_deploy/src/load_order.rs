//! Slot assignment, folder structure generation and load order inspection.

use crate::error::LoadOrderError;
use crate::slot::{Slot, SlotDefinition, DEFAULT_CATEGORY, SLOT_TABLE};
use camino::{Utf8Path, Utf8PathBuf};
use s4mm_core::{ContentType, ModFile};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::Write;
use walkdir::WalkDir;

/// Host path length limit.
pub const MAX_PATH_LENGTH: usize = 260;

/// Folders a package may sit under, below the output root.
pub const MAX_NESTING_DEPTH: usize = 1;

/// A problem found by [`LoadOrderEngine::structure_warnings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructureWarning {
    MissingRoot { path: Utf8PathBuf },
    PathTooLong { path: Utf8PathBuf, length: usize },
    NestedTooDeep { path: Utf8PathBuf, depth: usize },
    ScriptNotAtRoot { path: Utf8PathBuf },
    UnrecognizedFolder { path: Utf8PathBuf },
}

impl StructureWarning {
    /// Blocking warnings mean the game will not load something.
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            StructureWarning::MissingRoot { .. }
                | StructureWarning::NestedTooDeep { .. }
                | StructureWarning::ScriptNotAtRoot { .. }
        )
    }
}

impl fmt::Display for StructureWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructureWarning::MissingRoot { path } => {
                write!(f, "Mods folder does not exist: {path}")
            }
            StructureWarning::PathTooLong { path, length } => write!(
                f,
                "Path exceeds {MAX_PATH_LENGTH} character limit ({length} characters): {path}"
            ),
            StructureWarning::NestedTooDeep { path, depth } => write!(
                f,
                "Nested {depth} folders deep, the game only loads {MAX_NESTING_DEPTH}: {path}"
            ),
            StructureWarning::ScriptNotAtRoot { path } => write!(
                f,
                "Script is not in the Mods folder root and will not load: {path}"
            ),
            StructureWarning::UnrecognizedFolder { path } => {
                write!(f, "Folder is not a load order slot: {path}")
            }
        }
    }
}

/// Assigns mods to slots and lays out the output root.
#[derive(Debug, Clone)]
pub struct LoadOrderEngine {
    slots: &'static [SlotDefinition],
    terminal_category: String,
}

impl Default for LoadOrderEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadOrderEngine {
    pub fn new() -> Self {
        Self {
            slots: SLOT_TABLE,
            terminal_category: "Overrides".to_string(),
        }
    }

    pub fn with_terminal_category(mut self, category: impl Into<String>) -> Self {
        self.terminal_category = category.into();
        self
    }

    pub fn slot_definitions(&self) -> &[SlotDefinition] {
        self.slots
    }

    pub fn terminal_slot(&self) -> Slot {
        Slot::Terminal {
            category: self.terminal_category.clone(),
        }
    }

    /// Pick the slot for a mod.
    ///
    /// Scripts always go to the root. Packages are matched by content type,
    /// then by category keywords, then by the slot the scanner recorded, and
    /// fall back to the main mods slot.
    pub fn assign_slot(&self, mod_file: &ModFile) -> Slot {
        if mod_file.is_script() {
            return Slot::Root;
        }

        let category = mod_file.category.to_lowercase();
        if let Some(def) = self.match_keywords(&category) {
            return self.slot_for(def);
        }

        if let Some(slot) = mod_file
            .assigned_slot
            .as_deref()
            .and_then(|name| self.recorded_slot(name))
        {
            return slot;
        }

        self.default_slot()
    }

    /// Final path for a mod inside `root`.
    pub fn destination_for(&self, mod_file: &ModFile, root: &Utf8Path) -> Utf8PathBuf {
        self.assign_slot(mod_file)
            .path_in(root)
            .join(&mod_file.name)
    }

    /// Slot and final path for a mod, refusing placements the game cannot load.
    ///
    /// Fails with [`LoadOrderError::PathTooLong`] past [`MAX_PATH_LENGTH`]
    /// characters, and with [`LoadOrderError::InvalidPlacement`] when a script
    /// would not sit directly in `root`.
    pub fn checked_destination(
        &self,
        mod_file: &ModFile,
        root: &Utf8Path,
    ) -> Result<(Slot, Utf8PathBuf), LoadOrderError> {
        let slot = self.assign_slot(mod_file);
        let path = slot.path_in(root).join(&mod_file.name);

        let length = path.as_str().chars().count();
        if length > MAX_PATH_LENGTH {
            return Err(LoadOrderError::PathTooLong {
                path,
                length,
                limit: MAX_PATH_LENGTH,
            });
        }
        if mod_file.is_script() && path.parent() != Some(root) {
            return Err(LoadOrderError::InvalidPlacement {
                path,
                reason: "scripts must sit directly in the output root".to_string(),
            });
        }
        Ok((slot, path))
    }

    /// Description of a table slot, if `slot` is one.
    pub fn slot_description(&self, slot: &Slot) -> Option<&'static str> {
        match slot {
            Slot::Root => Some("Scripts"),
            Slot::Numbered { number, category } => self
                .slots
                .iter()
                .find(|d| d.number == Some(*number) && d.category == category)
                .map(|d| d.description),
            Slot::Terminal { .. } => self
                .slots
                .iter()
                .find(|d| d.number.is_none())
                .map(|d| d.description),
        }
    }

    /// Create the slot folders `mods_by_category` needs under `root`.
    ///
    /// Existing folders are left alone, so running this twice changes nothing.
    pub fn generate_structure(
        &self,
        mods_by_category: &BTreeMap<String, Vec<ModFile>>,
        root: &Utf8Path,
    ) -> Result<BTreeMap<String, Utf8PathBuf>, LoadOrderError> {
        let mut created = Vec::new();
        let slots = self.generate_structure_tracked(mods_by_category, root, &mut created)?;
        Ok(slots)
    }

    /// Same as [`generate_structure`](Self::generate_structure), recording every
    /// directory it creates in `created` even when it fails part way.
    pub(crate) fn generate_structure_tracked(
        &self,
        mods_by_category: &BTreeMap<String, Vec<ModFile>>,
        root: &Utf8Path,
        created: &mut Vec<Utf8PathBuf>,
    ) -> Result<BTreeMap<String, Utf8PathBuf>, LoadOrderError> {
        let needed: BTreeSet<Slot> = mods_by_category
            .values()
            .flatten()
            .map(|m| self.assign_slot(m))
            .filter(|slot| !slot.is_root())
            .collect();

        let mut owners: BTreeMap<u16, &str> = BTreeMap::new();
        for slot in &needed {
            if let Slot::Numbered { number, category } = slot {
                if let Some(other) = owners.insert(*number, category) {
                    return Err(LoadOrderError::InvalidSlot(format!(
                        "slot number {number:03} is claimed by both {other} and {category}"
                    )));
                }
            }
        }

        ensure_dir(root, created)?;

        let mut slots = BTreeMap::new();
        for slot in needed {
            let path = slot.path_in(root);
            ensure_dir(&path, created)?;
            if let Some(name) = slot.dir_name() {
                slots.insert(name, path);
            }
        }

        tracing::debug!(
            "Load order structure under {}: {} slots, {} new directories",
            root,
            slots.len(),
            created.len()
        );
        Ok(slots)
    }

    /// Check `root` for placements the game cannot load.
    ///
    /// Returns whether the structure is loadable and a description of every
    /// problem found. Advisory warnings do not make it invalid.
    pub fn validate_structure(&self, root: &Utf8Path) -> (bool, Vec<String>) {
        let warnings = self.structure_warnings(root);
        let valid = !warnings.iter().any(StructureWarning::is_blocking);
        (valid, warnings.iter().map(ToString::to_string).collect())
    }

    pub fn structure_warnings(&self, root: &Utf8Path) -> Vec<StructureWarning> {
        if !root.is_dir() {
            return vec![StructureWarning::MissingRoot {
                path: root.to_path_buf(),
            }];
        }

        let mut warnings = Vec::new();
        for entry in WalkDir::new(root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let Some(path) = Utf8Path::from_path(entry.path()) else {
                continue;
            };
            let depth = entry.depth();

            if entry.file_type().is_dir() {
                if depth == 1 && !is_hidden(path) && !is_slot_dir(path) {
                    warnings.push(StructureWarning::UnrecognizedFolder {
                        path: path.to_path_buf(),
                    });
                }
                continue;
            }

            let length = path.as_str().chars().count();
            if length > MAX_PATH_LENGTH {
                warnings.push(StructureWarning::PathTooLong {
                    path: path.to_path_buf(),
                    length,
                });
            }

            let content_type = ContentType::from_path(path);
            if content_type.is_some_and(ContentType::is_script) && depth > 1 {
                warnings.push(StructureWarning::ScriptNotAtRoot {
                    path: path.to_path_buf(),
                });
            } else if depth > MAX_NESTING_DEPTH + 1 {
                warnings.push(StructureWarning::NestedTooDeep {
                    path: path.to_path_buf(),
                    depth: depth - 1,
                });
            }
        }
        warnings
    }

    /// Mod file names under `root` in the order the game loads them.
    ///
    /// Root files come first, then numbered slots by number, then terminal
    /// slots. Names sort case-insensitively within a slot. Files that are not
    /// mods are skipped.
    pub fn get_load_order(&self, root: &Utf8Path) -> Vec<String> {
        self.load_order_by_slot(root)
            .into_iter()
            .flat_map(|(_, names)| names)
            .collect()
    }

    /// Load order grouped by slot folder name; the root group is `None`.
    pub fn load_order_by_slot(&self, root: &Utf8Path) -> Vec<(Option<String>, Vec<String>)> {
        let Ok(read_dir) = root.read_dir_utf8() else {
            return Vec::new();
        };

        let mut root_files = Vec::new();
        let mut slot_dirs: Vec<(SlotRank, String, Utf8PathBuf)> = Vec::new();

        for entry in read_dir.filter_map(|e| e.ok()) {
            let name = entry.file_name().to_string();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                if let Ok(slot) = name.parse::<Slot>() {
                    let rank = self.rank(&slot);
                    slot_dirs.push((rank, name, entry.into_path()));
                }
            } else if ContentType::from_path(entry.path()).is_some() {
                root_files.push(name);
            }
        }

        sort_case_insensitive(&mut root_files);
        slot_dirs.sort_by(|a, b| {
            a.0.cmp(&b.0)
                .then_with(|| a.1.to_lowercase().cmp(&b.1.to_lowercase()))
        });

        let mut order = Vec::new();
        if !root_files.is_empty() {
            order.push((None, root_files));
        }
        for (_, name, path) in slot_dirs {
            let mut files: Vec<String> = WalkDir::new(&path)
                .min_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| !e.file_type().is_dir())
                .filter_map(|e| {
                    let path = Utf8Path::from_path(e.path())?;
                    ContentType::from_path(path)?;
                    path.file_name().map(str::to_string)
                })
                .collect();
            sort_case_insensitive(&mut files);
            if !files.is_empty() {
                order.push((Some(name), files));
            }
        }
        order
    }

    /// Move a deployed package from one slot to another.
    pub fn move_mod(
        &self,
        mod_file: &ModFile,
        from: &Slot,
        to: &Slot,
        root: &Utf8Path,
    ) -> Result<Utf8PathBuf, LoadOrderError> {
        let source = from.path_in(root).join(&mod_file.name);
        let target_dir = to.path_in(root);
        let target = target_dir.join(&mod_file.name);

        if mod_file.is_script() && !to.is_root() {
            return Err(LoadOrderError::InvalidPlacement {
                path: target,
                reason: "scripts must stay in the root folder".to_string(),
            });
        }
        if !source.exists() {
            return Err(LoadOrderError::NotFound(source));
        }

        std::fs::create_dir_all(&target_dir).map_err(|e| LoadOrderError::io(&target_dir, e))?;
        std::fs::rename(&source, &target).map_err(|e| LoadOrderError::io(&source, e))?;

        tracing::info!("Moved {} from {} to {}", mod_file.name, from, to);
        Ok(target)
    }

    /// File names that appear in more than one slot, with the slots holding them.
    pub fn detect_duplicates(&self, root: &Utf8Path) -> Vec<(String, Vec<String>)> {
        let mut seen: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (slot, names) in self.load_order_by_slot(root) {
            let slot = slot.unwrap_or_else(|| Slot::Root.to_string());
            for name in names {
                seen.entry(name).or_default().push(slot.clone());
            }
        }
        seen.into_iter()
            .filter(|(_, slots)| slots.len() > 1)
            .collect()
    }

    /// Write the load order to a text file and return the number of mods.
    pub fn export_load_order(
        &self,
        root: &Utf8Path,
        output: &Utf8Path,
    ) -> Result<usize, LoadOrderError> {
        let order = self.get_load_order(root);
        let write = || -> std::io::Result<()> {
            let mut file = std::io::BufWriter::new(std::fs::File::create(output)?);
            writeln!(file, "# Sims 4 mod load order")?;
            writeln!(file, "# Mods folder: {root}")?;
            writeln!(file, "# Total mods: {}", order.len())?;
            writeln!(file)?;
            for (idx, name) in order.iter().enumerate() {
                writeln!(file, "{:03}. {}", idx + 1, name)?;
            }
            file.flush()
        };
        write().map_err(|e| LoadOrderError::io(output, e))?;
        Ok(order.len())
    }

    fn match_keywords(&self, category: &str) -> Option<&SlotDefinition> {
        // terminal keywords win so "hair_override" is still an override
        self.slots
            .iter()
            .filter(|d| d.number.is_none())
            .chain(self.slots.iter().filter(|d| d.number.is_some()))
            .find(|d| d.keywords.iter().any(|k| category.contains(k)))
    }

    /// A slot name recorded by an earlier deployment, unless it is malformed or
    /// reuses the number of a table slot under another category.
    fn recorded_slot(&self, name: &str) -> Option<Slot> {
        let slot = name.parse::<Slot>().ok()?;
        if let Slot::Numbered { number, category } = &slot {
            let owner = self.slots.iter().find(|d| d.number == Some(*number));
            if owner.is_some_and(|d| d.category != category.as_str()) {
                tracing::warn!("Ignoring recorded slot {} (number {:03} is taken)", name, number);
                return None;
            }
        }
        Some(slot)
    }

    fn slot_for(&self, def: &SlotDefinition) -> Slot {
        match def.number {
            Some(number) => Slot::Numbered {
                number,
                category: def.category.to_string(),
            },
            None => self.terminal_slot(),
        }
    }

    fn default_slot(&self) -> Slot {
        self.slots
            .iter()
            .find(|d| d.category == DEFAULT_CATEGORY)
            .map(|d| self.slot_for(d))
            .unwrap_or_else(|| Slot::Numbered {
                number: 20,
                category: DEFAULT_CATEGORY.to_string(),
            })
    }

    fn rank(&self, slot: &Slot) -> SlotRank {
        match slot {
            Slot::Root => SlotRank::Root,
            Slot::Terminal { .. } => SlotRank::Terminal,
            Slot::Numbered { category, .. }
                if category.eq_ignore_ascii_case(&self.terminal_category) =>
            {
                SlotRank::Terminal
            }
            Slot::Numbered { number, .. } => SlotRank::Numbered(*number),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum SlotRank {
    Root,
    Numbered(u16),
    Terminal,
}

fn ensure_dir(path: &Utf8Path, created: &mut Vec<Utf8PathBuf>) -> Result<(), LoadOrderError> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(LoadOrderError::InvalidPlacement {
            path: path.to_path_buf(),
            reason: "a file is in the way of a slot folder".to_string(),
        }),
        Err(_) => {
            // create missing ancestors one at a time so each can be undone
            if let Some(parent) = path.parent() {
                if !parent.as_str().is_empty() && !parent.exists() {
                    ensure_dir(parent, created)?;
                }
            }
            std::fs::create_dir(path).map_err(|e| LoadOrderError::io(path, e))?;
            created.push(path.to_path_buf());
            Ok(())
        }
    }
}

fn is_slot_dir(path: &Utf8Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.parse::<Slot>().is_ok())
}

fn is_hidden(path: &Utf8Path) -> bool {
    path.file_name().is_some_and(|name| name.starts_with('.'))
}

fn sort_case_insensitive(names: &mut [String]) {
    names.sort_by(|a, b| {
        a.to_lowercase()
            .cmp(&b.to_lowercase())
            .then_with(|| a.cmp(b))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{fake_mod, TestDir};

    #[test]
    fn scripts_always_go_to_root() {
        let engine = LoadOrderEngine::new();
        let script = fake_mod("mc_cmd_center.ts4script", ContentType::Script, "CAS");
        let py = fake_mod("loader.py", ContentType::PlainTextScript, "Overrides");
        assert_eq!(engine.assign_slot(&script), Slot::Root);
        assert_eq!(engine.assign_slot(&py), Slot::Root);

        let root = Utf8Path::new("/games/Mods");
        assert_eq!(
            engine.destination_for(&script, root),
            Utf8PathBuf::from("/games/Mods/mc_cmd_center.ts4script")
        );
    }

    #[test]
    fn packages_follow_category_keywords() {
        let engine = LoadOrderEngine::new();
        let slot = |category: &str| {
            engine
                .assign_slot(&fake_mod("x.package", ContentType::Package, category))
                .to_string()
        };
        assert_eq!(slot("CAS"), "040_CC");
        assert_eq!(slot("Hair"), "040_CC");
        assert_eq!(slot("Tuning"), "030_Tuning");
        assert_eq!(slot("Libraries"), "010_Libraries");
        assert_eq!(slot("WickedWhims"), "000_Core");
        assert_eq!(slot("Overrides"), "ZZZ_Overrides");
        assert_eq!(slot("hair_override"), "ZZZ_Overrides");
        assert_eq!(slot("Misc"), "020_MainMods");
    }

    #[test]
    fn recorded_slot_is_used_when_category_is_unknown() {
        let engine = LoadOrderEngine::new();
        let m = fake_mod("x.package", ContentType::Package, "Misc").with_assigned_slot("015_Patches");
        assert_eq!(engine.assign_slot(&m).to_string(), "015_Patches");

        let m = fake_mod("x.package", ContentType::Package, "Misc").with_assigned_slot("garbage");
        assert_eq!(engine.assign_slot(&m).to_string(), "020_MainMods");
    }

    #[test]
    fn recorded_slot_cannot_reuse_a_table_number() {
        let engine = LoadOrderEngine::new();
        let m = fake_mod("x.package", ContentType::Package, "Misc").with_assigned_slot("040_Foo");
        assert_eq!(engine.assign_slot(&m).to_string(), "020_MainMods");

        let dir = TestDir::new();
        let root = dir.path().join("Mods");
        let mut by_category = BTreeMap::new();
        by_category.insert(
            "CAS".to_string(),
            vec![fake_mod("hair.package", ContentType::Package, "CAS")],
        );
        by_category.insert("Misc".to_string(), vec![m]);

        let slots = engine.generate_structure(&by_category, &root).unwrap();
        assert_eq!(
            slots.keys().collect::<Vec<_>>(),
            vec!["020_MainMods", "040_CC"]
        );
    }

    #[test]
    fn two_recorded_slots_with_one_number_are_rejected() {
        let dir = TestDir::new();
        let root = dir.path().join("Mods");
        let mut by_category = BTreeMap::new();
        by_category.insert(
            "Misc".to_string(),
            vec![fake_mod("a.package", ContentType::Package, "Misc").with_assigned_slot("050_Foo")],
        );
        by_category.insert(
            "Other".to_string(),
            vec![fake_mod("b.package", ContentType::Package, "Other").with_assigned_slot("050_Bar")],
        );

        let result = LoadOrderEngine::new().generate_structure(&by_category, &root);
        assert!(matches!(result, Err(LoadOrderError::InvalidSlot(msg)) if msg.contains("050")));
        assert!(!root.exists());
    }

    #[test]
    fn checked_destination_refuses_long_paths() {
        let engine = LoadOrderEngine::new();
        let root = Utf8Path::new("/games/Mods");
        let m = fake_mod("hair.package", ContentType::Package, "CAS");
        let (slot, path) = engine.checked_destination(&m, root).unwrap();
        assert_eq!(slot.to_string(), "040_CC");
        assert_eq!(path, root.join("040_CC/hair.package"));

        let long = fake_mod(&format!("{}.package", "a".repeat(MAX_PATH_LENGTH)), ContentType::Package, "CAS");
        match engine.checked_destination(&long, root) {
            Err(LoadOrderError::PathTooLong { length, limit, .. }) => {
                assert_eq!(limit, MAX_PATH_LENGTH);
                assert!(length > MAX_PATH_LENGTH);
            }
            other => panic!("expected PathTooLong, got {other:?}"),
        }
    }

    #[test]
    fn terminal_category_is_configurable() {
        let engine = LoadOrderEngine::new().with_terminal_category("Last");
        let m = fake_mod("x.package", ContentType::Package, "Overrides");
        assert_eq!(engine.assign_slot(&m).to_string(), "ZZZ_Last");
    }

    #[test]
    fn generate_structure_is_idempotent() {
        let dir = TestDir::new();
        let root = dir.path().join("Mods");
        let mut by_category = BTreeMap::new();
        by_category.insert(
            "CAS".to_string(),
            vec![fake_mod("hair.package", ContentType::Package, "CAS")],
        );
        by_category.insert(
            "ScriptMods".to_string(),
            vec![fake_mod("a.ts4script", ContentType::Script, "ScriptMods")],
        );

        let engine = LoadOrderEngine::new();
        let mut created = Vec::new();
        let slots = engine
            .generate_structure_tracked(&by_category, &root, &mut created)
            .unwrap();
        assert_eq!(slots.keys().collect::<Vec<_>>(), vec!["040_CC"]);
        assert_eq!(created, vec![root.clone(), root.join("040_CC")]);

        let mut created = Vec::new();
        let again = engine
            .generate_structure_tracked(&by_category, &root, &mut created)
            .unwrap();
        assert_eq!(again, slots);
        assert!(created.is_empty());
    }

    #[test]
    fn generate_structure_rejects_file_in_the_way() {
        let dir = TestDir::new();
        let root = dir.path().to_path_buf();
        std::fs::write(root.join("040_CC"), b"").unwrap();
        let mut by_category = BTreeMap::new();
        by_category.insert(
            "CAS".to_string(),
            vec![fake_mod("hair.package", ContentType::Package, "CAS")],
        );

        let result = LoadOrderEngine::new().generate_structure(&by_category, &root);
        assert!(matches!(result, Err(LoadOrderError::InvalidPlacement { .. })));
    }

    #[test]
    fn validate_flags_blocking_and_advisory_problems() {
        let dir = TestDir::new();
        let root = dir.path().to_path_buf();
        std::fs::create_dir_all(root.join("040_CC/deep")).unwrap();
        std::fs::create_dir_all(root.join("Random Stuff")).unwrap();
        std::fs::write(root.join("040_CC/ok.package"), b"").unwrap();
        std::fs::write(root.join("040_CC/deep/nested.package"), b"").unwrap();
        std::fs::write(root.join("040_CC/lost.ts4script"), b"").unwrap();
        std::fs::write(root.join("fine.ts4script"), b"").unwrap();

        let engine = LoadOrderEngine::new();
        let warnings = engine.structure_warnings(&root);
        assert!(warnings.contains(&StructureWarning::NestedTooDeep {
            path: root.join("040_CC/deep/nested.package"),
            depth: 2,
        }));
        assert!(warnings.contains(&StructureWarning::ScriptNotAtRoot {
            path: root.join("040_CC/lost.ts4script"),
        }));
        assert!(warnings.contains(&StructureWarning::UnrecognizedFolder {
            path: root.join("Random Stuff"),
        }));
        assert_eq!(warnings.len(), 3);

        let (valid, messages) = engine.validate_structure(&root);
        assert!(!valid);
        assert!(messages.iter().any(|m| m.contains("lost.ts4script")));
    }

    #[test]
    fn any_file_nested_too_deep_is_flagged() {
        let dir = TestDir::new();
        let root = dir.path().to_path_buf();
        std::fs::create_dir_all(root.join("040_CC/deep")).unwrap();
        std::fs::write(root.join("040_CC/readme.txt"), b"").unwrap();
        std::fs::write(root.join("040_CC/deep/readme.txt"), b"").unwrap();

        let (valid, messages) = LoadOrderEngine::new().validate_structure(&root);
        assert!(!valid);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("deep"));
    }

    #[test]
    fn long_paths_are_advisory() {
        let dir = TestDir::new();
        let root = dir.path().to_path_buf();
        let slot = root.join("040_CC");
        std::fs::create_dir_all(&slot).unwrap();
        let padding = MAX_PATH_LENGTH + 10 - slot.as_str().len() - 1 - ".package".len();
        let long = slot.join(format!("{}.package", "a".repeat(padding)));
        assert_eq!(long.as_str().len(), MAX_PATH_LENGTH + 10);
        if std::fs::write(&long, b"").is_err() {
            // file system cannot hold names this long
            return;
        }

        let (valid, messages) = LoadOrderEngine::new().validate_structure(&root);
        assert!(valid);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("260"));
        assert!(messages[0].contains(long.as_str()));
    }

    #[test]
    fn missing_root_is_invalid() {
        let dir = TestDir::new();
        let (valid, messages) = LoadOrderEngine::new().validate_structure(&dir.path().join("nope"));
        assert!(!valid);
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn load_order_sorts_root_then_slots_then_terminal() {
        let dir = TestDir::new();
        let root = dir.path().to_path_buf();
        for folder in ["ZZZ_Overrides", "040_CC", "000_Core", "notes"] {
            std::fs::create_dir_all(root.join(folder)).unwrap();
        }
        for file in [
            "ZZZ_Overrides/fix.package",
            "040_CC/b_hair.package",
            "040_CC/A_hair.package",
            "040_CC/readme.txt",
            "000_Core/core.package",
            "notes/ignored.package",
            "zz.ts4script",
            "Aa.py",
            "resource.cfg",
        ] {
            std::fs::write(root.join(file), b"").unwrap();
        }

        assert_eq!(
            LoadOrderEngine::new().get_load_order(&root),
            vec![
                "Aa.py",
                "zz.ts4script",
                "core.package",
                "A_hair.package",
                "b_hair.package",
                "fix.package",
            ]
        );
    }

    #[test]
    fn numbered_slot_named_like_terminal_loads_last() {
        let dir = TestDir::new();
        let root = dir.path().to_path_buf();
        std::fs::create_dir_all(root.join("050_Overrides")).unwrap();
        std::fs::create_dir_all(root.join("900_Late")).unwrap();
        std::fs::write(root.join("050_Overrides/o.package"), b"").unwrap();
        std::fs::write(root.join("900_Late/l.package"), b"").unwrap();

        assert_eq!(
            LoadOrderEngine::new().get_load_order(&root),
            vec!["l.package", "o.package"]
        );
    }

    #[test]
    fn load_order_of_missing_root_is_empty() {
        let dir = TestDir::new();
        assert!(LoadOrderEngine::new()
            .get_load_order(&dir.path().join("missing"))
            .is_empty());
    }

    #[test]
    fn move_between_slots() {
        let dir = TestDir::new();
        let root = dir.path().to_path_buf();
        std::fs::create_dir_all(root.join("020_MainMods")).unwrap();
        std::fs::write(root.join("020_MainMods/x.package"), b"x").unwrap();

        let engine = LoadOrderEngine::new();
        let m = fake_mod("x.package", ContentType::Package, "Misc");
        let from = Slot::numbered(20, "MainMods").unwrap();
        let to = engine.terminal_slot();
        let moved = engine.move_mod(&m, &from, &to, &root).unwrap();

        assert_eq!(moved, root.join("ZZZ_Overrides/x.package"));
        assert!(moved.exists());
        assert!(matches!(
            engine.move_mod(&m, &from, &to, &root),
            Err(LoadOrderError::NotFound(_))
        ));

        let script = fake_mod("s.ts4script", ContentType::Script, "ScriptMods");
        assert!(matches!(
            engine.move_mod(&script, &Slot::Root, &to, &root),
            Err(LoadOrderError::InvalidPlacement { .. })
        ));
    }

    #[test]
    fn duplicates_across_slots() {
        let dir = TestDir::new();
        let root = dir.path().to_path_buf();
        std::fs::create_dir_all(root.join("020_MainMods")).unwrap();
        std::fs::create_dir_all(root.join("040_CC")).unwrap();
        std::fs::write(root.join("020_MainMods/dup.package"), b"").unwrap();
        std::fs::write(root.join("040_CC/dup.package"), b"").unwrap();
        std::fs::write(root.join("040_CC/single.package"), b"").unwrap();

        assert_eq!(
            LoadOrderEngine::new().detect_duplicates(&root),
            vec![(
                "dup.package".to_string(),
                vec!["020_MainMods".to_string(), "040_CC".to_string()]
            )]
        );
    }

    #[test]
    fn export_writes_numbered_list() {
        let dir = TestDir::new();
        let root = dir.path().join("Mods");
        std::fs::create_dir_all(root.join("040_CC")).unwrap();
        std::fs::write(root.join("040_CC/hair.package"), b"").unwrap();
        std::fs::write(root.join("a.ts4script"), b"").unwrap();

        let out = dir.path().join("order.txt");
        let count = LoadOrderEngine::new().export_load_order(&root, &out).unwrap();
        assert_eq!(count, 2);

        let text = std::fs::read_to_string(&out).unwrap();
        assert!(text.contains("001. a.ts4script"));
        assert!(text.contains("002. hair.package"));
    }
}
