//! Load order slots.
//!
//! The game reads mod folders alphabetically, so numbered folder prefixes fix
//! the load order: `000_Core` loads before `040_CC`, and the terminal
//! `ZZZ_Overrides` folder loads after every numbered slot. Scripts sit in the
//! output root itself, because the game ignores scripts nested deeper.

use crate::error::LoadOrderError;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MAX_SLOT_NUMBER: u16 = 999;
pub const TERMINAL_PREFIX: &str = "ZZZ";

/// Where a mod lands inside the output root.
///
/// The derived ordering is load order: root, then numbered slots by number,
/// then terminal slots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum Slot {
    /// The output root. Reserved for scripts.
    Root,
    /// `NNN_<category>`.
    Numbered { number: u16, category: String },
    /// `ZZZ_<category>`, loads last.
    Terminal { category: String },
}

impl Slot {
    pub fn numbered(number: u16, category: impl Into<String>) -> Result<Self, LoadOrderError> {
        let category = category.into();
        if number > MAX_SLOT_NUMBER {
            return Err(LoadOrderError::InvalidSlot(format!(
                "slot number {number} exceeds {MAX_SLOT_NUMBER}"
            )));
        }
        validate_category(&category)?;
        Ok(Slot::Numbered { number, category })
    }

    pub fn terminal(category: impl Into<String>) -> Result<Self, LoadOrderError> {
        let category = category.into();
        validate_category(&category)?;
        Ok(Slot::Terminal { category })
    }

    /// Folder name, or `None` for the root.
    pub fn dir_name(&self) -> Option<String> {
        match self {
            Slot::Root => None,
            Slot::Numbered { number, category } => Some(format!("{number:03}_{category}")),
            Slot::Terminal { category } => Some(format!("{TERMINAL_PREFIX}_{category}")),
        }
    }

    pub fn category(&self) -> Option<&str> {
        match self {
            Slot::Root => None,
            Slot::Numbered { category, .. } | Slot::Terminal { category } => Some(category),
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, Slot::Root)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Slot::Terminal { .. })
    }

    /// Directory this slot occupies under `root`.
    pub fn path_in(&self, root: &Utf8Path) -> Utf8PathBuf {
        match self.dir_name() {
            Some(name) => root.join(name),
            None => root.to_path_buf(),
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.dir_name() {
            Some(name) => f.write_str(&name),
            None => f.write_str("(root)"),
        }
    }
}

impl FromStr for Slot {
    type Err = LoadOrderError;

    /// Parse a slot folder name such as `042_CAS` or `ZZZ_Overrides`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LoadOrderError::InvalidSlot(s.to_string());
        let (prefix, category) = s.split_once('_').ok_or_else(invalid)?;

        if prefix == TERMINAL_PREFIX {
            return Slot::terminal(category);
        }
        if prefix.len() != 3 || !prefix.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let number = prefix.parse::<u16>().map_err(|_| invalid())?;
        Slot::numbered(number, category)
    }
}

/// Slot categories are ASCII letters, digits and underscores.
pub fn is_valid_category(category: &str) -> bool {
    !category.is_empty()
        && category
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

fn validate_category(category: &str) -> Result<(), LoadOrderError> {
    if !is_valid_category(category) {
        return Err(LoadOrderError::InvalidSlot(format!(
            "invalid slot category '{category}'"
        )));
    }
    Ok(())
}

/// One row of the built-in slot table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotDefinition {
    /// `None` for the terminal slot.
    pub number: Option<u16>,
    pub category: &'static str,
    pub description: &'static str,
    /// Lowercase fragments matched against a mod's category.
    pub keywords: &'static [&'static str],
}

/// Category used when nothing in the table matches.
pub const DEFAULT_CATEGORY: &str = "MainMods";

pub const SLOT_TABLE: &[SlotDefinition] = &[
    SlotDefinition {
        number: Some(0),
        category: "Core",
        description: "Core scripts and frameworks",
        keywords: &["core", "script", "mccc", "ui_cheats", "wickedwhims", "framework"],
    },
    SlotDefinition {
        number: Some(10),
        category: "Libraries",
        description: "Shared dependencies",
        keywords: &["librar", "lib_", "dependenc"],
    },
    SlotDefinition {
        number: Some(20),
        category: DEFAULT_CATEGORY,
        description: "Gameplay overhauls",
        keywords: &["gameplay", "mainmod"],
    },
    SlotDefinition {
        number: Some(30),
        category: "Tuning",
        description: "XML tuning mods",
        keywords: &["tuning", "xml"],
    },
    SlotDefinition {
        number: Some(40),
        category: "CC",
        description: "Custom content",
        keywords: &[
            "cas", "cc", "hair", "clothes", "skin", "buildbuy", "build", "object", "custom",
        ],
    },
    SlotDefinition {
        number: None,
        category: "Overrides",
        description: "Override mods, loaded last",
        keywords: &["override"],
    },
];
