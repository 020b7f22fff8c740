//! Deployment configuration.
//!
//! The resource type ranges used for conflict severity are heuristics, so they
//! live here rather than in the detector. Callers normally load this from the
//! `[deploy]` table of the CLI config file.

use crate::directive::MIN_DIRECTIVE_PRIORITY;
use crate::error::ConfigError;
use crate::slot::is_valid_category;
use serde::{Deserialize, Serialize};

/// Inclusive range of resource type ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeIdRange {
    pub start: u32,
    pub end: u32,
}

impl TypeIdRange {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, type_id: u32) -> bool {
        (self.start..=self.end).contains(&type_id)
    }

    pub fn overlaps(&self, other: &TypeIdRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// Type id ranges that raise a conflict above [`Severity::Low`](crate::Severity::Low).
///
/// ```toml
/// [deploy.severity]
/// tuning = { start = 0x03000000, end = 0x03FFFFFF }
/// script = { start = 0x073F0000, end = 0x073FFFFF }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityConfig {
    /// Gameplay tuning resources. Conflicts here are [`High`](crate::Severity::High).
    pub tuning: TypeIdRange,
    /// Script-related resources. Conflicts here are [`Medium`](crate::Severity::Medium).
    pub script: TypeIdRange,
}

impl Default for SeverityConfig {
    fn default() -> Self {
        Self {
            tuning: TypeIdRange::new(0x0300_0000, 0x03FF_FFFF),
            script: TypeIdRange::new(0x073F_0000, 0x073F_FFFF),
        }
    }
}

impl SeverityConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, range) in [("tuning", &self.tuning), ("script", &self.script)] {
            if range.start > range.end {
                return Err(ConfigError::EmptyRange {
                    name: name.to_string(),
                    start: range.start,
                    end: range.end,
                });
            }
        }
        if self.tuning.overlaps(&self.script) {
            return Err(ConfigError::OverlappingRanges {
                first: "tuning".to_string(),
                second: "script".to_string(),
            });
        }
        Ok(())
    }
}

/// Settings for [`DeployEngine`](crate::DeployEngine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    pub severity: SeverityConfig,
    /// Priority written to `resource.cfg`.
    pub directive_priority: u32,
    /// Parse package indexes on the rayon pool.
    pub parallel_scan: bool,
    /// Category of the slot that always loads last (`ZZZ_<category>`).
    pub terminal_category: String,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            severity: SeverityConfig::default(),
            directive_priority: MIN_DIRECTIVE_PRIORITY,
            parallel_scan: true,
            terminal_category: "Overrides".to_string(),
        }
    }
}

impl DeployConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.severity.validate()?;
        if self.directive_priority < MIN_DIRECTIVE_PRIORITY {
            return Err(ConfigError::PriorityTooLow(self.directive_priority));
        }
        if !is_valid_category(&self.terminal_category) {
            return Err(ConfigError::InvalidTerminalCategory(
                self.terminal_category.clone(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(DeployConfig::default().validate(), Ok(()));
    }

    #[test]
    fn overlapping_ranges_are_rejected() {
        let config = SeverityConfig {
            tuning: TypeIdRange::new(0x0300_0000, 0x0800_0000),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OverlappingRanges { .. })
        ));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let config = SeverityConfig {
            script: TypeIdRange::new(10, 5),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::EmptyRange { .. })));
    }

    #[test]
    fn low_priority_is_rejected() {
        let config = DeployConfig {
            directive_priority: 10,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::PriorityTooLow(10)));
    }

    #[test]
    fn terminal_category_must_be_an_identifier() {
        for bad in ["", "Late Mods", "Café", "../up", ".hidden"] {
            let config = DeployConfig {
                terminal_category: bad.to_string(),
                ..Default::default()
            };
            assert_eq!(
                config.validate(),
                Err(ConfigError::InvalidTerminalCategory(bad.to_string())),
                "{bad:?} should be rejected"
            );
        }
        let config = DeployConfig {
            terminal_category: "Last_Word".to_string(),
            ..Default::default()
        };
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let range = TypeIdRange::new(5, 10);
        assert!(range.contains(5));
        assert!(range.contains(10));
        assert!(!range.contains(11));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: DeployConfig = serde_json::from_str(r#"{ "directive_priority": 2000 }"#).unwrap();
        assert_eq!(config.directive_priority, 2000);
        assert_eq!(config.severity, SeverityConfig::default());
    }
}
