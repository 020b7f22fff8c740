//! Application configuration stored in `s4mm.toml`.

use crate::errors::CliError;
use camino::{Utf8Path, Utf8PathBuf};
use s4mm_core::ProcessConfig;
use s4mm_deploy::DeployConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;

pub const CONFIG_FILE_NAME: &str = "s4mm.toml";

/// Application-wide configuration.
///
/// ```toml
/// output_root = "C:/Users/me/Documents/Electronic Arts/The Sims 4/Mods"
/// backup_retention = 10
/// log_level = "info"
///
/// [deploy]
/// directive_priority = 1000
///
/// [process]
/// game_process_names = ["TS4_x64.exe"]
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// The game's Mods folder.
    pub output_root: Option<Utf8PathBuf>,
    /// Where backup archives go. Defaults to `backups` next to the executable.
    pub backup_dir: Option<Utf8PathBuf>,
    pub backup_retention: usize,
    pub log_level: Option<String>,
    pub deploy: DeployConfig,
    pub process: ProcessConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_root: None,
            backup_dir: None,
            backup_retention: 10,
            log_level: None,
            deploy: DeployConfig::default(),
            process: ProcessConfig::default(),
        }
    }
}

impl AppConfig {
    /// `--output` if given, else the configured output root.
    pub fn output_root(&self, arg: Option<Utf8PathBuf>) -> Result<Utf8PathBuf, CliError> {
        arg.or_else(|| self.output_root.clone())
            .ok_or(CliError::OutputRootMissing)
    }

    pub fn backup_dir(&self) -> Utf8PathBuf {
        self.backup_dir
            .clone()
            .or_else(|| install_dir().map(|dir| dir.join("backups")))
            .unwrap_or_else(|| Utf8PathBuf::from("backups"))
    }
}

/// Returns the directory where the current executable resides.
pub fn install_dir() -> Option<Utf8PathBuf> {
    let exe = env::current_exe().ok()?;
    let parent = exe.parent()?;
    Utf8PathBuf::from_path_buf(parent.to_path_buf()).ok()
}

/// Returns the default configuration file path, next to the executable.
pub fn default_config_path() -> Option<Utf8PathBuf> {
    install_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Load the configuration from `path`, or from the default location.
///
/// A missing default file yields defaults; a missing explicit file is an error.
pub fn load_config(path: Option<&Utf8Path>) -> Result<AppConfig, CliError> {
    let (path, explicit) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => match default_config_path() {
            Some(path) => (path, false),
            None => return Ok(AppConfig::default()),
        },
    };

    if !path.is_file() {
        if explicit {
            return Err(CliError::ConfigNotFound { path });
        }
        return Ok(AppConfig::default());
    }

    let content = fs::read_to_string(&path)?;
    parse_config(&path, &content)
}

fn parse_config(path: &Utf8Path, content: &str) -> Result<AppConfig, CliError> {
    let cfg: AppConfig = toml::from_str(content).map_err(|source| CliError::ConfigParseError {
        path: path.to_path_buf(),
        source,
    })?;
    cfg.deploy
        .validate()
        .map_err(|source| CliError::InvalidConfig { source })?;
    Ok(cfg)
}
