use camino::Utf8PathBuf;
use miette::Diagnostic;
use s4mm_deploy::{BackupError, ConfigError, DeployError};
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    #[error("Configuration file not found: {path}")]
    #[diagnostic(
        code(config::not_found),
        help("Pass an existing file with --config, or omit it to use s4mm.toml next to the executable")
    )]
    ConfigNotFound { path: Utf8PathBuf },

    #[error("Configuration file error in {path}")]
    #[diagnostic(
        code(config::parse_error),
        help("Check s4mm.toml for syntax errors")
    )]
    ConfigParseError {
        path: Utf8PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid deploy configuration")]
    #[diagnostic(code(config::invalid), help("Fix the [deploy] table in s4mm.toml"))]
    InvalidConfig {
        #[source]
        source: ConfigError,
    },

    #[error("No output folder given")]
    #[diagnostic(
        code(config::output_missing),
        help("Pass --output, or set output_root in s4mm.toml to the game's Mods folder")
    )]
    OutputRootMissing,

    #[error("Mods directory not found: {path}")]
    #[diagnostic(
        code(file::not_found),
        help("Make sure the directory exists and the path is correct")
    )]
    ModsDirNotFound { path: Utf8PathBuf },

    #[error("Mod scan failed at {path}")]
    #[diagnostic(code(io::scan_failed))]
    Scan {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(code(deploy::failed))]
    Deploy(#[from] DeployError),

    #[error("Deployment rolled back: {reason}")]
    #[diagnostic(
        code(deploy::rolled_back),
        help("The Mods folder was restored from backup {backup_id}. Fix the cause and deploy again")
    )]
    RolledBack { reason: String, backup_id: String },

    #[error(transparent)]
    #[diagnostic(code(backup::failed))]
    Backup(#[from] BackupError),

    #[error("Backup {id} failed verification: {reason}")]
    #[diagnostic(
        code(backup::corrupt),
        help("Restoring this backup is refused; pick another with `s4mm backups list`")
    )]
    BackupCorrupt { id: String, reason: String },

    #[error("IO operation failed")]
    #[diagnostic(code(io::operation_failed))]
    IoError {
        #[from]
        source: std::io::Error,
    },
}

impl CliError {
    pub fn scan(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Scan {
            path: path.into(),
            source,
        }
    }
}
