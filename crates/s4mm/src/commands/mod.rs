use crate::utils::config::AppConfig;
use s4mm_core::SysinfoProcessManager;
use s4mm_deploy::{DeployEngine, LoadOrderEngine, ZipBackupManager};
use std::sync::Arc;

mod backups;
mod conflicts;
mod deploy;
mod load_order;
mod validate;

pub use backups::{backups_list, backups_restore, backups_verify};
pub use conflicts::show_conflicts;
pub use deploy::{deploy_mods, DeployModsArgs, PolicyArg};
pub use load_order::show_load_order;
pub use validate::validate_output;

fn backup_manager(config: &AppConfig) -> ZipBackupManager {
    ZipBackupManager::new(config.backup_dir()).with_retention(config.backup_retention)
}

fn process_manager(config: &AppConfig) -> SysinfoProcessManager {
    SysinfoProcessManager::new(config.process.clone())
}

fn deploy_engine(config: &AppConfig) -> DeployEngine {
    DeployEngine::new(
        Arc::new(backup_manager(config)),
        Arc::new(process_manager(config)),
    )
    .with_config(config.deploy.clone())
}

fn load_order_engine(config: &AppConfig) -> LoadOrderEngine {
    LoadOrderEngine::new().with_terminal_category(&config.deploy.terminal_category)
}
