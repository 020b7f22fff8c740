use super::{backup_manager, process_manager};
use crate::errors::CliError;
use crate::println_pad;
use crate::utils::config::AppConfig;
use crate::utils::format_size;
use colored::Colorize;
use miette::Result;
use s4mm_core::ProcessManager;
use s4mm_deploy::lock::OutputRootLock;
use s4mm_deploy::{BackupId, BackupManager, DeployError};

pub fn backups_list(config: &AppConfig) -> Result<()> {
    let manager = backup_manager(config);
    let ids = manager.list().map_err(CliError::from)?;

    println_pad!(
        "{} {}",
        "🗄️ Backups in".bright_blue().bold(),
        manager.backup_dir().as_str().bright_cyan()
    );
    if ids.is_empty() {
        println_pad!("   {}", "(none)".dimmed());
        return Ok(());
    }

    for id in ids {
        match manager.info(&id) {
            Ok(info) => println_pad!(
                "   {} {} {} {}",
                id.as_str().bright_white().bold(),
                info.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string().dimmed(),
                format!("{} files, {}", info.file_count, format_size(info.total_size)),
                info.source_root.as_str().bright_cyan()
            ),
            Err(err) => println_pad!(
                "   {} {}",
                id.as_str().bright_white().bold(),
                format!("unreadable: {err}").bright_red()
            ),
        }
    }
    Ok(())
}

pub fn backups_verify(config: &AppConfig, id: &str) -> Result<()> {
    let manager = backup_manager(config);
    let id = BackupId::new(id);
    let (ok, message) = manager.verify(&id);
    if !ok {
        return Err(CliError::BackupCorrupt {
            id: id.to_string(),
            reason: message,
        }
        .into());
    }
    println_pad!("{} {}: {}", "✅ Verified".bright_green().bold(), id, message);
    Ok(())
}

/// Verify, then restore under the output root lock.
pub fn backups_restore(config: &AppConfig, id: &str) -> Result<()> {
    let manager = backup_manager(config);
    let id = BackupId::new(id);
    let info = manager.info(&id).map_err(CliError::from)?;

    if process_manager(config).is_host_game_running() {
        return Err(CliError::from(DeployError::HostRunning).into());
    }
    let (ok, message) = manager.verify(&id);
    if !ok {
        return Err(CliError::BackupCorrupt {
            id: id.to_string(),
            reason: message,
        }
        .into());
    }

    let _lock = OutputRootLock::acquire(&info.source_root).map_err(CliError::from)?;
    manager.restore(&id).map_err(CliError::from)?;

    println_pad!(
        "{} {} to {}",
        "♻️ Restored".bright_green().bold(),
        id,
        info.source_root
    );
    Ok(())
}
