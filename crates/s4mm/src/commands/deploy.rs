use super::deploy_engine;
use crate::errors::CliError;
use crate::println_pad;
use crate::utils::config::AppConfig;
use crate::utils::discover::discover_mods;
use camino::Utf8PathBuf;
use colored::Colorize;
use miette::Result;
use s4mm_deploy::{ConflictPolicy, DeploymentResult, PlacementMethod};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum PolicyArg {
    /// Keep the newest mod of each conflicting group
    AutoNewest,
    /// Leave out every mod involved in a conflict
    SkipConflicting,
    /// Leave out the mods named with --exclude; fail if conflicts remain
    Manual,
}

#[derive(Debug)]
pub struct DeployModsArgs {
    pub mods: Utf8PathBuf,
    pub output: Option<Utf8PathBuf>,
    pub policy: PolicyArg,
    pub exclude: Vec<String>,
}

impl DeployModsArgs {
    fn conflict_policy(&self) -> ConflictPolicy {
        match self.policy {
            PolicyArg::AutoNewest => ConflictPolicy::AutoNewest,
            PolicyArg::SkipConflicting => ConflictPolicy::SkipConflicting,
            PolicyArg::Manual => ConflictPolicy::Manual {
                excluded: self.exclude.iter().cloned().collect(),
            },
        }
    }
}

pub fn deploy_mods(config: &AppConfig, args: DeployModsArgs) -> Result<()> {
    let output_root = config.output_root(args.output.clone())?;
    let mods = discover_mods(&args.mods)?;
    let policy = args.conflict_policy();
    if !args.exclude.is_empty() && !matches!(policy, ConflictPolicy::Manual { .. }) {
        tracing::warn!("--exclude only applies to the manual policy");
    }

    println_pad!(
        "{} {} mods from {} into {}",
        "🚀 Deploying".bright_blue().bold(),
        mods.len().to_string().bright_white().bold(),
        args.mods.as_str().bright_cyan(),
        output_root.as_str().bright_cyan()
    );

    let engine = deploy_engine(config).with_progress(|p| match &p.current_file {
        Some(file) => println_pad!(
            "   {} {} {}",
            "•".bright_cyan(),
            format!("[{}/{}]", p.current, p.total).dimmed(),
            file
        ),
        None => println_pad!("{} {}", "▶".bright_blue(), p.state.to_string().bright_white()),
    });

    let result = engine
        .deploy(&mods, &output_root, &policy)
        .map_err(CliError::from)?;
    print_resolution(&result);

    if !result.success {
        let reason = result
            .failures
            .first()
            .map(|f| match &f.mod_file {
                Some(m) => format!("{}: {}", m.name, f.error),
                None => f.error.to_string(),
            })
            .unwrap_or_else(|| "unknown failure".to_string());
        return Err(CliError::RolledBack {
            reason,
            backup_id: result.backup_id.to_string(),
        }
        .into());
    }

    let mut methods: BTreeMap<String, usize> = BTreeMap::new();
    for placed in &result.deployed {
        *methods.entry(placed.method.to_string()).or_default() += 1;
    }
    let methods = methods
        .iter()
        .map(|(method, count)| format!("{count} {method}"))
        .collect::<Vec<_>>()
        .join(", ");

    println_pad!(
        "\n{} {} mods in {:.2?} ({})",
        "✅ Deployed".bright_green().bold(),
        result.deployed.len().to_string().bright_white().bold(),
        result.elapsed,
        methods
    );
    if result.deployed.iter().any(|d| d.method == PlacementMethod::Copy) {
        println_pad!(
            "   {}",
            "Some files were copied; changes in the library will not show until the next deploy"
                .dimmed()
        );
    }
    println_pad!("   {} {}", "Backup:".bright_white(), result.backup_id);
    Ok(())
}

fn print_resolution(result: &DeploymentResult) {
    let resolution = &result.conflicts;
    if !resolution.conflicts.is_empty() {
        println_pad!(
            "{} {} resources declared by more than one mod",
            "⚠️ Conflicts:".bright_yellow().bold(),
            resolution.conflicts.len()
        );
    }
    for name in &resolution.excluded {
        println_pad!("   {} {}", "skipped".bright_yellow(), name);
    }
    for warning in &resolution.warnings {
        println_pad!("   {} {}", "unreadable".bright_red(), warning);
    }
}
