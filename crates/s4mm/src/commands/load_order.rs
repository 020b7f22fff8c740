use super::load_order_engine;
use crate::errors::CliError;
use crate::println_pad;
use crate::utils::config::AppConfig;
use camino::{Utf8Path, Utf8PathBuf};
use colored::Colorize;
use miette::Result;
use s4mm_deploy::{DeployError, Slot};

pub fn show_load_order(
    config: &AppConfig,
    output: Option<Utf8PathBuf>,
    export: Option<&Utf8Path>,
) -> Result<()> {
    let root = config.output_root(output)?;
    let engine = load_order_engine(config);
    let groups = engine.load_order_by_slot(&root);

    println_pad!(
        "{} {}",
        "📂 Load order of".bright_blue().bold(),
        root.as_str().bright_cyan()
    );
    if groups.is_empty() {
        println_pad!("   {}", "(no mods)".dimmed());
    }

    let mut position = 0;
    for (slot, names) in &groups {
        let heading = slot.as_deref().unwrap_or("(root)");
        let description = slot
            .as_deref()
            .map_or(Some(Slot::Root), |name| name.parse::<Slot>().ok())
            .and_then(|slot| engine.slot_description(&slot));
        match description {
            Some(desc) => println_pad!(
                "\n{} {}",
                heading.bright_magenta().bold(),
                format!("- {desc}").dimmed()
            ),
            None => println_pad!("\n{}", heading.bright_magenta().bold()),
        }
        for name in names {
            position += 1;
            println_pad!("   {} {}", format!("{position:>4}.").dimmed(), name);
        }
    }

    for (name, slots) in engine.detect_duplicates(&root) {
        println_pad!(
            "{} {} is in {}",
            "duplicate".bright_yellow(),
            name,
            slots.join(", ")
        );
    }

    if let Some(export) = export {
        let count = engine
            .export_load_order(&root, export)
            .map_err(|e| CliError::from(DeployError::from(e)))?;
        println_pad!(
            "\n{} {} mods to {}",
            "📝 Exported".bright_green(),
            count,
            export
        );
    }
    Ok(())
}
