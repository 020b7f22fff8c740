use super::load_order_engine;
use crate::println_pad;
use crate::utils::config::AppConfig;
use camino::Utf8PathBuf;
use colored::Colorize;
use miette::Result;

pub fn validate_output(config: &AppConfig, output: Option<Utf8PathBuf>) -> Result<()> {
    let root = config.output_root(output)?;
    let engine = load_order_engine(config);
    let warnings = engine.structure_warnings(&root);

    for warning in &warnings {
        let label = if warning.is_blocking() {
            "error".bright_red().bold()
        } else {
            "warning".bright_yellow()
        };
        println_pad!("{} {}", label, warning);
    }

    let blocking = warnings.iter().filter(|w| w.is_blocking()).count();
    if blocking > 0 {
        return Err(miette::miette!(
            "{} problems in {} stop the game from loading some mods",
            blocking,
            root
        ));
    }

    println_pad!(
        "{} {} ({} advisory warnings)",
        "✅ Valid:".bright_green().bold(),
        root,
        warnings.len()
    );
    Ok(())
}
