use crate::println_pad;
use crate::utils::config::AppConfig;
use crate::utils::discover::discover_mods;
use camino::Utf8Path;
use colored::{ColoredString, Colorize};
use miette::Result;
use s4mm_deploy::{ConflictDetector, Severity};

pub fn show_conflicts(config: &AppConfig, mods_dir: &Utf8Path) -> Result<()> {
    let mods = discover_mods(mods_dir)?;
    let detector = ConflictDetector::from_config(&config.deploy);
    let report = detector.detect(&mods);

    for warning in &report.warnings {
        println_pad!("{} {}", "unreadable".bright_red(), warning);
    }

    if !report.has_conflicts() {
        println_pad!(
            "{} across {} mods",
            "✅ No conflicts".bright_green().bold(),
            mods.len()
        );
        return Ok(());
    }

    // highest severity first
    let mut entries: Vec<_> = report.conflicts.values().collect();
    entries.sort_by(|a, b| b.severity.cmp(&a.severity).then(a.resource.cmp(&b.resource)));

    println_pad!("{}", "⚠️ Conflicts:".bright_yellow().bold());
    for entry in entries {
        println_pad!(
            "   {} {} {}",
            severity_label(entry.severity),
            entry.resource.to_string().bright_white(),
            entry
                .mods
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ")
                .dimmed()
        );
    }

    let counts = report.severity_counts();
    let count = |s: Severity| counts.get(&s).copied().unwrap_or_default();
    println_pad!(
        "\n{} conflicting resources ({} high, {} medium, {} low) between {} mods",
        report.conflicts.len().to_string().bright_white().bold(),
        count(Severity::High),
        count(Severity::Medium),
        count(Severity::Low),
        report.conflicting_mods().len()
    );
    Ok(())
}

fn severity_label(severity: Severity) -> ColoredString {
    let label = format!("{:<6}", severity.to_string());
    match severity {
        Severity::High => label.bright_red().bold(),
        Severity::Medium => label.bright_yellow(),
        Severity::Low => label.dimmed(),
    }
}
