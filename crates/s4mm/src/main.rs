use camino::Utf8PathBuf;
use clap::builder::{styling::AnsiColor, Styles};
use clap::ColorChoice;
use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use commands::{
    backups_list, backups_restore, backups_verify, deploy_mods, show_conflicts, show_load_order,
    validate_output, DeployModsArgs, PolicyArg,
};
use miette::Result;

mod commands;
mod errors;
mod utils;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the config file (defaults to s4mm.toml next to the executable)
    #[arg(long, global = true)]
    config: Option<Utf8PathBuf>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Deploy every mod found in a directory into the game's Mods folder
    Deploy {
        /// Directory holding the mod library
        #[arg(short, long)]
        mods: Utf8PathBuf,

        /// The Mods folder to deploy into
        #[arg(short, long)]
        output: Option<Utf8PathBuf>,

        /// How to settle resource conflicts
        #[arg(long, value_enum, default_value = "auto-newest")]
        policy: PolicyArg,

        /// Mod file names to leave out (manual policy)
        #[arg(long)]
        exclude: Vec<String>,
    },
    /// List resource conflicts between the mods in a directory
    Conflicts {
        /// Directory holding the mod library
        #[arg(short, long)]
        mods: Utf8PathBuf,
    },
    /// Show the effective load order of a Mods folder
    LoadOrder {
        #[arg(short, long)]
        output: Option<Utf8PathBuf>,

        /// Also write the listing to this file
        #[arg(long)]
        export: Option<Utf8PathBuf>,
    },
    /// Check a Mods folder against the game's loading rules
    Validate {
        #[arg(short, long)]
        output: Option<Utf8PathBuf>,
    },
    /// Manage deployment backups
    Backups {
        #[command(subcommand)]
        command: BackupCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum BackupCommands {
    /// List backups, oldest first
    List,
    /// Re-hash every file in a backup
    Verify { id: String },
    /// Restore a backup over the Mods folder it was taken from
    Restore { id: String },
}

fn parse_args() -> Result<Args> {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default())
        .placeholder(AnsiColor::Blue.on_default());

    let matches = Args::command()
        .styles(styles)
        .color(ColorChoice::Auto)
        .get_matches();

    Args::from_arg_matches(&matches).map_err(|e| miette::miette!("{}", e))
}

fn main() -> Result<()> {
    let args = parse_args()?;
    let config = utils::config::load_config(args.config.as_deref())?;
    utils::logging::init_logging(args.verbose, config.log_level.as_deref());

    match args.command {
        Commands::Deploy {
            mods,
            output,
            policy,
            exclude,
        } => deploy_mods(
            &config,
            DeployModsArgs {
                mods,
                output,
                policy,
                exclude,
            },
        ),
        Commands::Conflicts { mods } => show_conflicts(&config, &mods),
        Commands::LoadOrder { output, export } => {
            show_load_order(&config, output, export.as_deref())
        }
        Commands::Validate { output } => validate_output(&config, output),
        Commands::Backups { command } => match command {
            BackupCommands::List => backups_list(&config),
            BackupCommands::Verify { id } => backups_verify(&config, &id),
            BackupCommands::Restore { id } => backups_restore(&config, &id),
        },
    }
}
