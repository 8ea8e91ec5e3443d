use camino::Utf8PathBuf;
use clap::builder::{styling::AnsiColor, Styles};
use clap::ColorChoice;
use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use commands::{inspect_container, patch_containers, InspectArgs, PatchArgs};
use miette::Result;

mod commands;
mod errors;
mod utils;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Give every container with an already-used id a fresh one, in place
    Patch {
        /// Directories to scan for .utoc/.ucas pairs (defaults to the configured mods directory)
        dirs: Vec<Utf8PathBuf>,

        /// Reassign every container, not just the colliding ones
        #[arg(long)]
        force: bool,

        /// Report what would change without writing to any file
        #[arg(long)]
        dry_run: bool,

        /// Print the batch report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the header, container-header entry and package ids of a .utoc file
    Inspect {
        /// The path to the .utoc file
        file_path: Utf8PathBuf,
    },
    /// Manage the configuration stored next to the executable
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the current configuration
    Show,
    /// Set the directory `patch` scans when none is given
    SetModsDir {
        /// The mods directory
        path: Utf8PathBuf,
    },
    /// Reset the configuration to defaults
    Reset,
}

fn parse_args() -> Args {
    // Configure colored/styled help output
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default())
        .placeholder(AnsiColor::Blue.on_default());

    let matches = Args::command()
        .styles(styles)
        .color(ColorChoice::Auto)
        .get_matches();

    Args::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
}

fn main() -> Result<()> {
    let args = parse_args();

    let cfg = utils::config::load_config();
    let _log_guard = utils::logging::init_logging(&cfg);

    match args.command {
        Commands::Patch {
            dirs,
            force,
            dry_run,
            json,
        } => patch_containers(PatchArgs {
            dirs,
            force,
            dry_run,
            json,
        }),
        Commands::Inspect { file_path } => inspect_container(InspectArgs { file_path }),
        Commands::Config { command } => match command {
            ConfigCommands::Show => commands::show_config(),
            ConfigCommands::SetModsDir { path } => commands::set_mods_dir(path),
            ConfigCommands::Reset => commands::reset_config(),
        },
    }
}
