use crate::errors::CliError;
use crate::utils::config::{self, AppConfig};
use camino::Utf8PathBuf;
use colored::Colorize;
use miette::Result;

/// Print a config path entry with status indicator
fn print_path_config(
    name: &str,
    path: Option<&Utf8PathBuf>,
    validator: impl Fn(&Utf8PathBuf) -> bool,
) {
    match path {
        Some(p) => {
            let status = if validator(p) {
                "✓".bright_green()
            } else {
                "✗".bright_red()
            };
            println!("  {} {} {}", format!("{}:", name).bright_white(), p, status);
        }
        None => {
            println!(
                "  {} {}",
                format!("{}:", name).bright_white(),
                "(not set)".bright_yellow()
            );
        }
    }
}

pub fn show_config() -> Result<()> {
    let cfg = config::load_config();
    let config_path = config::default_config_path()
        .map(|p| p.to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    println!();
    println!("  {} {}", "config_file:".bright_white(), config_path);

    print_path_config("mods_dir", cfg.mods_dir.as_ref(), |p| p.is_dir());
    print_path_config("log_file", cfg.resolved_log_file().as_ref(), |p| {
        p.parent().is_some_and(|dir| dir.as_str().is_empty() || dir.is_dir())
    });
    println!("  {} {}", "file_logging:".bright_white(), cfg.file_logging);

    println!();
    Ok(())
}

pub fn set_mods_dir(path: Utf8PathBuf) -> Result<()> {
    if !path.is_dir() {
        return Err(CliError::invalid_directory(path).into());
    }

    let mut cfg = config::load_config();
    cfg.mods_dir = Some(path.clone());
    config::save_config(&cfg).map_err(CliError::config_save_failed)?;

    println!(
        "{}",
        "✓ Mods directory set successfully!".bright_green().bold()
    );
    println!();
    println!(
        "  {} {}",
        "Path:".bright_white().bold(),
        path.as_str().bright_green()
    );

    Ok(())
}

pub fn reset_config() -> Result<()> {
    let config_path = config::default_config_path()
        .map(|p| p.to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    config::save_config(&AppConfig::default()).map_err(CliError::config_save_failed)?;

    println!(
        "{}",
        "✓ Configuration reset to defaults".bright_green().bold()
    );
    println!();
    println!("  {} {}", "Config file:".bright_white().bold(), config_path);
    println!();
    println!(
        "  {}",
        "Run 'iostore-patcher config set-mods-dir <DIR>' to choose a default scan directory"
            .bright_cyan()
    );

    Ok(())
}
