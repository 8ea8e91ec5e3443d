use crate::errors::CliError;
use crate::utils::{config, discovery, format_id, print_ansi_boxed_lines};
use crate::println_pad;
use camino::Utf8PathBuf;
use colored::{ColoredString, Colorize};
use iostore_core::{
    BatchCoordinator, BatchOptions, BatchReport, ContainerReport, ContainerStatus, Severity,
    Warning,
};
use miette::{IntoDiagnostic, Result};

#[derive(Debug)]
pub struct PatchArgs {
    pub dirs: Vec<Utf8PathBuf>,
    pub force: bool,
    pub dry_run: bool,
    pub json: bool,
}

pub fn patch_containers(args: PatchArgs) -> Result<()> {
    let dirs = resolve_scan_dirs(args.dirs)?;
    let pairs = discovery::discover_containers(&dirs)?;
    tracing::info!("Found {} container(s) to check", pairs.len());

    let mut batch = BatchCoordinator::new(BatchOptions {
        force_reassign: args.force,
        dry_run: args.dry_run,
    });

    for paths in &pairs {
        let outcome = batch.process(paths).map(|_| ());
        if let Err(err) = outcome {
            let report = batch.into_report();
            if !args.json {
                print_summary(&report);
            }
            return Err(CliError::batch_aborted(report.containers.len(), err).into());
        }
    }

    let report = batch.into_report();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report).map_err(CliError::from)?);
    } else {
        print_summary(&report);
    }

    Ok(())
}

/// Directories given on the command line, else the configured mods directory,
/// else the current directory.
fn resolve_scan_dirs(dirs: Vec<Utf8PathBuf>) -> Result<Vec<Utf8PathBuf>> {
    if !dirs.is_empty() {
        return Ok(dirs);
    }

    if let Some(mods_dir) = config::load_config().mods_dir {
        tracing::debug!("Using configured mods directory {}", mods_dir);
        return Ok(vec![mods_dir]);
    }

    let cwd = std::env::current_dir().into_diagnostic()?;
    let cwd = Utf8PathBuf::from_path_buf(cwd)
        .map_err(|p| miette::miette!("Current directory is not UTF-8: {}", p.display()))?;
    Ok(vec![cwd])
}

fn status_label(container: &ContainerReport) -> ColoredString {
    match &container.status {
        ContainerStatus::Unchanged => "unchanged".bright_white(),
        ContainerStatus::Reassigned => "reassigned".bright_green().bold(),
        ContainerStatus::Failed { kind, .. } => format!("failed ({:?})", kind).bright_red().bold(),
    }
}

fn severity_marker(warning: &Warning) -> ColoredString {
    match warning.severity() {
        Severity::High => "!!".bright_red().bold(),
        Severity::Warning => "!".bright_yellow(),
        Severity::Info => "i".bright_cyan(),
    }
}

fn print_summary(report: &BatchReport) {
    println!();
    let title = if report.dry_run {
        "🔍 Container ids (dry run, nothing written):"
    } else {
        "🔧 Container ids:"
    };
    println_pad!("{}", title.bright_blue().bold());

    let lines: Vec<String> = report
        .containers
        .iter()
        .map(|container| {
            let ids = match (&container.status, container.new_id) {
                (ContainerStatus::Reassigned, new_id) => format!(
                    "{} -> {}",
                    format_id(container.old_id).dimmed(),
                    format_id(new_id).bright_green()
                ),
                (ContainerStatus::Failed { .. }, _) if container.old_id == 0 => String::new(),
                _ => format_id(container.old_id),
            };
            format!(
                "{} {} {}",
                container.name.bright_cyan().bold(),
                status_label(container),
                ids
            )
        })
        .collect();
    if !lines.is_empty() {
        print_ansi_boxed_lines(&lines);
    }

    for container in report.failed() {
        if let ContainerStatus::Failed { message, .. } = &container.status {
            println_pad!(
                "{} {}: {}",
                "✗".bright_red(),
                container.name.bright_white(),
                message
            );
        }
    }

    let warned: Vec<_> = report
        .containers
        .iter()
        .filter(|c| !c.warnings.is_empty())
        .collect();
    if !warned.is_empty() {
        println_pad!("\n{}", "⚠️  Warnings:".bright_yellow().bold());
        for container in warned {
            for warning in &container.warnings {
                println_pad!(
                    "   {} {}: {}",
                    severity_marker(warning),
                    container.name.bright_white(),
                    warning
                );
            }
        }
    }

    let shared: Vec<_> = report.shared_packages().collect();
    if !shared.is_empty() {
        println_pad!(
            "\n{}",
            "📦 Package ids used by more than one container:"
                .bright_magenta()
                .bold()
        );
        for (package_id, containers) in shared {
            println_pad!(
                "   {} {} {}",
                "•".bright_cyan(),
                format_id(package_id).bright_white(),
                containers.join(", ").dimmed()
            );
        }
    }

    println!();
    println_pad!(
        "{} {}  {} {}  {} {}",
        "Checked:".bright_white().bold(),
        report.containers.len(),
        "Reassigned:".bright_green().bold(),
        report.reassigned_count(),
        "Failed:".bright_red().bold(),
        report.failed_count()
    );
    println!();
}
