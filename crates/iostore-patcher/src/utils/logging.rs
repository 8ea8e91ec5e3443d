use crate::utils::config::AppConfig;
use camino::Utf8Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_FILTER: &str = "iostore_patcher=info,iostore_core=info";

/// Install the global subscriber: console output on stderr, plus a plain-text
/// log file when enabled in the config.
///
/// The returned guard flushes the file writer on drop and must be held until
/// the program exits.
pub fn init_logging(cfg: &AppConfig) -> Option<WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_FILTER.into());

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let log_file = cfg.file_logging.then(|| cfg.resolved_log_file()).flatten();
    let (file_guard, file_layer) = match log_file.as_deref().map(file_appender) {
        Some(Ok(appender)) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false);
            (Some(guard), Some(layer))
        }
        Some(Err(e)) => {
            eprintln!("Failed to open log file: {}", e);
            (None, None)
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);
    if let Some(layer) = file_layer {
        registry.with(layer).init();
    } else {
        registry.init();
    }

    file_guard
}

/// A non-rotating appender that writes to exactly `path`.
fn file_appender(path: &Utf8Path) -> Result<RollingFileAppender, String> {
    let file_name = path
        .file_name()
        .ok_or_else(|| format!("{} is not a file path", path))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)
        .map_err(|e| format!("{}: {}", path, e))
}
