use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    #[error("Directory not found: {path}")]
    #[diagnostic(
        code(discovery::invalid_directory),
        help("Pass a directory that contains .utoc/.ucas pairs, or set one with 'iostore-patcher config set-mods-dir <DIR>'")
    )]
    InvalidDirectory { path: Utf8PathBuf },

    #[error("No .utoc files found")]
    #[diagnostic(
        code(discovery::no_containers),
        help("Searched: {searched}. IoStore mods usually live in a '~mods' folder next to the game's .pak files")
    )]
    NoContainersFound { searched: String },

    #[error("Batch aborted after {processed} container(s)")]
    #[diagnostic(
        code(batch::aborted),
        help("Containers processed before the abort have already been patched. Re-running the batch is safe")
    )]
    BatchAborted {
        processed: usize,
        #[source]
        source: iostore_core::Error,
    },

    #[error("Failed to read {path}")]
    #[diagnostic(
        code(inspect::read_failed),
        help("Make sure the file is an unencrypted IoStore table of contents (.utoc)")
    )]
    InspectFailed {
        path: Utf8PathBuf,
        #[source]
        source: iostore_core::Error,
    },

    #[error("Failed to save configuration")]
    #[diagnostic(
        code(config::save_failed),
        help("Check that the directory containing the executable is writable")
    )]
    ConfigSaveFailed {
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize report")]
    #[diagnostic(code(report::serialize_failed))]
    ReportSerializeFailed {
        #[from]
        source: serde_json::Error,
    },
}

impl CliError {
    pub fn invalid_directory(path: Utf8PathBuf) -> Self {
        Self::InvalidDirectory { path }
    }

    pub fn no_containers_found(searched: &[Utf8PathBuf]) -> Self {
        let searched = searched
            .iter()
            .map(|path| path.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Self::NoContainersFound { searched }
    }

    pub fn batch_aborted(processed: usize, source: iostore_core::Error) -> Self {
        Self::BatchAborted { processed, source }
    }

    pub fn inspect_failed(path: Utf8PathBuf, source: iostore_core::Error) -> Self {
        Self::InspectFailed { path, source }
    }

    pub fn config_save_failed(source: std::io::Error) -> Self {
        Self::ConfigSaveFailed { source }
    }
}
