//! CLI error types.

use dio_config::ConfigError;
use dio_export::ExportError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Export(#[from] ExportError),

    #[error("{0} diagram(s) failed to export")]
    Failed(usize),

    #[error("{0}")]
    Validation(String),
}
