//! Export error types.

use std::path::PathBuf;
use std::process::ExitStatus;

/// Error produced while exporting a diagram or managing the display session.
///
/// Renderer failures carry the full command line and the renderer's output
/// verbatim so the operator can reproduce the call.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The diagram source file does not exist.
    #[error("External draw.io file {} not found.", .path.display())]
    InputNotFound {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// The request is malformed or out of range.
    #[error("invalid export request: {0}")]
    InvalidRequest(String),

    /// No export format is registered for the output target.
    #[error("no export format specified for target '{target}'")]
    UnsupportedExportTarget {
        /// Output target name (e.g. `html`).
        target: String,
    },

    /// The virtual display server did not come up.
    #[error("failed to start virtual display: {message}\n[stdout]\n{stdout}\n[stderr]\n{stderr}")]
    DisplaySessionStartFailure {
        /// What went wrong.
        message: String,
        /// Captured standard output of the display server.
        stdout: String,
        /// Captured standard error of the display server.
        stderr: String,
    },

    /// A virtual display session is already live in this process.
    #[error("a virtual display session is already active")]
    DisplaySessionActive,

    /// The renderer process could not be started.
    #[error("draw.io ({command}) could not be started: {source}")]
    RendererLaunchFailure {
        /// Full command line.
        command: String,
        /// Underlying spawn error.
        source: std::io::Error,
    },

    /// The renderer exited with a non-zero status.
    #[error("draw.io ({command}) exited with {status}:\n[stderr]\n{stderr}\n[stdout]\n{stdout}")]
    RendererExecutionFailure {
        /// Full command line.
        command: String,
        /// Exit status.
        status: ExitStatus,
        /// Captured standard output.
        stdout: String,
        /// Captured standard error.
        stderr: String,
    },

    /// The renderer exited successfully without writing the artifact.
    #[error(
        "draw.io ({command}) did not produce an output file:\n[stderr]\n{stderr}\n[stdout]\n{stdout}"
    )]
    OutputMissing {
        /// Full command line.
        command: String,
        /// Captured standard output.
        stdout: String,
        /// Captured standard error.
        stderr: String,
    },

    /// Filesystem error in the export cache.
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        /// Path that caused the error.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

impl ExportError {
    /// Whether the error must fail the build.
    ///
    /// A missing input degrades to a document warning and an unknown target
    /// falls back to the default format; everything else means an image is
    /// missing from the output.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::InputNotFound { .. } | Self::UnsupportedExportTarget { .. }
        )
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
