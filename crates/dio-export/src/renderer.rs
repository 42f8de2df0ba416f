//! draw.io renderer invocation.
//!
//! The renderer is the draw.io desktop binary run in export mode:
//!
//! ```text
//! drawio --export --crop --page-index <n> [--scale <s>] [--width <w>] [--height <h>]
//!        [--transparent] --format <fmt> --output <path> <input> [--no-sandbox]
//! ```
//!
//! The call blocks until the process exits. There is no timeout.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use dio_config::DrawioConfig;

use crate::error::ExportError;
use crate::request::ExportRequest;

/// Something that turns an export request into an artifact file.
///
/// Implementations must be thread-safe (`Send + Sync`) for use with parallel
/// exports.
pub trait Renderer: Send + Sync {
    /// Render `request` into `target`.
    ///
    /// `display` is the X display to render against, or `None` to use the
    /// ambient environment unchanged. Succeeds only if `target` exists
    /// afterwards.
    fn render(
        &self,
        request: &ExportRequest,
        target: &Path,
        display: Option<&str>,
    ) -> Result<(), ExportError>;
}

/// [`Renderer`] backed by the draw.io desktop binary.
#[derive(Debug, Clone)]
pub struct DrawioRenderer {
    binary: PathBuf,
    no_sandbox: bool,
}

impl DrawioRenderer {
    /// Create a renderer that runs `binary`.
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            no_sandbox: false,
        }
    }

    /// Create a renderer from the `[drawio]` config section.
    #[must_use]
    pub fn from_config(config: &DrawioConfig) -> Self {
        Self::new(config.binary()).no_sandbox(config.no_sandbox)
    }

    /// Append `--no-sandbox` to every invocation.
    #[must_use]
    pub fn no_sandbox(mut self, no_sandbox: bool) -> Self {
        self.no_sandbox = no_sandbox;
        self
    }

    /// Arguments for exporting `request` into `target` (binary excluded).
    #[must_use]
    pub fn args(&self, request: &ExportRequest, target: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--export".into(),
            "--crop".into(),
            "--page-index".into(),
            request.page_index.to_string().into(),
        ];

        if !request.omits_scale() {
            args.push("--scale".into());
            args.push(request.scale_factor().into());
        }
        if let Some(width) = request.width {
            args.push("--width".into());
            args.push(width.to_string().into());
        }
        if let Some(height) = request.height {
            args.push("--height".into());
            args.push(height.to_string().into());
        }
        if request.transparent {
            args.push("--transparent".into());
        }

        args.push("--format".into());
        args.push(request.format.extension().into());
        args.push("--output".into());
        args.push(target.into());
        args.push(request.source.clone().into());

        // draw.io only honors this when it is the last argument
        if self.no_sandbox {
            args.push("--no-sandbox".into());
        }

        args
    }

    /// Human-readable command line for diagnostics.
    fn command_line(&self, args: &[OsString]) -> String {
        std::iter::once(self.binary.as_os_str())
            .chain(args.iter().map(OsString::as_os_str))
            .map(|arg| arg.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Renderer for DrawioRenderer {
    fn render(
        &self,
        request: &ExportRequest,
        target: &Path,
        display: Option<&str>,
    ) -> Result<(), ExportError> {
        let args = self.args(request, target);
        let command = self.command_line(&args);

        let mut cmd = Command::new(&self.binary);
        cmd.args(&args);
        if let Some(display) = display {
            cmd.env("DISPLAY", display);
        }

        tracing::debug!(command = %command, "running draw.io");
        let output = cmd
            .output()
            .map_err(|source| ExportError::RendererLaunchFailure {
                command: command.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(ExportError::RendererExecutionFailure {
                command,
                status: output.status,
                stdout,
                stderr,
            });
        }

        if !target.exists() {
            return Err(ExportError::OutputMissing {
                command,
                stdout,
                stderr,
            });
        }

        Ok(())
    }
}
