//! Arguments and export driver shared by `export` and `build`.

use std::path::PathBuf;

use clap::Args;
use dio_config::{CliSettings, Config, HeadlessPolicy};
use dio_export::{BuildSession, DisplaySessionManager, ExportRequest, Exporter};

use crate::error::CliError;
use crate::output::Output;

/// Configuration and renderer flags.
#[derive(Args)]
pub(crate) struct RenderArgs {
    /// Path to configuration file (default: auto-discover dio.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Build source directory (overrides config).
    #[arg(short, long)]
    source_dir: Option<PathBuf>,

    /// draw.io binary (overrides config).
    #[arg(long, env = "DIO_DRAWIO_BINARY")]
    binary: Option<String>,

    /// Virtual display policy: auto, always or never (overrides config).
    #[arg(long)]
    headless: Option<HeadlessPolicy>,

    /// Pass --no-sandbox to draw.io (needed when running as root in containers).
    #[arg(long)]
    no_sandbox: bool,

    /// Output target whose export format applies (e.g. html, latex).
    #[arg(short, long, default_value = "html")]
    pub target: String,

    /// Enable verbose output (show render and cache logs).
    #[arg(short, long)]
    pub verbose: bool,
}

impl RenderArgs {
    /// Load config with these flags applied.
    pub(crate) fn load_config(&self) -> Result<Config, CliError> {
        let cli_settings = CliSettings {
            source_dir: self.source_dir.clone(),
            binary_path: self.binary.clone(),
            headless: self.headless,
            no_sandbox: self.no_sandbox.then_some(true),
            ..CliSettings::default()
        };
        Ok(Config::load(self.config.as_deref(), Some(&cli_settings))?)
    }
}

/// Export `requests` inside a build session and report each result.
///
/// Missing inputs are reported as warnings. Any other failure fails the
/// command once every request has been attempted.
pub(crate) fn run_exports(
    config: &Config,
    requests: &[ExportRequest],
    output: &Output,
) -> Result<(), CliError> {
    let manager = DisplaySessionManager::new();

    BuildSession::scope(&manager, &config.drawio, |session| {
        let exporter = Exporter::from_config(config).with_display(session.display());
        let results = exporter.export_all(requests);

        let mut failed = 0;
        for (request, result) in requests.iter().zip(results) {
            match result {
                Ok(path) => output.success(&format!(
                    "{} -> {}",
                    request.source.display(),
                    path.display()
                )),
                Err(err) if !err.is_fatal() => output.warning(&format!("Warning: {err}")),
                Err(err) => {
                    output.error(&format!("{}: {err}", request.source.display()));
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            return Err(CliError::Failed(failed));
        }
        Ok(())
    })
}
