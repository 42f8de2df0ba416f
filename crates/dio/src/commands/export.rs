//! `dio export` command implementation.

use std::path::PathBuf;

use clap::Args;
use dio_config::ExportFormat;
use dio_export::ExportOptions;

use super::common::{RenderArgs, run_exports};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the export command.
#[derive(Args)]
pub(crate) struct ExportArgs {
    /// Diagram files to export (relative to the current directory).
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Output format (default: the target's configured format).
    #[arg(short, long)]
    format: Option<ExportFormat>,

    /// Zero-based page to export.
    #[arg(long)]
    page_index: Option<u32>,

    /// Export scale in percent (default: from config).
    #[arg(long)]
    scale: Option<u32>,

    /// Transparent background; `--transparent false` overrides a config default of true.
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    transparent: Option<bool>,

    /// Fit the export to this width.
    #[arg(long)]
    width: Option<u32>,

    /// Fit the export to this height.
    #[arg(long)]
    height: Option<u32>,

    #[command(flatten)]
    pub render: RenderArgs,
}

impl ExportArgs {
    /// Execute the export command.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let config = self.render.load_config()?;

        let options = ExportOptions {
            format: self.format,
            page_index: self.page_index,
            transparency: self.transparent,
            export_scale: self.scale,
            export_width: self.width,
            export_height: self.height,
        };

        let requests = self
            .files
            .iter()
            .map(|file| {
                let source = std::path::absolute(file)?;
                Ok(options.resolve(&source, &config.drawio, &self.render.target))
            })
            .collect::<Result<Vec<_>, std::io::Error>>()?;

        output.info(&format!(
            "Source: {}",
            config.docs_resolved.source_dir.display()
        ));
        run_exports(&config, &requests, &output)
    }
}
