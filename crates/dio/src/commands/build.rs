//! `dio build` command implementation.

use std::path::{Path, PathBuf};

use clap::Args;
use dio_export::{CACHE_DIR_NAME, ExportOptions};

use super::common::{RenderArgs, run_exports};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the build command.
#[derive(Args)]
pub(crate) struct BuildArgs {
    #[command(flatten)]
    pub render: RenderArgs,
}

impl BuildArgs {
    /// Execute the build command: export every diagram under the source root.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let config = self.render.load_config()?;
        let source_dir = &config.docs_resolved.source_dir;

        output.info(&format!("Source: {}", source_dir.display()));

        let diagrams = find_diagrams(source_dir)?;
        tracing::info!(count = diagrams.len(), "found diagrams");
        if diagrams.is_empty() {
            output.warning("No .drawio files found");
            return Ok(());
        }

        let options = ExportOptions::default();
        let requests: Vec<_> = diagrams
            .iter()
            .map(|path| options.resolve(path, &config.drawio, &self.render.target))
            .collect();

        run_exports(&config, &requests, &output)?;
        output.success(&format!("Exported {} diagram(s)", requests.len()));
        Ok(())
    }
}

/// All `*.drawio` files under `root`, sorted, excluding the export cache.
fn find_diagrams(root: &Path) -> Result<Vec<PathBuf>, CliError> {
    let root_str = root.to_str().ok_or_else(|| {
        CliError::Validation(format!(
            "source directory is not valid UTF-8: {}",
            root.display()
        ))
    })?;
    let pattern = format!("{}/**/*.drawio", glob::Pattern::escape(root_str));
    let cache_dir = root.join(CACHE_DIR_NAME);

    let mut diagrams = Vec::new();
    for entry in glob::glob(&pattern).map_err(|e| CliError::Validation(e.to_string()))? {
        let path = entry.map_err(glob::GlobError::into_error)?;
        if path.is_file() && !path.starts_with(&cache_dir) {
            diagrams.push(path);
        }
    }
    diagrams.sort();
    Ok(diagrams)
}
