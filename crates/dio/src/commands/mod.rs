//! CLI command implementations.

pub(crate) mod build;
mod common;
pub(crate) mod export;

pub(crate) use build::BuildArgs;
pub(crate) use export::ExportArgs;
