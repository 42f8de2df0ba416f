//! draw.io diagram export for dio.
//!
//! This crate turns `.drawio` source files into image artifacts during a
//! documentation build and reuses earlier renders whose inputs are unchanged:
//! - [`CacheKey`] identifies an artifact by its rendering parameters
//! - [`ExportCache`] stores artifacts under `{source_root}/.drawio/{key}/`
//! - [`DrawioRenderer`] runs the draw.io binary and classifies its failures
//! - [`DisplaySessionManager`] runs `Xvfb` when there is no display
//! - [`BuildSession`] ties the display session to the build's lifetime
//! - [`Exporter`] drives the whole pipeline
//!
//! # Example
//!
//! ```ignore
//! use dio_config::Config;
//! use dio_export::{BuildSession, DisplaySessionManager, ExportError, ExportOptions, Exporter};
//!
//! let config = Config::load(None, None)?;
//! let manager = DisplaySessionManager::new();
//!
//! BuildSession::scope(&manager, &config.drawio, |session| {
//!     let exporter = Exporter::from_config(&config).with_display(session.display());
//!     let request = ExportOptions::default().resolve("overview.drawio".as_ref(), &config.drawio, "html");
//!     let artifact = exporter.export(&request)?;
//!     Ok::<_, ExportError>(artifact)
//! })?;
//! ```

mod cache;
mod consts;
mod display;
mod error;
mod exporter;
mod key;
mod lifecycle;
mod renderer;
mod request;

pub use cache::{ExportCache, Resolved};
pub use consts::CACHE_DIR_NAME;
pub use display::{DisplaySession, DisplaySessionManager};
pub use error::ExportError;
pub use exporter::Exporter;
pub use key::CacheKey;
pub use lifecycle::BuildSession;
pub use renderer::{DrawioRenderer, Renderer};
pub use request::{ExportOptions, ExportRequest, target_format};
