//! On-disk export cache.
//!
//! [`ExportCache`] stores one directory per [`CacheKey`] under the build source
//! root. Each directory holds the rendered artifact named after the source
//! file's stem:
//!
//! ```text
//! {source_root}/
//! +-- .drawio/
//!     +-- 3f2a...e1/          # cache key
//!     |   +-- overview.svg    # artifact
//!     +-- 9b07...4c/
//!         +-- overview.pdf
//! ```
//!
//! An artifact is fresh when its modification time is strictly later than
//! the source file's. Entries are never deleted here; stale artifacts are
//! overwritten by the next render. No locking happens at this layer.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use dio_config::ExportFormat;

use crate::consts::CACHE_DIR_NAME;
use crate::error::ExportError;
use crate::key::CacheKey;

/// Outcome of a cache lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Where the artifact lives (or will be written).
    pub path: PathBuf,
    /// `true` when the artifact exists and is newer than the source.
    pub fresh: bool,
}

/// Directory-per-key artifact store rooted at `{source_root}/.drawio`.
#[derive(Debug, Clone)]
pub struct ExportCache {
    root: PathBuf,
}

impl ExportCache {
    /// Create a cache for the build rooted at `source_root`.
    ///
    /// Nothing is created on disk until [`directory_for`](Self::directory_for).
    #[must_use]
    pub fn new(source_root: &Path) -> Self {
        Self {
            root: source_root.join(CACHE_DIR_NAME),
        }
    }

    /// Artifact path for a key, source stem and format.
    #[must_use]
    pub fn artifact_path(&self, key: &CacheKey, stem: &OsStr, format: ExportFormat) -> PathBuf {
        let mut file_name = stem.to_os_string();
        file_name.push(".");
        file_name.push(format.extension());
        self.root.join(key.as_str()).join(file_name)
    }

    /// Look up the artifact and report whether it can be reused.
    ///
    /// A missing or unreadable artifact counts as stale.
    #[must_use]
    pub fn resolve(
        &self,
        key: &CacheKey,
        stem: &OsStr,
        format: ExportFormat,
        source_mtime: SystemTime,
    ) -> Resolved {
        let path = self.artifact_path(key, stem, format);
        let fresh = fs::metadata(&path)
            .and_then(|meta| meta.modified())
            .is_ok_and(|artifact_mtime| artifact_mtime > source_mtime);
        Resolved { path, fresh }
    }

    /// Ensure the directory for `key` exists and return it.
    pub fn directory_for(&self, key: &CacheKey) -> Result<PathBuf, ExportError> {
        let dir = self.root.join(key.as_str());
        fs::create_dir_all(&dir).map_err(|e| ExportError::io(&dir, e))?;
        Ok(dir)
    }
}
