//! Export cache key computation.
//!
//! Provides [`CacheKey`] for identifying a rendered artifact by every
//! parameter that affects its bytes.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::ExportError;
use crate::request::ExportRequest;

/// Identifier of a cache entry: hex-encoded SHA-256 (64 characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for `request` within the build rooted at `source_root`.
    ///
    /// The digest covers the source path relative to `source_root`, page
    /// index, scale, transparency and the optional width and height. The
    /// absolute location of the build never enters the key, so the same
    /// project built from another directory reuses its artifacts.
    ///
    /// # Hash Format
    ///
    /// Each field is fed to SHA-256 as an 8-byte little-endian length
    /// followed by its bytes. Optional fields are preceded by a presence
    /// byte. No two distinct parameter tuples share an encoding.
    pub fn derive(request: &ExportRequest, source_root: &Path) -> Result<Self, ExportError> {
        let relative = relative_source(&request.source, source_root)?;

        let mut hasher = Sha256::new();
        write_field(&mut hasher, &path_bytes(&relative));
        write_field(&mut hasher, request.page_index.to_string().as_bytes());
        write_field(&mut hasher, request.scale_factor().as_bytes());
        write_field(
            &mut hasher,
            if request.transparent { b"true" } else { b"false" },
        );
        write_optional(&mut hasher, request.width);
        write_optional(&mut hasher, request.height);

        Ok(Self(hex::encode(hasher.finalize())))
    }

    /// Hex digest string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn write_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

fn write_optional(hasher: &mut Sha256, value: Option<u32>) {
    match value {
        Some(v) => {
            hasher.update([1u8]);
            write_field(hasher, v.to_string().as_bytes());
        }
        None => hasher.update([0u8]),
    }
}

/// Raw bytes of a relative path, components joined by `/`.
///
/// Non-UTF-8 names keep their exact bytes so distinct names never share a key.
fn path_bytes(path: &Path) -> Vec<u8> {
    let mut bytes = Vec::new();
    for (i, component) in path.components().enumerate() {
        if i > 0 {
            bytes.push(b'/');
        }
        bytes.extend_from_slice(component.as_os_str().as_encoded_bytes());
    }
    bytes
}

/// Path of `source` relative to `source_root`.
///
/// Relative sources are taken relative to `source_root`. Both paths are
/// normalized lexically, so `docs/./a/../b.drawio` and `docs/b.drawio` agree.
pub(crate) fn relative_source(source: &Path, source_root: &Path) -> Result<PathBuf, ExportError> {
    let root = absolute(source_root)?;
    let source = if source.is_absolute() {
        normalize(source)
    } else {
        normalize(&root.join(source))
    };

    let outside = || {
        ExportError::InvalidRequest(format!(
            "source {} is outside the source root {}",
            source.display(),
            root.display()
        ))
    };
    let relative = source.strip_prefix(&root).map_err(|_| outside())?;
    if relative.as_os_str().is_empty() {
        return Err(outside());
    }
    Ok(relative.to_path_buf())
}

fn absolute(path: &Path) -> Result<PathBuf, ExportError> {
    std::path::absolute(path)
        .map(|p| normalize(&p))
        .map_err(|e| ExportError::io(path, e))
}

/// Resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}
