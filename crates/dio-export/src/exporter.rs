//! Export pipeline: key derivation, cache lookup and rendering on a miss.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use dio_config::Config;
use rayon::prelude::*;

use crate::cache::ExportCache;
use crate::error::ExportError;
use crate::key::{CacheKey, relative_source};
use crate::renderer::{DrawioRenderer, Renderer};
use crate::request::ExportRequest;

/// Exports diagrams into the cache, rendering only when needed.
///
/// Safe to share across threads. Lookups and renders for the same key are
/// serialized within this process, so a key is rendered at most once at a
/// time and never read while it is being rewritten. Other processes sharing
/// the cache may still render the same key concurrently; the last write wins.
///
/// # Example
///
/// ```ignore
/// use dio_config::ExportFormat;
/// use dio_export::{DrawioRenderer, ExportRequest, Exporter};
///
/// let exporter = Exporter::new("docs", DrawioRenderer::new("/opt/draw.io/drawio"))
///     .with_display(Some(":1".to_owned()));
///
/// let path = exporter.export(&ExportRequest::new("overview.drawio", ExportFormat::Svg))?;
/// ```
pub struct Exporter {
    source_root: PathBuf,
    cache: ExportCache,
    renderer: Arc<dyn Renderer>,
    display: Option<String>,
    in_flight: Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
}

impl Exporter {
    /// Create an exporter for the build rooted at `source_root`.
    #[must_use]
    pub fn new(source_root: impl Into<PathBuf>, renderer: impl Renderer + 'static) -> Self {
        let source_root = source_root.into();
        Self {
            cache: ExportCache::new(&source_root),
            source_root,
            renderer: Arc::new(renderer),
            display: None,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Create an exporter running draw.io as configured.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.docs_resolved.source_dir.clone(),
            DrawioRenderer::from_config(&config.drawio),
        )
    }

    /// Render against this X display (`None` keeps the ambient environment).
    #[must_use]
    pub fn with_display(mut self, display: Option<String>) -> Self {
        self.display = display;
        self
    }

    /// Export one request and return the artifact path.
    ///
    /// Returns the cached artifact when it is newer than the source;
    /// otherwise renders it first.
    pub fn export(&self, request: &ExportRequest) -> Result<PathBuf, ExportError> {
        let source = if request.source.is_absolute() {
            request.source.clone()
        } else {
            self.source_root.join(&request.source)
        };

        let metadata = match fs::metadata(&source) {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return Err(ExportError::InputNotFound { path: source }),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ExportError::InputNotFound { path: source });
            }
            Err(e) => return Err(ExportError::io(source, e)),
        };

        request.validate()?;
        let key = CacheKey::derive(request, &self.source_root)?;
        let source_mtime = metadata
            .modified()
            .map_err(|e| ExportError::io(&source, e))?;

        let lock = self.key_lock(&key);
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.export_locked(request, source, &key, source_mtime)
        };
        self.release_key_lock(&key, lock);
        result
    }

    /// Cache lookup and render for one key. Callers hold the key's lock.
    fn export_locked(
        &self,
        request: &ExportRequest,
        source: PathBuf,
        key: &CacheKey,
        source_mtime: SystemTime,
    ) -> Result<PathBuf, ExportError> {
        let stem = request.stem()?;
        let resolved = self.cache.resolve(key, stem, request.format, source_mtime);
        if resolved.fresh {
            tracing::debug!(key = %key, "cache hit: {}", resolved.path.display());
            return Ok(resolved.path);
        }

        self.cache.directory_for(key)?;
        // A stale artifact left in place would pass for the renderer's output
        match fs::remove_file(&resolved.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(ExportError::io(&resolved.path, e)),
        }

        let relative = relative_source(&source, &self.source_root)?;
        let render_request = ExportRequest {
            source,
            ..request.clone()
        };
        self.renderer
            .render(&render_request, &resolved.path, self.display.as_deref())?;

        let export_rel = resolved
            .path
            .strip_prefix(&self.source_root)
            .unwrap_or(&resolved.path);
        tracing::info!(
            "(drawio) '{}' -> '{}'",
            relative.display(),
            export_rel.display()
        );

        Ok(resolved.path)
    }

    /// Export a batch in parallel.
    ///
    /// Results are returned in the order of `requests`.
    pub fn export_all(&self, requests: &[ExportRequest]) -> Vec<Result<PathBuf, ExportError>> {
        requests.par_iter().map(|r| self.export(r)).collect()
    }

    fn key_lock(&self, key: &CacheKey) -> Arc<Mutex<()>> {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(in_flight.entry(key.clone()).or_default())
    }

    /// Drop the map entry for `key` once no other export holds its lock.
    fn release_key_lock(&self, key: &CacheKey, lock: Arc<Mutex<()>>) {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one here
        if Arc::strong_count(&lock) == 2 {
            in_flight.remove(key);
        }
    }

    #[cfg(test)]
    fn in_flight_len(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
