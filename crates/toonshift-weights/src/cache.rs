//! Weight download and local cache
//!
//! Downloaded assets land in a cache directory keyed by filename; a blake3
//! digest sidecar written at download time is re-verified whenever a cached
//! file is reused, so a truncated download never silently feeds the network.

use crate::style::{asset_filename, WeightSource, ASSET_HOST};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Errors from weight resolution
#[derive(Debug, Error)]
pub enum WeightError {
    #[error("weight file not found: {0}")]
    NotFound(PathBuf),

    #[error("download of {url} failed: {message}")]
    Download { url: String, message: String },

    #[error("cached weight {path} is corrupt: digest {actual} != recorded {expected}")]
    DigestMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Filename-keyed cache for downloaded weight assets.
#[derive(Debug, Clone)]
pub struct WeightCache {
    dir: PathBuf,
}

impl WeightCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Platform cache directory, falling back to a hidden dir in cwd.
    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("toonshift")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolve a weight source to a local file, downloading a named asset on
    /// first use and reusing the cached copy afterwards.
    pub fn resolve(&self, source: &WeightSource) -> Result<PathBuf, WeightError> {
        match source {
            WeightSource::File(path) => {
                if path.is_file() {
                    Ok(path.clone())
                } else {
                    Err(WeightError::NotFound(path.clone()))
                }
            }
            WeightSource::Named(name) => self.fetch(name),
        }
    }

    fn fetch(&self, name: &str) -> Result<PathBuf, WeightError> {
        let filename = asset_filename(name);
        let path = self.dir.join(&filename);

        if path.is_file() {
            self.verify(&path)?;
            debug!(path = %path.display(), "using cached weights");
            return Ok(path);
        }

        let url = format!("{ASSET_HOST}/{filename}");
        info!(%url, "downloading pretrained weights");

        let mut response = ureq::get(&url).call().map_err(|e| WeightError::Download {
            url: url.clone(),
            message: e.to_string(),
        })?;
        let mut bytes = Vec::new();
        response
            .body_mut()
            .as_reader()
            .read_to_end(&mut bytes)
            .map_err(|e| WeightError::Download {
                url: url.clone(),
                message: e.to_string(),
            })?;

        self.store(&path, &bytes)?;

        info!(path = %path.display(), bytes = bytes.len(), "weights cached");
        Ok(path)
    }

    /// Write a downloaded asset and its digest sidecar.
    ///
    /// The payload is staged in a temp file and renamed into place only after
    /// the sidecar exists, so an interrupted download never leaves an entry
    /// that a later [`verify`](Self::verify) would trust.
    fn store(&self, path: &Path, bytes: &[u8]) -> Result<(), WeightError> {
        std::fs::create_dir_all(&self.dir)?;

        let mut staged = tempfile::NamedTempFile::new_in(&self.dir)?;
        staged.write_all(bytes)?;
        std::fs::write(digest_path(path), blake3::hash(bytes).to_hex().as_str())?;
        staged.persist(path).map_err(|e| WeightError::Io(e.error))?;
        Ok(())
    }

    /// Check the cached file against its digest sidecar, when one exists.
    fn verify(&self, path: &Path) -> Result<(), WeightError> {
        let sidecar = digest_path(path);
        let Ok(expected) = std::fs::read_to_string(&sidecar) else {
            // Hand-placed files carry no sidecar; trust them.
            return Ok(());
        };
        let expected = expected.trim().to_string();

        let bytes = std::fs::read(path)?;
        let actual = blake3::hash(&bytes).to_hex().to_string();
        if actual != expected {
            return Err(WeightError::DigestMismatch {
                path: path.to_path_buf(),
                expected,
                actual,
            });
        }
        Ok(())
    }
}

fn digest_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".b3");
    PathBuf::from(os)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_file_source() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("custom.pth");
        std::fs::write(&file, b"weights").unwrap();

        let cache = WeightCache::new(dir.path().join("cache"));
        let resolved = cache
            .resolve(&WeightSource::File(file.clone()))
            .unwrap();
        assert_eq!(resolved, file);
    }

    #[test]
    fn test_missing_local_file() {
        let cache = WeightCache::new("/tmp/toonshift-test-cache");
        let result = cache.resolve(&WeightSource::File("/nonexistent.pth".into()));
        assert!(matches!(result, Err(WeightError::NotFound(_))));
    }

    #[test]
    fn test_cached_asset_skips_download() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = WeightCache::new(dir.path());

        // Seed the cache as a previous download would have left it. Resolving
        // must return this file without touching the network (the host in
        // ASSET_HOST is unreachable from tests anyway).
        let body = b"pretrained bytes";
        let path = dir.path().join("generator_hayao.pth");
        std::fs::write(&path, body).unwrap();
        std::fs::write(
            digest_path(&path),
            blake3::hash(body).to_hex().as_str(),
        )
        .unwrap();

        let resolved = cache
            .resolve(&WeightSource::Named("hayao".to_string()))
            .unwrap();
        assert_eq!(resolved, path);

        // Second resolution reuses the same cached file.
        let again = cache
            .resolve(&WeightSource::Named("hayao".to_string()))
            .unwrap();
        assert_eq!(again, path);
    }

    #[test]
    fn test_corrupt_cache_detected() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = WeightCache::new(dir.path());

        let path = dir.path().join("generator_shinkai.pth");
        std::fs::write(&path, b"original").unwrap();
        std::fs::write(
            digest_path(&path),
            blake3::hash(b"original").to_hex().as_str(),
        )
        .unwrap();
        // Corrupt the payload after the digest was recorded.
        std::fs::write(&path, b"truncated").unwrap();

        let result = cache.resolve(&WeightSource::Named("shinkai".to_string()));
        assert!(matches!(result, Err(WeightError::DigestMismatch { .. })));
    }

    #[test]
    fn test_store_leaves_verified_entry() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = WeightCache::new(dir.path());
        let path = dir.path().join("generator_hayao.pth");

        cache.store(&path, b"payload").unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"payload");
        let recorded = std::fs::read_to_string(digest_path(&path)).unwrap();
        assert_eq!(recorded, blake3::hash(b"payload").to_hex().as_str());
        cache.verify(&path).unwrap();

        // Nothing left behind besides the entry and its sidecar.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_sidecarless_file_is_trusted() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = WeightCache::new(dir.path());

        let path = dir.path().join("generator_hayao.pth");
        std::fs::write(&path, b"hand placed").unwrap();

        let resolved = cache
            .resolve(&WeightSource::Named("hayao".to_string()))
            .unwrap();
        assert_eq!(resolved, path);
    }
}
