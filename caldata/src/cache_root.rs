//! Cache-root configuration.
//!
//! The cache directory is an explicit value handed to the store rather
//! than a process global. It is created on first use and never cleared.

use crate::{CacheError, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the default cache directory.
pub const CACHE_DIR_ENV: &str = "FRIDASIM_CACHE_DIR";

/// Subdirectory of the platform cache directory used by default.
pub const DEFAULT_CACHE_SUBDIR: &str = "fridasim";

/// Root directory holding verified calibration artifacts, keyed by filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRoot {
    path: PathBuf,
}

impl CacheRoot {
    /// Resolve the default cache root.
    ///
    /// Order: `$FRIDASIM_CACHE_DIR`, the platform cache directory, then
    /// `$HOME/.cache`.
    pub fn from_env() -> Result<Self> {
        if let Some(dir) = env::var_os(CACHE_DIR_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::with_path(dir));
        }
        dirs::cache_dir()
            .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".cache")))
            .map(|base| Self::with_path(base.join(DEFAULT_CACHE_SUBDIR)))
            .ok_or(CacheError::NoCacheDir(CACHE_DIR_ENV))
    }

    /// Use a caller-chosen directory
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Location of `filename` inside the cache, whether or not it exists yet
    pub fn entry(&self, filename: &str) -> PathBuf {
        self.path.join(filename)
    }

    /// Create the directory if needed and return it
    pub fn ensure(&self) -> Result<&Path> {
        fs::create_dir_all(&self.path).map_err(|e| CacheError::io(&self.path, e))?;
        Ok(&self.path)
    }
}
