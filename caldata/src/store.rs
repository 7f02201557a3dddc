//! Content-addressed local store.
//!
//! `get(filename, md5)` returns a path to a file whose bytes hash to `md5`.
//! A cached copy is reused only after re-hashing it. A copy that fails the
//! check is deleted before anything is fetched. Missing files are then
//! fetched from the source, verified in memory, then written to a unique
//! temporary file in the cache directory and renamed into place. Readers
//! therefore only ever observe complete, verified files, even with several
//! resolutions of the same artifact running at once.

use crate::cache_root::CacheRoot;
use crate::digest::Md5Digest;
use crate::source::{check_filename, RemoteSource};
use crate::{CacheError, Result};
use log::{debug, info, warn};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Verified artifact store backed by a [`RemoteSource`].
#[derive(Debug)]
pub struct ContentStore<S> {
    root: CacheRoot,
    source: S,
}

impl<S: RemoteSource> ContentStore<S> {
    pub fn new(root: CacheRoot, source: S) -> Self {
        Self { root, source }
    }

    pub fn root(&self) -> &CacheRoot {
        &self.root
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Path of a verified local copy of `filename`, fetching it if needed.
    pub fn get(&self, filename: &str, expected: &Md5Digest) -> Result<PathBuf> {
        check_filename(filename)?;
        let dir = self.root.ensure()?;
        let path = dir.join(filename);

        if path.is_file() {
            match Md5Digest::of_file(&path) {
                Ok(actual) if actual == *expected => {
                    debug!("cache hit for {filename}");
                    return Ok(path);
                }
                Ok(actual) => warn!(
                    "cached {} has {actual}, expected {expected}; discarding it",
                    path.display()
                ),
                Err(e) => warn!("cannot hash cached {}: {e}; discarding it", path.display()),
            }
            discard(&path)?;
        }

        info!("fetching {}", self.source.locate(filename));
        let bytes = self.source.fetch(filename)?;
        let actual = Md5Digest::of(&bytes);
        if actual != *expected {
            return Err(CacheError::HashMismatch {
                filename: filename.to_string(),
                expected: *expected,
                actual,
            });
        }

        place_atomically(dir, &path, &bytes)?;
        debug!("stored {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }
}

/// Remove an invalid cache entry. Another resolver may have removed it already.
fn discard(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CacheError::io(path, e)),
    }
}

/// Write `bytes` to a temporary file in `dir` and rename it onto `path`.
fn place_atomically(dir: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = tempfile::Builder::new()
        .prefix(".fetch-")
        .suffix(".part")
        .tempfile_in(dir)
        .map_err(|e| CacheError::io(dir, e))?;
    tmp.write_all(bytes).map_err(|e| CacheError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| CacheError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| CacheError::io(path, e.error))?;
    Ok(())
}
