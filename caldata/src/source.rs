//! Byte sources for calibration artifacts.
//!
//! [`HttpSource`] talks to the calibration data server. [`DirectorySource`]
//! reads from a local mirror of the same layout, for offline runs.

use crate::{CacheError, Result};
use log::debug;
use reqwest::StatusCode;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default timeout for a single HTTP request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Something that can produce the raw bytes of a named artifact.
///
/// Implementations must not verify or cache; that is the store's job.
pub trait RemoteSource: Send + Sync {
    fn fetch(&self, filename: &str) -> Result<Vec<u8>>;

    /// Human-readable location of `filename`, for logs and errors
    fn locate(&self, filename: &str) -> String;
}

/// Reject anything that is not a plain file name.
pub(crate) fn check_filename(filename: &str) -> Result<()> {
    let plain = !filename.is_empty()
        && filename != "."
        && filename != ".."
        && !filename.contains(['/', '\\'])
        && Path::new(filename).file_name().is_some();
    if plain {
        Ok(())
    } else {
        Err(CacheError::InvalidFilename(filename.to_string()))
    }
}

/// Blocking HTTP source rooted at a base URL.
#[derive(Debug, Clone)]
pub struct HttpSource {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into();
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CacheError::Unavailable {
                url: base_url.clone(),
                reason: format!("failed to create HTTP client: {e}"),
            })?;
        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Statuses worth retrying later rather than fixing the configuration.
fn is_transient(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

impl RemoteSource for HttpSource {
    fn fetch(&self, filename: &str) -> Result<Vec<u8>> {
        check_filename(filename)?;
        let url = self.locate(filename);
        debug!("GET {url}");

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| CacheError::Unavailable {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            if is_transient(status) {
                return Err(CacheError::Unavailable {
                    url,
                    reason: format!("status {status}"),
                });
            }
            return Err(CacheError::RemoteRejected {
                url,
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().map_err(|e| CacheError::Unavailable {
            url: url.clone(),
            reason: format!("failed to read response: {e}"),
        })?;
        Ok(bytes.to_vec())
    }

    fn locate(&self, filename: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), filename)
    }
}

/// Local directory laid out like the remote server.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl RemoteSource for DirectorySource {
    fn fetch(&self, filename: &str) -> Result<Vec<u8>> {
        check_filename(filename)?;
        let path = self.root.join(filename);
        fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => CacheError::NotFound {
                location: path.display().to_string(),
            },
            _ => CacheError::io(&path, e),
        })
    }

    fn locate(&self, filename: &str) -> String {
        self.root.join(filename).display().to_string()
    }
}
