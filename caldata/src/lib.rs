//! Calibration-data resolver for the FRIDA IFU simulator.
//!
//! Auxiliary calibration artifacts (sky model table, arc-line list, pixel
//! flat field and IFU-to-detector distortion model) live on a remote
//! server and are described by a small JSON manifest. This crate fetches
//! the manifest, verifies it against a known MD5, and resolves every
//! artifact required for a grating into a verified file inside a local
//! cache directory.
//!
//! # Layout
//! - [`cache_root`]: explicit cache-directory configuration
//! - [`digest`]: MD5 content addresses
//! - [`source`]: where bytes come from (HTTP server or local mirror)
//! - [`store`]: fetch-if-absent, verify, atomic placement
//! - [`manifest`]: manifest schema and artifact labels
//! - [`resolver`]: [`CalibrationCache::resolve`]

pub mod cache_root;
pub mod digest;
pub mod manifest;
pub mod resolver;
pub mod source;
pub mod store;

use shared::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;

pub use cache_root::CacheRoot;
pub use digest::Md5Digest;
pub use manifest::{ArtifactLabel, Manifest};
pub use resolver::{CacheConfig, CalibrationArtifact, CalibrationCache, ResolvedArtifacts};
pub use source::{DirectorySource, HttpSource, RemoteSource};
pub use store::ContentStore;

/// Errors raised while resolving calibration artifacts.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("grating {grating} has not yet been defined for artifact '{label}'")]
    UndefinedArtifact { label: ArtifactLabel, grating: String },

    #[error("manifest has no entry '{key}' for artifact '{label}'")]
    MissingLabel { label: ArtifactLabel, key: String },

    #[error("invalid md5 digest '{value}' for {filename}")]
    InvalidDigest { filename: String, value: String },

    #[error("refusing artifact filename '{0}': must be a plain file name")]
    InvalidFilename(String),

    #[error("no cache directory available; set {0} or pass an explicit cache root")]
    NoCacheDir(&'static str),

    #[error("{location} does not exist")]
    NotFound { location: String },

    #[error("remote rejected {url} with status {status}")]
    RemoteRejected { url: String, status: u16 },

    #[error("md5 mismatch for {filename}: expected {expected}, got {actual}")]
    HashMismatch {
        filename: String,
        expected: Md5Digest,
        actual: Md5Digest,
    },

    #[error("malformed manifest {filename}: {source}")]
    MalformedManifest {
        filename: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to fetch {url}: {reason}")]
    Unavailable { url: String, reason: String },

    #[error("cache I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CacheError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CacheError::UndefinedArtifact { .. }
            | CacheError::MissingLabel { .. }
            | CacheError::InvalidDigest { .. }
            | CacheError::InvalidFilename(_)
            | CacheError::NoCacheDir(_)
            | CacheError::NotFound { .. }
            | CacheError::RemoteRejected { .. } => ErrorKind::Configuration,
            CacheError::HashMismatch { .. } | CacheError::MalformedManifest { .. } => {
                ErrorKind::DataIntegrity
            }
            CacheError::Unavailable { .. } => ErrorKind::Unavailable,
            CacheError::Io { .. } => ErrorKind::Io,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for calibration-data operations
pub type Result<T> = std::result::Result<T, CacheError>;
