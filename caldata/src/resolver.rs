//! Grating-level resolution of calibration artifacts.

use crate::cache_root::CacheRoot;
use crate::digest::Md5Digest;
use crate::manifest::{ArtifactLabel, ArtifactRef, Manifest};
use crate::source::{HttpSource, RemoteSource, DEFAULT_TIMEOUT};
use crate::store::ContentStore;
use crate::{CacheError, Result};
use log::{debug, info};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Server hosting the simulator's calibration data.
pub const DEFAULT_BASE_URL: &str = "http://nartex.fis.ucm.es/~ncl/fridadrp_simulator_data";

/// Manifest filename on the server.
pub const DEFAULT_MANIFEST: &str = "configuration_FRIDA_IFU_simulator.json";

/// Known digest of [`DEFAULT_MANIFEST`].
pub const DEFAULT_MANIFEST_MD5: &str = "9befc9554521b062bd444cb80e730333";

/// Where to find the manifest and where to cache artifacts.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub root: CacheRoot,
    pub base_url: String,
    pub manifest_filename: String,
    pub manifest_md5: Md5Digest,
    pub timeout: Duration,
}

impl CacheConfig {
    /// Defaults for the public server with the given cache root.
    pub fn with_root(root: CacheRoot) -> Result<Self> {
        let manifest_md5 = DEFAULT_MANIFEST_MD5
            .parse()
            .map_err(|_| CacheError::InvalidDigest {
                filename: DEFAULT_MANIFEST.to_string(),
                value: DEFAULT_MANIFEST_MD5.to_string(),
            })?;
        Ok(Self {
            root,
            base_url: DEFAULT_BASE_URL.to_string(),
            manifest_filename: DEFAULT_MANIFEST.to_string(),
            manifest_md5,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Defaults with the cache root taken from the environment
    pub fn from_env() -> Result<Self> {
        Self::with_root(CacheRoot::from_env()?)
    }
}

/// An artifact and, once verified, its local path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationArtifact {
    pub label: ArtifactLabel,
    pub filename: String,
    pub md5: Md5Digest,
    pub local_path: Option<PathBuf>,
}

impl CalibrationArtifact {
    /// Usable only once a verified local copy exists.
    pub fn is_usable(&self) -> bool {
        self.local_path.is_some()
    }
}

impl From<ArtifactRef> for CalibrationArtifact {
    fn from(r: ArtifactRef) -> Self {
        Self {
            label: r.label,
            filename: r.filename,
            md5: r.md5,
            local_path: None,
        }
    }
}

/// Every required artifact for one grating, verified and cached.
#[derive(Debug, Clone)]
pub struct ResolvedArtifacts {
    pub uuid: String,
    pub grating: String,
    artifacts: BTreeMap<ArtifactLabel, CalibrationArtifact>,
}

impl ResolvedArtifacts {
    /// Assemble from already-verified artifacts.
    ///
    /// Fails if a required label is missing or has no local path.
    pub fn new(
        uuid: impl Into<String>,
        grating: impl Into<String>,
        artifacts: impl IntoIterator<Item = CalibrationArtifact>,
    ) -> Result<Self> {
        let grating = grating.into();
        let artifacts: BTreeMap<_, _> = artifacts.into_iter().map(|a| (a.label, a)).collect();
        for label in ArtifactLabel::ALL {
            match artifacts.get(&label) {
                Some(a) if a.is_usable() => {}
                _ => {
                    return Err(CacheError::UndefinedArtifact {
                        label,
                        grating: grating.clone(),
                    })
                }
            }
        }
        Ok(Self {
            uuid: uuid.into(),
            grating,
            artifacts,
        })
    }

    pub fn artifact(&self, label: ArtifactLabel) -> Option<&CalibrationArtifact> {
        self.artifacts.get(&label)
    }

    /// Local path of `label`. Present for every label after construction.
    pub fn path(&self, label: ArtifactLabel) -> Option<&Path> {
        self.artifacts
            .get(&label)
            .and_then(|a| a.local_path.as_deref())
    }

    /// `{label: local_path}` view
    pub fn paths(&self) -> BTreeMap<ArtifactLabel, PathBuf> {
        self.artifacts
            .iter()
            .filter_map(|(label, a)| a.local_path.clone().map(|p| (*label, p)))
            .collect()
    }
}

/// Resolves calibration artifacts through a verified local cache.
#[derive(Debug)]
pub struct CalibrationCache<S = HttpSource> {
    store: ContentStore<S>,
    manifest_filename: String,
    manifest_md5: Md5Digest,
}

impl CalibrationCache<HttpSource> {
    /// Cache backed by the HTTP server named in `config`.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        let source = HttpSource::new(config.base_url.clone(), config.timeout)?;
        Ok(Self::new(
            config.root.clone(),
            source,
            config.manifest_filename.clone(),
            config.manifest_md5,
        ))
    }
}

impl<S: RemoteSource> CalibrationCache<S> {
    pub fn new(
        root: CacheRoot,
        source: S,
        manifest_filename: impl Into<String>,
        manifest_md5: Md5Digest,
    ) -> Self {
        Self {
            store: ContentStore::new(root, source),
            manifest_filename: manifest_filename.into(),
            manifest_md5,
        }
    }

    pub fn store(&self) -> &ContentStore<S> {
        &self.store
    }

    /// Fetch, verify and parse the manifest.
    pub fn manifest(&self) -> Result<Manifest> {
        let path = self.store.get(&self.manifest_filename, &self.manifest_md5)?;
        let bytes = fs::read(&path).map_err(|e| CacheError::io(&path, e))?;
        Manifest::from_slice(&bytes, &self.manifest_filename)
    }

    /// Resolve every required artifact for `grating`.
    ///
    /// All manifest lookups happen before any artifact is fetched, so an
    /// undefined grating fails without network traffic beyond the manifest.
    /// Fetches then run in parallel, one per label.
    pub fn resolve(&self, grating: &str) -> Result<ResolvedArtifacts> {
        let manifest = self.manifest()?;
        info!("calibration manifest uuid: {}", manifest.uuid);

        let refs = ArtifactLabel::ALL
            .iter()
            .map(|label| manifest.artifact(*label, grating))
            .collect::<Result<Vec<_>>>()?;

        let resolved = refs
            .into_par_iter()
            .map(|r| -> Result<CalibrationArtifact> {
                let path = self.store.get(&r.filename, &r.md5)?;
                debug!("{} -> {}", r.label, path.display());
                let mut artifact = CalibrationArtifact::from(r);
                artifact.local_path = Some(path);
                Ok(artifact)
            })
            .collect::<Result<Vec<_>>>()?;

        ResolvedArtifacts::new(manifest.uuid, grating, resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_points_at_public_server() {
        let config = CacheConfig::with_root(CacheRoot::with_path("/tmp/x")).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.manifest_md5.to_hex(), DEFAULT_MANIFEST_MD5);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_resolved_requires_every_label() {
        let partial = vec![CalibrationArtifact {
            label: ArtifactLabel::Skycalc,
            filename: "sky.dat".into(),
            md5: Md5Digest::of(b""),
            local_path: Some(PathBuf::from("/tmp/sky.dat")),
        }];
        let err = ResolvedArtifacts::new("u", "medium-K", partial).unwrap_err();
        assert!(err.to_string().contains("arc-lines"));
    }
}
