//! Calibration manifest schema.
//!
//! The manifest is a JSON document:
//!
//! ```json
//! {
//!   "uuid": "5f9c...",
//!   "auxfiles": {
//!     "skycalc": {"filename": "skycalc.dat", "md5": "..."},
//!     "EMIR-arc-delta-lines": {"filename": "arc.dat", "md5": "..."},
//!     "flatpix2pix": {"medium-K": {"filename": "flat.json", "md5": "..."},
//!                     "high-H": {"filename": null, "md5": null}},
//!     "model_ifu2detector": {"medium-K": {"filename": "model.json", "md5": "..."}}
//!   }
//! }
//! ```
//!
//! Grating-specific labels nest one more level by grating name. A null
//! filename or md5 marks a grating whose artifact has not been produced yet.

use crate::digest::Md5Digest;
use crate::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The auxiliary artifacts every simulation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArtifactLabel {
    /// Sky radiance and atmospheric transmission table
    Skycalc,
    /// Arc-lamp line list
    ArcLines,
    /// Pixel-to-pixel flat field
    FlatPix2Pix,
    /// IFU (x, y, wavelength) to detector (x, y) distortion model
    ModelIfu2Detector,
}

impl ArtifactLabel {
    pub const ALL: [ArtifactLabel; 4] = [
        ArtifactLabel::Skycalc,
        ArtifactLabel::ArcLines,
        ArtifactLabel::FlatPix2Pix,
        ArtifactLabel::ModelIfu2Detector,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactLabel::Skycalc => "skycalc",
            ArtifactLabel::ArcLines => "arc-lines",
            ArtifactLabel::FlatPix2Pix => "flatpix2pix",
            ArtifactLabel::ModelIfu2Detector => "model_ifu2detector",
        }
    }

    /// Key of this label inside `auxfiles`
    pub fn manifest_key(self) -> &'static str {
        match self {
            ArtifactLabel::ArcLines => "EMIR-arc-delta-lines",
            other => other.as_str(),
        }
    }

    pub fn is_grating_specific(self) -> bool {
        matches!(
            self,
            ArtifactLabel::FlatPix2Pix | ArtifactLabel::ModelIfu2Detector
        )
    }
}

impl fmt::Display for ArtifactLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactLabel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ArtifactLabel::ALL
            .into_iter()
            .find(|label| label.as_str() == s || label.manifest_key() == s)
            .ok_or_else(|| format!("unknown artifact label '{s}'"))
    }
}

/// One `{filename, md5}` record. Either field may be null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub filename: Option<String>,
    pub md5: Option<String>,
}

/// Parsed manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Provenance identifier of this manifest revision
    pub uuid: String,
    pub auxfiles: BTreeMap<String, serde_json::Value>,
}

/// Filename and expected digest of an artifact, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub label: ArtifactLabel,
    pub filename: String,
    pub md5: Md5Digest,
}

impl Manifest {
    /// Parse manifest bytes. `filename` only names the document in errors.
    pub fn from_slice(bytes: &[u8], filename: &str) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|source| CacheError::MalformedManifest {
            filename: filename.to_string(),
            source,
        })
    }

    /// Look up the artifact registered for `label` and `grating`.
    pub fn artifact(&self, label: ArtifactLabel, grating: &str) -> Result<ArtifactRef> {
        let key = label.manifest_key();
        let mut value = self.auxfiles.get(key).ok_or_else(|| CacheError::MissingLabel {
            label,
            key: key.to_string(),
        })?;

        if label.is_grating_specific() {
            value = value.get(grating).ok_or_else(|| CacheError::UndefinedArtifact {
                label,
                grating: grating.to_string(),
            })?;
        }

        let entry: ArtifactEntry =
            serde_json::from_value(value.clone()).map_err(|source| {
                CacheError::MalformedManifest {
                    filename: format!("auxfiles.{key}"),
                    source,
                }
            })?;

        match (entry.filename, entry.md5) {
            (Some(filename), Some(md5)) => {
                let md5 = md5.parse().map_err(|_| CacheError::InvalidDigest {
                    filename: filename.clone(),
                    value: md5.clone(),
                })?;
                Ok(ArtifactRef {
                    label,
                    filename,
                    md5,
                })
            }
            _ => Err(CacheError::UndefinedArtifact {
                label,
                grating: grating.to_string(),
            }),
        }
    }
}
