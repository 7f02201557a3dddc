//! In-memory calibration data loaded from resolved artifacts.

pub mod arc_lines;
pub mod distortion;
pub mod flat;
pub mod sky;
pub mod table;

pub use arc_lines::{ArcLine, ArcLineList};
pub use distortion::{DistortionModel, GeometryError, PolyTerm, Polynomial3, SliceModel};
pub use flat::FlatField;
pub use sky::SkyModel;

use crate::error::{Result, SimError};
use caldata::{ArtifactLabel, ResolvedArtifacts};
use clap::ValueEnum;
use log::debug;
use std::fmt;
use std::path::Path;

/// Whether the pixel flat is applied to the rendered frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FlatFieldMode {
    #[default]
    Default,
    None,
}

impl fmt::Display for FlatFieldMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FlatFieldMode::Default => "default",
            FlatFieldMode::None => "none",
        })
    }
}

/// Parsed calibration artifacts for one grating.
#[derive(Debug, Clone)]
pub struct CalibrationData {
    pub sky: SkyModel,
    pub arc_lines: ArcLineList,
    /// Absent when the flat field is disabled
    pub flat: Option<FlatField>,
    pub distortion: DistortionModel,
}

fn read_text(path: &Path) -> std::result::Result<String, String> {
    std::fs::read_to_string(path).map_err(|e| e.to_string())
}

fn load_artifact<T>(
    artifacts: &ResolvedArtifacts,
    label: ArtifactLabel,
    parse: impl FnOnce(&Path) -> std::result::Result<T, String>,
) -> Result<T> {
    let path = artifacts
        .path(label)
        .ok_or_else(|| SimError::Configuration(format!("artifact {label} was not resolved")))?;
    debug!("loading {label} from {}", path.display());
    parse(path).map_err(|reason| SimError::Artifact {
        label,
        path: path.to_path_buf(),
        reason,
    })
}

impl CalibrationData {
    /// Parse every resolved artifact. The flat is skipped for [`FlatFieldMode::None`].
    pub fn load(artifacts: &ResolvedArtifacts, flat_mode: FlatFieldMode) -> Result<Self> {
        let sky = load_artifact(artifacts, ArtifactLabel::Skycalc, |p| {
            read_text(p).and_then(|t| SkyModel::parse(&t))
        })?;
        let arc_lines = load_artifact(artifacts, ArtifactLabel::ArcLines, |p| {
            read_text(p).and_then(|t| ArcLineList::parse(&t))
        })?;
        let distortion = load_artifact(artifacts, ArtifactLabel::ModelIfu2Detector, |p| {
            read_text(p).and_then(|t| DistortionModel::from_json_str(&t))
        })?;
        if distortion.grating() != artifacts.grating {
            return Err(SimError::Configuration(format!(
                "distortion model is for grating {}, expected {}",
                distortion.grating(),
                artifacts.grating
            )));
        }
        let flat = match flat_mode {
            FlatFieldMode::Default => Some(load_artifact(artifacts, ArtifactLabel::FlatPix2Pix, FlatField::load)?),
            FlatFieldMode::None => None,
        };

        Ok(Self {
            sky,
            arc_lines,
            flat,
            distortion,
        })
    }
}
