//! Simulator error type.

use crate::instrument::Grating;
use crate::quantity::UnitError;
use caldata::{ArtifactLabel, CacheError};
use shared::image_proc::NoiseError;
use shared::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while configuring or running a simulation.
///
/// Per-sample geometry failures never appear here; the renderer counts
/// them in [`crate::render::RenderStats`] instead.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("invalid grating '{0}' (valid: low-zJ, low-JH, medium-z, medium-J, medium-H, medium-K, high-H, high-K)")]
    InvalidGrating(String),

    #[error("grating {0} has not yet been defined")]
    UndefinedGrating(Grating),

    #[error("invalid spatial scale '{0}' (valid: fine, medium, coarse)")]
    InvalidScale(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("failed to load {label} artifact {}: {reason}", path.display())]
    Artifact {
        label: ArtifactLabel,
        path: PathBuf,
        reason: String,
    },

    #[error("failed to read scene {}: {reason}", path.display())]
    Scene { path: PathBuf, reason: String },

    #[error(transparent)]
    Calibration(#[from] CacheError),

    #[error(transparent)]
    Unit(#[from] UnitError),

    #[error(transparent)]
    Noise(#[from] NoiseError),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write image: {0}")]
    Image(#[from] image::ImageError),

    #[cfg(feature = "fits")]
    #[error("FITS error: {0}")]
    Fits(#[from] fitsio::errors::Error),
}

impl SimError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SimError::InvalidGrating(_)
            | SimError::UndefinedGrating(_)
            | SimError::InvalidScale(_)
            | SimError::Configuration(_)
            | SimError::Artifact { .. }
            | SimError::Scene { .. }
            | SimError::Noise(_) => ErrorKind::Configuration,
            SimError::Calibration(e) => e.kind(),
            SimError::Unit(e) => e.kind(),
            SimError::Io { .. } | SimError::Image(_) => ErrorKind::Io,
            #[cfg(feature = "fits")]
            SimError::Fits(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SimError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, SimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(
            SimError::UndefinedGrating(Grating::HighK).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            SimError::from(UnitError::MissingUnit("3".into())).kind(),
            ErrorKind::Unit
        );
        let cache = CacheError::Unavailable {
            url: "http://x/y".into(),
            reason: "timeout".into(),
        };
        assert_eq!(SimError::from(cache).kind(), ErrorKind::Unavailable);
    }

    #[test]
    fn test_undefined_grating_message_names_grating() {
        let msg = SimError::UndefinedGrating(Grating::LowZJ).to_string();
        assert_eq!(msg, "grating low-zJ has not yet been defined");
    }
}
