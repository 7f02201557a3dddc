//! Error taxonomy shared by every crate in the workspace.
//!
//! Each crate keeps its own `thiserror` enum; all of them classify their
//! variants onto [`ErrorKind`] so callers can decide between aborting,
//! retrying and carrying on without matching on crate-specific types.

use std::fmt;

/// Coarse classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid or undefined grating, scale, option or calibration recipe.
    Configuration,
    /// Content hash mismatch or malformed verified data.
    DataIntegrity,
    /// Transient failure reaching a remote source. The caller may retry.
    Unavailable,
    /// Missing or incompatible physical unit.
    Unit,
    /// A sample outside the valid domain of the distortion model.
    Geometry,
    /// Local filesystem failure.
    Io,
}

impl ErrorKind {
    /// Whether retrying the same operation unchanged can succeed.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Unavailable)
    }

    /// Whether the failure must abort the run.
    ///
    /// Geometry failures are per-sample: the sample is dropped and counted.
    pub fn is_fatal(self) -> bool {
        !matches!(self, ErrorKind::Geometry)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Configuration => "ConfigurationError",
            ErrorKind::DataIntegrity => "DataIntegrityError",
            ErrorKind::Unavailable => "UnavailableError",
            ErrorKind::Unit => "UnitError",
            ErrorKind::Geometry => "GeometryError",
            ErrorKind::Io => "IoError",
        };
        f.write_str(name)
    }
}
