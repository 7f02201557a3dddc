//! FRIDA instrument constants and configuration enumerations.

use crate::error::{Result, SimError};
use crate::quantity::{Quantity, Unit};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// HAWAII detector columns
pub const FRIDA_NAXIS1_HAWAII: usize = 2048;
/// HAWAII detector rows
pub const FRIDA_NAXIS2_HAWAII: usize = 2048;

/// Detector array shape in `(rows, columns)` order
pub const HAWAII_SHAPE: (usize, usize) = (FRIDA_NAXIS2_HAWAII, FRIDA_NAXIS1_HAWAII);

/// IFU field of view, in IFU pixels, and its slicing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IfuGeometry {
    pub naxis1: usize,
    pub naxis2: usize,
    pub nslices: usize,
}

impl IfuGeometry {
    /// `(naxis1, naxis2)` in FITS order
    pub fn naxis(&self) -> (usize, usize) {
        (self.naxis1, self.naxis2)
    }

    /// Height of one slice along y, in IFU pixels
    pub fn slice_height(&self) -> f64 {
        self.naxis2 as f64 / self.nslices as f64
    }

    /// `[lo, hi)` range of 0-indexed y covered by `slice`
    pub fn slice_y_range(&self, slice: usize) -> (f64, f64) {
        let h = self.slice_height();
        (-0.5 + slice as f64 * h, -0.5 + (slice + 1) as f64 * h)
    }
}

pub const FRIDA_IFU: IfuGeometry = IfuGeometry {
    naxis1: 64,
    naxis2: 60,
    nslices: 30,
};

/// Dispersive element selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
pub enum Grating {
    #[value(name = "low-zJ")]
    #[serde(rename = "low-zJ")]
    LowZJ,
    #[value(name = "low-JH")]
    #[serde(rename = "low-JH")]
    LowJH,
    #[value(name = "medium-z")]
    #[serde(rename = "medium-z")]
    MediumZ,
    #[value(name = "medium-J")]
    #[serde(rename = "medium-J")]
    MediumJ,
    #[value(name = "medium-H")]
    #[serde(rename = "medium-H")]
    MediumH,
    #[value(name = "medium-K")]
    #[serde(rename = "medium-K")]
    MediumK,
    #[value(name = "high-H")]
    #[serde(rename = "high-H")]
    HighH,
    #[value(name = "high-K")]
    #[serde(rename = "high-K")]
    HighK,
}

/// Linear wavelength solution of a grating
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WavelengthRecipe {
    pub crpix1: Quantity,
    pub crval1: Quantity,
    pub cdelt1: Quantity,
    pub naxis1: Quantity,
}

impl Grating {
    pub const ALL: [Grating; 8] = [
        Grating::LowZJ,
        Grating::LowJH,
        Grating::MediumZ,
        Grating::MediumJ,
        Grating::MediumH,
        Grating::MediumK,
        Grating::HighH,
        Grating::HighK,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Grating::LowZJ => "low-zJ",
            Grating::LowJH => "low-JH",
            Grating::MediumZ => "medium-z",
            Grating::MediumJ => "medium-J",
            Grating::MediumH => "medium-H",
            Grating::MediumK => "medium-K",
            Grating::HighH => "high-H",
            Grating::HighK => "high-K",
        }
    }

    /// Wavelength calibration recipe, if one has been defined
    pub fn wavelength_recipe(self) -> Option<WavelengthRecipe> {
        match self {
            Grating::MediumK => Some(WavelengthRecipe {
                crpix1: Quantity::pixels(1.0),
                crval1: Quantity::micrometers(1.9344),
                cdelt1: Quantity::new(0.000285, Unit::MicrometerPerPixel),
                naxis1: Quantity::pixels(FRIDA_NAXIS1_HAWAII as f64),
            }),
            _ => None,
        }
    }
}

impl fmt::Display for Grating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grating {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        Grating::ALL
            .into_iter()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| SimError::InvalidGrating(s.to_string()))
    }
}

/// IFU spatial scale selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpatialScale {
    Fine,
    Medium,
    Coarse,
}

impl SpatialScale {
    pub const ALL: [SpatialScale; 3] = [SpatialScale::Fine, SpatialScale::Medium, SpatialScale::Coarse];

    pub fn as_str(self) -> &'static str {
        match self {
            SpatialScale::Fine => "fine",
            SpatialScale::Medium => "medium",
            SpatialScale::Coarse => "coarse",
        }
    }

    /// Plate scale on the sky
    pub fn quantity(self) -> Quantity {
        let arcsec = match self {
            SpatialScale::Fine => 0.01,
            SpatialScale::Medium => 0.02,
            SpatialScale::Coarse => 0.04,
        };
        Quantity::arcsec_per_pixel(arcsec)
    }
}

impl fmt::Display for SpatialScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpatialScale {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        SpatialScale::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| SimError::InvalidScale(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::ErrorKind;

    #[test]
    fn test_grating_names_round_trip() {
        for g in Grating::ALL {
            assert_eq!(g.as_str().parse::<Grating>().unwrap(), g);
            let json = serde_json::to_string(&g).unwrap();
            assert_eq!(json, format!("\"{}\"", g.as_str()));
        }
    }

    #[test]
    fn test_invalid_grating_names_value() {
        let err = "medium-Q".parse::<Grating>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("medium-Q"));
        // names are case sensitive
        assert!("medium-k".parse::<Grating>().is_err());
    }

    #[test]
    fn test_only_medium_k_has_recipe() {
        for g in Grating::ALL {
            assert_eq!(g.wavelength_recipe().is_some(), g == Grating::MediumK);
        }
    }

    #[test]
    fn test_clap_value_names_match() {
        let possible: Vec<String> = Grating::value_variants()
            .iter()
            .filter_map(|g| g.to_possible_value())
            .map(|v| v.get_name().to_string())
            .collect();
        assert!(possible.contains(&"medium-K".to_string()));
        assert_eq!(possible.len(), 8);
    }

    #[test]
    fn test_scales() {
        assert_eq!(SpatialScale::Medium.quantity(), Quantity::arcsec_per_pixel(0.02));
        assert_eq!("coarse".parse::<SpatialScale>().unwrap(), SpatialScale::Coarse);
        assert_eq!(
            "tiny".parse::<SpatialScale>().unwrap_err().kind(),
            ErrorKind::Configuration
        );
    }

    #[test]
    fn test_ifu_slices_tile_the_field() {
        assert_eq!(FRIDA_IFU.slice_height(), 2.0);
        assert_eq!(FRIDA_IFU.slice_y_range(0), (-0.5, 1.5));
        assert_eq!(FRIDA_IFU.slice_y_range(29), (57.5, 59.5));
    }
}
