//! IFU-to-detector geometric distortion from the `model_ifu2detector` artifact.
//!
//! Each IFU slice owns a pair of polynomials in `(x_ifu, y_ifu, wavelength)`
//! returning 0-indexed detector coordinates. Inputs are 0-indexed IFU pixel
//! coordinates and the wavelength in the model's declared unit. The model
//! is only valid inside its fitted domain; anything else is a
//! [`GeometryError`] for that sample.

use crate::quantity::{PhysicalType, Unit};
use serde::Deserialize;
use shared::ErrorKind;
use thiserror::Error;

/// A sample cannot be mapped onto the detector.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("x_ifu {x} outside fitted range [{lo}, {hi}]")]
    XOutOfDomain { x: f64, lo: f64, hi: f64 },

    #[error("wavelength {wavelength_um} um outside fitted range [{lo_um}, {hi_um}] um")]
    WavelengthOutOfDomain {
        wavelength_um: f64,
        lo_um: f64,
        hi_um: f64,
    },

    #[error("y_ifu {y} does not fall in any slice")]
    NoSlice { y: f64 },
}

impl GeometryError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Geometry
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PolyTerm {
    pub powers: [i32; 3],
    pub coeff: f64,
}

/// Sparse trivariate polynomial
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polynomial3 {
    terms: Vec<PolyTerm>,
}

impl Polynomial3 {
    pub fn new(terms: Vec<PolyTerm>) -> Self {
        Self { terms }
    }

    pub fn eval(&self, x: f64, y: f64, w: f64) -> f64 {
        self.terms
            .iter()
            .map(|t| t.coeff * x.powi(t.powers[0]) * y.powi(t.powers[1]) * w.powi(t.powers[2]))
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SliceModel {
    pub index: usize,
    /// Half-open `[lo, hi)` range of `y_ifu`
    pub y_ifu: (f64, f64),
    pub x_detector: Polynomial3,
    pub y_detector: Polynomial3,
}

#[derive(Deserialize)]
struct RawDomain {
    x_ifu: [f64; 2],
    wavelength: [f64; 2],
}

#[derive(Deserialize)]
struct RawSlice {
    index: usize,
    y_ifu: [f64; 2],
    x_detector: Vec<PolyTerm>,
    y_detector: Vec<PolyTerm>,
}

#[derive(Deserialize)]
struct RawModel {
    grating: String,
    detector_shape: [usize; 2],
    wavelength_unit: String,
    domain: RawDomain,
    slices: Vec<RawSlice>,
}

/// Fitted mapping `(x_ifu, y_ifu, wavelength) -> (x_detector, y_detector)`.
#[derive(Debug, Clone, PartialEq)]
pub struct DistortionModel {
    grating: String,
    detector_shape: (usize, usize),
    wavelength_unit: Unit,
    /// Multiplies micrometers into `wavelength_unit`
    um_to_model: f64,
    x_domain: (f64, f64),
    wavelength_domain: (f64, f64),
    slices: Vec<SliceModel>,
}

impl DistortionModel {
    pub fn from_json_str(text: &str) -> Result<Self, String> {
        let raw: RawModel = serde_json::from_str(text).map_err(|e| e.to_string())?;

        let wavelength_unit = raw.wavelength_unit.parse::<Unit>().map_err(|e| e.to_string())?;
        if wavelength_unit.physical_type() != PhysicalType::Length {
            return Err(format!("wavelength_unit must be a length, got {wavelength_unit}"));
        }
        let um_to_model = Unit::Micrometer
            .conversion_factor(wavelength_unit)
            .map_err(|e| e.to_string())?;

        let [ny, nx] = raw.detector_shape;
        if ny == 0 || nx == 0 {
            return Err(format!("detector_shape [{ny}, {nx}] is empty"));
        }
        for (name, [lo, hi]) in [("x_ifu", raw.domain.x_ifu), ("wavelength", raw.domain.wavelength)] {
            if !(lo < hi) {
                return Err(format!("domain.{name} [{lo}, {hi}] is empty"));
            }
        }
        if raw.slices.is_empty() {
            return Err("model has no slices".to_string());
        }

        let mut slices: Vec<SliceModel> = raw
            .slices
            .into_iter()
            .map(|s| {
                let [lo, hi] = s.y_ifu;
                if !(lo < hi) {
                    return Err(format!("slice {} has empty y_ifu range [{lo}, {hi})", s.index));
                }
                Ok(SliceModel {
                    index: s.index,
                    y_ifu: (lo, hi),
                    x_detector: Polynomial3::new(s.x_detector),
                    y_detector: Polynomial3::new(s.y_detector),
                })
            })
            .collect::<Result<_, String>>()?;
        slices.sort_by(|a, b| a.y_ifu.0.total_cmp(&b.y_ifu.0));
        if let Some(w) = slices.windows(2).find(|w| w[1].y_ifu.0 < w[0].y_ifu.1) {
            return Err(format!("slices {} and {} overlap", w[0].index, w[1].index));
        }

        Ok(Self {
            grating: raw.grating,
            detector_shape: (ny, nx),
            wavelength_unit,
            um_to_model,
            x_domain: (raw.domain.x_ifu[0], raw.domain.x_ifu[1]),
            wavelength_domain: (raw.domain.wavelength[0], raw.domain.wavelength[1]),
            slices,
        })
    }

    pub fn grating(&self) -> &str {
        &self.grating
    }

    /// Declared detector output shape `(ny, nx)`
    pub fn detector_shape(&self) -> (usize, usize) {
        self.detector_shape
    }

    pub fn wavelength_unit(&self) -> Unit {
        self.wavelength_unit
    }

    pub fn slices(&self) -> &[SliceModel] {
        &self.slices
    }

    /// Slices are half-open in y, except the top one which keeps its upper edge.
    fn slice_for(&self, y: f64) -> Option<&SliceModel> {
        let idx = self.slices.partition_point(|s| s.y_ifu.0 <= y).checked_sub(1)?;
        let slice = self.slices.get(idx)?;
        let top = idx + 1 == self.slices.len();
        (y < slice.y_ifu.1 || (top && y == slice.y_ifu.1)).then_some(slice)
    }

    /// Detector position of a 0-indexed IFU coordinate at `wavelength_um`.
    ///
    /// Domain bounds are inclusive.
    pub fn evaluate(&self, x_ifu: f64, y_ifu: f64, wavelength_um: f64) -> Result<(f64, f64), GeometryError> {
        let (xlo, xhi) = self.x_domain;
        if !(xlo..=xhi).contains(&x_ifu) {
            return Err(GeometryError::XOutOfDomain {
                x: x_ifu,
                lo: xlo,
                hi: xhi,
            });
        }

        let w = wavelength_um * self.um_to_model;
        let (wlo, whi) = self.wavelength_domain;
        if !(wlo..=whi).contains(&w) {
            return Err(GeometryError::WavelengthOutOfDomain {
                wavelength_um,
                lo_um: wlo / self.um_to_model,
                hi_um: whi / self.um_to_model,
            });
        }

        let slice = self.slice_for(y_ifu).ok_or(GeometryError::NoSlice { y: y_ifu })?;
        Ok((
            slice.x_detector.eval(x_ifu, y_ifu, w),
            slice.y_detector.eval(x_ifu, y_ifu, w),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const MODEL: &str = r#"{
        "grating": "medium-K",
        "detector_shape": [100, 200],
        "wavelength_unit": "Angstrom",
        "domain": {"x_ifu": [-0.5, 63.5], "wavelength": [19000, 25000]},
        "slices": [
            {"index": 1, "y_ifu": [1.5, 3.5],
             "x_detector": [{"powers": [1, 0, 0], "coeff": 1.0}, {"powers": [0, 0, 0], "coeff": 100.0}],
             "y_detector": [{"powers": [0, 0, 1], "coeff": 0.01}]},
            {"index": 0, "y_ifu": [-0.5, 1.5],
             "x_detector": [{"powers": [1, 0, 0], "coeff": 1.0}],
             "y_detector": [{"powers": [0, 0, 1], "coeff": 0.01}, {"powers": [0, 1, 0], "coeff": 2.0}]}
        ]
    }"#;

    #[test]
    fn test_evaluate_picks_slice() {
        let model = DistortionModel::from_json_str(MODEL).unwrap();
        assert_eq!(model.detector_shape(), (100, 200));
        assert_eq!(model.wavelength_unit(), Unit::Angstrom);
        assert_eq!(model.slices()[0].index, 0);

        let (x, y) = model.evaluate(10.0, 1.0, 2.0).unwrap();
        assert_relative_eq!(x, 10.0);
        assert_relative_eq!(y, 202.0, epsilon = 1e-9);

        let (x, y) = model.evaluate(10.0, 1.5, 2.0).unwrap();
        assert_relative_eq!(x, 110.0);
        assert_relative_eq!(y, 200.0, epsilon = 1e-9);
    }

    #[test]
    fn test_top_edge_of_last_slice_is_inside() {
        let model = DistortionModel::from_json_str(MODEL).unwrap();
        let (x, _) = model.evaluate(63.5, 3.5, 2.0).unwrap();
        assert_relative_eq!(x, 163.5);
        // interior edges still belong to the slice above
        let (x, _) = model.evaluate(0.0, 1.5, 2.0).unwrap();
        assert_relative_eq!(x, 100.0);
    }

    #[test]
    fn test_out_of_domain_errors() {
        let model = DistortionModel::from_json_str(MODEL).unwrap();
        let err = model.evaluate(64.0, 0.0, 2.0).unwrap_err();
        assert!(matches!(err, GeometryError::XOutOfDomain { .. }));
        assert_eq!(err.kind(), ErrorKind::Geometry);

        match model.evaluate(0.0, 0.0, 2.6).unwrap_err() {
            GeometryError::WavelengthOutOfDomain { lo_um, hi_um, .. } => {
                assert_relative_eq!(lo_um, 1.9, epsilon = 1e-12);
                assert_relative_eq!(hi_um, 2.5, epsilon = 1e-12);
            }
            other => panic!("unexpected {other:?}"),
        }

        assert_eq!(
            model.evaluate(0.0, 3.6, 2.0).unwrap_err(),
            GeometryError::NoSlice { y: 3.6 }
        );
        assert!(model.evaluate(0.0, -0.6, 2.0).is_err());
    }

    #[test]
    fn test_rejects_malformed_models() {
        let overlapping = MODEL.replace("[1.5, 3.5]", "[1.0, 3.5]");
        assert!(DistortionModel::from_json_str(&overlapping).unwrap_err().contains("overlap"));

        let bad_unit = MODEL.replace("\"Angstrom\"", "\"pix\"");
        assert!(DistortionModel::from_json_str(&bad_unit).is_err());

        assert!(DistortionModel::from_json_str("{}").is_err());
    }
}
