//! Pixel-to-pixel flat field from the `flatpix2pix` artifact.

use ndarray::Array2;
use serde::Deserialize;
use std::path::Path;

#[derive(Deserialize)]
struct RawFlat {
    shape: [usize; 2],
    data: Vec<f64>,
}

/// Multiplicative per-pixel sensitivity, shape `(ny, nx)`.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatField {
    data: Array2<f64>,
}

impl FlatField {
    pub fn new(data: Array2<f64>) -> Result<Self, String> {
        if let Some(bad) = data.iter().find(|v| !(**v >= 0.0) || !v.is_finite()) {
            return Err(format!("flat-field value {bad} is not a finite non-negative number"));
        }
        Ok(Self { data })
    }

    pub fn from_json_str(text: &str) -> Result<Self, String> {
        let raw: RawFlat = serde_json::from_str(text).map_err(|e| e.to_string())?;
        let [ny, nx] = raw.shape;
        let data = Array2::from_shape_vec((ny, nx), raw.data)
            .map_err(|e| format!("flat data does not match shape [{ny}, {nx}]: {e}"))?;
        Self::new(data)
    }

    /// Reads JSON, or a FITS primary image when built with the `fits` feature.
    pub fn load(path: &Path) -> Result<Self, String> {
        let is_fits = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("fits"));
        if is_fits {
            return Self::load_fits(path);
        }
        let text = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        Self::from_json_str(&text)
    }

    #[cfg(feature = "fits")]
    fn load_fits(path: &Path) -> Result<Self, String> {
        crate::io::fits::read_primary_image(path)
            .map_err(|e| e.to_string())
            .and_then(Self::new)
    }

    #[cfg(not(feature = "fits"))]
    fn load_fits(path: &Path) -> Result<Self, String> {
        Err(format!(
            "{} is a FITS file; rebuild with the `fits` feature",
            path.display()
        ))
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    /// Elementwise product with `image`
    pub fn apply(&self, image: &Array2<f64>) -> Array2<f64> {
        image * &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_json_flat() {
        let flat = FlatField::from_json_str(r#"{"shape": [2, 3], "data": [1, 1, 1, 0.5, 2, 1]}"#).unwrap();
        assert_eq!(flat.shape(), (2, 3));
        let out = flat.apply(&Array2::from_elem((2, 3), 10.0));
        assert_eq!(out[[1, 0]], 5.0);
        assert_eq!(out[[1, 1]], 20.0);
    }

    #[test]
    fn test_json_flat_shape_mismatch() {
        let err = FlatField::from_json_str(r#"{"shape": [2, 2], "data": [1, 1, 1]}"#).unwrap_err();
        assert!(err.contains("shape"));
    }

    #[test]
    fn test_negative_flat_rejected() {
        assert!(FlatField::from_json_str(r#"{"shape": [1, 2], "data": [1, -1]}"#).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"shape": [1, 1], "data": [0.9]}}"#).unwrap();
        let flat = FlatField::load(file.path()).unwrap();
        assert_eq!(flat.data()[[0, 0]], 0.9);
    }
}
