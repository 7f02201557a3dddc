//! FITS import and export of detector frames.
//!
//! Array row 0 is FITS row 1, so 0-indexed detector coordinates `(x, y)`
//! are FITS pixel `(x + 1, y + 1)`.

use crate::error::Result;
use crate::wcs::{HeaderCard, HeaderValue};
use fitsio::hdu::HduInfo;
use fitsio::images::{ImageDescription, ImageType};
use fitsio::FitsFile;
use ndarray::Array2;
use std::path::Path;

/// Write `frame` as a double-precision primary image with `cards` in its header.
pub fn write_frame(path: &Path, frame: &Array2<f64>, cards: &[HeaderCard]) -> Result<()> {
    let (ny, nx) = frame.dim();
    let description = ImageDescription {
        data_type: ImageType::Double,
        dimensions: &[ny, nx],
    };
    let mut fptr = FitsFile::create(path)
        .with_custom_primary(&description)
        .overwrite()
        .open()?;
    let hdu = fptr.primary_hdu()?;
    let data: Vec<f64> = frame.iter().copied().collect();
    hdu.write_image(&mut fptr, &data)?;

    for card in cards {
        match &card.value {
            HeaderValue::Text(s) => hdu.write_key(&mut fptr, &card.key, s.as_str())?,
            HeaderValue::Real(v) => hdu.write_key(&mut fptr, &card.key, *v)?,
        }
    }
    Ok(())
}

/// Read the primary image of a FITS file as `(naxis2, naxis1)` doubles.
pub fn read_primary_image(path: &Path) -> Result<Array2<f64>> {
    let mut fptr = FitsFile::open(path)?;
    let hdu = fptr.primary_hdu()?;
    let shape = match &hdu.info {
        HduInfo::ImageInfo { shape, .. } if shape.len() == 2 => (shape[0], shape[1]),
        _ => {
            return Err(crate::error::SimError::Configuration(format!(
                "{} has no 2-D primary image",
                path.display()
            )))
        }
    };
    let data: Vec<f64> = hdu.read_image(&mut fptr)?;
    Array2::from_shape_vec(shape, data).map_err(|e| {
        crate::error::SimError::Configuration(format!("{}: {e}", path.display()))
    })
}
