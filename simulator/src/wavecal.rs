//! Linear wavelength calibration.
//!
//! `wave = crval1 + (fitspixel - crpix1) * cdelt1`, where `fitspixel` is
//! 1-indexed. Inputs tagged `pix` are already FITS pixels; dimensionless
//! inputs are 0-indexed array positions and get `+1` before use.

use crate::error::{Result, SimError};
use crate::instrument::Grating;
use crate::quantity::{Magnitude, PhysicalType, Quantity, Unit, UnitError};
use std::fmt;

/// Offset from the caller's pixel convention to FITS pixels.
fn fits_offset(unit: Unit, context: &'static str) -> std::result::Result<f64, UnitError> {
    match unit {
        Unit::Pixel => Ok(0.0),
        Unit::Dimensionless => Ok(1.0),
        got => Err(UnitError::WrongType {
            context,
            expected: PhysicalType::Pixel,
            got,
        }),
    }
}

/// Affine pixel-to-wavelength mapping for one grating.
#[derive(Debug, Clone)]
pub struct LinearWaveCal {
    crpix1: Quantity,
    crval1: Quantity,
    cdelt1: Quantity,
    naxis1: Quantity,
    grating: Option<Grating>,
    /// `cdelt1` expressed in `crval1` units per pixel
    dispersion: f64,
}

impl LinearWaveCal {
    /// Build from explicit WCS keywords.
    pub fn new(crpix1: Quantity, crval1: Quantity, cdelt1: Quantity, naxis1: Quantity) -> Result<Self> {
        crpix1.require(PhysicalType::Pixel, "crpix1")?;
        crval1.require(PhysicalType::Length, "crval1")?;
        cdelt1.require(PhysicalType::LengthPerPixel, "cdelt1")?;
        naxis1.require(PhysicalType::Pixel, "naxis1")?;

        let dispersion = cdelt1.value() * cdelt1.unit().numerator().conversion_factor(crval1.unit())?;
        if dispersion == 0.0 || !dispersion.is_finite() {
            return Err(SimError::Configuration(format!(
                "cdelt1 must be finite and non-zero, got {cdelt1}"
            )));
        }
        if !(*naxis1.value() >= 1.0) || naxis1.value().fract() != 0.0 {
            return Err(SimError::Configuration(format!(
                "naxis1 must be a positive whole number of pixels, got {naxis1}"
            )));
        }

        Ok(Self {
            crpix1,
            crval1,
            cdelt1,
            naxis1,
            grating: None,
            dispersion,
        })
    }

    /// Calibration recipe of a FRIDA grating.
    pub fn from_grating(grating: Grating) -> Result<Self> {
        let recipe = grating
            .wavelength_recipe()
            .ok_or(SimError::UndefinedGrating(grating))?;
        let mut wavecal = Self::new(recipe.crpix1, recipe.crval1, recipe.cdelt1, recipe.naxis1)?;
        wavecal.grating = Some(grating);
        Ok(wavecal)
    }

    /// Same as [`Self::from_grating`] for a grating name.
    pub fn from_grating_name(name: &str) -> Result<Self> {
        Self::from_grating(name.parse()?)
    }

    pub fn crpix1(&self) -> Quantity {
        self.crpix1
    }

    pub fn crval1(&self) -> Quantity {
        self.crval1
    }

    pub fn cdelt1(&self) -> Quantity {
        self.cdelt1
    }

    pub fn naxis1(&self) -> Quantity {
        self.naxis1
    }

    pub fn grating(&self) -> Option<Grating> {
        self.grating
    }

    /// Number of spectral pixels
    pub fn npix(&self) -> usize {
        *self.naxis1.value() as usize
    }

    /// Unit in which wavelengths are returned
    pub fn wavelength_unit(&self) -> Unit {
        self.crval1.unit()
    }

    /// Wavelength at `pixel`, tagged `pix` (1-indexed) or dimensionless (0-indexed).
    pub fn wave_at_pixel<M: Magnitude>(&self, pixel: &Quantity<M>) -> std::result::Result<Quantity<M>, UnitError> {
        let offset = fits_offset(pixel.unit(), "wave_at_pixel")?;
        let (crpix, crval, cdelt) = (*self.crpix1.value(), *self.crval1.value(), self.dispersion);
        Ok(pixel.map_into(self.wavelength_unit(), |p| crval + (p + offset - crpix) * cdelt))
    }

    /// Pixel at `wave`, in the convention selected by `return_units`.
    pub fn pixel_at_wave<M: Magnitude>(
        &self,
        wave: &Quantity<M>,
        return_units: Unit,
    ) -> std::result::Result<Quantity<M>, UnitError> {
        wave.require(PhysicalType::Length, "pixel_at_wave")?;
        let offset = match return_units {
            Unit::Pixel | Unit::Dimensionless => fits_offset(return_units, "pixel_at_wave")?,
            got => {
                return Err(UnitError::UnsupportedReturnUnit {
                    context: "pixel_at_wave",
                    got,
                })
            }
        };
        let wave = wave.to(self.wavelength_unit())?;
        let (crpix, crval, cdelt) = (*self.crpix1.value(), *self.crval1.value(), self.dispersion);
        Ok(wave.map_into(return_units, |w| (w - crval) / cdelt + crpix - offset))
    }

    /// Wavelength interval spanned by FITS pixels `0` to `naxis1`.
    ///
    /// Samples outside `[min, max]` are outside the valid range.
    pub fn wavelength_range(&self) -> (Quantity, Quantity) {
        let unit = self.wavelength_unit();
        let (crpix, crval, naxis) = (*self.crpix1.value(), *self.crval1.value(), *self.naxis1.value());
        let a = crval - crpix * self.dispersion;
        let b = crval + (naxis - crpix) * self.dispersion;
        (Quantity::new(a.min(b), unit), Quantity::new(a.max(b), unit))
    }

    /// [`Self::wavelength_range`] in micrometers
    pub fn wavelength_range_um(&self) -> (f64, f64) {
        let factor = self.wavelength_unit().conversion_factor(Unit::Micrometer).unwrap_or(1.0);
        let (lo, hi) = self.wavelength_range();
        (lo.value() * factor, hi.value() * factor)
    }

    /// Dispersion in micrometers per pixel (signed)
    pub fn dispersion_um(&self) -> f64 {
        self.dispersion * self.wavelength_unit().conversion_factor(Unit::Micrometer).unwrap_or(1.0)
    }
}

impl PartialEq for LinearWaveCal {
    /// Equal when the four defining quantities match in value and unit.
    fn eq(&self, other: &Self) -> bool {
        self.crpix1 == other.crpix1
            && self.crval1 == other.crval1
            && self.cdelt1 == other.cdelt1
            && self.naxis1 == other.naxis1
    }
}

impl fmt::Display for LinearWaveCal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LinearWaveCal(crpix1={}, crval1={}, cdelt1={}, naxis1={}, grating={})",
            self.crpix1,
            self.crval1,
            self.cdelt1,
            self.naxis1,
            self.grating.map_or("none", Grating::as_str)
        )
    }
}
