//! Composite world-coordinate system of the IFU data cube.
//!
//! Axis order and conventions:
//!
//! | axis | CTYPE      | pixel                  | world              |
//! |------|------------|------------------------|--------------------|
//! | 1    | `RA---TAN` | x_ifu                  | right ascension    |
//! | 2    | `DEC--TAN` | y_ifu                  | declination        |
//! | 3    | `WAVE`     | spectral pixel         | wavelength         |
//!
//! Pixel coordinates tagged `pix` are 1-indexed FITS pixels; dimensionless
//! pixel coordinates are 0-indexed array positions. The spatial reference
//! pixel sits at the field center, `CRPIX = (naxis + 1) / 2`, with
//! `CDELT1 = -scale` (east to the left) and `CDELT2 = +scale`. The spatial
//! and spectral transforms share no terms.

use crate::error::{Result, SimError};
use crate::quantity::{PhysicalType, Quantity, Unit, UnitError};
use crate::units::{Angle, AngleExt};
use crate::wavecal::LinearWaveCal;
use nalgebra::{Matrix3, Vector3};
use std::f64::consts::{FRAC_PI_2, TAU};

/// A position on the celestial sphere, in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Equatorial {
    pub ra: f64,
    pub dec: f64,
}

impl Equatorial {
    pub fn new(ra: f64, dec: f64) -> Self {
        Self { ra, dec }
    }

    pub fn from_degrees(ra_deg: f64, dec_deg: f64) -> Self {
        Self::new(
            Angle::from_degrees(ra_deg).as_radians(),
            Angle::from_degrees(dec_deg).as_radians(),
        )
    }

    /// Build from unit-tagged angles, rejecting anything that is not an angle.
    pub fn from_quantities(ra: &Quantity, dec: &Quantity) -> Result<Self> {
        ra.require(PhysicalType::Angle, "right ascension")?;
        dec.require(PhysicalType::Angle, "declination")?;
        let pos = Self::new(ra.value_in(Unit::Radian)?, dec.value_in(Unit::Radian)?);
        if !pos.ra.is_finite() || !(pos.dec.abs() <= FRAC_PI_2 * (1.0 + 1e-12)) {
            return Err(SimError::Configuration(format!(
                "invalid sky position ra={ra}, dec={dec}"
            )));
        }
        Ok(pos)
    }

    pub fn ra_degrees(&self) -> f64 {
        Angle::from_radians(self.ra).as_degrees()
    }

    pub fn dec_degrees(&self) -> f64 {
        Angle::from_radians(self.dec).as_degrees()
    }

    fn to_unit_vector(self) -> Vector3<f64> {
        let (sin_ra, cos_ra) = self.ra.sin_cos();
        let (sin_dec, cos_dec) = self.dec.sin_cos();
        Vector3::new(cos_dec * cos_ra, cos_dec * sin_ra, sin_dec)
    }

    fn from_unit_vector(v: &Vector3<f64>) -> Self {
        let dec = v.z.atan2(v.x.hypot(v.y));
        let ra = v.y.atan2(v.x).rem_euclid(TAU);
        Self { ra, dec }
    }

    /// Great-circle distance in radians
    pub fn separation(&self, other: &Equatorial) -> f64 {
        let a = self.to_unit_vector();
        let b = other.to_unit_vector();
        a.cross(&b).norm().atan2(a.dot(&b))
    }
}

/// Gnomonic projection about a tangent point.
///
/// Standard coordinates `(xi, eta)` are in radians, `xi` towards east and
/// `eta` towards north.
#[derive(Debug, Clone, PartialEq)]
pub struct TangentPlane {
    center: Equatorial,
    /// Columns are the east, north and line-of-sight unit vectors
    rotation: Matrix3<f64>,
}

impl TangentPlane {
    pub fn new(center: Equatorial) -> Self {
        let z = center.to_unit_vector();
        // east is well defined at the poles too: it follows the RA of the center
        let (sin_ra, cos_ra) = center.ra.sin_cos();
        let east = Vector3::new(-sin_ra, cos_ra, 0.0);
        let north = z.cross(&east).normalize();
        Self {
            center,
            rotation: Matrix3::from_columns(&[east, north, z]),
        }
    }

    pub fn center(&self) -> Equatorial {
        self.center
    }

    /// Standard coordinates of `pos`, or None on the far hemisphere
    pub fn project(&self, pos: &Equatorial) -> Option<(f64, f64)> {
        let local = self.rotation.transpose() * pos.to_unit_vector();
        if local.z <= 0.0 {
            return None;
        }
        Some((local.x / local.z, local.y / local.z))
    }

    pub fn deproject(&self, xi: f64, eta: f64) -> Equatorial {
        let local = Vector3::new(xi, eta, 1.0).normalize();
        Equatorial::from_unit_vector(&(self.rotation * local))
    }
}

/// World coordinates of one cube voxel position.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldCoord {
    pub position: Equatorial,
    pub wavelength: Quantity,
}

/// Pixel coordinates of one cube position, all in the same convention.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelCoord {
    pub x: Quantity,
    pub y: Quantity,
    pub spectral: Quantity,
}

/// Value of a FITS header card.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Text(String),
    Real(f64),
}

/// A FITS header keyword and its value.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderCard {
    pub key: String,
    pub value: HeaderValue,
}

impl HeaderCard {
    pub fn text(key: impl Into<String>, value: &str) -> Self {
        Self {
            key: key.into(),
            value: HeaderValue::Text(value.to_string()),
        }
    }

    pub fn real(key: impl Into<String>, value: f64) -> Self {
        Self {
            key: key.into(),
            value: HeaderValue::Real(value),
        }
    }
}

fn pixel_convention_offset(unit: Unit, context: &'static str) -> std::result::Result<f64, UnitError> {
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

/// Spatial tangent-plane projection combined with a linear spectral axis.
#[derive(Debug, Clone)]
pub struct CompositeWcs {
    naxis_ifu: (usize, usize),
    plane: TangentPlane,
    /// FITS reference pixel of axes 1 and 2
    crpix: (f64, f64),
    spatial_scale: Quantity,
    /// Plate scale in radians per IFU pixel
    scale_rad: f64,
    spectral: LinearWaveCal,
}

impl CompositeWcs {
    /// Build the cube WCS centered on `pointing`.
    ///
    /// `naxis_ifu` is `(naxis1, naxis2)`; `spatial_scale` must be an
    /// angle per pixel.
    pub fn build(
        naxis_ifu: (usize, usize),
        pointing: Equatorial,
        spatial_scale: Quantity,
        wavecal: LinearWaveCal,
    ) -> Result<Self> {
        spatial_scale.require(PhysicalType::AnglePerPixel, "spatial_scale")?;
        let scale_deg = spatial_scale.value_in(Unit::DegreePerPixel)?;
        let scale_rad = Angle::from_degrees(scale_deg).as_radians();
        if !(scale_rad > 0.0 && scale_rad.is_finite()) {
            return Err(SimError::Configuration(format!(
                "spatial scale must be positive, got {spatial_scale}"
            )));
        }
        if naxis_ifu.0 == 0 || naxis_ifu.1 == 0 {
            return Err(SimError::Configuration(format!(
                "IFU axes must be non-empty, got {naxis_ifu:?}"
            )));
        }

        Ok(Self {
            naxis_ifu,
            plane: TangentPlane::new(pointing),
            crpix: (
                (naxis_ifu.0 as f64 + 1.0) / 2.0,
                (naxis_ifu.1 as f64 + 1.0) / 2.0,
            ),
            spatial_scale,
            scale_rad,
            spectral: wavecal,
        })
    }

    pub fn naxis_ifu(&self) -> (usize, usize) {
        self.naxis_ifu
    }

    pub fn pointing(&self) -> Equatorial {
        self.plane.center()
    }

    pub fn spectral(&self) -> &LinearWaveCal {
        &self.spectral
    }

    pub fn spatial_scale(&self) -> Quantity {
        self.spatial_scale
    }

    /// Plate scale in radians per IFU pixel
    pub fn scale_radians(&self) -> f64 {
        self.scale_rad
    }

    /// Sky position of 0-indexed IFU coordinates
    pub fn ifu_index_to_sky(&self, x: f64, y: f64) -> Equatorial {
        let xi = -(x + 1.0 - self.crpix.0) * self.scale_rad;
        let eta = (y + 1.0 - self.crpix.1) * self.scale_rad;
        self.plane.deproject(xi, eta)
    }

    /// 0-indexed IFU coordinates of a sky position, None behind the tangent plane
    pub fn sky_to_ifu_index(&self, pos: &Equatorial) -> Option<(f64, f64)> {
        let (xi, eta) = self.plane.project(pos)?;
        Some((
            self.crpix.0 - 1.0 - xi / self.scale_rad,
            self.crpix.1 - 1.0 + eta / self.scale_rad,
        ))
    }

    /// Whether 0-indexed IFU coordinates fall on the IFU field.
    ///
    /// The field spans `[-0.5, n - 0.5]` on each axis; only positions
    /// strictly outside it are off the field.
    pub fn contains_ifu_index(&self, x: f64, y: f64) -> bool {
        let (nx, ny) = (self.naxis_ifu.0 as f64, self.naxis_ifu.1 as f64);
        (-0.5..=nx - 0.5).contains(&x) && (-0.5..=ny - 0.5).contains(&y)
    }

    pub fn pixel_to_world(&self, x: &Quantity, y: &Quantity, spectral: &Quantity) -> Result<WorldCoord> {
        let x0 = x.value() + pixel_convention_offset(x.unit(), "pixel_to_world x")? - 1.0;
        let y0 = y.value() + pixel_convention_offset(y.unit(), "pixel_to_world y")? - 1.0;
        let wavelength = self.spectral.wave_at_pixel(spectral)?;
        Ok(WorldCoord {
            position: self.ifu_index_to_sky(x0, y0),
            wavelength,
        })
    }

    /// Inverse of [`Self::pixel_to_world`]; None when the position lies
    /// on the far side of the tangent plane.
    pub fn world_to_pixel(&self, world: &WorldCoord, return_units: Unit) -> Result<Option<PixelCoord>> {
        let offset = match return_units {
            Unit::Pixel | Unit::Dimensionless => {
                pixel_convention_offset(return_units, "world_to_pixel")?
            }
            got => {
                return Err(UnitError::UnsupportedReturnUnit {
                    context: "world_to_pixel",
                    got,
                }
                .into())
            }
        };
        let spectral = self.spectral.pixel_at_wave(&world.wavelength, return_units)?;
        Ok(self.sky_to_ifu_index(&world.position).map(|(x0, y0)| PixelCoord {
            x: Quantity::new(x0 + 1.0 - offset, return_units),
            y: Quantity::new(y0 + 1.0 - offset, return_units),
            spectral,
        }))
    }

    /// FITS WCS keywords describing the cube.
    pub fn header_cards(&self) -> Vec<HeaderCard> {
        let scale_deg = Angle::from_radians(self.scale_rad).as_degrees();
        let pointing = self.pointing();
        let wave_unit = self.spectral.wavelength_unit();
        let cdelt3 = self
            .spectral
            .cdelt1()
            .value_in(match wave_unit {
                Unit::Meter => Unit::MicrometerPerPixel,
                Unit::Nanometer => Unit::NanometerPerPixel,
                Unit::Angstrom => Unit::AngstromPerPixel,
                _ => Unit::MicrometerPerPixel,
            })
            .unwrap_or(*self.spectral.cdelt1().value());
        let wave_unit = match wave_unit {
            Unit::Meter => Unit::Micrometer,
            other => other,
        };
        let crval3 = self
            .spectral
            .crval1()
            .value_in(wave_unit)
            .unwrap_or(*self.spectral.crval1().value());

        vec![
            HeaderCard::real("WCSAXES", 3.0),
            HeaderCard::text("CTYPE1", "RA---TAN"),
            HeaderCard::text("CTYPE2", "DEC--TAN"),
            HeaderCard::text("CTYPE3", "WAVE"),
            HeaderCard::real("CRPIX1", self.crpix.0),
            HeaderCard::real("CRPIX2", self.crpix.1),
            HeaderCard::real("CRPIX3", *self.spectral.crpix1().value()),
            HeaderCard::real("CRVAL1", pointing.ra_degrees()),
            HeaderCard::real("CRVAL2", pointing.dec_degrees()),
            HeaderCard::real("CRVAL3", crval3),
            HeaderCard::real("CDELT1", -scale_deg),
            HeaderCard::real("CDELT2", scale_deg),
            HeaderCard::real("CDELT3", cdelt3),
            HeaderCard::text("CUNIT1", "deg"),
            HeaderCard::text("CUNIT2", "deg"),
            HeaderCard::text("CUNIT3", wave_unit.symbol()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::{Grating, SpatialScale, FRIDA_IFU};
    use approx::assert_relative_eq;

    fn wcs_at(ra: f64, dec: f64) -> CompositeWcs {
        CompositeWcs::build(
            FRIDA_IFU.naxis(),
            Equatorial::from_degrees(ra, dec),
            SpatialScale::Fine.quantity(),
            LinearWaveCal::from_grating(Grating::MediumK).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_reference_pixel_maps_to_pointing() {
        let wcs = wcs_at(150.0, 2.2);
        let world = wcs
            .pixel_to_world(&Quantity::pixels(32.5), &Quantity::pixels(30.5), &Quantity::pixels(1.0))
            .unwrap();
        assert_relative_eq!(world.position.ra_degrees(), 150.0, epsilon = 1e-10);
        assert_relative_eq!(world.position.dec_degrees(), 2.2, epsilon = 1e-10);
        assert_eq!(world.wavelength, Quantity::micrometers(1.9344));
    }

    #[test]
    fn test_round_trip_both_conventions() {
        for (ra, dec) in [(0.0, 0.0), (359.99, -45.0), (80.0, 89.9999)] {
            let wcs = wcs_at(ra, dec);
            for unit in [Unit::Pixel, Unit::Dimensionless] {
                for (x, y, s) in [(1.0, 1.0, 1.0), (10.25, 47.5, 300.0), (64.0, 60.0, 2048.0), (-3.0, 70.0, -5.0)] {
                    let world = wcs
                        .pixel_to_world(&Quantity::new(x, unit), &Quantity::new(y, unit), &Quantity::new(s, unit))
                        .unwrap();
                    let back = wcs.world_to_pixel(&world, unit).unwrap().unwrap();
                    assert_eq!(back.x.unit(), unit);
                    assert_relative_eq!(*back.x.value(), x, epsilon = 1e-6);
                    assert_relative_eq!(*back.y.value(), y, epsilon = 1e-6);
                    assert_relative_eq!(*back.spectral.value(), s, epsilon = 1e-9);
                }
            }
        }
    }

    #[test]
    fn test_east_is_towards_lower_x() {
        let wcs = wcs_at(10.0, 0.0);
        let (x_center, _) = wcs.sky_to_ifu_index(&wcs.pointing()).unwrap();
        let east = Equatorial::from_degrees(10.0 + 0.05 / 3600.0, 0.0);
        let (x_east, y_east) = wcs.sky_to_ifu_index(&east).unwrap();
        assert_relative_eq!(x_center - x_east, 5.0, epsilon = 1e-6);
        assert_relative_eq!(y_east, 29.5, epsilon = 1e-6);

        let north = Equatorial::from_degrees(10.0, 0.1 / 3600.0);
        let (_, y_north) = wcs.sky_to_ifu_index(&north).unwrap();
        assert_relative_eq!(y_north - 29.5, 10.0, epsilon = 1e-6);
    }

    #[test]
    fn test_spectral_axis_is_independent() {
        let wcs = wcs_at(45.0, 30.0);
        let a = wcs
            .pixel_to_world(&Quantity::pixels(5.0), &Quantity::pixels(7.0), &Quantity::pixels(1.0))
            .unwrap();
        let b = wcs
            .pixel_to_world(&Quantity::pixels(5.0), &Quantity::pixels(7.0), &Quantity::pixels(900.0))
            .unwrap();
        assert_eq!(a.position, b.position);
        assert_ne!(a.wavelength, b.wavelength);
    }

    #[test]
    fn test_far_side_is_not_projected() {
        let wcs = wcs_at(0.0, 0.0);
        let world = WorldCoord {
            position: Equatorial::from_degrees(180.0, 0.0),
            wavelength: Quantity::micrometers(2.0),
        };
        assert!(wcs.world_to_pixel(&world, Unit::Pixel).unwrap().is_none());
    }

    #[test]
    fn test_unit_errors() {
        let wcs = wcs_at(0.0, 0.0);
        assert!(wcs
            .pixel_to_world(&Quantity::degrees(1.0), &Quantity::pixels(1.0), &Quantity::pixels(1.0))
            .is_err());
        let world = WorldCoord {
            position: wcs.pointing(),
            wavelength: Quantity::micrometers(2.0),
        };
        let err = wcs.world_to_pixel(&world, Unit::Degree).unwrap_err();
        assert_eq!(err.kind(), shared::ErrorKind::Unit);

        let bad_scale = CompositeWcs::build(
            (4, 4),
            Equatorial::from_degrees(0.0, 0.0),
            Quantity::micrometers(1.0),
            LinearWaveCal::from_grating(Grating::MediumK).unwrap(),
        );
        assert!(bad_scale.is_err());
    }

    #[test]
    fn test_field_edges_are_inclusive() {
        let wcs = wcs_at(0.0, 0.0);
        assert!(wcs.contains_ifu_index(-0.5, -0.5));
        assert!(wcs.contains_ifu_index(63.49, 59.49));
        assert!(wcs.contains_ifu_index(63.5, 59.5));
        assert!(!wcs.contains_ifu_index(63.5 + 1e-9, 10.0));
        assert!(!wcs.contains_ifu_index(10.0, 59.5 + 1e-9));
        assert!(!wcs.contains_ifu_index(10.0, -0.51));
    }

    #[test]
    fn test_header_cards() {
        let wcs = wcs_at(150.0, 2.2);
        let cards = wcs.header_cards();
        let get = |k: &str| cards.iter().find(|c| c.key == k).map(|c| c.value.clone());
        assert_eq!(get("CTYPE1"), Some(HeaderValue::Text("RA---TAN".into())));
        assert_eq!(get("CRPIX1"), Some(HeaderValue::Real(32.5)));
        assert_eq!(get("CRPIX2"), Some(HeaderValue::Real(30.5)));
        assert_eq!(get("CRVAL3"), Some(HeaderValue::Real(1.9344)));
        assert_eq!(get("CDELT3"), Some(HeaderValue::Real(0.000285)));
        assert_eq!(get("CUNIT3"), Some(HeaderValue::Text("um".into())));
        match get("CDELT1") {
            Some(HeaderValue::Real(v)) => assert_relative_eq!(v, -0.01 / 3600.0, epsilon = 1e-15),
            other => panic!("unexpected CDELT1 {other:?}"),
        }
    }

    #[test]
    fn test_separation() {
        let a = Equatorial::from_degrees(0.0, 0.0);
        let b = Equatorial::from_degrees(90.0, 0.0);
        assert_relative_eq!(b.separation(&a), std::f64::consts::FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn test_from_quantities_requires_angles() {
        let pos = Equatorial::from_quantities(&Quantity::degrees(10.0), &Quantity::degrees(-5.0)).unwrap();
        assert_relative_eq!(pos.ra_degrees(), 10.0, epsilon = 1e-12);
        assert!(Equatorial::from_quantities(&Quantity::pixels(1.0), &Quantity::degrees(0.0)).is_err());
        assert!(Equatorial::from_quantities(&Quantity::degrees(1.0), &Quantity::degrees(91.0)).is_err());
    }
}
