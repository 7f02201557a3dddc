//! Type-safe physical units backed by `uom`
//!
//! Wavelengths and sky angles are carried as `uom` quantities wherever
//! the unit is fixed at compile time. Runtime-tagged values use
//! [`crate::quantity::Quantity`], which takes its scale factors from here.

use uom::si::angle::{degree, radian, second};
use uom::si::length::{angstrom, meter, micrometer, nanometer};

/// Type alias for length measurements with convenient methods
pub type Length = uom::si::f64::Length;

/// Type alias for plane angles with convenient methods
pub type Angle = uom::si::f64::Angle;

/// Extension trait for length conversions common in near-infrared spectroscopy
pub trait LengthExt {
    fn from_angstroms(aa: f64) -> Self;
    fn as_angstroms(&self) -> f64;
    fn from_nanometers(nm: f64) -> Self;
    fn as_nanometers(&self) -> f64;
    fn from_micrometers(um: f64) -> Self;
    fn as_micrometers(&self) -> f64;
    fn from_meters(m: f64) -> Self;
    fn as_meters(&self) -> f64;
}

/// Extension trait for sky-angle conversions
pub trait AngleExt {
    fn from_degrees(deg: f64) -> Self;
    fn as_degrees(&self) -> f64;
    fn from_arcseconds(arcsec: f64) -> Self;
    fn as_arcseconds(&self) -> f64;
    fn from_radians(rad: f64) -> Self;
    fn as_radians(&self) -> f64;
}

impl LengthExt for Length {
    fn from_angstroms(aa: f64) -> Self {
        Length::new::<angstrom>(aa)
    }

    fn as_angstroms(&self) -> f64 {
        self.get::<angstrom>()
    }

    fn from_nanometers(nm: f64) -> Self {
        Length::new::<nanometer>(nm)
    }

    fn as_nanometers(&self) -> f64 {
        self.get::<nanometer>()
    }

    fn from_micrometers(um: f64) -> Self {
        Length::new::<micrometer>(um)
    }

    fn as_micrometers(&self) -> f64 {
        self.get::<micrometer>()
    }

    fn from_meters(m: f64) -> Self {
        Length::new::<meter>(m)
    }

    fn as_meters(&self) -> f64 {
        self.get::<meter>()
    }
}

impl AngleExt for Angle {
    fn from_degrees(deg: f64) -> Self {
        Angle::new::<degree>(deg)
    }

    fn as_degrees(&self) -> f64 {
        self.get::<degree>()
    }

    fn from_arcseconds(arcsec: f64) -> Self {
        Angle::new::<second>(arcsec)
    }

    fn as_arcseconds(&self) -> f64 {
        self.get::<second>()
    }

    fn from_radians(rad: f64) -> Self {
        Angle::new::<radian>(rad)
    }

    fn as_radians(&self) -> f64 {
        self.get::<radian>()
    }
}
