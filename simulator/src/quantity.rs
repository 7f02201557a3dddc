//! Runtime-tagged physical quantities.
//!
//! Calibration inputs arrive from files and the command line, so their
//! units are only known at runtime. [`Quantity`] pairs a scalar or array
//! magnitude with a [`Unit`] tag and refuses every operation that would
//! mix incompatible units. Sums go through [`Quantity::checked_add`],
//! which fails on incompatible units instead of coercing.
//!
//! Pixel (`pix`, 1-indexed FITS convention) and dimensionless (0-indexed
//! array index) are separate physical types and never convert into each
//! other here; only calibration objects apply the +1 offset between them.

use crate::units::{Angle, AngleExt, Length, LengthExt};
use ndarray::Array1;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Physical type of a unit. Conversion is only defined within one type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhysicalType {
    Pixel,
    Dimensionless,
    Length,
    LengthPerPixel,
    Angle,
    AnglePerPixel,
}

impl fmt::Display for PhysicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PhysicalType::Pixel => "pixel",
            PhysicalType::Dimensionless => "dimensionless",
            PhysicalType::Length => "length",
            PhysicalType::LengthPerPixel => "length/pixel",
            PhysicalType::Angle => "angle",
            PhysicalType::AnglePerPixel => "angle/pixel",
        };
        f.write_str(name)
    }
}

/// Units understood by the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    Pixel,
    Dimensionless,
    Meter,
    Micrometer,
    Nanometer,
    Angstrom,
    MicrometerPerPixel,
    NanometerPerPixel,
    AngstromPerPixel,
    Radian,
    Degree,
    Arcsecond,
    DegreePerPixel,
    ArcsecondPerPixel,
}

impl Unit {
    pub const ALL: [Unit; 14] = [
        Unit::Pixel,
        Unit::Dimensionless,
        Unit::Meter,
        Unit::Micrometer,
        Unit::Nanometer,
        Unit::Angstrom,
        Unit::MicrometerPerPixel,
        Unit::NanometerPerPixel,
        Unit::AngstromPerPixel,
        Unit::Radian,
        Unit::Degree,
        Unit::Arcsecond,
        Unit::DegreePerPixel,
        Unit::ArcsecondPerPixel,
    ];

    pub fn physical_type(self) -> PhysicalType {
        match self {
            Unit::Pixel => PhysicalType::Pixel,
            Unit::Dimensionless => PhysicalType::Dimensionless,
            Unit::Meter | Unit::Micrometer | Unit::Nanometer | Unit::Angstrom => {
                PhysicalType::Length
            }
            Unit::MicrometerPerPixel | Unit::NanometerPerPixel | Unit::AngstromPerPixel => {
                PhysicalType::LengthPerPixel
            }
            Unit::Radian | Unit::Degree | Unit::Arcsecond => PhysicalType::Angle,
            Unit::DegreePerPixel | Unit::ArcsecondPerPixel => PhysicalType::AnglePerPixel,
        }
    }

    /// Canonical symbol, as written in FITS `CUNIT` cards and table headers
    pub fn symbol(self) -> &'static str {
        match self {
            Unit::Pixel => "pix",
            Unit::Dimensionless => "",
            Unit::Meter => "m",
            Unit::Micrometer => "um",
            Unit::Nanometer => "nm",
            Unit::Angstrom => "Angstrom",
            Unit::MicrometerPerPixel => "um / pix",
            Unit::NanometerPerPixel => "nm / pix",
            Unit::AngstromPerPixel => "Angstrom / pix",
            Unit::Radian => "rad",
            Unit::Degree => "deg",
            Unit::Arcsecond => "arcsec",
            Unit::DegreePerPixel => "deg / pix",
            Unit::ArcsecondPerPixel => "arcsec / pix",
        }
    }

    /// For a per-pixel unit, the unit of its numerator
    pub fn numerator(self) -> Unit {
        match self {
            Unit::MicrometerPerPixel => Unit::Micrometer,
            Unit::NanometerPerPixel => Unit::Nanometer,
            Unit::AngstromPerPixel => Unit::Angstrom,
            Unit::DegreePerPixel => Unit::Degree,
            Unit::ArcsecondPerPixel => Unit::Arcsecond,
            other => other,
        }
    }

    /// Size of one unit in the SI base of its physical type (m or rad)
    fn base_scale(self) -> f64 {
        match self.numerator() {
            Unit::Meter => Length::from_meters(1.0).as_meters(),
            Unit::Micrometer => Length::from_micrometers(1.0).as_meters(),
            Unit::Nanometer => Length::from_nanometers(1.0).as_meters(),
            Unit::Angstrom => Length::from_angstroms(1.0).as_meters(),
            Unit::Radian => Angle::from_radians(1.0).as_radians(),
            Unit::Degree => Angle::from_degrees(1.0).as_radians(),
            Unit::Arcsecond => Angle::from_arcseconds(1.0).as_radians(),
            _ => 1.0,
        }
    }

    pub fn is_convertible_to(self, other: Unit) -> bool {
        self.physical_type() == other.physical_type()
    }

    /// Factor `f` such that `x [self] == x * f [target]`
    pub fn conversion_factor(self, target: Unit) -> Result<f64, UnitError> {
        if self == target {
            return Ok(1.0);
        }
        if !self.is_convertible_to(target) {
            return Err(UnitError::Incompatible {
                from: self,
                to: target,
            });
        }
        Ok(self.base_scale() / target.base_scale())
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Dimensionless => f.write_str("dimensionless"),
            other => f.write_str(other.symbol()),
        }
    }
}

impl FromStr for Unit {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        let unit = match compact.as_str() {
            "" => return Err(UnitError::MissingUnit(s.to_string())),
            "pix" | "pixel" | "pixels" => Unit::Pixel,
            "dimensionless" | "1" => Unit::Dimensionless,
            "m" => Unit::Meter,
            "um" | "µm" | "micron" | "microns" => Unit::Micrometer,
            "nm" => Unit::Nanometer,
            "Angstrom" | "angstrom" | "AA" | "Å" => Unit::Angstrom,
            "um/pix" | "µm/pix" | "micron/pix" => Unit::MicrometerPerPixel,
            "nm/pix" => Unit::NanometerPerPixel,
            "Angstrom/pix" | "AA/pix" => Unit::AngstromPerPixel,
            "rad" => Unit::Radian,
            "deg" => Unit::Degree,
            "arcsec" => Unit::Arcsecond,
            "deg/pix" => Unit::DegreePerPixel,
            "arcsec/pix" => Unit::ArcsecondPerPixel,
            _ => return Err(UnitError::UnknownUnit(s.to_string())),
        };
        Ok(unit)
    }
}

/// Unit bookkeeping failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnitError {
    #[error("cannot convert {from} to {to}: incompatible units")]
    Incompatible { from: Unit, to: Unit },

    #[error("{context} expects a {expected} quantity, got unit '{got}'")]
    WrongType {
        context: &'static str,
        expected: PhysicalType,
        got: Unit,
    },

    #[error("{context}: return_units must be pix or dimensionless, got '{got}'")]
    UnsupportedReturnUnit { context: &'static str, got: Unit },

    #[error("missing unit in '{0}'")]
    MissingUnit(String),

    #[error("unknown unit '{0}'")]
    UnknownUnit(String),

    #[error("invalid number in '{0}'")]
    InvalidNumber(String),
}

impl UnitError {
    pub fn kind(&self) -> shared::ErrorKind {
        shared::ErrorKind::Unit
    }
}

/// Numeric payload of a [`Quantity`]: a scalar or a 1-D array.
pub trait Magnitude: Clone + fmt::Debug + PartialEq + Send + Sync {
    /// Apply `f` to every element
    fn map_elements(&self, f: impl Fn(f64) -> f64) -> Self;
}

impl Magnitude for f64 {
    fn map_elements(&self, f: impl Fn(f64) -> f64) -> Self {
        f(*self)
    }
}

impl Magnitude for Array1<f64> {
    fn map_elements(&self, f: impl Fn(f64) -> f64) -> Self {
        self.mapv(f)
    }
}

/// A magnitude tagged with a unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantity<M = f64> {
    value: M,
    unit: Unit,
}

/// Array-valued quantity, evaluated elementwise
pub type ArrayQuantity = Quantity<Array1<f64>>;

impl<M: Magnitude> Quantity<M> {
    pub fn new(value: M, unit: Unit) -> Self {
        Self { value, unit }
    }

    pub fn value(&self) -> &M {
        &self.value
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn into_value(self) -> M {
        self.value
    }

    pub fn physical_type(&self) -> PhysicalType {
        self.unit.physical_type()
    }

    /// Convert to `unit`, failing across physical types
    pub fn to(&self, unit: Unit) -> Result<Self, UnitError> {
        let factor = self.unit.conversion_factor(unit)?;
        if unit == self.unit {
            return Ok(self.clone());
        }
        Ok(Self::new(self.value.map_elements(|v| v * factor), unit))
    }

    /// Magnitude expressed in `unit`
    pub fn value_in(&self, unit: Unit) -> Result<M, UnitError> {
        Ok(self.to(unit)?.value)
    }

    /// Fail unless this quantity has physical type `expected`
    pub fn require(&self, expected: PhysicalType, context: &'static str) -> Result<(), UnitError> {
        if self.physical_type() == expected {
            Ok(())
        } else {
            Err(UnitError::WrongType {
                context,
                expected,
                got: self.unit,
            })
        }
    }

    /// Multiply by a pure number, keeping the unit
    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(self.value.map_elements(|v| v * factor), self.unit)
    }

    /// Apply `f` elementwise and tag the result with `unit`.
    pub(crate) fn map_into(&self, unit: Unit, f: impl Fn(f64) -> f64) -> Self {
        Self::new(self.value.map_elements(f), unit)
    }
}

impl Quantity<f64> {
    pub fn pixels(value: f64) -> Self {
        Self::new(value, Unit::Pixel)
    }

    pub fn dimensionless(value: f64) -> Self {
        Self::new(value, Unit::Dimensionless)
    }

    pub fn micrometers(value: f64) -> Self {
        Self::new(value, Unit::Micrometer)
    }

    pub fn degrees(value: f64) -> Self {
        Self::new(value, Unit::Degree)
    }

    pub fn arcsec_per_pixel(value: f64) -> Self {
        Self::new(value, Unit::ArcsecondPerPixel)
    }

    /// Sum in this quantity's unit; `other` is converted first
    pub fn checked_add(&self, other: &Quantity) -> Result<Quantity, UnitError> {
        Ok(Self::new(self.value + other.value_in(self.unit)?, self.unit))
    }

    /// Difference in this quantity's unit; `other` is converted first
    pub fn checked_sub(&self, other: &Quantity) -> Result<Quantity, UnitError> {
        Ok(Self::new(self.value - other.value_in(self.unit)?, self.unit))
    }

    /// Broadcast to a one-element array quantity
    pub fn to_array(&self) -> ArrayQuantity {
        Quantity::new(Array1::from_elem(1, self.value), self.unit)
    }
}

impl fmt::Display for Quantity<f64> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.unit {
            Unit::Dimensionless => write!(f, "{}", self.value),
            unit => write!(f, "{} {}", self.value, unit.symbol()),
        }
    }
}

impl FromStr for Quantity<f64> {
    type Err = UnitError;

    /// Parses `"<number> <unit>"`, e.g. `"1.9344 um"` or `"1 pix"`.
    ///
    /// A bare number is rejected: unitless input is never guessed.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (number, unit) = match trimmed.split_once(char::is_whitespace) {
            Some((number, unit)) => (number, unit.trim()),
            None => (trimmed, ""),
        };
        let value: f64 = number
            .parse()
            .map_err(|_| UnitError::InvalidNumber(s.to_string()))?;
        if unit.is_empty() {
            return Err(UnitError::MissingUnit(s.to_string()));
        }
        Ok(Self::new(value, unit.parse()?))
    }
}
