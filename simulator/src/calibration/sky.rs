//! Sky emission and atmospheric transmission from the `skycalc` artifact.

use super::table::AsciiTable;
use shared::algo::TabulatedCurve;

/// Tabulated sky radiance (counts per arcsec^2 per um) and transmission.
#[derive(Debug, Clone, PartialEq)]
pub struct SkyModel {
    radiance: TabulatedCurve,
    transmission: TabulatedCurve,
}

impl SkyModel {
    pub fn parse(text: &str) -> Result<Self, String> {
        let table = AsciiTable::parse(text, 3)?;
        let wave = table.column(0);
        let radiance = table.column(1);
        let transmission = table.column(2);

        if let Some(bad) = radiance.iter().find(|v| !(**v >= 0.0)) {
            return Err(format!("negative or invalid sky radiance {bad}"));
        }
        if let Some(bad) = transmission.iter().find(|t| !(0.0..=1.0).contains(*t)) {
            return Err(format!("transmission {bad} outside [0, 1]"));
        }

        Ok(Self {
            radiance: TabulatedCurve::new(wave.clone(), radiance).map_err(|e| e.to_string())?,
            transmission: TabulatedCurve::new(wave, transmission).map_err(|e| e.to_string())?,
        })
    }

    /// Micrometer range covered by the table
    pub fn domain_um(&self) -> (f64, f64) {
        self.radiance.domain()
    }

    /// Radiance integrated over `[lo, hi]` um, in counts per arcsec^2.
    /// Zero outside the tabulated range.
    pub fn radiance_in_bin(&self, lo: f64, hi: f64) -> f64 {
        self.radiance.integrate(lo, hi)
    }

    /// Atmospheric transmission at `wavelength_um`; 1 outside the table.
    pub fn transmission_at(&self, wavelength_um: f64) -> f64 {
        self.transmission.eval_or(wavelength_um, 1.0)
    }
}
