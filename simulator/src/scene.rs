//! Scene model consumed by the renderer.
//!
//! The renderer only sees [`SceneModel`]: a list of [`FluxContribution`]s,
//! each of which splits into spatial samples (sky positions with flux
//! fractions) and spectral samples (wavelengths with counts). Their cross
//! product is the `(ra, dec, wavelength, flux)` sample set of the
//! contribution. Fluxes are expected counts for the whole exposure.
//!
//! [`Scene`] is the built-in implementation, read from JSON:
//!
//! ```json
//! {"objects": [
//!   {"name": "qso", "ra_deg": 150.0, "dec_deg": 2.2,
//!    "spectrum": {"type": "gaussian_line", "center_um": 2.166, "fwhm_um": 0.001, "total_flux": 5e4},
//!    "morphology": {"type": "gaussian", "fwhm_arcsec": 0.05}}
//! ]}
//! ```

use crate::error::{Result, SimError};
use crate::wcs::{CompositeWcs, Equatorial, TangentPlane};
use crate::units::{Angle, AngleExt};
use serde::{Deserialize, Serialize};
use shared::algo::{gaussian_bin_fraction, TabulatedCurve};
use std::fs;
use std::ops::Bound;
use std::path::Path;

/// FWHM of a unit-sigma Gaussian
const FWHM_PER_SIGMA: f64 = 2.354_820_045_030_949_3;

/// Extended sources are sampled out to this many sigma
const GAUSSIAN_EXTENT_SIGMA: f64 = 3.0;

/// Upper bound on spatial grid steps from the center of an extended source
const MAX_HALF_STEPS: usize = 64;

/// A sky position carrying a fraction of a contribution's flux.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialSample {
    pub position: Equatorial,
    pub weight: f64,
}

/// Expected counts at one wavelength.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralSample {
    pub wavelength_um: f64,
    pub flux: f64,
}

/// One `(ra, dec, wavelength, flux)` sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FluxSample {
    pub position: Equatorial,
    pub wavelength_um: f64,
    pub flux: f64,
}

/// Spatial and spectral sampling resolution used to discretize a scene.
///
/// Wavelength bins tile the valid range of the spectral axis exactly, so
/// every bin center is a valid wavelength. Bins are half-open except the
/// last, which also holds the upper edge of the range.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingGrid {
    pixel_scale_rad: f64,
    spatial_step_rad: f64,
    wavelength_lo_um: f64,
    wavelength_hi_um: f64,
    bin_width_um: f64,
    nbins: usize,
}

impl SamplingGrid {
    pub fn new(wcs: &CompositeWcs, spatial_oversampling: usize, spectral_oversampling: usize) -> Self {
        let spatial_oversampling = spatial_oversampling.max(1);
        let spectral_oversampling = spectral_oversampling.max(1);
        let (lo, hi) = wcs.spectral().wavelength_range_um();
        let nbins = wcs.spectral().npix() * spectral_oversampling;
        Self {
            pixel_scale_rad: wcs.scale_radians(),
            spatial_step_rad: wcs.scale_radians() / spatial_oversampling as f64,
            wavelength_lo_um: lo,
            wavelength_hi_um: hi,
            bin_width_um: (hi - lo) / nbins as f64,
            nbins,
        }
    }

    /// Plate scale in radians per IFU pixel
    pub fn pixel_scale_rad(&self) -> f64 {
        self.pixel_scale_rad
    }

    /// Spacing of spatial samples for extended sources
    pub fn spatial_step_rad(&self) -> f64 {
        self.spatial_step_rad
    }

    pub fn bin_width_um(&self) -> f64 {
        self.bin_width_um
    }

    pub fn nbins(&self) -> usize {
        self.nbins
    }

    /// Valid wavelength range in micrometers, both ends inclusive
    pub fn wavelength_range_um(&self) -> (f64, f64) {
        (self.wavelength_lo_um, self.wavelength_hi_um)
    }

    /// Wavelengths half a bin beyond each end of the valid range.
    ///
    /// Flux a spectrum carries outside the range is sampled here, so the
    /// renderer drops it and counts the drop.
    pub fn out_of_band_wavelengths(&self) -> (f64, f64) {
        (
            self.wavelength_lo_um - 0.5 * self.bin_width_um,
            self.wavelength_hi_um + 0.5 * self.bin_width_um,
        )
    }

    /// `(lo, center, hi)` of every wavelength bin, in micrometers
    pub fn wavelength_bins(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        (0..self.nbins).map(move |k| {
            let lo = self.wavelength_lo_um + k as f64 * self.bin_width_um;
            let hi = if k + 1 == self.nbins {
                self.wavelength_hi_um
            } else {
                self.wavelength_lo_um + (k + 1) as f64 * self.bin_width_um
            };
            (lo, 0.5 * (lo + hi), hi)
        })
    }
}

/// A point or extended emitter, as seen by the renderer.
pub trait FluxContribution: Sync {
    fn name(&self) -> &str;

    /// Sky positions and the fraction of flux each carries
    fn spatial_samples(&self, grid: &SamplingGrid) -> Vec<SpatialSample>;

    /// Counts per wavelength sample, including samples beyond the valid
    /// range for flux the spectrum carries there
    fn spectral_samples(&self, grid: &SamplingGrid) -> Vec<SpectralSample>;

    /// Full `(ra, dec, wavelength, flux)` expansion
    fn samples(&self, grid: &SamplingGrid) -> Vec<FluxSample> {
        let spectral = self.spectral_samples(grid);
        self.spatial_samples(grid)
            .iter()
            .flat_map(|s| {
                spectral.iter().map(move |w| FluxSample {
                    position: s.position,
                    wavelength_um: w.wavelength_um,
                    flux: s.weight * w.flux,
                })
            })
            .collect()
    }
}

/// Anything the renderer can draw.
pub trait SceneModel: Sync {
    fn contributions(&self) -> Vec<&dyn FluxContribution>;
}

/// Tabulated spectral flux density, linear between samples and zero outside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTabulated", into = "RawTabulated")]
pub struct TabulatedSpectrum {
    curve: TabulatedCurve,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawTabulated {
    wavelength_um: Vec<f64>,
    flux_density: Vec<f64>,
}

impl TryFrom<RawTabulated> for TabulatedSpectrum {
    type Error = String;

    fn try_from(raw: RawTabulated) -> std::result::Result<Self, Self::Error> {
        if raw.flux_density.iter().any(|f| *f < 0.0) {
            return Err("tabulated flux_density must be non-negative".to_string());
        }
        let curve = TabulatedCurve::new(raw.wavelength_um, raw.flux_density)
            .map_err(|e| format!("invalid tabulated spectrum: {e}"))?;
        Ok(Self { curve })
    }
}

impl From<TabulatedSpectrum> for RawTabulated {
    fn from(t: TabulatedSpectrum) -> Self {
        Self {
            wavelength_um: t.curve.xs().to_vec(),
            flux_density: t.curve.ys().to_vec(),
        }
    }
}

/// Spectral energy distribution of an object, in counts.
///
/// A flat continuum covers the instrument band only. Lines and tables may
/// reach past it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SpectralModel {
    /// Constant counts per micrometer
    Flat { flux_density: f64 },
    /// Single emission line
    GaussianLine {
        center_um: f64,
        fwhm_um: f64,
        total_flux: f64,
    },
    Tabulated(TabulatedSpectrum),
}

impl SpectralModel {
    /// Counts falling in `[lo, hi)` micrometers, or `[lo, hi]` when `closed`
    pub fn counts_in_bin(&self, lo: f64, hi: f64, closed: bool) -> f64 {
        match self {
            SpectralModel::Flat { flux_density } => flux_density * (hi - lo),
            SpectralModel::GaussianLine {
                center_um,
                fwhm_um,
                total_flux,
            } => {
                let sigma = fwhm_um / FWHM_PER_SIGMA;
                let fraction = if closed {
                    gaussian_bin_fraction(lo..=hi, *center_um, sigma)
                } else {
                    gaussian_bin_fraction(lo..hi, *center_um, sigma)
                };
                total_flux * fraction
            }
            SpectralModel::Tabulated(t) => t.curve.integrate(lo, hi),
        }
    }

    /// Counts below `lo` and above `hi` micrometers
    pub fn counts_outside(&self, lo: f64, hi: f64) -> (f64, f64) {
        match self {
            SpectralModel::Flat { .. } => (0.0, 0.0),
            SpectralModel::GaussianLine {
                center_um,
                fwhm_um,
                total_flux,
            } => {
                let sigma = fwhm_um / FWHM_PER_SIGMA;
                (
                    total_flux * gaussian_bin_fraction(..lo, *center_um, sigma),
                    total_flux * gaussian_bin_fraction((Bound::Excluded(hi), Bound::Unbounded), *center_um, sigma),
                )
            }
            SpectralModel::Tabulated(t) => (
                t.curve.integrate(f64::NEG_INFINITY, lo),
                t.curve.integrate(hi, f64::INFINITY),
            ),
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        match self {
            SpectralModel::Flat { flux_density } if !(*flux_density >= 0.0 && flux_density.is_finite()) => {
                Err(format!("flux_density must be finite and >= 0, got {flux_density}"))
            }
            SpectralModel::GaussianLine {
                center_um,
                fwhm_um,
                total_flux,
            } if !(center_um.is_finite()
                && *fwhm_um >= 0.0
                && fwhm_um.is_finite()
                && *total_flux >= 0.0
                && total_flux.is_finite()) =>
            {
                Err(format!(
                    "invalid gaussian line center={center_um} fwhm={fwhm_um} flux={total_flux}"
                ))
            }
            _ => Ok(()),
        }
    }
}

/// Spatial light distribution of an object.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Morphology {
    #[default]
    Point,
    /// Circular Gaussian
    Gaussian { fwhm_arcsec: f64 },
    /// Flat disk with a sharp edge
    UniformDisk { radius_arcsec: f64 },
}

impl Morphology {
    fn validate(&self) -> std::result::Result<(), String> {
        match *self {
            Morphology::Gaussian { fwhm_arcsec: v } | Morphology::UniformDisk { radius_arcsec: v }
                if !(v > 0.0 && v.is_finite()) =>
            {
                Err(format!("extended morphology size must be positive, got {v}"))
            }
            _ => Ok(()),
        }
    }

    /// Tangent-plane offsets (radians) and unnormalized weights
    fn offsets(&self, step: f64) -> Vec<(f64, f64, f64)> {
        let (extent, profile): (f64, Box<dyn Fn(f64) -> f64>) = match *self {
            Morphology::Point => return vec![(0.0, 0.0, 1.0)],
            Morphology::Gaussian { fwhm_arcsec } => {
                let sigma = Angle::from_arcseconds(fwhm_arcsec).as_radians() / FWHM_PER_SIGMA;
                (
                    GAUSSIAN_EXTENT_SIGMA * sigma,
                    Box::new(move |r2: f64| (-0.5 * r2 / (sigma * sigma)).exp()),
                )
            }
            Morphology::UniformDisk { radius_arcsec } => {
                let radius = Angle::from_arcseconds(radius_arcsec).as_radians();
                (
                    radius,
                    Box::new(move |r2: f64| if r2 <= radius * radius { 1.0 } else { 0.0 }),
                )
            }
        };

        let half_steps = ((extent / step).ceil() as usize).clamp(1, MAX_HALF_STEPS);
        let step = extent / half_steps as f64;
        let n = half_steps as i64;

        let mut out: Vec<(f64, f64, f64)> = (-n..=n)
            .flat_map(|j| (-n..=n).map(move |i| (i as f64 * step, j as f64 * step)))
            .map(|(dx, dy)| (dx, dy, profile(dx * dx + dy * dy)))
            .filter(|(_, _, w)| *w > 0.0)
            .collect();
        if out.is_empty() {
            out.push((0.0, 0.0, 1.0));
        }
        out
    }
}

/// One emitting object of a [`Scene`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub name: String,
    pub ra_deg: f64,
    pub dec_deg: f64,
    pub spectrum: SpectralModel,
    #[serde(default)]
    pub morphology: Morphology,
}

impl SceneObject {
    pub fn position(&self) -> Equatorial {
        Equatorial::from_degrees(self.ra_deg, self.dec_deg)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if !self.ra_deg.is_finite() || !(-90.0..=90.0).contains(&self.dec_deg) {
            return Err(format!(
                "object '{}' has invalid position ra={} dec={}",
                self.name, self.ra_deg, self.dec_deg
            ));
        }
        self.spectrum
            .validate()
            .and_then(|_| self.morphology.validate())
            .map_err(|e| format!("object '{}': {e}", self.name))
    }
}

impl FluxContribution for SceneObject {
    fn name(&self) -> &str {
        &self.name
    }

    fn spatial_samples(&self, grid: &SamplingGrid) -> Vec<SpatialSample> {
        let offsets = self.morphology.offsets(grid.spatial_step_rad());
        let total: f64 = offsets.iter().map(|(_, _, w)| w).sum();
        let plane = TangentPlane::new(self.position());
        offsets
            .into_iter()
            .map(|(dx, dy, w)| SpatialSample {
                position: plane.deproject(dx, dy),
                weight: w / total,
            })
            .collect()
    }

    fn spectral_samples(&self, grid: &SamplingGrid) -> Vec<SpectralSample> {
        let last = grid.nbins().saturating_sub(1);
        let mut samples: Vec<SpectralSample> = grid
            .wavelength_bins()
            .enumerate()
            .filter_map(|(k, (lo, center, hi))| {
                let flux = self.spectrum.counts_in_bin(lo, hi, k == last);
                (flux > 0.0).then_some(SpectralSample {
                    wavelength_um: center,
                    flux,
                })
            })
            .collect();

        let (lo, hi) = grid.wavelength_range_um();
        let (below, above) = self.spectrum.counts_outside(lo, hi);
        let (below_um, above_um) = grid.out_of_band_wavelengths();
        for (wavelength_um, flux) in [(below_um, below), (above_um, above)] {
            if flux > 0.0 {
                samples.push(SpectralSample { wavelength_um, flux });
            }
        }
        samples
    }
}

/// Parsed scene description.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Scene {
    pub objects: Vec<SceneObject>,
}

impl Scene {
    pub fn from_json_str(text: &str) -> std::result::Result<Self, String> {
        let scene: Scene = serde_json::from_str(text).map_err(|e| e.to_string())?;
        scene.objects.iter().try_for_each(SceneObject::validate)?;
        Ok(scene)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| SimError::Scene {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_json_str(&text).map_err(|reason| SimError::Scene {
            path: path.to_path_buf(),
            reason,
        })
    }
}

impl SceneModel for Scene {
    fn contributions(&self) -> Vec<&dyn FluxContribution> {
        self.objects.iter().map(|o| o as &dyn FluxContribution).collect()
    }
}
