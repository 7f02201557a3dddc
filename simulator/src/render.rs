//! Detector-frame rendering for the IFU.
//!
//! A render pass turns a [`SceneModel`] into counts on the detector:
//!
//! 1. Every scene contribution is expanded on a [`SamplingGrid`] into sky
//!    positions and wavelength samples.
//! 2. Sky positions are projected into IFU pixel coordinates; samples off
//!    the IFU field or outside the valid wavelength range are dropped and
//!    counted. Spectra reaching past the range carry that flux in samples
//!    just beyond it.
//! 3. The geometric-distortion model maps `(x_ifu, y_ifu, wavelength)` to a
//!    fractional detector position. Samples outside the fitted domain are
//!    dropped and counted.
//! 4. Flux is deposited with a [`DepositionKernel`]. Both kernels conserve
//!    flux; only cells beyond the detector edge lose it.
//! 5. Optional sky and arc-lamp illumination are added per spaxel before the
//!    flat field is applied.
//! 6. Shot noise and read noise are drawn from seeds taken from the caller's
//!    RNG and nothing else.
//!
//! Work is evaluated in parallel batches whose results are applied in input
//! order, so the accumulated frame is identical for any thread count.

use crate::calibration::{CalibrationData, FlatFieldMode};
use crate::error::{Result, SimError};
use crate::scene::{FluxContribution, SamplingGrid, SceneModel, SpectralSample};
use crate::units::{Angle, AngleExt};
use crate::wavecal::LinearWaveCal;
use crate::wcs::CompositeWcs;
use clap::ValueEnum;
use log::{debug, info, warn};
use ndarray::Array2;
use rand::RngCore;
use shared::algo::map_batches_in_order;
use shared::image_proc::{add_gaussian_read_noise, apply_poisson_photon_noise};
use std::fmt;
use std::ops::Range;

/// Work items evaluated in parallel before their deposits are applied
const BATCH_ITEMS: usize = 64;

/// Spectral samples traced per work item
const SPECTRAL_CHUNK: usize = 256;

/// How a fractional detector position is spread over pixels.
///
/// Pixel `i` is centered on coordinate `i` and covers `[i - 0.5, i + 0.5)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DepositionKernel {
    /// All flux into the pixel containing the position
    Nearest,
    /// Flux split over the four surrounding pixel centers
    #[default]
    Bilinear,
}

impl DepositionKernel {
    fn for_each_cell(self, x: f64, y: f64, mut f: impl FnMut(i64, i64, f64)) {
        match self {
            DepositionKernel::Nearest => f((x + 0.5).floor() as i64, (y + 0.5).floor() as i64, 1.0),
            DepositionKernel::Bilinear => {
                let (x0, y0) = (x.floor(), y.floor());
                let (fx, fy) = (x - x0, y - y0);
                let (ix, iy) = (x0 as i64, y0 as i64);
                for (dx, dy, w) in [
                    (0, 0, (1.0 - fx) * (1.0 - fy)),
                    (1, 0, fx * (1.0 - fy)),
                    (0, 1, (1.0 - fx) * fy),
                    (1, 1, fx * fy),
                ] {
                    if w > 0.0 {
                        f(ix + dx, iy + dy, w);
                    }
                }
            }
        }
    }
}

impl fmt::Display for DepositionKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DepositionKernel::Nearest => "nearest",
            DepositionKernel::Bilinear => "bilinear",
        })
    }
}

/// Knobs of a render pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub kernel: DepositionKernel,
    /// Spatial samples per IFU pixel along each axis for extended sources
    pub spatial_oversampling: usize,
    /// Wavelength samples per spectral pixel
    pub spectral_oversampling: usize,
    pub flat_field: FlatFieldMode,
    /// Gaussian readout noise sigma in counts
    pub readout_noise: f64,
    pub shot_noise: bool,
    /// Scale applied to the sky emission, None to skip the sky
    pub sky: Option<f64>,
    /// Attenuate scene flux by the atmospheric transmission
    pub apply_transmission: bool,
    /// Scale applied to arc-lamp line intensities, None to skip the lamp
    pub arc_lamp: Option<f64>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            kernel: DepositionKernel::default(),
            spatial_oversampling: 3,
            spectral_oversampling: 1,
            flat_field: FlatFieldMode::Default,
            readout_noise: 0.0,
            shot_noise: true,
            sky: None,
            apply_transmission: false,
            arc_lamp: None,
        }
    }
}

impl RenderOptions {
    pub fn validate(&self) -> Result<()> {
        if !(self.readout_noise >= 0.0 && self.readout_noise.is_finite()) {
            return Err(SimError::Configuration(format!(
                "readout noise must be a finite value >= 0, got {}",
                self.readout_noise
            )));
        }
        if self.spatial_oversampling == 0 || self.spectral_oversampling == 0 {
            return Err(SimError::Configuration(
                "oversampling factors must be at least 1".to_string(),
            ));
        }
        for (name, scale) in [("sky", self.sky), ("arc lamp", self.arc_lamp)] {
            if let Some(s) = scale {
                if !(s >= 0.0 && s.is_finite()) {
                    return Err(SimError::Configuration(format!(
                        "{name} scale must be a finite value >= 0, got {s}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Sample and flux bookkeeping of a render pass.
///
/// Every traced sample ends up in exactly one of `samples_deposited` or a
/// `dropped_*` counter, and `flux_accepted` splits into `flux_deposited`
/// plus `flux_lost_at_edges`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderStats {
    pub samples_total: u64,
    pub samples_deposited: u64,
    pub dropped_outside_field: u64,
    pub dropped_outside_wavelength: u64,
    pub dropped_geometry: u64,
    pub dropped_behind_projection: u64,
    pub flux_injected: f64,
    pub flux_accepted: f64,
    pub flux_deposited: f64,
    pub flux_lost_at_edges: f64,
}

impl RenderStats {
    pub fn merge(&mut self, other: &RenderStats) {
        self.samples_total += other.samples_total;
        self.samples_deposited += other.samples_deposited;
        self.dropped_outside_field += other.dropped_outside_field;
        self.dropped_outside_wavelength += other.dropped_outside_wavelength;
        self.dropped_geometry += other.dropped_geometry;
        self.dropped_behind_projection += other.dropped_behind_projection;
        self.flux_injected += other.flux_injected;
        self.flux_accepted += other.flux_accepted;
        self.flux_deposited += other.flux_deposited;
        self.flux_lost_at_edges += other.flux_lost_at_edges;
    }

    pub fn dropped(&self) -> u64 {
        self.dropped_outside_field
            + self.dropped_outside_wavelength
            + self.dropped_geometry
            + self.dropped_behind_projection
    }

    fn log_summary(&self, what: &str) {
        info!(
            "{what}: {} of {} samples deposited, {:.6e} of {:.6e} counts on the detector",
            self.samples_deposited, self.samples_total, self.flux_deposited, self.flux_injected
        );
        if self.dropped() > 0 {
            warn!(
                "{what}: dropped {} samples (outside field: {}, outside wavelength range: {}, \
                 distortion domain: {}, behind projection: {})",
                self.dropped(),
                self.dropped_outside_field,
                self.dropped_outside_wavelength,
                self.dropped_geometry,
                self.dropped_behind_projection
            );
        }
        if self.flux_lost_at_edges > 0.0 {
            warn!("{what}: {:.6e} counts fell beyond the detector edges", self.flux_lost_at_edges);
        }
    }
}

/// Finished detector image, shape `(naxis2, naxis1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorFrame {
    data: Array2<f64>,
}

impl DetectorFrame {
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn sum(&self) -> f64 {
        self.data.sum()
    }

    pub fn into_array(self) -> Array2<f64> {
        self.data
    }
}

/// Output of [`IfuSimulator::render`].
#[derive(Debug, Clone)]
pub struct RenderedExposure {
    /// Final frame with flat field and noise applied
    pub frame: DetectorFrame,
    /// Scene counts before flat field and noise
    pub source_image: Array2<f64>,
    /// Sky emission before flat field and noise
    pub sky_image: Array2<f64>,
    /// Arc-lamp illumination before flat field and noise
    pub lamp_image: Array2<f64>,
    /// All components after the flat field, before noise
    pub noiseless_image: Array2<f64>,
    /// Scene sample bookkeeping
    pub stats: RenderStats,
    /// Sky and arc-lamp sample bookkeeping
    pub background_stats: RenderStats,
}

/// Deposits of one work item plus its bookkeeping
struct Traced {
    deposits: Vec<([usize; 2], f64)>,
    stats: RenderStats,
}

impl Traced {
    fn new() -> Self {
        Self {
            deposits: Vec::new(),
            stats: RenderStats::default(),
        }
    }
}

/// Forward model from scene to detector frame for one instrument setup.
#[derive(Debug)]
pub struct IfuSimulator<'a> {
    wcs: &'a CompositeWcs,
    detector_shape: (usize, usize),
    calibration: &'a CalibrationData,
    options: RenderOptions,
    grid: SamplingGrid,
    wavelength_range_um: (f64, f64),
}

impl<'a> IfuSimulator<'a> {
    /// Check that `wcs`, `wavecal`, the calibration data and `detector_shape`
    /// describe the same instrument setup.
    pub fn new(
        wcs: &'a CompositeWcs,
        wavecal: &LinearWaveCal,
        detector_shape: (usize, usize),
        calibration: &'a CalibrationData,
        options: RenderOptions,
    ) -> Result<Self> {
        options.validate()?;

        if wavecal != wcs.spectral() {
            return Err(SimError::Configuration(format!(
                "wavelength calibration {wavecal} does not match the WCS spectral axis {}",
                wcs.spectral()
            )));
        }
        if detector_shape.0 == 0 || detector_shape.1 == 0 {
            return Err(SimError::Configuration(format!(
                "detector shape {detector_shape:?} is empty"
            )));
        }
        let model_shape = calibration.distortion.detector_shape();
        if model_shape != detector_shape {
            return Err(SimError::Configuration(format!(
                "distortion model maps onto a {model_shape:?} detector, expected {detector_shape:?}"
            )));
        }
        match (options.flat_field, &calibration.flat) {
            (FlatFieldMode::Default, None) => {
                return Err(SimError::Configuration(
                    "flat field requested but no flatpix2pix data is loaded".to_string(),
                ))
            }
            (FlatFieldMode::Default, Some(flat)) if flat.shape() != detector_shape => {
                return Err(SimError::Configuration(format!(
                    "flat field shape {:?} differs from detector shape {detector_shape:?}",
                    flat.shape()
                )))
            }
            _ => {}
        }

        let grid = SamplingGrid::new(wcs, options.spatial_oversampling, options.spectral_oversampling);
        Ok(Self {
            wcs,
            detector_shape,
            calibration,
            wavelength_range_um: wavecal.wavelength_range_um(),
            options,
            grid,
        })
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn grid(&self) -> &SamplingGrid {
        &self.grid
    }

    /// Render `scene` into a detector frame, drawing noise seeds from `rng`.
    pub fn render<S, R>(&self, scene: &S, rng: &mut R) -> Result<RenderedExposure>
    where
        S: SceneModel + ?Sized,
        R: RngCore,
    {
        let contributions = scene.contributions();
        info!(
            "rendering {} scene contributions onto a {:?} detector ({} kernel, {} wavelength bins)",
            contributions.len(),
            self.detector_shape,
            self.options.kernel,
            self.grid.nbins()
        );

        let mut source_image = Array2::zeros(self.detector_shape);
        let mut stats = RenderStats::default();
        for contribution in contributions {
            let s = self.render_contribution(contribution, &mut source_image);
            debug!(
                "{}: {} samples, {:.6e} counts injected",
                contribution.name(),
                s.samples_total,
                s.flux_injected
            );
            stats.merge(&s);
        }
        stats.log_summary("scene");

        let mut background_stats = RenderStats::default();
        let mut sky_image = Array2::zeros(self.detector_shape);
        if let Some(scale) = self.options.sky {
            let spectrum = self.sky_spectrum(scale);
            background_stats.merge(&self.render_per_spaxel(&spectrum, &mut sky_image));
        }
        let mut lamp_image = Array2::zeros(self.detector_shape);
        if let Some(scale) = self.options.arc_lamp {
            let spectrum = self.lamp_spectrum(scale);
            background_stats.merge(&self.render_per_spaxel(&spectrum, &mut lamp_image));
        }
        if self.options.sky.is_some() || self.options.arc_lamp.is_some() {
            background_stats.log_summary("background");
        }

        let total = &source_image + &sky_image + &lamp_image;
        let noiseless_image = match (self.options.flat_field, &self.calibration.flat) {
            (FlatFieldMode::Default, Some(flat)) => flat.apply(&total),
            _ => total,
        };

        let shot_seed = rng.next_u64();
        let read_seed = rng.next_u64();
        let shot = if self.options.shot_noise {
            apply_poisson_photon_noise(&noiseless_image, shot_seed)
        } else {
            noiseless_image.clone()
        };
        let data = add_gaussian_read_noise(shot, self.options.readout_noise, read_seed)?;

        Ok(RenderedExposure {
            frame: DetectorFrame { data },
            source_image,
            sky_image,
            lamp_image,
            noiseless_image,
            stats,
            background_stats,
        })
    }

    fn render_contribution(&self, contribution: &dyn FluxContribution, image: &mut Array2<f64>) -> RenderStats {
        let spatial = contribution.spatial_samples(&self.grid);
        let mut spectral = contribution.spectral_samples(&self.grid);
        if self.options.apply_transmission {
            for s in spectral.iter_mut() {
                s.flux *= self.calibration.sky.transmission_at(s.wavelength_um);
            }
        }

        let nspec = spectral.len();
        let items: Vec<(usize, Range<usize>)> = (0..spatial.len())
            .flat_map(|i| {
                (0..nspec)
                    .step_by(SPECTRAL_CHUNK)
                    .map(move |start| (i, start..(start + SPECTRAL_CHUNK).min(nspec)))
            })
            .collect();

        let mut stats = RenderStats::default();
        map_batches_in_order(
            &items,
            BATCH_ITEMS,
            |_, (i, range)| {
                let sample = &spatial[*i];
                let chunk = &spectral[range.clone()];
                let mut traced = Traced::new();
                match self.wcs.sky_to_ifu_index(&sample.position) {
                    None => {
                        let n = Self::drop_all(chunk, sample.weight, &mut traced.stats);
                        traced.stats.dropped_behind_projection += n;
                    }
                    Some((x, y)) if !self.wcs.contains_ifu_index(x, y) => {
                        let n = Self::drop_all(chunk, sample.weight, &mut traced.stats);
                        traced.stats.dropped_outside_field += n;
                    }
                    Some((x, y)) => chunk.iter().for_each(|w| {
                        self.trace(x, y, w.wavelength_um, sample.weight * w.flux, &mut traced)
                    }),
                }
                traced
            },
            |traced| self.apply(traced, image, &mut stats),
        );
        stats
    }

    /// Trace the same spectrum through the center of every spaxel
    fn render_per_spaxel(&self, spectrum: &[SpectralSample], image: &mut Array2<f64>) -> RenderStats {
        let (nx, ny) = self.wcs.naxis_ifu();
        let spaxels: Vec<(usize, usize)> = (0..ny).flat_map(|y| (0..nx).map(move |x| (x, y))).collect();

        let mut stats = RenderStats::default();
        map_batches_in_order(
            &spaxels,
            BATCH_ITEMS,
            |_, &(x, y)| {
                let mut traced = Traced::new();
                for s in spectrum {
                    self.trace(x as f64, y as f64, s.wavelength_um, s.flux, &mut traced);
                }
                traced
            },
            |traced| self.apply(traced, image, &mut stats),
        );
        stats
    }

    /// Sky counts per spaxel and wavelength bin
    fn sky_spectrum(&self, scale: f64) -> Vec<SpectralSample> {
        let spaxel_area = Angle::from_radians(self.grid.pixel_scale_rad()).as_arcseconds().powi(2);
        self.grid
            .wavelength_bins()
            .filter_map(|(lo, center, hi)| {
                let flux = self.calibration.sky.radiance_in_bin(lo, hi) * spaxel_area * scale;
                (flux > 0.0).then_some(SpectralSample {
                    wavelength_um: center,
                    flux,
                })
            })
            .collect()
    }

    /// Arc lines inside the valid wavelength range, per spaxel
    fn lamp_spectrum(&self, scale: f64) -> Vec<SpectralSample> {
        let (lo, hi) = self.wavelength_range_um;
        self.calibration
            .arc_lines
            .within(lo, hi)
            .iter()
            .map(|line| SpectralSample {
                wavelength_um: line.wavelength_um,
                flux: line.intensity * scale,
            })
            .filter(|s| s.flux > 0.0)
            .collect()
    }

    /// Count a chunk as injected but not traced; returns the number of samples
    fn drop_all(chunk: &[SpectralSample], weight: f64, stats: &mut RenderStats) -> u64 {
        let n = chunk.len() as u64;
        stats.samples_total += n;
        stats.flux_injected += weight * chunk.iter().map(|s| s.flux).sum::<f64>();
        n
    }

    fn trace(&self, x_ifu: f64, y_ifu: f64, wavelength_um: f64, flux: f64, traced: &mut Traced) {
        let stats = &mut traced.stats;
        stats.samples_total += 1;
        stats.flux_injected += flux;

        let (lo, hi) = self.wavelength_range_um;
        if !(lo..=hi).contains(&wavelength_um) {
            stats.dropped_outside_wavelength += 1;
            return;
        }

        let (x_det, y_det) = match self.calibration.distortion.evaluate(x_ifu, y_ifu, wavelength_um) {
            Ok((x, y)) if x.is_finite() && y.is_finite() => (x, y),
            _ => {
                stats.dropped_geometry += 1;
                return;
            }
        };

        stats.samples_deposited += 1;
        stats.flux_accepted += flux;
        let (ny, nx) = self.detector_shape;
        let deposits = &mut traced.deposits;
        self.options.kernel.for_each_cell(x_det, y_det, |ix, iy, w| {
            let counts = flux * w;
            if ix >= 0 && iy >= 0 && (ix as usize) < nx && (iy as usize) < ny {
                deposits.push(([iy as usize, ix as usize], counts));
                stats.flux_deposited += counts;
            } else {
                stats.flux_lost_at_edges += counts;
            }
        });
    }

    fn apply(&self, traced: Traced, image: &mut Array2<f64>, stats: &mut RenderStats) {
        for (idx, counts) in traced.deposits {
            image[idx] += counts;
        }
        stats.merge(&traced.stats);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{ArcLineList, DistortionModel, FlatField, SkyModel};
    use crate::instrument::{Grating, SpatialScale, FRIDA_IFU};
    use crate::scene::{Morphology, Scene, SceneObject, SpectralModel};
    use crate::wcs::Equatorial;
    use approx::assert_relative_eq;
    use ndarray::s;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const DETECTOR: (usize, usize) = (2048, 2048);

    /// Slices side by side in x, wavelength along y, one detector row per spectral pixel
    fn distortion_json(shape: (usize, usize)) -> String {
        let slices: Vec<String> = (0..FRIDA_IFU.nslices)
            .map(|s| {
                let (lo, hi) = FRIDA_IFU.slice_y_range(s);
                format!(
                    r#"{{"index": {s}, "y_ifu": [{lo}, {hi}],
                        "x_detector": [{{"powers": [1, 0, 0], "coeff": 1.0}}, {{"powers": [0, 0, 0], "coeff": {}}}],
                        "y_detector": [{{"powers": [0, 0, 1], "coeff": {}}}, {{"powers": [0, 0, 0], "coeff": {}}}]}}"#,
                    2.0 + 68.0 * s as f64,
                    1.0 / 0.000285,
                    -1.9344 / 0.000285
                )
            })
            .collect();
        format!(
            r#"{{"grating": "medium-K", "detector_shape": [{}, {}], "wavelength_unit": "um",
                "domain": {{"x_ifu": [-0.5, 63.5], "wavelength": [1.9, 2.55]}},
                "slices": [{}]}}"#,
            shape.0,
            shape.1,
            slices.join(",")
        )
    }

    fn calibration(flat: Option<FlatField>) -> CalibrationData {
        CalibrationData {
            sky: SkyModel::parse("# wavelength_unit = um\n1.9 1000 0.5\n2.6 1000 0.5\n").unwrap(),
            arc_lines: ArcLineList::parse("# wavelength_unit = um\n2.0 100\n2.2 50\n3.0 10\n").unwrap(),
            flat,
            distortion: DistortionModel::from_json_str(&distortion_json(DETECTOR)).unwrap(),
        }
    }

    fn wcs() -> CompositeWcs {
        CompositeWcs::build(
            FRIDA_IFU.naxis(),
            Equatorial::from_degrees(120.0, 30.0),
            SpatialScale::Fine.quantity(),
            LinearWaveCal::from_grating(Grating::MediumK).unwrap(),
        )
        .unwrap()
    }

    fn options() -> RenderOptions {
        RenderOptions {
            flat_field: FlatFieldMode::None,
            shot_noise: false,
            ..RenderOptions::default()
        }
    }

    fn point_scene(dra_arcsec: f64, spectrum: SpectralModel) -> Scene {
        Scene {
            objects: vec![SceneObject {
                name: "src".into(),
                ra_deg: 120.0 + dra_arcsec / 3600.0 / 30f64.to_radians().cos(),
                dec_deg: 30.0,
                spectrum,
                morphology: Morphology::Point,
            }],
        }
    }

    #[test]
    fn test_kernels_conserve_weight() {
        for kernel in [DepositionKernel::Nearest, DepositionKernel::Bilinear] {
            let mut total = 0.0;
            kernel.for_each_cell(3.3, 7.8, |_, _, w| total += w);
            assert_relative_eq!(total, 1.0, epsilon = 1e-12);
        }
        let mut cells = Vec::new();
        DepositionKernel::Nearest.for_each_cell(3.5, 7.49, |x, y, _| cells.push((x, y)));
        assert_eq!(cells, vec![(4, 7)]);
    }

    #[test]
    fn test_options_validation() {
        assert!(options().validate().is_ok());
        let bad = RenderOptions {
            readout_noise: -5.0,
            ..options()
        };
        assert_eq!(bad.validate().unwrap_err().kind(), shared::ErrorKind::Configuration);
        let bad = RenderOptions {
            spatial_oversampling: 0,
            ..options()
        };
        assert!(bad.validate().is_err());
        let bad = RenderOptions {
            sky: Some(f64::NAN),
            ..options()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_point_source_flux_conservation() {
        let (wcs, cal) = (wcs(), calibration(None));
        let sim = IfuSimulator::new(&wcs, wcs.spectral(), DETECTOR, &cal, options()).unwrap();
        let scene = point_scene(0.0, SpectralModel::Flat { flux_density: 1.0e5 });
        let exposure = sim.render(&scene, &mut StdRng::seed_from_u64(1)).unwrap();

        let injected = 1.0e5 * 2048.0 * 0.000285;
        assert_relative_eq!(exposure.stats.flux_injected, injected, max_relative = 1e-9);
        assert_eq!(exposure.stats.dropped(), 0);
        assert_relative_eq!(
            exposure.source_image.sum(),
            exposure.stats.flux_deposited,
            max_relative = 1e-9
        );
        assert_relative_eq!(
            exposure.stats.flux_deposited + exposure.stats.flux_lost_at_edges,
            injected,
            max_relative = 1e-9
        );
        assert_relative_eq!(exposure.frame.sum(), exposure.source_image.sum(), max_relative = 1e-12);
    }

    #[test]
    fn test_source_outside_field_is_dropped() {
        let (wcs, cal) = (wcs(), calibration(None));
        let sim = IfuSimulator::new(&wcs, wcs.spectral(), DETECTOR, &cal, options()).unwrap();
        let scene = point_scene(5.0, SpectralModel::Flat { flux_density: 1.0e5 });
        let exposure = sim.render(&scene, &mut StdRng::seed_from_u64(1)).unwrap();

        assert_eq!(exposure.stats.samples_deposited, 0);
        assert_eq!(exposure.stats.dropped_outside_field, 2048);
        assert_eq!(exposure.frame.sum(), 0.0);
    }

    #[test]
    fn test_distortion_domain_drops_are_counted() {
        let wcs = wcs();
        let cal = CalibrationData {
            distortion: DistortionModel::from_json_str(
                &distortion_json(DETECTOR).replace("[1.9, 2.55]", "[1.9, 2.5]"),
            )
            .unwrap(),
            ..calibration(None)
        };
        let sim = IfuSimulator::new(&wcs, wcs.spectral(), DETECTOR, &cal, options()).unwrap();
        let scene = point_scene(
            0.0,
            SpectralModel::Tabulated(
                serde_json::from_str(r#"{"wavelength_um": [2.5, 2.52, 2.6], "flux_density": [100, 100, 100]}"#)
                    .unwrap(),
            ),
        );
        let exposure = sim.render(&scene, &mut StdRng::seed_from_u64(1)).unwrap();
        assert!(exposure.stats.dropped_geometry > 0);
        assert!(exposure.stats.samples_deposited > 0);
        assert_eq!(
            exposure.stats.samples_total,
            exposure.stats.samples_deposited + exposure.stats.dropped()
        );
    }

    #[test]
    fn test_line_lands_between_expected_rows() {
        let (wcs, cal) = (wcs(), calibration(None));
        let sim = IfuSimulator::new(&wcs, wcs.spectral(), DETECTOR, &cal, options()).unwrap();
        // falls in the bin centered half a pixel above spectral pixel 1000
        let center = 1.9344 + 1000.2 * 0.000285;
        let scene = point_scene(
            0.0,
            SpectralModel::GaussianLine {
                center_um: center,
                fwhm_um: 0.0,
                total_flux: 1000.0,
            },
        );
        let exposure = sim.render(&scene, &mut StdRng::seed_from_u64(1)).unwrap();
        let rows = exposure.source_image.slice(s![1000..=1001, ..]).sum();
        assert_relative_eq!(rows, 1000.0, max_relative = 1e-9);
        assert_eq!(exposure.stats.samples_total, 1);
    }

    #[test]
    fn test_line_beyond_band_is_counted_not_deposited() {
        let (wcs, cal) = (wcs(), calibration(None));
        let sim = IfuSimulator::new(&wcs, wcs.spectral(), DETECTOR, &cal, options()).unwrap();
        let scene = point_scene(
            0.0,
            SpectralModel::GaussianLine {
                center_um: 3.0,
                fwhm_um: 0.002,
                total_flux: 1.0e4,
            },
        );
        let exposure = sim.render(&scene, &mut StdRng::seed_from_u64(1)).unwrap();

        assert!(exposure.stats.dropped_outside_wavelength > 0);
        assert_relative_eq!(exposure.stats.flux_injected, 1.0e4, max_relative = 1e-9);
        assert!(exposure.stats.flux_injected > exposure.frame.sum());
        assert_eq!(
            exposure.stats.samples_total,
            exposure.stats.samples_deposited + exposure.stats.dropped()
        );
    }

    #[test]
    fn test_line_on_upper_band_edge_is_deposited() {
        let (wcs, cal) = (wcs(), calibration(None));
        let sim = IfuSimulator::new(&wcs, wcs.spectral(), DETECTOR, &cal, options()).unwrap();
        let (_, hi) = wcs.spectral().wavelength_range_um();
        let scene = point_scene(
            0.0,
            SpectralModel::GaussianLine {
                center_um: hi,
                fwhm_um: 0.0,
                total_flux: 1000.0,
            },
        );
        let exposure = sim.render(&scene, &mut StdRng::seed_from_u64(1)).unwrap();

        assert_eq!(exposure.stats.samples_total, 1);
        assert_eq!(exposure.stats.dropped(), 0);
        assert_relative_eq!(
            exposure.source_image.sum() + exposure.stats.flux_lost_at_edges,
            1000.0,
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_same_seed_is_bit_identical() {
        let (wcs, cal) = (wcs(), calibration(None));
        let opts = RenderOptions {
            shot_noise: true,
            readout_noise: 3.0,
            ..options()
        };
        let sim = IfuSimulator::new(&wcs, wcs.spectral(), DETECTOR, &cal, opts).unwrap();
        let scene = point_scene(0.0, SpectralModel::Flat { flux_density: 1.0e5 });

        let a = sim.render(&scene, &mut StdRng::seed_from_u64(1234)).unwrap();
        let b = sim.render(&scene, &mut StdRng::seed_from_u64(1234)).unwrap();
        let c = sim.render(&scene, &mut StdRng::seed_from_u64(4321)).unwrap();

        assert_eq!(a.frame, b.frame);
        assert_ne!(a.frame, c.frame);
        assert_eq!(a.noiseless_image, c.noiseless_image);
    }

    #[test]
    fn test_sky_and_lamp_fill_background_images() {
        let (wcs, cal) = (wcs(), calibration(None));
        let opts = RenderOptions {
            sky: Some(1.0),
            arc_lamp: Some(2.0),
            ..options()
        };
        let sim = IfuSimulator::new(&wcs, wcs.spectral(), DETECTOR, &cal, opts).unwrap();
        let exposure = sim.render(&Scene::default(), &mut StdRng::seed_from_u64(1)).unwrap();

        // two lamp lines fall inside the valid range, one per spaxel each
        let lamp_expected = 64.0 * 60.0 * (100.0 + 50.0) * 2.0;
        assert_relative_eq!(exposure.lamp_image.sum(), lamp_expected, max_relative = 1e-9);

        let (lo, hi) = wcs.spectral().wavelength_range_um();
        let sky_expected = 64.0 * 60.0 * 1000.0 * (hi - lo) * 0.01f64.powi(2);
        assert_relative_eq!(
            exposure.sky_image.sum() + exposure.background_stats.flux_lost_at_edges,
            sky_expected,
            max_relative = 1e-6
        );
        assert_eq!(exposure.source_image.sum(), 0.0);
    }

    #[test]
    fn test_transmission_attenuates_scene() {
        let (wcs, cal) = (wcs(), calibration(None));
        let opts = RenderOptions {
            apply_transmission: true,
            ..options()
        };
        let sim = IfuSimulator::new(&wcs, wcs.spectral(), DETECTOR, &cal, opts).unwrap();
        let scene = point_scene(0.0, SpectralModel::Flat { flux_density: 1.0e5 });
        let exposure = sim.render(&scene, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_relative_eq!(
            exposure.stats.flux_injected,
            0.5 * 1.0e5 * 2048.0 * 0.000285,
            max_relative = 1e-9
        );
    }

    #[test]
    fn test_flat_field_scales_frame() {
        let flat = FlatField::new(Array2::from_elem(DETECTOR, 0.5)).unwrap();
        let (wcs, cal) = (wcs(), calibration(Some(flat)));
        let opts = RenderOptions {
            flat_field: FlatFieldMode::Default,
            ..options()
        };
        let sim = IfuSimulator::new(&wcs, wcs.spectral(), DETECTOR, &cal, opts).unwrap();
        let scene = point_scene(0.0, SpectralModel::Flat { flux_density: 1.0e5 });
        let exposure = sim.render(&scene, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_relative_eq!(
            exposure.noiseless_image.sum(),
            0.5 * exposure.source_image.sum(),
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_inconsistent_setup_is_rejected() {
        let (wcs, cal) = (wcs(), calibration(None));
        let err = IfuSimulator::new(&wcs, wcs.spectral(), (1024, 1024), &cal, options()).unwrap_err();
        assert_eq!(err.kind(), shared::ErrorKind::Configuration);

        let with_flat = RenderOptions {
            flat_field: FlatFieldMode::Default,
            ..options()
        };
        assert!(IfuSimulator::new(&wcs, wcs.spectral(), DETECTOR, &cal, with_flat.clone()).is_err());

        let small_flat = calibration(Some(FlatField::new(Array2::ones((4, 4))).unwrap()));
        assert!(IfuSimulator::new(&wcs, wcs.spectral(), DETECTOR, &small_flat, with_flat).is_err());

        let other = LinearWaveCal::new(
            crate::quantity::Quantity::pixels(1.0),
            crate::quantity::Quantity::micrometers(2.0),
            crate::quantity::Quantity::new(0.000285, crate::quantity::Unit::MicrometerPerPixel),
            crate::quantity::Quantity::pixels(2048.0),
        )
        .unwrap();
        assert!(IfuSimulator::new(&wcs, &other, DETECTOR, &cal, options()).is_err());
    }
}
