//! Command-line arguments of the `ifu_simulator` binary.

use crate::calibration::FlatFieldMode;
use crate::error::Result;
use crate::instrument::{Grating, SpatialScale};
use crate::quantity::Quantity;
use crate::render::{DepositionKernel, RenderOptions};
use crate::wcs::Equatorial;
use clap::Parser;
use std::path::PathBuf;

/// Simulate a raw FRIDA IFU detector frame from a scene description
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct SimulatorArgs {
    /// JSON scene description
    pub scene: PathBuf,

    /// Grating
    #[arg(long, value_enum, default_value_t = Grating::MediumK)]
    pub grating: Grating,

    /// Spatial scale
    #[arg(long, value_enum, default_value_t = SpatialScale::Fine)]
    pub scale: SpatialScale,

    /// Right ascension of the IFU center in degrees
    #[arg(long, alias = "ra_center_deg", default_value_t = 0.0, allow_negative_numbers = true)]
    pub ra_center_deg: f64,

    /// Declination of the IFU center in degrees
    #[arg(long, alias = "dec_center_deg", default_value_t = 0.0, allow_negative_numbers = true)]
    pub dec_center_deg: f64,

    /// Attenuate the scene by the atmospheric transmission
    #[arg(long)]
    pub transmission: bool,

    /// Readout noise sigma in counts
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub rnoise: f64,

    /// Pixel-to-pixel flat field
    #[arg(long, value_enum, default_value_t = FlatFieldMode::Default)]
    pub flatpix2pix: FlatFieldMode,

    /// Random seed
    #[arg(long, default_value_t = 1234)]
    pub seed: u64,

    /// Flux deposition kernel
    #[arg(long, value_enum, default_value_t = DepositionKernel::Bilinear)]
    pub kernel: DepositionKernel,

    /// Spatial samples per IFU pixel along each axis for extended sources
    #[arg(long, default_value_t = 3)]
    pub spatial_oversampling: usize,

    /// Wavelength samples per spectral pixel
    #[arg(long, default_value_t = 1)]
    pub spectral_oversampling: usize,

    /// Add sky emission scaled by this factor
    #[arg(long)]
    pub sky_scale: Option<f64>,

    /// Illuminate every spaxel with the arc lamp scaled by this factor
    #[arg(long)]
    pub arc_lamp: Option<f64>,

    /// Skip Poisson shot noise
    #[arg(long)]
    pub no_shot_noise: bool,

    /// Calibration cache directory (default: $FRIDASIM_CACHE_DIR or the user cache dir)
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Read calibration files from this directory instead of the remote server
    #[arg(long)]
    pub mirror_dir: Option<PathBuf>,

    /// Output image (.png, or .fits when built with the `fits` feature)
    #[arg(short, long, default_value = "frida_ifu_simulated.png")]
    pub output: PathBuf,

    /// Saturation level of the quantized output
    #[arg(long, default_value_t = u16::MAX)]
    pub max_counts: u16,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Also write the noiseless component images next to the output
    #[arg(long)]
    pub plots: bool,

    /// Log the full command line
    #[arg(long)]
    pub echo: bool,
}

impl SimulatorArgs {
    /// Render options implied by the arguments, validated.
    pub fn render_options(&self) -> Result<RenderOptions> {
        let options = RenderOptions {
            kernel: self.kernel,
            spatial_oversampling: self.spatial_oversampling,
            spectral_oversampling: self.spectral_oversampling,
            flat_field: self.flatpix2pix,
            readout_noise: self.rnoise,
            shot_noise: !self.no_shot_noise,
            sky: self.sky_scale,
            apply_transmission: self.transmission,
            arc_lamp: self.arc_lamp,
        };
        options.validate()?;
        Ok(options)
    }

    pub fn pointing(&self) -> Result<Equatorial> {
        Equatorial::from_quantities(
            &Quantity::degrees(self.ra_center_deg),
            &Quantity::degrees(self.dec_center_deg),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::ErrorKind;

    #[test]
    fn test_defaults() {
        let args = SimulatorArgs::parse_from(["ifu_simulator", "scene.json"]);
        assert_eq!(args.grating, Grating::MediumK);
        assert_eq!(args.scale, SpatialScale::Fine);
        assert_eq!(args.seed, 1234);
        assert_eq!(args.flatpix2pix, FlatFieldMode::Default);
        assert_eq!(args.output, PathBuf::from("frida_ifu_simulated.png"));
        let options = args.render_options().unwrap();
        assert_eq!(options.kernel, DepositionKernel::Bilinear);
        assert!(options.shot_noise);
    }

    #[test]
    fn test_invalid_grating_rejected_by_parser() {
        let parsed = SimulatorArgs::try_parse_from(["ifu_simulator", "s.json", "--grating", "medium-X"]);
        assert!(parsed.is_err());
        let parsed = SimulatorArgs::try_parse_from(["ifu_simulator", "s.json", "--scale", "huge"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_negative_rnoise_parses_but_fails_validation() {
        let args = SimulatorArgs::parse_from(["ifu_simulator", "s.json", "--rnoise", "-5"]);
        assert_eq!(args.rnoise, -5.0);
        assert_eq!(args.render_options().unwrap_err().kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_pointing_and_flags() {
        let args = SimulatorArgs::parse_from([
            "ifu_simulator",
            "s.json",
            "--ra_center_deg",
            "10.5",
            "--dec-center-deg",
            "-45",
            "--flatpix2pix",
            "none",
            "--kernel",
            "nearest",
            "--transmission",
        ]);
        let pointing = args.pointing().unwrap();
        assert!((pointing.ra_degrees() - 10.5).abs() < 1e-12);
        assert!((pointing.dec_degrees() + 45.0).abs() < 1e-12);
        let options = args.render_options().unwrap();
        assert_eq!(options.flat_field, FlatFieldMode::None);
        assert_eq!(options.kernel, DepositionKernel::Nearest);
        assert!(options.apply_transmission);
    }

    #[test]
    fn test_dec_out_of_range() {
        let args = SimulatorArgs::parse_from(["ifu_simulator", "s.json", "--dec-center-deg", "95"]);
        assert!(args.pointing().is_err());
    }
}
