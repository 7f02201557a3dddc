//! End-to-end simulation: arguments in, rendered exposure out.

use crate::args::SimulatorArgs;
use crate::calibration::CalibrationData;
use crate::error::{Result, SimError};
use crate::instrument::{FRIDA_IFU, HAWAII_SHAPE};
use crate::io::{quantize_frame, save_png};
use crate::render::{IfuSimulator, RenderedExposure};
use crate::scene::Scene;
use crate::wavecal::LinearWaveCal;
use crate::wcs::{CompositeWcs, HeaderCard};
use caldata::{CalibrationCache, RemoteSource};
use log::info;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};

/// Everything produced by [`run`].
#[derive(Debug, Clone)]
pub struct SimulationOutput {
    pub exposure: RenderedExposure,
    pub wcs: CompositeWcs,
    /// Provenance identifier of the calibration manifest
    pub manifest_uuid: String,
}

/// Run one simulation.
///
/// Arguments are validated before the scene is read or the cache is touched,
/// and the grating's wavelength recipe is checked before any artifact is
/// fetched.
pub fn run<S: RemoteSource>(args: &SimulatorArgs, cache: &CalibrationCache<S>) -> Result<SimulationOutput> {
    let options = args.render_options()?;
    let pointing = args.pointing()?;
    let scene = Scene::from_file(&args.scene)?;
    info!("scene {} has {} objects", args.scene.display(), scene.objects.len());

    let wavecal = LinearWaveCal::from_grating(args.grating)?;
    info!("{wavecal}");

    let artifacts = cache.resolve(args.grating.as_str())?;
    let calibration = CalibrationData::load(&artifacts, options.flat_field)?;

    let wcs = CompositeWcs::build(FRIDA_IFU.naxis(), pointing, args.scale.quantity(), wavecal.clone())?;
    let exposure = {
        let simulator = IfuSimulator::new(&wcs, &wavecal, HAWAII_SHAPE, &calibration, options)?;
        let mut rng = StdRng::seed_from_u64(args.seed);
        simulator.render(&scene, &mut rng)?
    };

    Ok(SimulationOutput {
        exposure,
        wcs,
        manifest_uuid: artifacts.uuid,
    })
}

/// Header cards recording how a frame was made.
///
/// The IFU cube WCS is stored as alternate description `A`.
pub fn header_cards(args: &SimulatorArgs, output: &SimulationOutput) -> Vec<HeaderCard> {
    let mut cards = vec![
        HeaderCard::text("INSTRUME", "FRIDA"),
        HeaderCard::text("GRATING", args.grating.as_str()),
        HeaderCard::text("SCALE", args.scale.as_str()),
        HeaderCard::real("SEED", args.seed as f64),
        HeaderCard::real("RNOISE", args.rnoise),
        HeaderCard::text("FLATMODE", &args.flatpix2pix.to_string()),
        HeaderCard::text("CALUUID", &output.manifest_uuid),
        HeaderCard::text("WCSNAMEA", "IFU"),
    ];
    cards.extend(output.wcs.header_cards().into_iter().map(|c| HeaderCard {
        key: format!("{}A", c.key),
        value: c.value,
    }));
    cards
}

fn is_fits(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("fits"))
}

/// PNG output carries no header, so `cards` only reach FITS files.
#[cfg_attr(not(feature = "fits"), allow(unused_variables))]
fn write_image(path: &Path, image: &Array2<f64>, max_counts: u16, cards: &[HeaderCard]) -> Result<()> {
    if is_fits(path) {
        #[cfg(feature = "fits")]
        return crate::io::fits::write_frame(path, image, cards);
        #[cfg(not(feature = "fits"))]
        return Err(SimError::Configuration(format!(
            "cannot write {}: built without the `fits` feature",
            path.display()
        )));
    }
    save_png(&quantize_frame(image, max_counts), path)
}

fn component_path(output: &Path, suffix: &str) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "frame".to_string());
    let ext = output
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "png".to_string());
    output.with_file_name(format!("{stem}_{suffix}.{ext}"))
}

/// Write the frame, plus the noiseless components when `args.plots` is set.
///
/// Returns the paths written.
pub fn write_outputs(args: &SimulatorArgs, output: &SimulationOutput) -> Result<Vec<PathBuf>> {
    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| SimError::io(parent, e))?;
    }

    let cards = header_cards(args, output);
    let exposure = &output.exposure;
    write_image(&args.output, exposure.frame.data(), args.max_counts, &cards)?;
    let mut written = vec![args.output.clone()];

    if args.plots {
        for (suffix, image) in [
            ("source", &exposure.source_image),
            ("sky", &exposure.sky_image),
            ("lamp", &exposure.lamp_image),
            ("noiseless", &exposure.noiseless_image),
        ] {
            let path = component_path(&args.output, suffix);
            write_image(&path, image, args.max_counts, &cards)?;
            written.push(path);
        }
    }

    for path in &written {
        info!("wrote {}", path.display());
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_path() {
        assert_eq!(
            component_path(Path::new("out/frame.png"), "sky"),
            PathBuf::from("out/frame_sky.png")
        );
        assert_eq!(component_path(Path::new("frame"), "lamp"), PathBuf::from("frame_lamp.png"));
    }

    #[test]
    fn test_is_fits() {
        assert!(is_fits(Path::new("a/b.FITS")));
        assert!(!is_fits(Path::new("a/b.png")));
    }

    #[cfg(not(feature = "fits"))]
    #[test]
    fn test_fits_output_needs_feature() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.fits");
        let cards = [HeaderCard::text("GRATING", "medium-K")];
        let err = write_image(&path, &Array2::zeros((2, 2)), u16::MAX, &cards).unwrap_err();
        assert_eq!(err.kind(), shared::ErrorKind::Configuration);
        assert!(!path.exists());
    }

    #[test]
    fn test_png_output_ignores_cards() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let cards = [HeaderCard::text("GRATING", "medium-K")];
        write_image(&path, &Array2::from_elem((2, 3), 7.0), u16::MAX, &cards).unwrap();
        assert_eq!(image::open(&path).unwrap().width(), 3);
    }
}
