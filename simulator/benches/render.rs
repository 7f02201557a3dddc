use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ifu_simulator::calibration::{ArcLineList, CalibrationData, DistortionModel, SkyModel};
use ifu_simulator::scene::{Morphology, Scene, SceneObject, SpectralModel};
use ifu_simulator::{
    CompositeWcs, Equatorial, FlatFieldMode, Grating, IfuSimulator, LinearWaveCal, RenderOptions,
    SpatialScale, FRIDA_IFU, HAWAII_SHAPE,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn distortion() -> DistortionModel {
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
    let json = format!(
        r#"{{"grating": "medium-K", "detector_shape": [2048, 2048], "wavelength_unit": "um",
            "domain": {{"x_ifu": [-0.5, 63.5], "wavelength": [1.9, 2.55]}}, "slices": [{}]}}"#,
        slices.join(",")
    );
    DistortionModel::from_json_str(&json).unwrap()
}

fn scene(n: usize) -> Scene {
    Scene {
        objects: (0..n)
            .map(|i| SceneObject {
                name: format!("obj{i}"),
                ra_deg: 150.0 + (i as f64 * 0.07 - 0.2) / 3600.0,
                dec_deg: 2.0 + (i as f64 * 0.05 - 0.2) / 3600.0,
                spectrum: SpectralModel::GaussianLine {
                    center_um: 2.1 + 0.01 * i as f64,
                    fwhm_um: 0.002,
                    total_flux: 1.0e4,
                },
                morphology: Morphology::Gaussian { fwhm_arcsec: 0.05 },
            })
            .collect(),
    }
}

fn bench_render(c: &mut Criterion) {
    let calibration = CalibrationData {
        sky: SkyModel::parse("# wavelength_unit = um\n1.9 100 0.9\n2.6 100 0.9\n").unwrap(),
        arc_lines: ArcLineList::parse("# wavelength_unit = um\n2.0 100\n").unwrap(),
        flat: None,
        distortion: distortion(),
    };
    let wavecal = LinearWaveCal::from_grating(Grating::MediumK).unwrap();
    let wcs = CompositeWcs::build(
        FRIDA_IFU.naxis(),
        Equatorial::from_degrees(150.0, 2.0),
        SpatialScale::Fine.quantity(),
        wavecal.clone(),
    )
    .unwrap();
    let options = RenderOptions {
        flat_field: FlatFieldMode::None,
        readout_noise: 5.0,
        ..RenderOptions::default()
    };
    let simulator = IfuSimulator::new(&wcs, &wavecal, HAWAII_SHAPE, &calibration, options).unwrap();

    let mut group = c.benchmark_group("render");
    group.sample_size(10);
    for n in [1, 10] {
        let scene = scene(n);
        group.bench_function(format!("{n}_extended_line_sources"), |b| {
            b.iter(|| {
                let mut rng = StdRng::seed_from_u64(1234);
                black_box(simulator.render(black_box(&scene), &mut rng).unwrap())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_render);
criterion_main!(benches);
