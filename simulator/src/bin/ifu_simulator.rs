//! FRIDA IFU detector-frame simulator
//!
//! Usage:
//! ```text
//! cargo run --release --bin ifu_simulator -- scene.json --grating medium-K --scale fine \
//!     --ra-center-deg 150.0 --dec-center-deg 2.2 --rnoise 5 --seed 1234
//! ```

use anyhow::{Context, Result};
use caldata::{CacheConfig, CacheRoot, CalibrationCache, DirectorySource, HttpSource};
use clap::Parser;
use ifu_simulator::pipeline::{self, SimulationOutput};
use ifu_simulator::SimulatorArgs;
use log::info;

fn cache_config(args: &SimulatorArgs) -> Result<CacheConfig> {
    let config = match &args.cache_dir {
        Some(dir) => CacheConfig::with_root(CacheRoot::with_path(dir.clone()))?,
        None => CacheConfig::from_env()?,
    };
    info!("calibration cache: {}", config.root.path().display());
    Ok(config)
}

fn simulate(args: &SimulatorArgs) -> Result<SimulationOutput> {
    let config = cache_config(args)?;
    let output = match &args.mirror_dir {
        Some(mirror) => {
            info!("reading calibration files from {}", mirror.display());
            let cache = CalibrationCache::new(
                config.root,
                DirectorySource::new(mirror.clone()),
                config.manifest_filename,
                config.manifest_md5,
            );
            pipeline::run(args, &cache)?
        }
        None => {
            let cache: CalibrationCache<HttpSource> = CalibrationCache::from_config(&config)?;
            pipeline::run(args, &cache)?
        }
    };
    Ok(output)
}

fn main() -> Result<()> {
    let args = SimulatorArgs::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    if args.echo {
        info!("{}", std::env::args().collect::<Vec<_>>().join(" "));
    }

    let output = simulate(&args).with_context(|| format!("simulating {}", args.scene.display()))?;
    let stats = &output.exposure.stats;
    info!(
        "frame total {:.6e} counts, {} samples dropped",
        output.exposure.frame.sum(),
        stats.dropped()
    );

    pipeline::write_outputs(&args, &output).context("writing output images")?;
    Ok(())
}
