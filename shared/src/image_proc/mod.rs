//! Image-level processing for simulated detector frames.
//!
//! - **noise**: shot-noise and readout-noise realizations

pub mod noise;

pub use noise::{add_gaussian_read_noise, apply_poisson_photon_noise, NoiseError};
