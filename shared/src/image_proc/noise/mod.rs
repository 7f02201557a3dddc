//! Noise processing module for detector simulation
//!
//! - **generate**: seeded noise generation for rendered frames

pub mod generate;

pub use generate::{add_gaussian_read_noise, apply_poisson_photon_noise, NoiseError};
