//! Numeric algorithms shared across the simulator.
//!
//! - **tabulated**: validated 1D curves with linear interpolation
//! - **parallel**: deterministic data-parallel helpers
//! - **stats**: normal-distribution helpers

pub mod parallel;
pub mod stats;
pub mod tabulated;

pub use parallel::{map_batches_in_order, process_array_in_parallel_chunks};
pub use stats::{gaussian_bin_fraction, normal_cdf};
pub use tabulated::{InterpError, TabulatedCurve};
