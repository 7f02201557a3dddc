//! Shared components and utilities for the FRIDA IFU simulator workspace.
//!
//! This crate holds the pieces used by both the calibration-data resolver
//! and the rendering engine: the error-kind taxonomy, tabulated-curve
//! interpolation, deterministic parallel helpers and noise generators.

pub mod algo;
pub mod error_kind;
pub mod image_proc;

pub use error_kind::ErrorKind;
