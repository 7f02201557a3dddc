//! Forward simulation of FRIDA integral-field-unit detector frames
//!
//! A scene of point and extended sources is sampled on the IFU field,
//! dispersed with the grating's linear wavelength calibration and mapped
//! onto the HAWAII detector through the fitted IFU-to-detector distortion
//! model. Calibration artifacts come from a verified local cache (see the
//! `caldata` crate).

pub mod args;
pub mod calibration;
pub mod error;
pub mod instrument;
pub mod io;
pub mod pipeline;
pub mod quantity;
pub mod render;
pub mod scene;
pub mod units;
pub mod wavecal;
pub mod wcs;

// Re-exports for easier access
pub use args::SimulatorArgs;
pub use calibration::{CalibrationData, FlatFieldMode, GeometryError};
pub use error::{Result, SimError};
pub use instrument::{Grating, SpatialScale, FRIDA_IFU, HAWAII_SHAPE};
pub use quantity::{Quantity, Unit, UnitError};
pub use render::{DepositionKernel, DetectorFrame, IfuSimulator, RenderOptions, RenderStats, RenderedExposure};
pub use scene::{FluxContribution, Scene, SceneModel};
pub use wavecal::LinearWaveCal;
pub use wcs::{CompositeWcs, Equatorial};
