//! `membranequant`
//!
//! Quantifies membrane-bound and cytoplasmic signal along a cell cortex in
//! fluorescence images. Every cross-section perpendicular to the cortex is
//! fit as a sum of an error-function cytoplasmic step and a Gaussian
//! membrane peak, giving at each position the offset of the membrane from
//! the supplied line, the cytoplasmic level and the membrane level.
//!
//! The engine is `MembraneQuant`; `quantify` runs it in one call.

pub mod config;
pub mod data;
pub mod file_data;
pub mod fit;
pub mod quantifier;
mod utils;

pub use config::{ConfigError, InterpKind, QuantConfig};
pub use data::background::{BackgroundEstimator, EdgeRowsBackground, FixedBackground};
pub use data::geometry::GeometryError;
pub use data::profile::ProfileError;
pub use fit::{FitError, ProfileFit, ProfileFitter};
pub use quantifier::{EngineState, FitRecord, MembraneQuant, SimulatedImages};
pub use utils::QuantError;

use ndarray::Array2;

/// `quantify(img, roi, config)` builds a `MembraneQuant`,
/// runs it to completion (saving if `config.save_path` is set),
/// and returns the finished engine for inspection.
///
/// ## Arguments
///
/// * `img` - The image, indexed `[row, column]`
///
/// * `roi` - `(n, 2)` array of `(x, y)` cortex coordinates
///
/// * `config` - Run parameters; `sigma` must be set
///
/// ## Example
///
/// ```rust, ignore
/// let quant = quantify(img, roi, QuantConfig::with_sigma(2.0))?;
/// println!("{:?}", quant.mems_full());
/// ```
pub fn quantify(img : Array2<f64>, roi : Array2<f64>, config : QuantConfig) -> Result<MembraneQuant, QuantError> {
    let mut quant = MembraneQuant::new(img, roi, config)?;
    quant.run()?;
    Ok(quant)
}

#[cfg(test)]
mod tests;
