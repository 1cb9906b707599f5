//! `data`
//!
//! The numerical building blocks of a quantification run: ROI geometry,
//! profile resampling, reference curves, straightening, background
//! estimation and summary metrics. Nothing here knows about the engine.

pub mod background;
pub mod geometry;
pub mod metrics;
pub mod profile;
pub mod reference;
pub mod straighten;
