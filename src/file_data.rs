//! Reading and writing the files a quantification run consumes and
//! produces: plain-text numeric tables (ROIs and results) and grayscale
//! TIFF images. Purely I/O; knows nothing about fitting.

pub mod tables;
pub mod tiff;

use std::path::Path;

use ndarray::Array2;

use crate::utils::QuantError;

/// Loads an image, as a TIFF if the extension is `.tif` or `.tiff`,
/// otherwise as a whitespace-delimited text table.
pub fn load_image<P : AsRef<Path>>(path : P) -> Result<Array2<f64>, QuantError> {
    let is_tiff = path.as_ref().extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("tif") || ext.eq_ignore_ascii_case("tiff"))
        .unwrap_or(false);
    if is_tiff {
        tiff::read_tiff(path)
    } else {
        tables::read_table(path)
    }
}
