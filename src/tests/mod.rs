//! Synthetic fixtures shared by the unit tests.

use std::path::PathBuf;

use ndarray::prelude::*;

/// `n` points on a circle, counter-clockwise in `(x, y)` starting at
/// angle 0, without repeating the first point.
pub (crate) fn circle_roi(cx : f64, cy : f64, r : f64, n : usize) -> Array2<f64> {
    Array2::from_shape_fn((n, 2), |(i, c)| {
        let theta = 2.0 * std::f64::consts::PI * i as f64 / n as f64;
        if c == 0 { cx + r * theta.cos() } else { cy + r * theta.sin() }
    })
}

/// An image that is `inside` within `radius` of `(cx, cy)` and
/// `outside` elsewhere. Pixel `[row, col]` sits at `(x, y) = (col, row)`.
pub (crate) fn disk_image(
    nrows : usize,
    ncols : usize,
    centre : (f64, f64),
    radius : f64,
    inside : f64,
    outside : f64
) -> Array2<f64> {
    Array2::from_shape_fn((nrows, ncols), |(row, col)| {
        let d = (col as f64 - centre.0).hypot(row as f64 - centre.1);
        if d <= radius { inside } else { outside }
    })
}

/// A fresh directory under the system temp dir for one test.
pub (crate) fn scratch_dir(name : &str) -> PathBuf {
    let dir = std::env::temp_dir()
        .join("membranequant_tests")
        .join(format!("{}_{}", name, std::process::id()));
    if dir.exists() {
        std::fs::remove_dir_all(&dir).unwrap();
    }
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
