//! Straightening: resampling an image into a rectangular stack with one
//! column per ROI point, each column the intensity profile along the
//! local perpendicular.

use ndarray::prelude::*;

use crate::config::InterpKind;
use crate::data::geometry::{unit_normals, GeometryError};

/// Pixel value with the coordinates clamped into the image, so samples
/// past the border take the nearest edge value.
#[inline]
fn clamped_pixel(img : &ArrayView2<f64>, row : isize, col : isize) -> f64 {
    let row = row.clamp(0, img.nrows() as isize - 1) as usize;
    let col = col.clamp(0, img.ncols() as isize - 1) as usize;
    img[[row, col]]
}

/// Catmull-Rom cubic convolution kernel.
#[inline]
fn cubic_kernel(x : f64) -> f64 {
    const A : f64 = -0.5;
    let abs_x = x.abs();
    if abs_x <= 1.0 {
        ((A + 2.0) * abs_x - (A + 3.0)) * abs_x * abs_x + 1.0
    } else if abs_x < 2.0 {
        ((A * abs_x - 5.0 * A) * abs_x + 8.0 * A) * abs_x - 4.0 * A
    } else {
        0.0
    }
}

#[inline]
fn sample_bilinear(img : &ArrayView2<f64>, x : f64, y : f64) -> f64 {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (x0, y0) = (x0 as isize, y0 as isize);

    let p00 = clamped_pixel(img, y0, x0);
    let p10 = clamped_pixel(img, y0, x0 + 1);
    let p01 = clamped_pixel(img, y0 + 1, x0);
    let p11 = clamped_pixel(img, y0 + 1, x0 + 1);

    let top = p00 + fx * (p10 - p00);
    let bottom = p01 + fx * (p11 - p01);
    top + fy * (bottom - top)
}

#[inline]
fn sample_bicubic(img : &ArrayView2<f64>, x : f64, y : f64) -> f64 {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (x0, y0) = (x0 as isize, y0 as isize);

    let wx = [cubic_kernel(fx + 1.0), cubic_kernel(fx), cubic_kernel(fx - 1.0), cubic_kernel(fx - 2.0)];
    let wy = [cubic_kernel(fy + 1.0), cubic_kernel(fy), cubic_kernel(fy - 1.0), cubic_kernel(fy - 2.0)];

    let mut sum = 0.0;
    for (j, wyj) in wy.iter().enumerate() {
        let row = y0 - 1 + j as isize;
        for (i, wxi) in wx.iter().enumerate() {
            let col = x0 - 1 + i as isize;
            sum += clamped_pixel(img, row, col) * wxi * wyj;
        }
    }
    sum
}

/// Samples `img` at the off-grid point `(x, y)` (`x` along columns,
/// `y` along rows).
pub fn sample_image(img : &ArrayView2<f64>, x : f64, y : f64, method : InterpKind) -> f64 {
    match method {
        InterpKind::Linear => sample_bilinear(img, x, y),
        InterpKind::Cubic => sample_bicubic(img, x, y),
    }
}

/// Creates a straightened image from the ROI.
///
/// Row `r` of column `i` samples the image at
/// `p_i + (thickness/2 - r * thickness/(ninterp - 1)) * n_i`, where `n_i` is
/// the unit perpendicular at ROI point `i` (see `geometry::unit_normals`).
/// Increasing row index therefore walks from the outer side of the line to
/// the inner side, in equal steps of true perpendicular distance.
///
/// Works best on a closed ROI sampled roughly one pixel apart; open or
/// unevenly sampled ROIs get less reliable perpendiculars.
///
/// ## Arguments
///
/// * `img` - The image, indexed `[row, column]`
///
/// * `roi` - `(n, 2)` array of `(x, y)` coordinates
///
/// * `thickness` - Perpendicular span of each cross-section, in pixels
///
/// * `periodic` - Whether the ROI is a closed loop
///
/// * `method` - Bilinear or cubic sampling
///
/// * `ninterp` - Number of samples per cross-section (`thickness` if `None`)
///
/// ## Returns
///
/// An `(ninterp, n)` array.
///
/// ## Example
///
/// ```rust, ignore
/// let straight = straighten(&img.view(), &roi.view(), 50, true, InterpKind::Cubic, None)?;
/// assert_eq!(straight.dim(), (50, roi.nrows()));
/// ```
pub fn straighten(
    img : &ArrayView2<f64>,
    roi : &ArrayView2<f64>,
    thickness : usize,
    periodic : bool,
    method : InterpKind,
    ninterp : Option<usize>
) -> Result<Array2<f64>, GeometryError> {
    let ninterp = ninterp.unwrap_or(thickness);
    let normals = unit_normals(roi, periodic)?;

    let half = thickness as f64 / 2.0;
    let step = if ninterp > 1 { thickness as f64 / (ninterp - 1) as f64 } else { 0.0 };

    let mut straight = Array2::<f64>::zeros((ninterp, roi.nrows()));
    straight.axis_iter_mut(Axis(1))
        .zip(roi.axis_iter(Axis(0)))
        .zip(normals.axis_iter(Axis(0)))
        .for_each(|((mut column, point), normal)| {
            for (r, value) in column.iter_mut().enumerate() {
                let along = half - r as f64 * step;
                let x = point[0] + along * normal[0];
                let y = point[1] + along * normal[1];
                *value = sample_image(img, x, y, method);
            }
        });
    Ok(straight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{circle_roi, disk_image};

    #[test]
    fn flat_image_straightens_flat() {
        let img = Array2::<f64>::from_elem((64, 64), 7.5);
        let roi = circle_roi(32.0, 32.0, 15.0, 94);
        for thickness in [2, 9, 20, 50] {
            for method in [InterpKind::Linear, InterpKind::Cubic] {
                let straight = straighten(&img.view(), &roi.view(), thickness, true, method, None)
                    .unwrap();
                assert_eq!(straight.dim(), (thickness, 94));
                assert!(straight.iter().all(|v| (v - 7.5).abs() < 1e-9));
            }
        }
    }

    #[test]
    fn straightened_disk_goes_from_outside_to_inside() {
        let img = disk_image(100, 100, (50.0, 50.0), 30.0, 10.0, 0.0);
        let roi = circle_roi(50.0, 50.0, 30.0, 188);
        let straight = straighten(&img.view(), &roi.view(), 20, true, InterpKind::Linear, None)
            .unwrap();
        let first_row_mean = straight.row(0).mean().unwrap();
        let last_row_mean = straight.row(19).mean().unwrap();
        assert!(first_row_mean < 0.5, "outside mean {}", first_row_mean);
        assert!(last_row_mean > 9.5, "inside mean {}", last_row_mean);
    }

    #[test]
    fn samples_on_grid_points_are_exact() {
        let img = Array2::from_shape_fn((5, 6), |(r, c)| (r * 10 + c) as f64);
        for method in [InterpKind::Linear, InterpKind::Cubic] {
            assert!((sample_image(&img.view(), 2.0, 3.0, method) - 32.0).abs() < 1e-12);
            // beyond the border takes the edge value
            assert!((sample_image(&img.view(), -4.0, 0.0, method) - 0.0).abs() < 1e-12);
            assert!((sample_image(&img.view(), 5.0, 9.0, method) - 45.0).abs() < 1e-12);
        }
        assert!((sample_image(&img.view(), 2.5, 3.0, InterpKind::Linear) - 32.5).abs() < 1e-12);
    }

    #[test]
    fn degenerate_roi_is_an_error() {
        let img = Array2::<f64>::zeros((10, 10));
        let roi = array![[1.0, 1.0], [1.0, 1.0], [2.0, 2.0]];
        assert!(straighten(&img.view(), &roi.view(), 4, true, InterpKind::Linear, None).is_err());
    }
}
