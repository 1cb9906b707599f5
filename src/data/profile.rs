//! Resampling of 1D profiles and 2D stacks of profiles to a
//! target number of samples, and rolling averages along the
//! ROI axis of a straightened stack.

pub mod spline;

use ndarray::prelude::*;

use crate::config::InterpKind;
use spline::CubicSpline;

#[derive(Debug, Clone, PartialEq)]
pub enum ProfileError {
    EmptyArray,
    InvalidAxis(usize),
    TooFewKnots{required : usize, found : usize},
    LengthMismatch{expected : usize, found : usize},
}

impl std::error::Error for ProfileError {}

impl std::fmt::Display for ProfileError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ProfileError::EmptyArray => {
                write!(f, "Cannot resample an empty array")
            },
            ProfileError::InvalidAxis(axis) => {
                write!(f, "Invalid interpolation axis {} for a 2d array", axis)
            },
            ProfileError::TooFewKnots{required, found} => {
                write!(f, "Spline needs at least {} knots, found {}", required, found)
            },
            ProfileError::LengthMismatch{expected, found} => {
                write!(f, "Expected {} values, found {}", expected, found)
            }
        }
    }
}

/// `n` evenly spaced sample positions covering `[0, len - 1]`.
fn sample_positions(len : usize, n : usize) -> impl Iterator<Item = f64> {
    let step = if n > 1 { (len - 1) as f64 / (n - 1) as f64 } else { 0.0 };
    (0..n).map(move |i| i as f64 * step)
}

/// Linear interpolation of `array` at fractional index `pos`.
fn lerp_at(array : &ArrayView1<f64>, pos : f64) -> f64 {
    let last = array.len() - 1;
    let lo = (pos.floor() as usize).min(last);
    let hi = (lo + 1).min(last);
    let frac = pos - lo as f64;
    if frac == 0.0 {
        return array[lo];
    }
    array[lo] + frac * (array[hi] - array[lo])
}

/// Interpolates a 1d array into `n` evenly spaced points spanning
/// its first to last element.
///
/// ## Arguments
///
/// * `array` - The values to resample, taken as samples at 0, 1, ..., len-1
///
/// * `n` - The number of output samples
///
/// * `method` - `Linear` for piecewise-linear, `Cubic` for a natural cubic
/// spline (falls back to linear with fewer than three samples)
///
/// ## Example
///
/// ```rust, ignore
/// let profile = array![0.0, 1.0, 4.0, 9.0];
/// let fine = interp_1d_array(&profile.view(), 31, InterpKind::Cubic)?;
/// ```
pub fn interp_1d_array(
    array : &ArrayView1<f64>,
    n : usize,
    method : InterpKind
) -> Result<Array1<f64>, ProfileError> {
    if array.is_empty() {
        return Err(ProfileError::EmptyArray);
    }
    if array.len() == 1 {
        return Ok(Array1::from_elem(n, array[0]));
    }

    match method {
        InterpKind::Cubic if array.len() > 2 => {
            let knots : Vec<f64> = (0..array.len()).map(|i| i as f64).collect();
            let values : Vec<f64> = array.iter().copied().collect();
            let spline = CubicSpline::natural(&knots, &values)?;
            Ok(sample_positions(array.len(), n).map(|t| spline.eval(t)).collect())
        },
        _ => {
            Ok(sample_positions(array.len(), n).map(|t| lerp_at(array, t)).collect())
        }
    }
}

/// Interpolates every lane of a 2d array along `axis` into `n` points.
/// `Axis(0)` resamples each column (e.g. the cross-section axis of a
/// straightened stack), `Axis(1)` resamples each row (the ROI axis).
///
/// Returns `ProfileError::InvalidAxis` for any other axis.
pub fn interp_2d_array(
    array : &ArrayView2<f64>,
    n : usize,
    axis : Axis,
    method : InterpKind
) -> Result<Array2<f64>, ProfileError> {
    if axis.index() > 1 {
        return Err(ProfileError::InvalidAxis(axis.index()));
    }
    let mut shape = [array.nrows(), array.ncols()];
    shape[axis.index()] = n;
    let mut out = Array2::<f64>::zeros(shape);

    for (lane, mut out_lane) in array.lanes(axis).into_iter().zip(out.lanes_mut(axis)) {
        out_lane.assign(&interp_1d_array(&lane, n, method)?);
    }
    Ok(out)
}

/// Index into the padded sequence for position `i` (may be negative or
/// past the end): wrapped when periodic, mirrored at the edges otherwise.
fn padded_index(i : isize, n : usize, periodic : bool) -> usize {
    let n = n as isize;
    if periodic {
        return i.rem_euclid(n) as usize;
    }
    let mirrored = if i < 0 {
        -i - 1
    } else if i >= n {
        2 * n - 1 - i
    } else {
        i
    };
    mirrored.clamp(0, n - 1) as usize
}

/// Centered moving average of width `window` that keeps the input length.
/// Ends wrap around when `periodic`, otherwise the edges are mirrored.
/// A window of 0 or 1 returns the input unchanged.
pub fn rolling_ave_1d(array : &ArrayView1<f64>, window : usize, periodic : bool) -> Array1<f64> {
    let n = array.len();
    if window <= 1 || n == 0 {
        return array.to_owned();
    }

    let left = (window / 2) as isize;
    let padded_len = n + window - 1;

    let mut cumsum = Vec::with_capacity(padded_len + 1);
    cumsum.push(0.0);
    let mut running = 0.0;
    for j in 0..padded_len {
        running += array[padded_index(j as isize - left, n, periodic)];
        cumsum.push(running);
    }

    (0..n).map(|i| (cumsum[i + window] - cumsum[i]) / window as f64).collect()
}

/// Rolling average across the columns of a straightened stack: every
/// row is averaged along `Axis(1)`.
pub fn rolling_ave_2d(array : &ArrayView2<f64>, window : usize, periodic : bool) -> Array2<f64> {
    if window <= 1 {
        return array.to_owned();
    }
    let mut out = Array2::<f64>::zeros(array.raw_dim());
    out.axis_iter_mut(Axis(0)).zip(array.axis_iter(Axis(0))).for_each(
        |(mut out_row, row)| out_row.assign(&rolling_ave_1d(&row, window, periodic))
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_identity_resampling() {
        let a = array![3.0, -1.0, 2.5, 7.25, 0.0];
        let same = interp_1d_array(&a.view(), a.len(), InterpKind::Linear).unwrap();
        assert_eq!(same, a);

        let stack = Array2::from_shape_fn((4, 6), |(r, c)| (r * 7 + c * c) as f64);
        let rows = interp_2d_array(&stack.view(), 4, Axis(0), InterpKind::Linear).unwrap();
        let cols = interp_2d_array(&stack.view(), 6, Axis(1), InterpKind::Linear).unwrap();
        assert_eq!(rows, stack);
        assert_eq!(cols, stack);
    }

    #[test]
    fn cubic_identity_resampling() {
        let a = array![3.0, -1.0, 2.5, 7.25, 0.0];
        let same = interp_1d_array(&a.view(), a.len(), InterpKind::Cubic).unwrap();
        for (x, y) in same.iter().zip(a.iter()) {
            assert!((x - y).abs() < 1e-10);
        }
    }

    #[test]
    fn upsampling_shapes_and_endpoints() {
        let a = array![0.0, 10.0];
        let fine = interp_1d_array(&a.view(), 11, InterpKind::Linear).unwrap();
        assert_eq!(fine.len(), 11);
        assert!((fine[3] - 3.0).abs() < 1e-12);

        let stack = Array2::<f64>::ones((5, 8));
        let up = interp_2d_array(&stack.view(), 50, Axis(0), InterpKind::Cubic).unwrap();
        assert_eq!(up.dim(), (50, 8));
        assert!(up.iter().all(|v| (v - 1.0).abs() < 1e-12));
        let across = interp_2d_array(&stack.view(), 3, Axis(1), InterpKind::Linear).unwrap();
        assert_eq!(across.dim(), (5, 3));
    }

    #[test]
    fn invalid_axis_and_empty_input() {
        let stack = Array2::<f64>::ones((2, 2));
        assert_eq!(
            interp_2d_array(&stack.view(), 3, Axis(2), InterpKind::Linear),
            Err(ProfileError::InvalidAxis(2))
        );
        let empty = Array1::<f64>::zeros(0);
        assert_eq!(
            interp_1d_array(&empty.view(), 3, InterpKind::Cubic),
            Err(ProfileError::EmptyArray)
        );
    }

    #[test]
    fn rolling_average_window_one_is_identity() {
        let a = array![1.0, 5.0, -2.0, 8.0];
        assert_eq!(rolling_ave_1d(&a.view(), 1, true), a);
        assert_eq!(rolling_ave_1d(&a.view(), 1, false), a);
        let stack = Array2::from_shape_fn((3, 4), |(r, c)| (r + 2 * c) as f64);
        assert_eq!(rolling_ave_2d(&stack.view(), 1, true), stack);
    }

    #[test]
    fn rolling_average_wraps_when_periodic() {
        let a = array![0.0, 0.0, 0.0, 0.0, 9.0];
        let ave = rolling_ave_1d(&a.view(), 3, true);
        assert_eq!(ave.len(), 5);
        assert!((ave[0] - 3.0).abs() < 1e-12);
        assert!((ave[3] - 3.0).abs() < 1e-12);
        assert!((ave[4] - 3.0).abs() < 1e-12);
        assert!(ave[1].abs() < 1e-12);

        let open = rolling_ave_1d(&a.view(), 3, false);
        assert!(open[0].abs() < 1e-12);
        assert!((open[4] - 6.0).abs() < 1e-12);
    }

    #[test]
    fn rolling_average_preserves_constants() {
        let stack = Array2::<f64>::from_elem((4, 7), 2.5);
        for periodic in [true, false] {
            let ave = rolling_ave_2d(&stack.view(), 10, periodic);
            assert_eq!(ave.dim(), (4, 7));
            assert!(ave.iter().all(|v| (v - 2.5).abs() < 1e-12));
        }
    }
}
