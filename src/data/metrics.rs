//! Summary statistics over per-position results, chiefly the
//! anterior/posterior asymmetry of membrane signal.

use ndarray::prelude::*;

use crate::data::profile::ProfileError;

/// Index window `[start, end)` covered by fractional `bounds`.
fn window(len : usize, bounds : (f64, f64)) -> (usize, usize) {
    let start = ((len as f64 * bounds.0) as usize).min(len);
    let end = ((len as f64 * bounds.1 + 1.0) as usize).min(len);
    (start, end)
}

/// Weighted mean of a 1d array over the fraction of its length given by
/// `bounds`. When `bounds.0 > bounds.1` the window wraps past the end,
/// covering `[bounds.0, 1]` and `[0, bounds.1]`.
///
/// ## Arguments
///
/// * `array` - Values, e.g. membrane levels around a closed ROI
///
/// * `bounds` - `(start, end)` as fractions of the array length
///
/// * `weights` - Optional weights of the same length (uniform if `None`)
pub fn bounded_mean_1d(
    array : &ArrayView1<f64>,
    bounds : (f64, f64),
    weights : Option<&ArrayView1<f64>>
) -> Result<f64, ProfileError> {
    let len = array.len();
    if let Some(w) = weights {
        if w.len() != len {
            return Err(ProfileError::LengthMismatch{expected : len, found : w.len()});
        }
    }
    let weight = |i : usize| weights.map_or(1.0, |w| w[i]);

    let indices : Vec<usize> = if bounds.0 < bounds.1 {
        let (start, end) = window(len, bounds);
        (start..end).collect()
    } else {
        let (_, head_end) = window(len, (0.0, bounds.1));
        let (tail_start, _) = window(len, (bounds.0, 1.0));
        (0..head_end).chain(tail_start..len).collect()
    };

    let total_weight : f64 = indices.iter().map(|&i| weight(i)).sum();
    if indices.is_empty() || total_weight == 0.0 {
        return Err(ProfileError::EmptyArray);
    }
    Ok(indices.iter().map(|&i| array[i] * weight(i)).sum::<f64>() / total_weight)
}

/// Mean of every row of a 2d array over the fraction of its columns
/// given by `bounds` (wrapping as in `bounded_mean_1d`).
pub fn bounded_mean_2d(array : &ArrayView2<f64>, bounds : (f64, f64)) -> Result<Array1<f64>, ProfileError> {
    let ncols = array.ncols();
    let columns : Vec<usize> = if bounds.0 < bounds.1 {
        let start = ((ncols as f64 * bounds.0) as usize).min(ncols);
        let end = ((ncols as f64 * bounds.1) as usize).min(ncols);
        (start..end).collect()
    } else {
        let head_end = ((ncols as f64 * bounds.1) as usize).min(ncols);
        let tail_start = ((ncols as f64 * bounds.0) as usize).min(ncols);
        (0..head_end).chain(tail_start..ncols).collect()
    };
    if columns.is_empty() {
        return Err(ProfileError::EmptyArray);
    }
    array.select(Axis(1), &columns).mean_axis(Axis(1)).ok_or(ProfileError::EmptyArray)
}

/// Asymmetry index of a membrane profile around a closed ROI whose first
/// point sits at one pole: `(ant - post) / (2 (ant + post))`, with `ant`
/// the mean over a central window of width `size` and `post` the mean
/// over the window of the same width wrapping around the ends.
pub fn asymmetry_index(mems : &ArrayView1<f64>, size : f64) -> Result<f64, ProfileError> {
    let ant = bounded_mean_1d(mems, (0.5 - size / 2.0, 0.5 + size / 2.0), None)?;
    let post = bounded_mean_1d(mems, (1.0 - size / 2.0, size / 2.0), None)?;
    Ok((ant - post) / (2.0 * (ant + post)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_and_wrapped_windows() {
        let a = Array1::from_iter((0..10).map(|i| i as f64));
        // [2, 5] -> indices 2..=5
        let mid = bounded_mean_1d(&a.view(), (0.2, 0.5), None).unwrap();
        assert!((mid - 3.5).abs() < 1e-12);
        // wraps: indices 0..=1 and 8..=9
        let ends = bounded_mean_1d(&a.view(), (0.8, 0.1), None).unwrap();
        assert!((ends - 4.5).abs() < 1e-12);
    }

    #[test]
    fn weights_shift_the_mean() {
        let a = array![1.0, 3.0];
        let w = array![3.0, 1.0];
        let mean = bounded_mean_1d(&a.view(), (0.0, 1.0), Some(&w.view())).unwrap();
        assert!((mean - 1.5).abs() < 1e-12);
        let short = array![1.0];
        assert!(bounded_mean_1d(&a.view(), (0.0, 1.0), Some(&short.view())).is_err());
    }

    #[test]
    fn row_means_over_columns() {
        let a = Array2::from_shape_fn((2, 10), |(r, c)| (r * 100 + c) as f64);
        let means = bounded_mean_2d(&a.view(), (0.0, 0.5)).unwrap();
        assert!((means[0] - 2.0).abs() < 1e-12);
        assert!((means[1] - 102.0).abs() < 1e-12);
    }

    #[test]
    fn asymmetry_of_a_polarized_profile() {
        // high at the middle of the ROI, low at the ends
        let n = 100;
        let mems = Array1::from_shape_fn(n, |i| if (33..67).contains(&i) { 3.0 } else { 1.0 });
        let asi = asymmetry_index(&mems.view(), 0.33).unwrap();
        assert!((asi - 0.25).abs() < 0.02, "asi {}", asi);

        let flat = Array1::<f64>::ones(n);
        assert!(asymmetry_index(&flat.view(), 0.33).unwrap().abs() < 1e-12);
    }
}
