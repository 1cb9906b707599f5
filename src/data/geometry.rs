//! Geometry of the cortex line: local perpendiculars, displacement of
//! points along them, smoothing, unit-spacing resampling and
//! re-anchoring of a closed ROI on its long axis.
//!
//! An ROI is an `(n, 2)` array of `(x, y)` coordinates where `x` indexes
//! image columns and `y` indexes image rows.

mod smoothing;

use ndarray::prelude::*;

use crate::data::profile::spline::CubicSpline;

/// Tangents shorter than this are treated as coincident points.
pub const MIN_TANGENT_LENGTH : f64 = 1e-12;

/// Number of parameter values the smoothing spline is evaluated at.
pub const SPLINE_EVAL_POINTS : usize = 10000;

#[derive(Debug, Clone, PartialEq)]
pub enum GeometryError {
    MalformedRoi{shape : (usize, usize)},
    TooFewPoints{required : usize, found : usize},
    DegenerateTangent{index : usize},
    LengthMismatch{expected : usize, found : usize},
}

impl std::error::Error for GeometryError {}

impl std::fmt::Display for GeometryError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            GeometryError::MalformedRoi{shape} => {
                write!(f, "ROI must have shape (n, 2), got ({}, {})", shape.0, shape.1)
            },
            GeometryError::TooFewPoints{required, found} => {
                write!(f, "ROI needs at least {} points, found {}", required, found)
            },
            GeometryError::DegenerateTangent{index} => {
                write!(f, "ROI point {} coincides with its neighbour; tangent is undefined", index)
            },
            GeometryError::LengthMismatch{expected, found} => {
                write!(f, "Expected one offset per ROI point ({}), found {}", expected, found)
            }
        }
    }
}

/// Errors unless `roi` is `(n, 2)` with at least `required` points.
pub fn check_roi(roi : &ArrayView2<f64>, required : usize) -> Result<(), GeometryError> {
    if roi.ncols() != 2 {
        return Err(GeometryError::MalformedRoi{shape : roi.dim()});
    }
    if roi.nrows() < required {
        return Err(GeometryError::TooFewPoints{required, found : roi.nrows()});
    }
    Ok(())
}

/// Unit perpendicular at every ROI point, as an `(n, 2)` array.
///
/// The tangent at point `i` is the backward difference `p_i - p_{i-1}`.
/// For the first point the previous point is the last one when the ROI
/// is `periodic`; an open ROI uses the forward difference there. The
/// perpendicular is the tangent `(dx, dy)` turned to `(dy, -dx)`, which
/// points outward for a loop traversed with increasing polar angle.
///
/// ## Errors
///
/// * `GeometryError::DegenerateTangent` - two consecutive points coincide
pub fn unit_normals(roi : &ArrayView2<f64>, periodic : bool) -> Result<Array2<f64>, GeometryError> {
    check_roi(roi, 2)?;
    let n = roi.nrows();
    let mut normals = Array2::<f64>::zeros((n, 2));

    for i in 0..n {
        let (from, to) = match i {
            0 if periodic => (n - 1, 0),
            0 => (0, 1),
            _ => (i - 1, i),
        };
        let dx = roi[[to, 0]] - roi[[from, 0]];
        let dy = roi[[to, 1]] - roi[[from, 1]];
        let length = dx.hypot(dy);
        if length < MIN_TANGENT_LENGTH {
            return Err(GeometryError::DegenerateTangent{index : i});
        }
        normals[[i, 0]] = dy / length;
        normals[[i, 1]] = -dx / length;
    }
    Ok(normals)
}

/// Displaces every ROI point along its local perpendicular by the
/// matching signed offset.
///
/// ## Arguments
///
/// * `roi` - `(n, 2)` coordinates
///
/// * `offsets` - one signed distance per point, in pixels
///
/// * `periodic` - whether the ROI is a closed loop (see `unit_normals`)
pub fn offset_coordinates(
    roi : &ArrayView2<f64>,
    offsets : &ArrayView1<f64>,
    periodic : bool
) -> Result<Array2<f64>, GeometryError> {
    if offsets.len() != roi.nrows() {
        return Err(GeometryError::LengthMismatch{expected : roi.nrows(), found : offsets.len()});
    }
    let normals = unit_normals(roi, periodic)?;
    let mut out = roi.to_owned();
    out.axis_iter_mut(Axis(0))
        .zip(normals.axis_iter(Axis(0)))
        .zip(offsets.iter())
        .for_each(|((mut point, normal), &offset)| {
            point.scaled_add(offset, &normal);
        });
    Ok(out)
}

/// Cumulative chord length along the rows of `coords`.
fn cumulative_length(coords : &ArrayView2<f64>) -> Vec<f64> {
    let mut cum = Vec::with_capacity(coords.nrows());
    cum.push(0.0);
    let mut total = 0.0;
    for i in 1..coords.nrows() {
        total += (coords[[i, 0]] - coords[[i - 1, 0]]).hypot(coords[[i, 1]] - coords[[i - 1, 1]]);
        cum.push(total);
    }
    cum
}

/// `coords` with its first point appended when `periodic`.
fn closed_copy(roi : &ArrayView2<f64>, periodic : bool) -> Array2<f64> {
    if !periodic {
        return roi.to_owned();
    }
    let mut closed = Array2::<f64>::zeros((roi.nrows() + 1, 2));
    closed.slice_mut(s![..roi.nrows(), ..]).assign(roi);
    closed.row_mut(roi.nrows()).assign(&roi.row(0));
    closed
}

/// Resamples the ROI by linear interpolation along its arc length so
/// consecutive points are one pixel apart. A periodic ROI includes the
/// closing segment and does not repeat its first point.
pub fn interp_roi(roi : &ArrayView2<f64>, periodic : bool) -> Result<Array2<f64>, GeometryError> {
    check_roi(roi, 2)?;
    let coords = closed_copy(roi, periodic);
    let cum = cumulative_length(&coords.view());
    let total = cum[cum.len() - 1];

    let npoints = total.round() as usize;
    if npoints < 2 {
        return Err(GeometryError::TooFewPoints{required : 2, found : npoints});
    }

    let mut resampled = Array2::<f64>::zeros((npoints, 2));
    for (k, mut point) in resampled.axis_iter_mut(Axis(0)).enumerate() {
        let position = total * k as f64 / (npoints - 1) as f64;
        let seg = cum.partition_point(|&c| c <= position).clamp(1, cum.len() - 1) - 1;
        let span = cum[seg + 1] - cum[seg];
        let frac = if span > 0.0 { (position - cum[seg]) / span } else { 0.0 };
        point[0] = coords[[seg, 0]] + frac * (coords[[seg + 1, 0]] - coords[[seg, 0]]);
        point[1] = coords[[seg, 1]] + frac * (coords[[seg + 1, 1]] - coords[[seg, 1]]);
    }

    if periodic {
        Ok(resampled.slice(s![..npoints - 1, ..]).to_owned())
    } else {
        Ok(resampled)
    }
}

/// Fits a smoothing cubic spline through the ROI and returns it
/// densely sampled (`SPLINE_EVAL_POINTS` points).
///
/// Points are parameterized by chord length. The coordinates are first
/// smoothed with a second-difference penalty whose weight is chosen so
/// the summed squared distance between input and smoothed points is
/// about `smoothing` (`0` keeps the points); a periodic or natural
/// interpolating spline through the smoothed points is then evaluated.
///
/// ## Example
///
/// ```rust, ignore
/// let smooth = spline_roi(&roi.view(), true, 100.0)?;
/// let unit_spaced = interp_roi(&smooth.view(), true)?;
/// ```
pub fn spline_roi(
    roi : &ArrayView2<f64>,
    periodic : bool,
    smoothing : f64
) -> Result<Array2<f64>, GeometryError> {
    check_roi(roi, if periodic { 3 } else { 2 })?;

    let channels : Vec<Vec<f64>> = (0..2).map(|c| roi.column(c).to_vec()).collect();
    let smoothed = if periodic {
        smoothing::smooth_closed(&channels, smoothing)
    } else {
        smoothing::smooth_open(&channels, smoothing)
    };

    let mut nodes = Array2::<f64>::zeros((roi.nrows(), 2));
    for (c, channel) in smoothed.iter().enumerate() {
        nodes.column_mut(c).assign(&ArrayView1::from(channel.as_slice()));
    }
    let nodes = closed_copy(&nodes.view(), periodic);
    let cum = cumulative_length(&nodes.view());
    let total = cum[cum.len() - 1];

    // Coincident nodes would give zero-width spline intervals.
    for (i, w) in cum.windows(2).enumerate() {
        if w[1] - w[0] < MIN_TANGENT_LENGTH {
            return Err(GeometryError::DegenerateTangent{index : (i + 1) % roi.nrows()});
        }
    }

    let splines = (0..2).map(|c| {
        let values = nodes.column(c).to_vec();
        if periodic {
            CubicSpline::periodic(&cum, &values)
        } else {
            CubicSpline::natural(&cum, &values)
        }
    }).collect::<Result<Vec<_>, _>>()
    .map_err(|_| GeometryError::TooFewPoints{required : 3, found : roi.nrows()})?;

    // A closed curve does not repeat its start point.
    let denom = if periodic { SPLINE_EVAL_POINTS } else { SPLINE_EVAL_POINTS - 1 } as f64;
    Ok(Array2::from_shape_fn((SPLINE_EVAL_POINTS, 2), |(i, c)| {
        splines[c].eval(total * i as f64 / denom)
    }))
}

/// Rolls a closed ROI so it starts at an end of its long axis.
///
/// Principal component analysis of the centered coordinates gives the
/// long axis; of the two extreme points along it, the one nearest the
/// current first point becomes index 0. Applying this twice picks the
/// same point both times.
pub fn rotate_roi(roi : &ArrayView2<f64>) -> Result<Array2<f64>, GeometryError> {
    check_roi(roi, 2)?;
    let n = roi.nrows();
    let mean_x = roi.column(0).sum() / n as f64;
    let mean_y = roi.column(1).sum() / n as f64;

    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for point in roi.axis_iter(Axis(0)) {
        let (dx, dy) = (point[0] - mean_x, point[1] - mean_y);
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }

    // Major eigenvector of the 2x2 covariance.
    let half_diff = 0.5 * (sxx - syy);
    let major = 0.5 * (sxx + syy) + half_diff.hypot(sxy);
    let (ax, ay) = if sxy.abs() > f64::EPSILON * (sxx + syy).max(1.0) {
        (major - syy, sxy)
    } else if sxx >= syy {
        (1.0, 0.0)
    } else {
        (0.0, 1.0)
    };

    let scores : Vec<f64> = roi.axis_iter(Axis(0))
        .map(|p| ax * (p[0] - mean_x) + ay * (p[1] - mean_y))
        .collect();
    let (mut low, mut high) = (0, 0);
    for (i, score) in scores.iter().enumerate() {
        if *score < scores[low] {
            low = i;
        }
        if *score > scores[high] {
            high = i;
        }
    }

    let distance = |i : usize| (roi[[0, 0]] - roi[[i, 0]]).hypot(roi[[0, 1]] - roi[[i, 1]]);
    let start = if distance(low) < distance(high) { low } else { high };

    Ok(Array2::from_shape_fn((n, 2), |(i, c)| roi[[(i + start) % n, c]]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::circle_roi;

    #[test]
    fn normals_point_outward_on_a_circle() {
        let roi = circle_roi(50.0, 40.0, 20.0, 126);
        let normals = unit_normals(&roi.view(), true).unwrap();
        for (point, normal) in roi.axis_iter(Axis(0)).zip(normals.axis_iter(Axis(0))) {
            let radial = ((point[0] - 50.0) / 20.0, (point[1] - 40.0) / 20.0);
            let dot = radial.0 * normal[0] + radial.1 * normal[1];
            assert!(dot > 0.99, "normal not radial: {}", dot);
        }
    }

    #[test]
    fn coincident_points_are_reported() {
        let roi = array![[0.0, 0.0], [1.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
        assert_eq!(
            unit_normals(&roi.view(), true),
            Err(GeometryError::DegenerateTangent{index : 2})
        );
        let offsets = Array1::<f64>::zeros(4);
        assert!(offset_coordinates(&roi.view(), &offsets.view(), true).is_err());
    }

    #[test]
    fn malformed_roi_is_rejected() {
        let roi = Array2::<f64>::zeros((5, 3));
        assert_eq!(
            unit_normals(&roi.view(), true),
            Err(GeometryError::MalformedRoi{shape : (5, 3)})
        );
    }

    #[test]
    fn offsetting_a_circle_changes_its_radius() {
        let roi = circle_roi(50.0, 50.0, 20.0, 200);
        let offsets = Array1::<f64>::from_elem(200, 2.0);
        let moved = offset_coordinates(&roi.view(), &offsets.view(), true).unwrap();
        for point in moved.axis_iter(Axis(0)) {
            let r = (point[0] - 50.0).hypot(point[1] - 50.0);
            assert!((r - 22.0).abs() < 0.05, "radius {}", r);
        }
        let short = Array1::<f64>::zeros(3);
        assert_eq!(
            offset_coordinates(&roi.view(), &short.view(), true),
            Err(GeometryError::LengthMismatch{expected : 200, found : 3})
        );
    }

    #[test]
    fn interp_roi_gives_unit_spacing() {
        let square = array![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]];
        let closed = interp_roi(&square.view(), true).unwrap();
        assert_eq!(closed.nrows(), 39);
        // first ten samples all lie on the bottom edge
        for w in 0..9 {
            let step = (closed[[w + 1, 0]] - closed[[w, 0]]).hypot(closed[[w + 1, 1]] - closed[[w, 1]]);
            assert!((step - 40.0 / 39.0).abs() < 1e-9);
        }

        let line = array![[0.0, 0.0], [7.0, 0.0]];
        let open = interp_roi(&line.view(), false).unwrap();
        assert_eq!(open.nrows(), 7);
        assert_eq!(open[[6, 0]], 7.0);
    }

    #[test]
    fn spline_smoothing_keeps_a_circle() {
        let roi = circle_roi(60.0, 60.0, 25.0, 157);
        let smooth = spline_roi(&roi.view(), true, 100.0).unwrap();
        assert_eq!(smooth.nrows(), SPLINE_EVAL_POINTS);
        for point in smooth.axis_iter(Axis(0)) {
            let r = (point[0] - 60.0).hypot(point[1] - 60.0);
            assert!((r - 25.0).abs() < 1.5, "radius {}", r);
        }
        let resampled = interp_roi(&smooth.view(), true).unwrap();
        let expected = 2.0 * std::f64::consts::PI * 25.0;
        assert!((resampled.nrows() as f64 - expected).abs() < 10.0);
    }

    #[test]
    fn open_spline_passes_through_a_line() {
        let line = Array2::from_shape_fn((20, 2), |(i, c)| if c == 0 { i as f64 } else { 3.0 });
        let smooth = spline_roi(&line.view(), false, 0.0).unwrap();
        assert!((smooth[[0, 0]] - 0.0).abs() < 1e-9);
        assert!((smooth[[SPLINE_EVAL_POINTS - 1, 0]] - 19.0).abs() < 1e-9);
        assert!(smooth.column(1).iter().all(|y| (y - 3.0).abs() < 1e-9));
    }

    #[test]
    fn rotation_is_repeatable() {
        // Ellipse elongated along x, starting near the top.
        let n = 120;
        let roi = Array2::from_shape_fn((n, 2), |(i, c)| {
            let t = 2.0 * std::f64::consts::PI * (i as f64 + 25.0) / n as f64;
            if c == 0 { 50.0 + 30.0 * t.cos() } else { 50.0 + 10.0 * t.sin() }
        });
        let once = rotate_roi(&roi.view()).unwrap();
        let twice = rotate_roi(&once.view()).unwrap();
        assert_eq!(once, twice);
        // Starts at one end of the long axis.
        assert!((once[[0, 0]] - 50.0).abs() > 29.0);
    }
}
