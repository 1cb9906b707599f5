//! Background estimation for a straightened stack. The engine only needs
//! a scalar; how it is obtained is left to a `BackgroundEstimator`.

use ndarray::prelude::*;

use crate::data::profile::ProfileError;

/// Rows at the outer edge of a cross-section averaged for the default
/// background estimate. Row 0 is the outermost sample, so these rows sit
/// outside the cell when the cross-section is wide enough.
pub const BACKGROUND_ROWS : usize = 5;

/// Anything that can turn a straightened stack into a scalar background.
pub trait BackgroundEstimator : Send + Sync {
    fn estimate(&self, straight : &ArrayView2<f64>) -> Result<f64, ProfileError>;
}

/// Mean over the first `rows` rows of the straightened stack.
#[derive(Debug, Clone, Copy)]
pub struct EdgeRowsBackground {
    pub rows : usize,
}

impl Default for EdgeRowsBackground {
    fn default() -> Self {
        EdgeRowsBackground { rows : BACKGROUND_ROWS }
    }
}

impl BackgroundEstimator for EdgeRowsBackground {
    fn estimate(&self, straight : &ArrayView2<f64>) -> Result<f64, ProfileError> {
        let rows = self.rows.min(straight.nrows());
        straight.slice(s![..rows, ..]).mean().ok_or(ProfileError::EmptyArray)
    }
}

/// A background value known in advance.
#[derive(Debug, Clone, Copy)]
pub struct FixedBackground(pub f64);

impl BackgroundEstimator for FixedBackground {
    fn estimate(&self, _straight : &ArrayView2<f64>) -> Result<f64, ProfileError> {
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_rows_mean() {
        let straight = Array2::from_shape_fn((10, 4), |(r, _)| if r < 5 { 2.0 } else { 50.0 });
        let bg = EdgeRowsBackground::default().estimate(&straight.view()).unwrap();
        assert!((bg - 2.0).abs() < 1e-12);

        let wide = EdgeRowsBackground { rows : 10 }.estimate(&straight.view()).unwrap();
        assert!((wide - 26.0).abs() < 1e-12);
    }

    #[test]
    fn empty_stack_has_no_background() {
        let straight = Array2::<f64>::zeros((0, 4));
        assert_eq!(
            EdgeRowsBackground::default().estimate(&straight.view()),
            Err(ProfileError::EmptyArray)
        );
        assert_eq!(FixedBackground(3.0).estimate(&straight.view()), Ok(3.0));
    }
}
