//! The records a quantification run produces. Each fitting pass builds
//! a fresh `FitRecord` and simulation builds a fresh `SimulatedImages`;
//! neither is patched in place.

use ndarray::prelude::*;

/// Phase of a `MembraneQuant` engine. A phase is entered when the
/// corresponding operation starts and the engine returns to `Idle` when
/// it completes, except after a save, which leaves it `Saved` until the
/// next operation. An operation that fails leaves the phase it failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Fitting,
    Adjusting,
    Simulating,
    Saved,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            EngineState::Idle => "idle",
            EngineState::Fitting => "fitting",
            EngineState::Adjusting => "adjusting",
            EngineState::Simulating => "simulating",
            EngineState::Saved => "saved",
        };
        write!(f, "{}", name)
    }
}

/// Everything one fitting pass produced, for the ROI it was run on.
///
/// `offsets`, `cyts` and `mems` have one entry per fit (`nfits`); the
/// `_full` versions are linearly interpolated to one entry per ROI point.
/// `straight` and `straight_filtered` are `(thickness, n_roi)`.
#[derive(Debug, Clone, PartialEq)]
pub struct FitRecord {
    pub roi : Array2<f64>,
    pub straight : Array2<f64>,
    pub straight_filtered : Array2<f64>,
    pub offsets : Array1<f64>,
    pub cyts : Array1<f64>,
    pub mems : Array1<f64>,
    pub offsets_full : Array1<f64>,
    pub cyts_full : Array1<f64>,
    pub mems_full : Array1<f64>,
}

impl FitRecord {
    /// An all-zero record sized for `roi`.
    pub fn empty(roi : &ArrayView2<f64>, thickness : usize, nfits : usize) -> Self {
        let n = roi.nrows();
        FitRecord {
            roi : roi.to_owned(),
            straight : Array2::zeros((thickness, n)),
            straight_filtered : Array2::zeros((thickness, n)),
            offsets : Array1::zeros(nfits),
            cyts : Array1::zeros(nfits),
            mems : Array1::zeros(nfits),
            offsets_full : Array1::zeros(n),
            cyts_full : Array1::zeros(n),
            mems_full : Array1::zeros(n),
        }
    }

    /// Number of ROI positions the record covers.
    pub fn len(&self) -> usize {
        self.roi.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.roi.nrows() == 0
    }
}

/// Images reconstructed from a `FitRecord`, all `(thickness, n_roi)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedImages {
    /// Cytoplasm plus membrane model.
    pub straight_fit : Array2<f64>,
    pub straight_cyt : Array2<f64>,
    pub straight_mem : Array2<f64>,
    /// `straight - straight_fit`
    pub straight_resids : Array2<f64>,
    pub straight_resids_pos : Array2<f64>,
    /// Magnitude of the negative residuals.
    pub straight_resids_neg : Array2<f64>,
}

impl SimulatedImages {
    pub fn empty(thickness : usize, n : usize) -> Self {
        SimulatedImages {
            straight_fit : Array2::zeros((thickness, n)),
            straight_cyt : Array2::zeros((thickness, n)),
            straight_mem : Array2::zeros((thickness, n)),
            straight_resids : Array2::zeros((thickness, n)),
            straight_resids_pos : Array2::zeros((thickness, n)),
            straight_resids_neg : Array2::zeros((thickness, n)),
        }
    }
}
