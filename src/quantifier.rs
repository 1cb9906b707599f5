//! `MembraneQuant`
//!
//! The quantification engine. Given an image, an initial cortex ROI and a
//! `QuantConfig`, it straightens the image along the ROI, fits every
//! cross-section as cytoplasm plus membrane, optionally moves the ROI onto
//! the fitted membrane and refits, and finally reconstructs the model as
//! images.

mod save;
mod state;

use log::{debug, info};
use ndarray::prelude::*;

use crate::config::{InterpKind, QuantConfig};
use crate::data::background::{BackgroundEstimator, EdgeRowsBackground};
use crate::data::geometry::{check_roi, interp_roi, offset_coordinates, rotate_roi, spline_roi};
use crate::data::metrics::asymmetry_index;
use crate::data::profile::{interp_1d_array, interp_2d_array, rolling_ave_2d};
use crate::data::reference::ReferenceCurves;
use crate::data::straighten::straighten;
use crate::fit::{position_seed, ProfileFit, ProfileFitter};
use crate::utils::{parallelize_op, QuantError};

pub use state::{EngineState, FitRecord, SimulatedImages};

/// Smoothing target used when refitting the ROI through the fitted
/// membrane positions.
pub const ROI_SMOOTHING : f64 = 100.0;

/// A quantification run over one image.
///
/// ## Example
///
/// ```rust, ignore
/// let config = QuantConfig { iterations : 2, ..QuantConfig::with_sigma(2.0) };
/// let mut quant = MembraneQuant::new(img, roi, config)?;
/// quant.run()?;
/// println!("{:?}", quant.mems());
/// ```
pub struct MembraneQuant {
    img : Array2<f64>,
    roi_init : Array2<f64>,
    roi : Array2<f64>,
    config : QuantConfig,
    curves : ReferenceCurves,
    nfits : usize,
    record : FitRecord,
    simulated : SimulatedImages,
    state : EngineState,
    background : Box<dyn BackgroundEstimator>,
    pool : Option<rayon::ThreadPool>,
}

impl std::fmt::Debug for MembraneQuant {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("MembraneQuant")
            .field("img", &self.img.dim())
            .field("roi", &self.roi.dim())
            .field("nfits", &self.nfits)
            .field("state", &self.state)
            .field("config", &self.config)
            .finish()
    }
}

impl MembraneQuant {
    /// Sets up a run. Fails before any fitting if the configuration is
    /// invalid (e.g. `sigma` missing) or the ROI is not an `(n, 2)` array
    /// with enough points.
    ///
    /// ## Arguments
    ///
    /// * `img` - The image, indexed `[row, column]`
    ///
    /// * `roi` - `(n, 2)` array of `(x, y)` cortex coordinates
    ///
    /// * `config` - Run parameters
    pub fn new(img : Array2<f64>, roi : Array2<f64>, config : QuantConfig) -> Result<Self, QuantError> {
        config.validate()?;
        check_roi(&roi.view(), if config.periodic { 3 } else { 2 })?;
        if img.is_empty() {
            return Err(QuantError::FormatError("Image has no pixels".to_string()));
        }

        let curves = ReferenceCurves::new(config.thickness, config.sigma()?, config.itp);
        let nfits = config.nfits.unwrap_or(roi.nrows());

        let pool = if config.parallel {
            // 0 lets rayon use one thread per CPU
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.cores.unwrap_or(0))
                .build()?;
            debug!("Fitting across {} threads", pool.current_num_threads());
            Some(pool)
        } else {
            None
        };

        let record = FitRecord::empty(&roi.view(), config.thickness, nfits);
        let simulated = SimulatedImages::empty(config.thickness, roi.nrows());
        let background = Box::new(EdgeRowsBackground { rows : config.background_rows });

        Ok(MembraneQuant {
            img,
            roi_init : roi.clone(),
            roi,
            config,
            curves,
            nfits,
            record,
            simulated,
            state : EngineState::Idle,
            background,
            pool,
        })
    }

    /// Replaces the background estimator used when `bg_subtract` is set.
    pub fn with_background_estimator<B : BackgroundEstimator + 'static>(mut self, estimator : B) -> Self {
        self.background = Box::new(estimator);
        self
    }

    /// Runs the full procedure: `iterations` fitting passes, adjusting the
    /// ROI before every pass after the first, then simulation, then a save
    /// if `save_path` is configured. There is no convergence test; exactly
    /// `iterations` passes are made.
    pub fn run(&mut self) -> Result<(), QuantError> {
        for iteration in 0..self.config.iterations {
            if iteration > 0 {
                self.adjust_roi()?;
            }
            info!("Iteration {} of {}", iteration + 1, self.config.iterations);
            self.fit()?;
        }

        self.simulate()?;

        if let Some(path) = self.config.save_path.clone() {
            self.save_to(&path)?;
        }
        Ok(())
    }

    /// One fitting pass over the current ROI.
    ///
    /// Straightens the image, optionally subtracts a background estimate
    /// (from both the straightened stack and the image), smooths along the
    /// ROI, upsamples each cross-section to `thickness_itp` samples and
    /// resamples to `nfits` positions, fits each position, and interpolates
    /// the results back to one per ROI point.
    pub fn fit(&mut self) -> Result<(), QuantError> {
        self.state = EngineState::Fitting;
        let config = &self.config;
        let npoints = self.roi.nrows();

        let mut straight = straighten(
            &self.img.view(),
            &self.roi.view(),
            config.thickness,
            config.periodic,
            config.interp,
            None,
        )?;

        if config.bg_subtract {
            let bg = self.background.estimate(&straight.view())?;
            debug!("Subtracting background {:.4}", bg);
            straight -= bg;
            self.img -= bg;
        }

        let straight_filtered = rolling_ave_2d(&straight.view(), config.rol_ave, config.periodic);

        let upsampled = interp_2d_array(
            &straight_filtered.view(), config.thickness_itp(), Axis(0), config.interp
        )?;
        let profiles = interp_2d_array(&upsampled.view(), self.nfits, Axis(1), config.interp)?;
        debug!("Fitting {} profiles of {} samples", profiles.ncols(), profiles.nrows());

        let fitter = ProfileFitter::new(&self.curves, config.freedom, config.zerocap, config.polish);
        let seed = config.seed;
        let fit_column = |index : usize, column : ArrayView1<f64>| -> Result<ProfileFit, QuantError> {
            Ok(fitter.fit_profile(&column, position_seed(seed, index))?)
        };

        let fits = match &self.pool {
            Some(pool) => parallelize_op!(profiles, Axis(1), pool, fit_column)?,
            None => parallelize_op!(profiles, Axis(1), fit_column)?,
        };

        let offsets : Array1<f64> = fits.iter().map(|fit| fit.offset).collect();
        let cyts : Array1<f64> = fits.iter().map(|fit| fit.cytoplasm).collect();
        let mems : Array1<f64> = fits.iter().map(|fit| fit.membrane).collect();

        self.record = FitRecord {
            roi : self.roi.clone(),
            offsets_full : interp_1d_array(&offsets.view(), npoints, InterpKind::Linear)?,
            cyts_full : interp_1d_array(&cyts.view(), npoints, InterpKind::Linear)?,
            mems_full : interp_1d_array(&mems.view(), npoints, InterpKind::Linear)?,
            offsets,
            cyts,
            mems,
            straight,
            straight_filtered,
        };
        self.state = EngineState::Idle;
        Ok(())
    }

    /// Moves the ROI onto the fitted membrane.
    ///
    /// Each point is displaced along its perpendicular by its fitted
    /// offset, a smoothing spline is passed through the displaced points
    /// and resampled at one-pixel spacing, and a closed ROI is re-anchored
    /// on its long axis if `rotate` is set. Results are cleared to match
    /// the new ROI, which may have a different number of points.
    pub fn adjust_roi(&mut self) -> Result<(), QuantError> {
        self.state = EngineState::Adjusting;
        let periodic = self.config.periodic;

        let moved = offset_coordinates(&self.roi.view(), &self.record.offsets_full.view(), periodic)?;
        let smooth = spline_roi(&moved.view(), periodic, ROI_SMOOTHING)?;
        let mut roi = interp_roi(&smooth.view(), periodic)?;
        if periodic && self.config.rotate {
            roi = rotate_roi(&roi.view())?;
        }
        debug!("Adjusted ROI from {} to {} points", self.roi.nrows(), roi.nrows());

        self.roi = roi;
        self.reset_res();
        self.state = EngineState::Idle;
        Ok(())
    }

    /// Rebuilds the model images from the current results.
    ///
    /// For every ROI point, the reference curves are placed at its fitted
    /// offset, scaled by its fitted levels and resampled to `thickness`
    /// rows. Residuals are taken against the straightened image.
    pub fn simulate(&mut self) -> Result<(), QuantError> {
        self.state = EngineState::Simulating;
        let thickness = self.config.thickness;
        let method = self.config.interp;
        let half = self.curves.thickness_itp as f64 / 2.0;
        let record = &self.record;

        let mut simulated = SimulatedImages::empty(thickness, record.len());
        for x in 0..record.len() {
            let start = (record.offsets_full[x] * self.curves.itp as f64 + half).max(0.0) as usize;
            let cyt = self.curves.cytoplasm_window(start).mapv(|v| v * record.cyts_full[x]);
            let mem = self.curves.membrane_window(start).mapv(|v| v * record.mems_full[x]);
            let fit = &cyt + &mem;

            simulated.straight_cyt.column_mut(x)
                .assign(&interp_1d_array(&cyt.view(), thickness, method)?);
            simulated.straight_mem.column_mut(x)
                .assign(&interp_1d_array(&mem.view(), thickness, method)?);
            simulated.straight_fit.column_mut(x)
                .assign(&interp_1d_array(&fit.view(), thickness, method)?);
        }

        simulated.straight_resids = &record.straight - &simulated.straight_fit;
        simulated.straight_resids_pos = simulated.straight_resids.mapv(|v| v.max(0.0));
        simulated.straight_resids_neg = simulated.straight_resids.mapv(|v| v.min(0.0).abs());

        self.simulated = simulated;
        self.state = EngineState::Idle;
        Ok(())
    }

    /// Restores the initial ROI and clears every result. The image keeps
    /// any background that was subtracted from it.
    pub fn reset(&mut self) {
        self.roi = self.roi_init.clone();
        self.reset_res();
        self.state = EngineState::Idle;
    }

    /// Clears every result, sized for the current ROI.
    pub fn reset_res(&mut self) {
        self.record = FitRecord::empty(&self.roi.view(), self.config.thickness, self.nfits);
        self.simulated = SimulatedImages::empty(self.config.thickness, self.roi.nrows());
    }

    /// Asymmetry index of the membrane levels around the ROI, comparing the
    /// central `size` fraction of the ROI with the same fraction around its
    /// ends.
    pub fn asymmetry(&self, size : f64) -> Result<f64, QuantError> {
        Ok(asymmetry_index(&self.record.mems_full.view(), size)?)
    }

    pub fn img(&self) -> &Array2<f64> {
        &self.img
    }

    /// The current ROI (moved by `adjust_roi`).
    pub fn roi(&self) -> &Array2<f64> {
        &self.roi
    }

    pub fn roi_init(&self) -> &Array2<f64> {
        &self.roi_init
    }

    pub fn config(&self) -> &QuantConfig {
        &self.config
    }

    pub fn curves(&self) -> &ReferenceCurves {
        &self.curves
    }

    /// Number of fits per pass, fixed when the engine is created.
    pub fn nfits(&self) -> usize {
        self.nfits
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn record(&self) -> &FitRecord {
        &self.record
    }

    pub fn simulated(&self) -> &SimulatedImages {
        &self.simulated
    }

    /// Offsets at fit resolution.
    pub fn offsets(&self) -> &Array1<f64> {
        &self.record.offsets
    }

    pub fn cyts(&self) -> &Array1<f64> {
        &self.record.cyts
    }

    pub fn mems(&self) -> &Array1<f64> {
        &self.record.mems
    }

    /// Offsets at ROI resolution.
    pub fn offsets_full(&self) -> &Array1<f64> {
        &self.record.offsets_full
    }

    pub fn cyts_full(&self) -> &Array1<f64> {
        &self.record.cyts_full
    }

    pub fn mems_full(&self) -> &Array1<f64> {
        &self.record.mems_full
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::data::background::FixedBackground;
    use crate::tests::{circle_roi, disk_image};

    fn small_config() -> QuantConfig {
        QuantConfig {
            thickness : 10,
            itp : 4,
            rol_ave : 3,
            iterations : 1,
            interp : InterpKind::Linear,
            ..QuantConfig::with_sigma(2.0)
        }
    }

    #[test]
    fn missing_sigma_is_rejected_up_front() {
        let img = Array2::<f64>::zeros((20, 20));
        let roi = circle_roi(10.0, 10.0, 5.0, 31);
        let err = MembraneQuant::new(img, roi, QuantConfig::default()).unwrap_err();
        assert!(matches!(err, QuantError::ConfigError(ConfigError::MissingSigma)));
    }

    #[test]
    fn malformed_roi_is_rejected_up_front() {
        let img = Array2::<f64>::zeros((20, 20));
        let roi = Array2::<f64>::zeros((10, 3));
        assert!(matches!(
            MembraneQuant::new(img, roi, small_config()),
            Err(QuantError::GeometryError(_))
        ));
    }

    #[test]
    fn results_are_sized_by_nfits_and_roi() {
        let img = disk_image(40, 40, (20.0, 20.0), 10.0, 5.0, 0.0);
        let roi = circle_roi(20.0, 20.0, 10.0, 63);
        let config = QuantConfig { nfits : Some(20), ..small_config() };
        let mut quant = MembraneQuant::new(img, roi, config).unwrap();
        quant.fit().unwrap();
        assert_eq!(quant.offsets().len(), 20);
        assert_eq!(quant.mems_full().len(), 63);
        assert_eq!(quant.record().straight.dim(), (10, 63));
        assert_eq!(quant.state(), EngineState::Idle);
        // freedom 0.5 keeps offsets within a quarter of the thickness
        assert!(quant.offsets().iter().all(|o| o.abs() <= 2.5 + 1e-9));
    }

    #[test]
    fn background_is_subtracted_from_image_and_stack() {
        let img = Array2::<f64>::from_elem((30, 30), 4.0);
        let roi = circle_roi(15.0, 15.0, 6.0, 38);
        let config = QuantConfig { bg_subtract : true, ..small_config() };
        let mut quant = MembraneQuant::new(img, roi, config).unwrap()
            .with_background_estimator(FixedBackground(1.5));
        quant.fit().unwrap();
        assert!(quant.img().iter().all(|&v| (v - 2.5).abs() < 1e-12));
        assert!(quant.record().straight.iter().all(|&v| (v - 2.5).abs() < 1e-9));
    }

    #[test]
    fn simulation_reconstructs_the_straightened_stack() {
        let img = disk_image(40, 40, (20.0, 20.0), 10.0, 5.0, 0.0);
        let roi = circle_roi(20.0, 20.0, 10.0, 63);
        let mut quant = MembraneQuant::new(img, roi, small_config()).unwrap();
        quant.fit().unwrap();
        quant.simulate().unwrap();

        let sims = quant.simulated();
        let resid = &quant.record().straight - &sims.straight_fit;
        assert_eq!(sims.straight_resids, resid);
        assert!(sims.straight_resids_pos.iter().all(|&v| v >= 0.0));
        assert!(sims.straight_resids_neg.iter().all(|&v| v >= 0.0));
        let combined = &sims.straight_resids_pos - &sims.straight_resids_neg;
        assert!(combined.iter().zip(resid.iter()).all(|(a, b)| (a - b).abs() < 1e-12));
        // interpolation is linear, so the parts add up to the whole
        let parts = &sims.straight_cyt + &sims.straight_mem;
        assert!(parts.iter().zip(sims.straight_fit.iter()).all(|(a, b)| (a - b).abs() < 1e-9));
    }
}
