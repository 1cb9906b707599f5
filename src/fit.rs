//! Per-position profile fitting.
//!
//! A cross-section, upsampled to `thickness_itp` samples, is modelled as
//! `c * cyt[l..l + thickness_itp] + m * mem[l..l + thickness_itp]` where
//! `cyt` and `mem` are the upsampled reference curves. The window start `l`
//! makes the problem non-convex, so the triple is searched with bounded
//! differential evolution. The amplitudes are then optionally polished
//! with the exact bounded least-squares solution at the chosen window.

pub mod evolution;

use log::warn;
use ndarray::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::data::reference::ReferenceCurves;
use evolution::{differential_evolution, EvolutionSettings};

/// Errors from fitting a single profile.
#[derive(Debug, Clone, PartialEq)]
pub enum FitError {
    /// The profile does not have `thickness_itp` samples.
    ProfileLength{expected : usize, found : usize},
}

impl std::error::Error for FitError {}

impl std::fmt::Display for FitError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            FitError::ProfileLength{expected, found} => {
                write!(f, "Profile has {} samples, expected {}", found, expected)
            },
        }
    }
}

/// The fitted parameters of one cross-section.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProfileFit {
    /// Signed offset of the membrane from the ROI point, native pixels.
    pub offset : f64,
    pub cytoplasm : f64,
    pub membrane : f64,
}

/// Search box for `(l, c, m)`.
pub type FitBounds = [(f64, f64); 3];

/// Derives the optimizer seed for one position from the run seed, so
/// each position's search is repeatable and independent of the order
/// positions are fitted in.
pub fn position_seed(seed : u64, position : usize) -> u64 {
    seed ^ (position as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Fits profiles against a fixed set of reference curves.
///
/// Holds only shared references and settings, so one fitter can be used
/// from every worker thread at once.
#[derive(Debug, Clone)]
pub struct ProfileFitter<'a> {
    curves : &'a ReferenceCurves,
    freedom : f64,
    zerocap : bool,
    polish : bool,
    settings : EvolutionSettings,
}

impl<'a> ProfileFitter<'a> {
    pub fn new(curves : &'a ReferenceCurves, freedom : f64, zerocap : bool, polish : bool) -> Self {
        ProfileFitter {
            curves,
            freedom,
            zerocap,
            polish,
            settings : EvolutionSettings::default(),
        }
    }

    /// Replaces the optimizer settings.
    pub fn with_settings(mut self, settings : EvolutionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn curves(&self) -> &ReferenceCurves {
        self.curves
    }

    /// Search bounds for a profile.
    ///
    /// `l` may move `freedom` of the half-width either side of the centre.
    /// With `zerocap` the amplitudes lie in `[0, 2 max]` (collapsing to
    /// `[0, 0]` for a profile with no positive signal), otherwise in
    /// `[-0.2 max, 2 max]`.
    pub fn bounds(&self, profile : &ArrayView1<f64>) -> FitBounds {
        let half = self.curves.thickness_itp as f64 / 2.0;
        let peak = profile.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
        let amplitude = if self.zerocap {
            (0.0, (2.0 * peak).max(0.0))
        } else {
            let (lo, hi) = (-0.2 * peak, 2.0 * peak);
            (lo.min(hi), lo.max(hi))
        };
        [
            (half * (1.0 - self.freedom), half * (1.0 + self.freedom)),
            amplitude,
            amplitude,
        ]
    }

    /// Mean squared error of the model `(l, c, m)` against `profile`.
    /// `l` is truncated to a whole upsampled index.
    pub fn mse(&self, params : &[f64; 3], profile : &ArrayView1<f64>) -> f64 {
        let start = params[0].max(0.0) as usize;
        let cyt = self.curves.cytoplasm_window(start);
        let mem = self.curves.membrane_window(start);
        let mut sum = 0.0;
        ndarray::Zip::from(profile).and(&cyt).and(&mem).for_each(|&p, &a, &b| {
            let r = p - params[1] * a - params[2] * b;
            sum += r * r;
        });
        sum / profile.len() as f64
    }

    /// Fits one upsampled cross-section.
    ///
    /// ## Arguments
    ///
    /// * `profile` - `thickness_itp` samples running from outside to inside
    ///
    /// * `seed` - seed for the optimizer's random stream
    ///
    /// ## Returns
    ///
    /// The offset in native pixels together with the cytoplasmic and
    /// membrane levels. Non-convergence within the generation cap is
    /// logged, not reported as an error.
    ///
    /// ## Example
    ///
    /// ```rust, ignore
    /// let curves = ReferenceCurves::new(20, 2.0, 10);
    /// let fitter = ProfileFitter::new(&curves, 0.5, true, true);
    /// let fit = fitter.fit_profile(&curves.model(100, 5.0, 10.0).view(), 0)?;
    /// assert!(fit.offset.abs() < 0.5);
    /// ```
    pub fn fit_profile(&self, profile : &ArrayView1<f64>, seed : u64) -> Result<ProfileFit, FitError> {
        let expected = self.curves.thickness_itp;
        if profile.len() != expected {
            return Err(FitError::ProfileLength{expected, found : profile.len()});
        }

        let bounds = self.bounds(profile);
        let mut rng = StdRng::seed_from_u64(seed);
        let result = differential_evolution(
            |params : &[f64; 3]| self.mse(params, profile),
            &bounds,
            &self.settings,
            &mut rng,
        );
        if !result.converged {
            warn!(
                "Profile fit stopped after {} generations without reaching tolerance (mse {:.4})",
                result.generations, result.energy
            );
        }

        let [l, mut cytoplasm, mut membrane] = result.x;
        if self.polish {
            let start = l.max(0.0) as usize;
            let (c, m) = bounded_pair_lstsq(
                profile,
                &self.curves.cytoplasm_window(start),
                &self.curves.membrane_window(start),
                bounds[1],
                bounds[2],
            );
            if self.mse(&[l, c, m], profile) <= result.energy {
                cytoplasm = c;
                membrane = m;
            }
        }

        Ok(ProfileFit {
            offset : (l - expected as f64 / 2.0) / self.curves.itp as f64,
            cytoplasm,
            membrane,
        })
    }
}

/// Minimizes `|p - c a - m b|^2` over the box `c_bounds x m_bounds`.
///
/// The objective is a convex quadratic, so the minimum is either the
/// unconstrained solution or lies on one of the four edges, where it is
/// a clamped one-dimensional solve.
fn bounded_pair_lstsq(
    p : &ArrayView1<f64>,
    a : &ArrayView1<f64>,
    b : &ArrayView1<f64>,
    c_bounds : (f64, f64),
    m_bounds : (f64, f64)
) -> (f64, f64) {
    let aa = a.dot(a);
    let bb = b.dot(b);
    let ab = a.dot(b);
    let pa = p.dot(a);
    let pb = p.dot(b);

    let inside = |v : f64, (lo, hi) : (f64, f64)| v >= lo && v <= hi;
    let det = aa * bb - ab * ab;
    if det > 1e-12 * aa * bb {
        let c = (pa * bb - pb * ab) / det;
        let m = (pb * aa - pa * ab) / det;
        if inside(c, c_bounds) && inside(m, m_bounds) {
            return (c, m);
        }
    }

    // p.p is common to every candidate and dropped
    let cost = |c : f64, m : f64| c * c * aa + m * m * bb + 2.0 * c * m * ab - 2.0 * c * pa - 2.0 * m * pb;
    let solve = |num : f64, den : f64, (lo, hi) : (f64, f64)| {
        if den > 0.0 { (num / den).clamp(lo, hi) } else { lo }
    };

    let mut candidates = Vec::with_capacity(4);
    for c in [c_bounds.0, c_bounds.1] {
        candidates.push((c, solve(pb - c * ab, bb, m_bounds)));
    }
    for m in [m_bounds.0, m_bounds.1] {
        candidates.push((solve(pa - m * ab, aa, c_bounds), m));
    }
    let (c, m, _) = candidates.into_iter()
        .fold((c_bounds.0, m_bounds.0, f64::INFINITY), |best, (c, m)| {
            let e = cost(c, m);
            if e < best.2 { (c, m, e) } else { best }
        });
    (c, m)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_a_centred_profile() {
        let curves = ReferenceCurves::new(20, 2.0, 10);
        let fitter = ProfileFitter::new(&curves, 0.5, true, true);
        let profile = curves.model(100, 5.0, 10.0);
        let fit = fitter.fit_profile(&profile.view(), 1).unwrap();
        assert!(fit.offset.abs() < 0.5, "offset {}", fit.offset);
        assert!((fit.cytoplasm - 5.0).abs() < 0.5, "cyt {}", fit.cytoplasm);
        assert!((fit.membrane - 10.0).abs() < 1.0, "mem {}", fit.membrane);
    }

    #[test]
    fn recovers_a_shifted_profile() {
        let curves = ReferenceCurves::new(20, 2.0, 10);
        let fitter = ProfileFitter::new(&curves, 0.5, true, true);
        // window starting 20 upsampled samples later: offset of +2 px
        let profile = curves.model(120, 3.0, 8.0);
        let fit = fitter.fit_profile(&profile.view(), 5).unwrap();
        assert!((fit.offset - 2.0).abs() < 0.5, "offset {}", fit.offset);
        assert!((fit.membrane - 8.0).abs() < 1.0, "mem {}", fit.membrane);
    }

    #[test]
    fn bounds_follow_freedom_and_zerocap() {
        let curves = ReferenceCurves::new(20, 2.0, 10);
        let profile = Array1::from_elem(200, 4.0);

        let capped = ProfileFitter::new(&curves, 0.5, true, true);
        assert_eq!(capped.bounds(&profile.view()), [(50.0, 150.0), (0.0, 8.0), (0.0, 8.0)]);

        let free = ProfileFitter::new(&curves, 0.2, false, true);
        let b = free.bounds(&profile.view());
        assert_eq!(b[0], (80.0, 120.0));
        assert!((b[1].0 + 0.8).abs() < 1e-12 && (b[1].1 - 8.0).abs() < 1e-12);

        let negative = Array1::from_elem(200, -1.0);
        assert_eq!(capped.bounds(&negative.view())[1], (0.0, 0.0));
        let b = free.bounds(&negative.view());
        assert!(b[1].0 <= b[1].1);
    }

    #[test]
    fn non_positive_profile_fits_zero_amplitudes() {
        let curves = ReferenceCurves::new(10, 2.0, 5);
        let fitter = ProfileFitter::new(&curves, 0.5, true, true);
        let profile = Array1::from_elem(50, -2.0);
        let fit = fitter.fit_profile(&profile.view(), 0).unwrap();
        assert_eq!(fit.cytoplasm, 0.0);
        assert_eq!(fit.membrane, 0.0);
    }

    #[test]
    fn wrong_length_is_rejected() {
        let curves = ReferenceCurves::new(10, 2.0, 5);
        let fitter = ProfileFitter::new(&curves, 0.5, true, true);
        let profile = Array1::zeros(100);
        assert_eq!(
            fitter.fit_profile(&profile.view(), 0),
            Err(FitError::ProfileLength{expected : 50, found : 100})
        );
    }

    #[test]
    fn box_least_squares() {
        let a = array![1.0, 0.0, 1.0];
        let b = array![0.0, 1.0, 1.0];
        let p = &a * 2.0 + &b * 3.0;
        let (c, m) = bounded_pair_lstsq(&p.view(), &a.view(), &b.view(), (0.0, 10.0), (0.0, 10.0));
        assert!((c - 2.0).abs() < 1e-12 && (m - 3.0).abs() < 1e-12);
        // m capped at 1, c re-solved on that edge
        let (c, m) = bounded_pair_lstsq(&p.view(), &a.view(), &b.view(), (0.0, 10.0), (0.0, 1.0));
        assert_eq!(m, 1.0);
        assert!((c - 3.0).abs() < 1e-12);
    }

    #[test]
    fn seeds_differ_by_position() {
        assert_ne!(position_seed(0, 0), position_seed(0, 1));
        assert_eq!(position_seed(9, 4), position_seed(9, 4));
    }
}
