//! Reference cross-section shapes: an error-function step for diffuse
//! cytoplasmic signal and a Gaussian for membrane-bound signal, both
//! centered on the nominal cortex position.

use ndarray::prelude::*;

/// Gaussian with peak 1 at `centre` and standard deviation `width`.
pub fn gaus(x : f64, centre : f64, width : f64) -> f64 {
    (-((x - centre).powi(2)) / (2.0 * width * width)).exp()
}

/// Error function centered at `centre` and scaled by `width`.
pub fn error_func(x : f64, centre : f64, width : f64) -> f64 {
    libm::erf((x - centre) / width)
}

/// Cytoplasmic step `(1 + erf((i - centre) / width)) / 2` over `len` samples.
fn cytoplasm_curve(len : usize, centre : f64, width : f64) -> Array1<f64> {
    Array1::from_shape_fn(len, |i| (1.0 + error_func(i as f64, centre, width)) / 2.0)
}

/// Membrane peak over `len` samples.
fn membrane_curve(len : usize, centre : f64, width : f64) -> Array1<f64> {
    Array1::from_shape_fn(len, |i| gaus(i as f64, centre, width))
}

/// The two basis curves at native and upsampled resolution.
///
/// Native curves have `2 * thickness` samples centered at index
/// `thickness`; upsampled ones have `2 * thickness_itp` samples centered
/// at `thickness_itp` with width `sigma * itp`, so a window of
/// `thickness_itp` samples starting at `thickness_itp / 2` covers one
/// cross-section with the cortex in the middle.
#[derive(Debug, Clone)]
pub struct ReferenceCurves {
    pub thickness : usize,
    pub itp : usize,
    pub thickness_itp : usize,
    pub sigma : f64,
    pub cytbg : Array1<f64>,
    pub membg : Array1<f64>,
    pub cytbg_itp : Array1<f64>,
    pub membg_itp : Array1<f64>,
}

impl ReferenceCurves {
    /// Builds both curve pairs for the given cross-section geometry.
    ///
    /// ## Arguments
    ///
    /// * `thickness` - cross-section length in native pixels
    ///
    /// * `sigma` - width of the membrane/cytoplasm transition
    ///
    /// * `itp` - upsampling factor
    pub fn new(thickness : usize, sigma : f64, itp : usize) -> ReferenceCurves {
        let thickness_itp = itp * thickness;
        ReferenceCurves {
            thickness,
            itp,
            thickness_itp,
            sigma,
            cytbg : cytoplasm_curve(2 * thickness, thickness as f64, sigma),
            membg : membrane_curve(2 * thickness, thickness as f64, sigma),
            cytbg_itp : cytoplasm_curve(2 * thickness_itp, thickness_itp as f64, sigma * itp as f64),
            membg_itp : membrane_curve(2 * thickness_itp, thickness_itp as f64, sigma * itp as f64),
        }
    }

    /// Window of the upsampled cytoplasmic curve starting at `start`.
    pub fn cytoplasm_window(&self, start : usize) -> ArrayView1<f64> {
        let start = start.min(self.cytbg_itp.len() - self.thickness_itp);
        self.cytbg_itp.slice(s![start..start + self.thickness_itp])
    }

    /// Window of the upsampled membrane curve starting at `start`.
    pub fn membrane_window(&self, start : usize) -> ArrayView1<f64> {
        let start = start.min(self.membg_itp.len() - self.thickness_itp);
        self.membg_itp.slice(s![start..start + self.thickness_itp])
    }

    /// Upsampled model cross-section `c * cyt + m * mem` for a window
    /// starting at `start`.
    pub fn model(&self, start : usize, cytoplasm : f64, membrane : f64) -> Array1<f64> {
        let mut out = self.cytoplasm_window(start).mapv(|v| v * cytoplasm);
        out.scaled_add(membrane, &self.membrane_window(start));
        out
    }
}
