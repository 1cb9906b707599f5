//! The `QuantConfig` struct holds every tunable parameter of a
//! quantification run. Defaults follow the values the method has
//! always shipped with; `sigma` has no sensible default and must
//! be provided.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::data::background::BACKGROUND_ROWS;

/// Interpolation order used when resampling profiles and
/// when sampling the image off-grid during straightening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpKind {
    Linear,
    Cubic,
}

impl InterpKind {
    /// Parses `"linear"` or `"cubic"` (case-insensitive).
    pub fn from_string_slice(s : &str) -> Result<InterpKind, ConfigError> {
        match s.to_lowercase().as_str() {
            "linear" => Ok(InterpKind::Linear),
            "cubic" => Ok(InterpKind::Cubic),
            _ => Err(ConfigError::Parse(format!("Unknown interpolation kind: {}", s))),
        }
    }
}

/// Ways a configuration can be rejected before any fitting starts.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    MissingSigma,
    InvalidSigma(f64),
    FreedomOutOfRange(f64),
    ZeroThickness,
    ZeroUpsampling,
    ZeroCores,
    ZeroFits,
    TooFewBackgroundRows{rows : usize, thickness : usize},
    Parse(String),
}

impl std::error::Error for ConfigError {}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ConfigError::MissingSigma => {
                write!(f, "sigma is required to build the reference curves")
            },
            ConfigError::InvalidSigma(sigma) => {
                write!(f, "sigma must be positive and finite, got {}", sigma)
            },
            ConfigError::FreedomOutOfRange(freedom) => {
                write!(f, "freedom must lie in [0, 1], got {}", freedom)
            },
            ConfigError::ZeroThickness => {
                write!(f, "thickness must be at least 2 pixels")
            },
            ConfigError::ZeroUpsampling => {
                write!(f, "itp must be at least 1")
            },
            ConfigError::ZeroCores => {
                write!(f, "cores must be at least 1 when provided")
            },
            ConfigError::ZeroFits => {
                write!(f, "nfits must be at least 1 when provided")
            },
            ConfigError::TooFewBackgroundRows{rows, thickness} => {
                write!(f, "background estimate needs {} rows but the cross-section has only {}",
                    rows, thickness)
            },
            ConfigError::Parse(msg) => {
                write!(f, "Could not parse configuration: {}", msg)
            }
        }
    }
}

/// Parameters of a quantification run.
///
/// * `sigma` - width of the reference error function and Gaussian (required)
/// * `freedom` - fraction of half the thickness the membrane may move from
/// the ROI (0 = pinned to the ROI, 1 = anywhere in the central half)
/// * `periodic` - whether the ROI is a closed loop
/// * `thickness` - length of each cross-section, in pixels
/// * `itp` - upsampling factor used during fitting (points per pixel)
/// * `rol_ave` - rolling-average window along the ROI (`0` or `1` disables)
/// * `parallel` / `cores` - fan the per-position fits out over a thread pool
/// * `rotate` - re-anchor a periodic ROI on its long axis after adjustment
/// * `zerocap` - forbid negative membrane and cytoplasm levels
/// * `nfits` - number of evenly spaced fits (defaults to the initial ROI length)
/// * `iterations` - number of fit passes; every pass after the first moves the
/// ROI onto the fitted membrane first
/// * `interp` - interpolation order for straightening and profile resampling
/// * `save_path` - directory to write results to after `run`
/// * `bg_subtract` - subtract a background estimate before fitting
/// * `background_rows` - rows at the outer edge of the cross-section used for
/// that estimate
/// * `seed` - base seed of the per-position optimizer random streams
/// * `polish` - refine the amplitudes by exact least squares after the
/// global search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantConfig {
    pub sigma : Option<f64>,
    pub freedom : f64,
    pub periodic : bool,
    pub thickness : usize,
    pub itp : usize,
    pub rol_ave : usize,
    pub parallel : bool,
    pub cores : Option<usize>,
    pub rotate : bool,
    pub zerocap : bool,
    pub nfits : Option<usize>,
    pub iterations : usize,
    pub interp : InterpKind,
    pub save_path : Option<PathBuf>,
    pub bg_subtract : bool,
    pub background_rows : usize,
    pub seed : u64,
    pub polish : bool,
}

impl Default for QuantConfig {
    fn default() -> Self {
        QuantConfig {
            sigma : None,
            freedom : 0.5,
            periodic : true,
            thickness : 50,
            itp : 10,
            rol_ave : 10,
            parallel : false,
            cores : None,
            rotate : false,
            zerocap : true,
            nfits : None,
            iterations : 2,
            interp : InterpKind::Cubic,
            save_path : None,
            bg_subtract : false,
            background_rows : BACKGROUND_ROWS,
            seed : 0,
            polish : true,
        }
    }
}

impl QuantConfig {
    /// Default configuration with the given reference width.
    pub fn with_sigma(sigma : f64) -> Self {
        QuantConfig { sigma : Some(sigma), ..Default::default() }
    }

    /// Reads a JSON document into a `QuantConfig`. Fields missing
    /// from the document take their default values.
    ///
    /// ## Example
    ///
    /// ```rust, ignore
    /// let config = QuantConfig::from_json_file("quant.json")?;
    /// ```
    pub fn from_json_file<P : AsRef<Path>>(path : P) -> Result<Self, crate::QuantError> {
        let text = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&text)
            .map_err(|err| ConfigError::Parse(err.to_string()))?;
        Ok(config)
    }

    /// Upsampled cross-section length, `itp * thickness`.
    pub fn thickness_itp(&self) -> usize {
        self.itp * self.thickness
    }

    /// Returns `sigma`, or `MissingSigma` if it was never provided.
    pub fn sigma(&self) -> Result<f64, ConfigError> {
        self.sigma.ok_or(ConfigError::MissingSigma)
    }

    /// Checks every parameter that could make a run meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sigma = self.sigma()?;
        if !(sigma.is_finite() && sigma > 0.0) {
            return Err(ConfigError::InvalidSigma(sigma));
        }
        if !(0.0..=1.0).contains(&self.freedom) {
            return Err(ConfigError::FreedomOutOfRange(self.freedom));
        }
        if self.thickness < 2 {
            return Err(ConfigError::ZeroThickness);
        }
        if self.itp == 0 {
            return Err(ConfigError::ZeroUpsampling);
        }
        if self.cores == Some(0) {
            return Err(ConfigError::ZeroCores);
        }
        if self.nfits == Some(0) {
            return Err(ConfigError::ZeroFits);
        }
        if self.bg_subtract
            && (self.background_rows == 0 || self.background_rows > self.thickness) {
            return Err(ConfigError::TooFewBackgroundRows{
                rows : self.background_rows,
                thickness : self.thickness,
            });
        }
        Ok(())
    }
}
