mod parallelize_op;

pub (crate) use parallelize_op::parallelize_op;

use crate::config::ConfigError;
use crate::data::geometry::GeometryError;
use crate::data::profile::ProfileError;
use crate::fit::FitError;

/// Errors that can occur during a quantification run, either
/// from the configuration, the numerics (bad geometry, bad
/// array shapes), or from reading and writing files (the
/// `IOError` and `FormatError` variants).
#[derive(Debug)]
pub enum QuantError {
    ConfigError(ConfigError),
    GeometryError(GeometryError),
    ProfileError(ProfileError),
    FitError(FitError),
    FormatError(String),
    IOError(std::io::Error),
    ThreadPool(String),
}

impl From<ConfigError> for QuantError {
    fn from(err : ConfigError) -> Self {
        QuantError::ConfigError(err)
    }
}

impl From<GeometryError> for QuantError {
    fn from(err : GeometryError) -> Self {
        QuantError::GeometryError(err)
    }
}

impl From<ProfileError> for QuantError {
    fn from(err : ProfileError) -> Self {
        QuantError::ProfileError(err)
    }
}

impl From<FitError> for QuantError {
    fn from(err : FitError) -> Self {
        QuantError::FitError(err)
    }
}

impl From<std::io::Error> for QuantError {
    fn from(err : std::io::Error) -> Self {
        QuantError::IOError(err)
    }
}

impl From<binrw::Error> for QuantError {
    fn from(err : binrw::Error) -> Self {
        QuantError::IOError(
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                err.to_string()
            )
        )
    }
}

impl From<rayon::ThreadPoolBuildError> for QuantError {
    fn from(err : rayon::ThreadPoolBuildError) -> Self {
        QuantError::ThreadPool(err.to_string())
    }
}

impl std::error::Error for QuantError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QuantError::ConfigError(err) => Some(err),
            QuantError::GeometryError(err) => Some(err),
            QuantError::ProfileError(err) => Some(err),
            QuantError::FitError(err) => Some(err),
            QuantError::IOError(err) => Some(err),
            _ => None,
        }
    }
}

impl std::fmt::Display for QuantError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            QuantError::ConfigError(err) => {
                write!(f, "ConfigError: {}", err)
            },
            QuantError::GeometryError(err) => {
                write!(f, "GeometryError: {}", err)
            },
            QuantError::ProfileError(err) => {
                write!(f, "ProfileError: {}", err)
            },
            QuantError::FitError(err) => {
                write!(f, "FitError: {}", err)
            },
            QuantError::FormatError(err) => {
                write!(f, "FormatError: {}", err)
            },
            QuantError::IOError(err) => {
                write!(f, "IOError: {}", err)
            },
            QuantError::ThreadPool(err) => {
                write!(f, "Could not build thread pool: {}", err)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn conversions_keep_their_source() {
        let err : QuantError = ConfigError::MissingSigma.into();
        assert!(matches!(err, QuantError::ConfigError(ConfigError::MissingSigma)));
        assert!(err.source().is_some());
        assert!(err.to_string().starts_with("ConfigError"));

        let err : QuantError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, QuantError::IOError(_)));

        let err = QuantError::FormatError("bad header".to_string());
        assert!(err.source().is_none());
        assert_eq!(err.to_string(), "FormatError: bad header");
    }
}
