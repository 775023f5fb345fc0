#![warn(missing_docs)]
//! Lenstrace specific error structures
use std::{error::Error, fmt::Display};

/// Lenstrace application specific Result type
pub type LtResult<T> = std::result::Result<T, LenstraceError>;

/// Errors that can be returned by various lenstrace functions.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum LenstraceError {
    /// violation of a structural invariant of an [`OpticalSystem`](crate::system::OpticalSystem)
    /// (missing object / image element, invalid stop index, negative distance, ...)
    Structural(String),
    /// errors while resolving a material or evaluating a refractive index model
    Material(String),
    /// errors while parsing an external prescription format
    Parse(String),
    /// pupil aiming did not converge within the iteration budget
    Aim(String),
    /// runtime errors during a paraxial or geometric analysis
    Analysis(String),
    /// errors not falling in one of the categories above
    Other(String),
}

impl Display for LenstraceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Structural(m) => write!(f, "Structural:{m}"),
            Self::Material(m) => write!(f, "Material:{m}"),
            Self::Parse(m) => write!(f, "Parse:{m}"),
            Self::Aim(m) => write!(f, "Aim:{m}"),
            Self::Analysis(m) => write!(f, "Analysis:{m}"),
            Self::Other(m) => write!(f, "Lenstrace Error:Other:{m}"),
        }
    }
}
impl Error for LenstraceError {}

impl std::convert::From<String> for LenstraceError {
    fn from(msg: String) -> Self {
        Self::Other(msg)
    }
}
