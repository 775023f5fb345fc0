//! Wavelength independent (constant) refractive index model
use serde::{Deserialize, Serialize};
use uom::si::f64::Length;

use super::RefractiveIndex;
use crate::error::{LenstraceError, LtResult};

/// A trivial dispersion model returning a constant refractive index.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct RefrIndexConst {
    refractive_index: f64,
}
impl RefrIndexConst {
    /// Create a new [`RefrIndexConst`] model.
    ///
    /// # Errors
    ///
    /// This function will return an error if the given refractive index is < 1.0 or not finite.
    pub fn new(refractive_index: f64) -> LtResult<Self> {
        if refractive_index < 1.0 || !refractive_index.is_finite() {
            return Err(LenstraceError::Material(
                "refractive index must be >= 1.0 and finite".into(),
            ));
        }
        Ok(Self { refractive_index })
    }
}
impl Default for RefrIndexConst {
    /// Vacuum / air: index 1.0
    fn default() -> Self {
        Self {
            refractive_index: 1.0,
        }
    }
}
impl RefractiveIndex for RefrIndexConst {
    fn get_refractive_index(&self, _wavelength: Length) -> LtResult<f64> {
        Ok(self.refractive_index)
    }
}
