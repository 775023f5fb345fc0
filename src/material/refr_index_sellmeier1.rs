//! Sellmeier (3 term) dispersion model
use serde::{Deserialize, Serialize};
use uom::si::length::micrometer;

use super::RefractiveIndex;
use crate::error::{LenstraceError, LtResult};

/// Three-term Sellmeier dispersion model.
///
/// n²(λ) = 1 + Σᵢ kᵢ·λ² / (λ² - lᵢ) with λ in µm and the lᵢ in µm².
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct RefrIndexSellmeier1 {
    k1: f64,
    k2: f64,
    k3: f64,
    l1: f64,
    l2: f64,
    l3: f64,
}
impl RefrIndexSellmeier1 {
    /// Create a new [`RefrIndexSellmeier1`] model from the given coefficients.
    #[must_use]
    pub const fn new(k1: f64, k2: f64, k3: f64, l1: f64, l2: f64, l3: f64) -> Self {
        Self {
            k1,
            k2,
            k3,
            l1,
            l2,
            l3,
        }
    }
}
impl RefractiveIndex for RefrIndexSellmeier1 {
    fn get_refractive_index(&self, wavelength: uom::si::f64::Length) -> LtResult<f64> {
        let lambda = wavelength.get::<micrometer>();
        let l_sq = lambda * lambda;
        let n_sq = 1.0
            + self.k1 * l_sq / (l_sq - self.l1)
            + self.k2 * l_sq / (l_sq - self.l2)
            + self.k3 * l_sq / (l_sq - self.l3);
        // near a resonance pole the terms blow up well past any physical
        // index; such wavelengths are outside the model's validity range
        const MAX_INDEX_SQUARED: f64 = 1.0e3;
        if !n_sq.is_finite() || n_sq <= 0.0 || n_sq > MAX_INDEX_SQUARED {
            return Err(LenstraceError::Material(
                "wavelength outside the validity range of the Sellmeier model".into(),
            ));
        }
        Ok(n_sq.sqrt())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::nanometer;
    use approx::assert_abs_diff_eq;
    #[test]
    fn bk7_index() {
        // Schott N-BK7
        let m = RefrIndexSellmeier1::new(
            1.039_612_12,
            0.231_792_344,
            1.010_469_45,
            0.006_000_698_67,
            0.020_017_914_4,
            103.560_653,
        );
        assert_abs_diff_eq!(
            m.get_refractive_index(nanometer!(587.5618)).unwrap(),
            1.5168,
            epsilon = 1e-4
        );
        assert_abs_diff_eq!(
            m.get_refractive_index(nanometer!(656.2725)).unwrap(),
            1.5143,
            epsilon = 1e-4
        );
    }
    #[test]
    fn pole_wavelength() {
        let m = RefrIndexSellmeier1::new(1.0, 0.0, 0.0, 0.25, 0.0, 0.0);
        // λ² at (and just off) the resonance pole at 0.25 µm²
        assert!(m.get_refractive_index(nanometer!(500.0)).is_err());
        assert!(m.get_refractive_index(nanometer!(500.000_001)).is_err());
        // far from the pole the model is well behaved
        assert!(m.get_refractive_index(nanometer!(900.0)).is_ok());
    }
}
