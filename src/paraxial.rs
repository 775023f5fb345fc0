#![warn(missing_docs)]
//! First-order (paraxial) propagation.
//!
//! Propagation is linearized around the optical axis: the ray state is the
//! reduced vector `(y, n·u)` with `y` the transverse height and `u` the ray
//! slope. Each inter-element gap and each surface then acts as a 2×2
//! ray-transfer matrix. Reflective folds are handled with the signed-index
//! convention (the index and subsequent axial distances change sign), so
//! refraction and reflection share the same matrix form.
//!
//! [`ParaxialTrace`] solves the two fundamental rays through the aperture
//! stop - the marginal ray from the axial object point to the stop edge and
//! the chief ray from the field edge through the stop center - and derives
//! the first-order properties (pupils, conjugates, focal length) from them.
use std::fmt::Display;

use nalgebra::Matrix2;
use uom::si::f64::Length;
use uom::si::length::nanometer;

use crate::error::{LenstraceError, LtResult};
use crate::system::OpticalSystem;

impl OpticalSystem {
    /// Refractive index of the medium after each element at `wavelength`,
    /// negated once an odd number of mirrors have been traversed.
    pub(crate) fn signed_indices(&self, wavelength: Length) -> LtResult<Vec<f64>> {
        self.iter()
            .zip(self.mirrored())
            .map(|(el, mirrored)| {
                let n = match el.material() {
                    Some(material) => material.index(wavelength)?,
                    None => 1.0,
                };
                Ok(if mirrored { -n } else { n })
            })
            .collect()
    }
    /// Cumulative ray-transfer matrices from just after element `start` up to
    /// just after each element in `start+1..=end`.
    ///
    /// Each yielded pair is `(element index, operator)` where the operator
    /// maps the reduced state `(y, n·u)` at `start` to the state after that
    /// element. The iterator is lazy; index lookups happen up front.
    ///
    /// # Errors
    ///
    /// This function will return an error if the range is not ascending and
    /// in bounds or a material lookup fails.
    pub fn paraxial_matrices(
        &self,
        wavelength: Length,
        start: usize,
        end: usize,
    ) -> LtResult<impl Iterator<Item = (usize, Matrix2<f64>)> + '_> {
        if start > end || end >= self.len() {
            return Err(LenstraceError::Structural(format!(
                "invalid element range {start}..={end} for {} elements",
                self.len()
            )));
        }
        let n = self.signed_indices(wavelength)?;
        Ok((start + 1..=end).scan(Matrix2::identity(), move |acc, i| {
            let el = &self[i];
            let transfer = Matrix2::new(1.0, el.distance() / n[i - 1], 0.0, 1.0);
            let power = el.curvature() * (n[i] - n[i - 1]);
            let refraction = Matrix2::new(1.0, 0.0, -power, 1.0);
            *acc = refraction * transfer * *acc;
            Some((i, *acc))
        }))
    }
    /// Ray-transfer matrix from just after element `start` to just after
    /// element `end`.
    ///
    /// # Errors
    ///
    /// This function will return an error if the range is not ascending and
    /// in bounds or a material lookup fails.
    pub fn paraxial_matrix(
        &self,
        wavelength: Length,
        start: usize,
        end: usize,
    ) -> LtResult<Matrix2<f64>> {
        Ok(self
            .paraxial_matrices(wavelength, start, end)?
            .last()
            .map_or_else(Matrix2::identity, |(_, m)| m))
    }
}

/// First-order trace of the marginal and chief rays through a system.
///
/// Ray 0 is the marginal ray, ray 1 the chief ray. `y` and `u` hold the
/// height and slope after each element; a trace borrows nothing and holds no
/// authoritative system state.
#[derive(Debug, Clone)]
pub struct ParaxialTrace {
    wavelength: Length,
    n: Vec<f64>,
    y: Vec<[f64; 2]>,
    u: Vec<[f64; 2]>,
}

impl ParaxialTrace {
    /// Solve the marginal and chief rays of `system` through its stop.
    ///
    /// A finite object launches the marginal ray from the axial object point
    /// and the chief ray from the field edge; an object at infinity launches
    /// the marginal ray parallel to the axis and the chief ray at the field
    /// slope. Both launch parameters are solved linearly through the stop.
    ///
    /// # Errors
    ///
    /// This function will return an error if
    ///  - the system is structurally invalid or has no designated stop,
    ///  - a material lookup fails,
    ///  - the stop is conjugate to the launch plane (the solve is singular).
    pub fn new(system: &OpticalSystem, wavelength: Length) -> LtResult<Self> {
        system.validate()?;
        let stop = system.stop().ok_or_else(|| {
            LenstraceError::Structural("paraxial solve requires a designated stop".into())
        })?;
        let n = system.signed_indices(wavelength)?;
        let stop_radius = system[stop].radius();
        let to_stop = system.paraxial_matrix(wavelength, 0, stop)?;
        let (a, b) = (to_stop[(0, 0)], to_stop[(0, 1)]);
        let (object_radius, finite) = match system[0] {
            crate::element::Element::Object { radius, finite, .. } => (radius, finite),
            _ => unreachable!("validate checked the object element"),
        };
        // launch states (y, n·u) at the object plane, solved so the marginal
        // ray meets the stop edge and the chief ray the stop center
        let (marginal, chief) = if finite {
            if b == 0.0 {
                return Err(LenstraceError::Analysis(
                    "the object plane is conjugate to the stop".into(),
                ));
            }
            (
                [0.0, stop_radius / b],
                [object_radius, -a * object_radius / b],
            )
        } else {
            if a == 0.0 {
                return Err(LenstraceError::Analysis(
                    "the stop is at infinity for a collimated launch".into(),
                ));
            }
            let w = n[0] * object_radius;
            ([stop_radius / a, 0.0], [-b * w / a, w])
        };
        let mut y = vec![[marginal[0], chief[0]]];
        let mut u = vec![[marginal[1] / n[0], chief[1] / n[0]]];
        let mut w = [marginal[1], chief[1]];
        for i in 1..system.len() {
            let el = &system[i];
            let power = el.curvature() * (n[i] - n[i - 1]);
            let mut row_y = [0.0; 2];
            let mut row_u = [0.0; 2];
            for r in 0..2 {
                let height = el.distance().mul_add(u[i - 1][r], y[i - 1][r]);
                w[r] = (-power).mul_add(height, w[r]);
                row_y[r] = height;
                row_u[r] = w[r] / n[i];
            }
            y.push(row_y);
            u.push(row_u);
        }
        Ok(Self {
            wavelength,
            n,
            y,
            u,
        })
    }
    /// Returns the wavelength this trace was solved at.
    #[must_use]
    pub const fn wavelength(&self) -> Length {
        self.wavelength
    }
    /// Ray heights after each element (`[element][ray]`, ray 0 marginal,
    /// ray 1 chief).
    #[must_use]
    pub fn y(&self) -> &[[f64; 2]] {
        &self.y
    }
    /// Ray slopes after each element (`[element][ray]`).
    #[must_use]
    pub fn u(&self) -> &[[f64; 2]] {
        &self.u
    }
    /// Signed refractive index after each element.
    #[must_use]
    pub fn n(&self) -> &[f64] {
        &self.n
    }
    fn last_interior(&self) -> usize {
        self.y.len() - 2
    }
    /// Axial distance from the first surface to the entrance pupil and from
    /// the last surface to the exit pupil.
    #[must_use]
    pub fn pupil_distance(&self) -> [f64; 2] {
        let k = self.last_interior();
        // refraction leaves heights unchanged, so y[1] and y[k] are the chief
        // heights at the first and last surface
        let entrance = -self.y[1][1] / self.u[0][1];
        let exit = -self.y[k][1] / self.u[k][1];
        [entrance, exit]
    }
    /// Marginal ray height at the entrance and exit pupil planes.
    #[must_use]
    pub fn pupil_height(&self) -> [f64; 2] {
        let k = self.last_interior();
        let [entrance, exit] = self.pupil_distance();
        [
            self.u[0][0].mul_add(entrance, self.y[1][0]),
            self.u[k][0].mul_add(exit, self.y[k][0]),
        ]
    }
    /// Distance from the last surface to the paraxial image plane, `None`
    /// for an afocal exit beam.
    #[must_use]
    pub fn image_distance(&self) -> Option<f64> {
        let k = self.last_interior();
        (self.u[k][0] != 0.0).then(|| -self.y[k][0] / self.u[k][0])
    }
    /// Chief ray height at the paraxial image plane.
    #[must_use]
    pub fn image_height(&self) -> Option<f64> {
        let k = self.last_interior();
        self.image_distance()
            .map(|t| self.u[k][1].mul_add(t, self.y[k][1]))
    }
    /// Transverse magnification between the conjugates, `None` for an
    /// infinite object or an afocal exit beam.
    #[must_use]
    pub fn magnification(&self) -> Option<f64> {
        let k = self.last_interior();
        // u[0] is the launch slope; zero marks a collimated (infinite) object
        if self.u[0][0] == 0.0 || self.u[k][0] == 0.0 {
            return None;
        }
        Some(self.n[0] * self.u[0][0] / (self.n[k] * self.u[k][0]))
    }
    /// Optical (Lagrange) invariant of the solved ray pair.
    #[must_use]
    pub fn lagrange_invariant(&self) -> f64 {
        let n = self.n[0];
        n * (self.u[0][1] * self.y[0][0] - self.u[0][0] * self.y[0][1])
    }
    /// The effective focal length of the system, `None` if afocal.
    ///
    /// Derived from the marginal/chief pair via the system matrix relation
    /// `f = -1/C` in reduced coordinates.
    #[must_use]
    pub fn effective_focal_length(&self) -> Option<f64> {
        // C from two traced solutions of the same operator
        let k = self.last_interior();
        let y0 = self.y[1];
        let w0 = [self.u[0][0] * self.n[0], self.u[0][1] * self.n[0]];
        let wk = [self.u[k][0] * self.n[k], self.u[k][1] * self.n[k]];
        let det = y0[0] * w0[1] - y0[1] * w0[0];
        if det == 0.0 {
            return None;
        }
        let c = (wk[0] * w0[1] - wk[1] * w0[0]) / det;
        (c.abs() > 1e-12).then(|| -1.0 / c)
    }
}

impl Display for ParaxialTrace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let nm = Length::format_args(nanometer, uom::fmt::DisplayStyle::Abbreviation);
        writeln!(f, "Paraxial trace at {:.2}", nm.with(self.wavelength))?;
        writeln!(
            f,
            "  # {:>12} {:>12} {:>12} {:>12} {:>8}",
            "marg y", "marg u", "chief y", "chief u", "n"
        )?;
        for i in 0..self.y.len() {
            writeln!(
                f,
                "{i:3} {:>12.6} {:>12.6} {:>12.6} {:>12.6} {:>8.5}",
                self.y[i][0], self.u[i][0], self.y[i][1], self.u[i][1], self.n[i]
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::nanometer;
    use crate::system::test::cooke_triplet;
    use approx::assert_abs_diff_eq;
    use assert_matches::assert_matches;

    fn d_line() -> Length {
        nanometer!(587.5618)
    }

    #[test]
    fn matrix_of_empty_range_is_identity() {
        let s = cooke_triplet();
        let m = s.paraxial_matrix(d_line(), 3, 3).unwrap();
        assert_eq!(m, Matrix2::identity());
    }
    #[test]
    fn matrix_range_checked() {
        let s = cooke_triplet();
        assert_matches!(
            s.paraxial_matrix(d_line(), 4, 2),
            Err(LenstraceError::Structural(_))
        );
        assert_matches!(
            s.paraxial_matrix(d_line(), 0, 9),
            Err(LenstraceError::Structural(_))
        );
    }
    #[test]
    fn matrices_compose() {
        let s = cooke_triplet();
        let front = s.paraxial_matrix(d_line(), 0, 4).unwrap();
        let rear = s.paraxial_matrix(d_line(), 4, 8).unwrap();
        let full = s.paraxial_matrix(d_line(), 0, 8).unwrap();
        assert_abs_diff_eq!(rear * front, full, epsilon = 1e-12);
        // ray-transfer matrices are unimodular in reduced coordinates
        assert_abs_diff_eq!(full.determinant(), 1.0, epsilon = 1e-12);
    }
    #[test]
    fn solve_meets_stop() {
        let s = cooke_triplet();
        let t = ParaxialTrace::new(&s, d_line()).unwrap();
        assert_abs_diff_eq!(t.y()[5][0], 4.75, epsilon = 1e-9);
        assert_abs_diff_eq!(t.y()[5][1], 0.0, epsilon = 1e-9);
        // collimated launch
        assert_abs_diff_eq!(t.u()[0][0], 0.0);
        assert_abs_diff_eq!(t.u()[0][1], 0.364, epsilon = 1e-12);
    }
    #[test]
    fn requires_stop() {
        let mut s = cooke_triplet();
        s.remove_element(5).unwrap();
        assert_matches!(
            ParaxialTrace::new(&s, d_line()),
            Err(LenstraceError::Structural(_))
        );
    }
    #[test]
    fn first_order_properties() {
        let s = cooke_triplet();
        let t = ParaxialTrace::new(&s, d_line()).unwrap();
        assert_abs_diff_eq!(
            t.effective_focal_length().unwrap(),
            EXPECTED_EFL,
            epsilon = 1e-6
        );
        assert_abs_diff_eq!(
            t.image_distance().unwrap(),
            EXPECTED_IMAGE_DISTANCE,
            epsilon = 1e-6
        );
        assert_abs_diff_eq!(
            t.image_height().unwrap(),
            EXPECTED_IMAGE_HEIGHT,
            epsilon = 1e-6
        );
        // collimated object has no transverse magnification
        assert!(t.magnification().is_none());
        let [ep, xp] = t.pupil_distance();
        assert_abs_diff_eq!(ep, EXPECTED_ENTRANCE_PUPIL, epsilon = 1e-6);
        assert_abs_diff_eq!(xp, EXPECTED_EXIT_PUPIL, epsilon = 1e-6);
    }
    #[test]
    fn lagrange_invariant_is_conserved() {
        let s = cooke_triplet();
        let t = ParaxialTrace::new(&s, d_line()).unwrap();
        let h0 = t.lagrange_invariant();
        for i in 1..s.len() {
            let h = t.n()[i] * (t.u()[i][1] * t.y()[i][0] - t.u()[i][0] * t.y()[i][1]);
            assert_abs_diff_eq!(h, h0, epsilon = 1e-9);
        }
    }
    #[test]
    fn display_table() {
        let s = cooke_triplet();
        let t = ParaxialTrace::new(&s, d_line()).unwrap();
        let printed = format!("{t}");
        assert_eq!(printed.lines().count(), 2 + s.len());
        assert!(printed.contains("chief"));
    }

    // first-order values of the triplet, solved independently
    const EXPECTED_EFL: f64 = 50.001_664_256_655_8;
    const EXPECTED_IMAGE_DISTANCE: f64 = 43.081_763_085_312_48;
    const EXPECTED_IMAGE_HEIGHT: f64 = 18.200_605_789_422_713;
    const EXPECTED_ENTRANCE_PUPIL: f64 = 10.466_301_469_232_778;
    const EXPECTED_EXIT_PUPIL: f64 = -10.070_165_838_649_132;
}
