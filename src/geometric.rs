#![warn(missing_docs)]
//! Exact (geometric) ray tracing.
//!
//! Rays are traced as full 3D position/direction pairs: each surface is
//! intersected exactly in its local frame (quadratic solve for spheroids),
//! then the direction is bent by the vector form of Snell's law or, for
//! reflective surfaces, mirrored about the surface normal. Folded systems
//! are handled per element with the parity mask of
//! [`OpticalSystem::mirrored`].
//!
//! Bundles are launched through the entrance pupil predicted by a
//! [`ParaxialTrace`] and refined by [`GeometricTrace::aim_pupil`], a bounded
//! secant iteration on the real stop crossing. Individual rays may fail
//! (miss a surface, undergo unmodeled total internal reflection); a failure
//! is recorded per ray as data, never as an `Err` of the whole bundle.
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use roots::{find_roots_quadratic, Roots};
use strum::{Display, EnumString};
use uom::si::f64::Length;

use crate::element::Element;
use crate::error::{LenstraceError, LtResult};
use crate::paraxial::ParaxialTrace;
use crate::system::OpticalSystem;
use crate::utils::linspace;

/// Deterministic pupil sampling patterns for ray bundles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Distribution {
    /// Meridional axis first, then the sagittal axis, `nrays/2 + 1` points
    /// each; the pupil center appears once per axis.
    Cross,
    /// `nrays` points across the meridional pupil diameter.
    Fan,
}

/// Why a single ray could not be traced further.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceFailure {
    /// The ray does not intersect the surface.
    Miss,
    /// Total internal reflection at a refracting surface.
    TotalInternalReflection,
}

/// Per-ray completion state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RayStatus {
    /// The ray reached the image element.
    Complete,
    /// The ray failed at `surface`; states up to the previous element are
    /// retained.
    Failed {
        /// element index where propagation stopped
        surface: usize,
        /// failure kind
        failure: TraceFailure,
    },
}

impl RayStatus {
    /// Returns `true` if the ray reached the image element.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

// per-element propagation data, precomputed so the per-ray loop is
// infallible and free of material lookups
struct Step {
    origin: Point3<f64>,
    sigma: f64,
    curvature: f64,
    action: StepAction,
}

enum StepAction {
    Refract { mu: f64 },
    Reflect,
    Inert,
}

struct RayPath {
    y: Vec<Point3<f64>>,
    u: Vec<Vector3<f64>>,
    status: RayStatus,
}

/// Exact trace of a ray bundle through an [`OpticalSystem`].
///
/// `y` and `u` are indexed `[element][ray]`; row 0 holds the launch states
/// at the object plane. Rows past a ray's failing surface repeat its last
/// valid state.
#[derive(Debug, Clone)]
pub struct GeometricTrace {
    wavelength: Length,
    y: Vec<Vec<Point3<f64>>>,
    u: Vec<Vec<Vector3<f64>>>,
    status: Vec<RayStatus>,
}

impl GeometricTrace {
    fn steps(system: &OpticalSystem, wavelength: Length) -> LtResult<Vec<Step>> {
        let origins = system.origins();
        let mirrored = system.mirrored();
        let mut n_prev = 1.0;
        let mut steps = Vec::with_capacity(system.len());
        for (i, el) in system.iter().enumerate() {
            let sigma = if i == 0 || !mirrored[i - 1] { 1.0 } else { -1.0 };
            // only apertures and the image plane are inert; an absent
            // material on a refracting surface resolves to air (index 1)
            let action = if el.is_aperture() || el.is_image() {
                StepAction::Inert
            } else if el.material().is_some_and(crate::material::Material::is_mirror) {
                StepAction::Reflect
            } else {
                let n = match el.material() {
                    Some(m) => m.index(wavelength)?,
                    None => 1.0,
                };
                let mu = n_prev / n;
                n_prev = n;
                StepAction::Refract { mu }
            };
            steps.push(Step {
                origin: origins[i],
                sigma,
                curvature: el.curvature(),
                action,
            });
        }
        Ok(steps)
    }
    // near-vertex intersection parameter with the surface c·|p|² - 2z = 0 in
    // the element-local frame, None if the ray misses
    fn intersect(curvature: f64, p: Vector3<f64>, d: Vector3<f64>) -> Option<f64> {
        if curvature == 0.0 {
            if d.z == 0.0 {
                return None;
            }
            return Some(-p.z / d.z);
        }
        let b = 2.0 * curvature.mul_add(p.dot(&d), -d.z);
        let c0 = curvature.mul_add(p.dot(&p), -2.0 * p.z);
        match find_roots_quadratic(curvature, b, c0) {
            Roots::No(_) => None,
            Roots::One([t]) => Some(t),
            // convex surfaces meet the beam on the near root, concave on the
            // far one
            Roots::Two([t1, t2]) => Some(if curvature > 0.0 { t1 } else { t2 }),
            _ => None,
        }
    }
    fn trace_ray(steps: &[Step], start: (Point3<f64>, Vector3<f64>)) -> RayPath {
        let (mut p, mut d) = start;
        let mut y = vec![p];
        let mut u = vec![d];
        for (i, step) in steps.iter().enumerate().skip(1) {
            let s = step.sigma;
            let pl = Vector3::new(
                p.x - step.origin.x,
                p.y - step.origin.y,
                s * (p.z - step.origin.z),
            );
            let dl = Vector3::new(d.x, d.y, s * d.z);
            let Some(t) = Self::intersect(step.curvature, pl, dl) else {
                return RayPath {
                    y,
                    u,
                    status: RayStatus::Failed {
                        surface: i,
                        failure: TraceFailure::Miss,
                    },
                };
            };
            let q = pl + t * dl;
            let hit = Point3::new(
                step.origin.x + q.x,
                step.origin.y + q.y,
                step.origin.z + s * q.z,
            );
            let normal = Vector3::new(
                step.curvature * q.x,
                step.curvature * q.y,
                step.curvature.mul_add(q.z, -1.0),
            )
            .normalize();
            let dl_out = match step.action {
                StepAction::Inert => dl,
                StepAction::Reflect => dl - 2.0 * dl.dot(&normal) * normal,
                StepAction::Refract { mu } => {
                    let a = dl.dot(&normal);
                    let dis = mu.mul_add(-mu * a.mul_add(-a, 1.0), 1.0);
                    if dis < 0.0 {
                        return RayPath {
                            y,
                            u,
                            status: RayStatus::Failed {
                                surface: i,
                                failure: TraceFailure::TotalInternalReflection,
                            },
                        };
                    }
                    mu * dl - mu.mul_add(a, dis.sqrt()) * normal
                }
            };
            p = hit;
            d = Vector3::new(dl_out.x, dl_out.y, s * dl_out.z);
            y.push(p);
            u.push(d);
        }
        RayPath {
            y,
            u,
            status: RayStatus::Complete,
        }
    }
    /// Trace the given launch states (position at the object plane, unit
    /// direction) through the system. Rays are independent and traced in
    /// parallel.
    ///
    /// # Errors
    ///
    /// This function will return an error if the system is invalid or a
    /// material lookup fails. Per-ray failures are recorded in
    /// [`GeometricTrace::status`], not returned here.
    pub fn trace(
        system: &OpticalSystem,
        wavelength: Length,
        starts: &[(Point3<f64>, Vector3<f64>)],
    ) -> LtResult<Self> {
        system.validate()?;
        let steps = Self::steps(system, wavelength)?;
        let paths: Vec<RayPath> = starts
            .par_iter()
            .map(|s| Self::trace_ray(&steps, *s))
            .collect();
        let n = system.len();
        let mut y = vec![Vec::with_capacity(starts.len()); n];
        let mut u = vec![Vec::with_capacity(starts.len()); n];
        let mut status = Vec::with_capacity(starts.len());
        for path in paths {
            for i in 0..n {
                let k = i.min(path.y.len() - 1);
                y[i].push(path.y[k]);
                u[i].push(path.u[k]);
            }
            status.push(path.status);
        }
        Ok(Self {
            wavelength,
            y,
            u,
            status,
        })
    }
    /// Returns the wavelength this bundle was traced at.
    #[must_use]
    pub const fn wavelength(&self) -> Length {
        self.wavelength
    }
    /// Ray positions at each element (`[element][ray]`, global frame).
    #[must_use]
    pub fn y(&self) -> &[Vec<Point3<f64>>] {
        &self.y
    }
    /// Ray directions after each element (`[element][ray]`, unit vectors).
    #[must_use]
    pub fn u(&self) -> &[Vec<Vector3<f64>>] {
        &self.u
    }
    /// Per-ray completion state.
    #[must_use]
    pub fn status(&self) -> &[RayStatus] {
        &self.status
    }
    /// Number of rays in this bundle.
    #[must_use]
    pub fn nrays(&self) -> usize {
        self.status.len()
    }

    fn launch(
        system: &OpticalSystem,
        height: f64,
        pupil_distance: f64,
        pupil_radius: f64,
        pupil: (f64, f64),
    ) -> (Point3<f64>, Vector3<f64>) {
        let (object_radius, finite) = match system[0] {
            Element::Object { radius, finite, .. } => (radius, finite),
            _ => (0.0, true),
        };
        let z0 = system[0].distance();
        // pupil plane position, measured from the first surface
        let zp = system[1].distance() + pupil_distance;
        let (px, py) = (pupil.0 * pupil_radius, pupil.1 * pupil_radius);
        if finite {
            let y0 = height * object_radius;
            let dir = Vector3::new(px, py - y0, zp).normalize();
            (Point3::new(0.0, y0, z0), dir)
        } else {
            // field radius is the slope (tangent of the half-field angle)
            let slope = height * object_radius;
            let dir = Vector3::new(0.0, slope, 1.0).normalize();
            let y0 = (-zp).mul_add(slope, py);
            (Point3::new(px, y0, z0), dir)
        }
    }
    fn stop_height(
        steps: &[Step],
        stop: usize,
        start: (Point3<f64>, Vector3<f64>),
    ) -> LtResult<f64> {
        let path = Self::trace_ray(steps, start);
        if path.y.len() <= stop {
            return Err(LenstraceError::Aim(format!(
                "aiming ray failed before the stop: {:?}",
                path.status
            )));
        }
        Ok(path.y[stop].y)
    }
    fn secant<F>(mut x: f64, tolerance: f64, mut f: F) -> LtResult<f64>
    where
        F: FnMut(f64) -> LtResult<f64>,
    {
        let mut fx = f(x)?;
        if fx.abs() <= tolerance {
            return Ok(x);
        }
        let mut x1 = 0.01f64.mul_add(x.abs().max(1.0), x);
        let mut f1 = f(x1)?;
        for _ in 0..20 {
            if f1.abs() <= tolerance {
                return Ok(x1);
            }
            let df = f1 - fx;
            if df == 0.0 {
                break;
            }
            let mut dx = -f1 * (x1 - x) / df;
            // damp the step to half the current scale
            let limit = 0.5 * x1.abs().max(1.0);
            dx = dx.clamp(-limit, limit);
            x = x1;
            fx = f1;
            x1 += dx;
            f1 = f(x1)?;
        }
        if f1.abs() <= tolerance {
            Ok(x1)
        } else {
            Err(LenstraceError::Aim(format!(
                "pupil aiming did not converge (residual {f1:.3e})"
            )))
        }
    }
    // pupil half-size along one meridional edge (+1 upper, -1 lower), solved
    // so the marginal ray meets the matching stop edge
    fn aim_edge(
        system: &OpticalSystem,
        steps: &[Step],
        stop: usize,
        tolerance: f64,
        height: f64,
        distance: f64,
        radius: f64,
        edge: f64,
    ) -> LtResult<f64> {
        let target = edge * system[stop].radius();
        let radius = Self::secant(radius, tolerance, |a| {
            let h = Self::stop_height(
                steps,
                stop,
                Self::launch(system, height, distance, a, (0.0, edge)),
            )?;
            Ok(h - target)
        })?;
        Ok(radius.abs())
    }
    /// Refine the paraxial pupil estimate against the real system.
    ///
    /// Solves the pupil distance so the chief ray of the given relative
    /// field `height` crosses the stop axis, then the pupil radius so the
    /// upper marginal ray meets the stop edge. Both are bounded damped
    /// secant iterations (20 steps, tolerance `1e-9·max(1, stop radius)`).
    /// Pupil aberration makes the meridional pupil asymmetric off axis; the
    /// bundle constructors solve the lower edge separately.
    ///
    /// # Errors
    ///
    /// This function will return an error if the system has no stop, a
    /// material lookup fails, an aiming ray fails before the stop or the
    /// iteration does not converge.
    pub fn aim_pupil(
        system: &OpticalSystem,
        wavelength: Length,
        height: f64,
        pupil_distance: f64,
        pupil_radius: f64,
    ) -> LtResult<(f64, f64)> {
        let stop = system.stop().ok_or_else(|| {
            LenstraceError::Aim("pupil aiming requires a designated stop".into())
        })?;
        let stop_radius = system[stop].radius();
        let steps = Self::steps(system, wavelength)?;
        let tolerance = 1e-9 * stop_radius.max(1.0);
        let distance = Self::secant(pupil_distance, tolerance, |zp| {
            Self::stop_height(&steps, stop, Self::launch(system, height, zp, pupil_radius, (0.0, 0.0)))
        })?;
        let radius =
            Self::aim_edge(system, &steps, stop, tolerance, height, distance, pupil_radius, 1.0)?;
        Ok((distance, radius))
    }
    fn pupil_points(distribution: Distribution, nrays: usize) -> Vec<(f64, f64)> {
        match distribution {
            Distribution::Cross => {
                let axis = linspace(-1.0, 1.0, nrays / 2 + 1);
                axis.iter()
                    .map(|p| (0.0, *p))
                    .chain(axis.iter().map(|p| (*p, 0.0)))
                    .collect()
            }
            Distribution::Fan => linspace(-1.0, 1.0, nrays)
                .into_iter()
                .map(|p| (0.0, p))
                .collect(),
        }
    }
    fn aimed_bundle(
        system: &OpticalSystem,
        paraxial: &ParaxialTrace,
        height: f64,
        pupils: &[(f64, f64)],
    ) -> LtResult<Self> {
        let wavelength = paraxial.wavelength();
        let (distance, upper) = Self::aim_pupil(
            system,
            wavelength,
            height,
            paraxial.pupil_distance()[0],
            paraxial.pupil_height()[0],
        )?;
        // the lower meridional edge gets its own half-size so both edges
        // graze the stop despite pupil aberration
        let stop = system.stop().ok_or_else(|| {
            LenstraceError::Aim("pupil aiming requires a designated stop".into())
        })?;
        let steps = Self::steps(system, wavelength)?;
        let tolerance = 1e-9 * system[stop].radius().max(1.0);
        let lower =
            Self::aim_edge(system, &steps, stop, tolerance, height, distance, upper, -1.0)?;
        let starts: Vec<_> = pupils
            .iter()
            .map(|&(px, py)| {
                let radius = if py < 0.0 { lower } else { upper };
                Self::launch(system, height, distance, radius, (px, py))
            })
            .collect();
        Self::trace(system, wavelength, &starts)
    }
    /// Trace a pupil-sampling bundle from one field point.
    ///
    /// `height` is the relative field (1 = field edge); the pupil is taken
    /// from `paraxial` and refined by aiming.
    ///
    /// # Errors
    ///
    /// This function will return an error if the system is invalid or pupil
    /// aiming fails.
    pub fn rays_paraxial_point(
        system: &OpticalSystem,
        paraxial: &ParaxialTrace,
        height: f64,
        distribution: Distribution,
        nrays: usize,
    ) -> LtResult<Self> {
        Self::aimed_bundle(
            system,
            paraxial,
            height,
            &Self::pupil_points(distribution, nrays),
        )
    }
    /// Trace a 21-ray meridional fan across the full pupil at the field
    /// edge.
    ///
    /// # Errors
    ///
    /// This function will return an error if the system is invalid or pupil
    /// aiming fails.
    pub fn rays_paraxial_line(system: &OpticalSystem, paraxial: &ParaxialTrace) -> LtResult<Self> {
        Self::aimed_bundle(
            system,
            paraxial,
            1.0,
            &Self::pupil_points(Distribution::Fan, 21),
        )
    }
    /// Trace the clipping rays of the field edge: the chief ray (index 0)
    /// and the lower (1) and upper (2) marginal rays, each rescaled until it
    /// grazes the tightest interior aperture.
    ///
    /// # Errors
    ///
    /// This function will return an error if pupil aiming fails or the
    /// rescaling does not settle within its budget.
    pub fn rays_paraxial_clipping(
        system: &OpticalSystem,
        paraxial: &ParaxialTrace,
    ) -> LtResult<Self> {
        let wavelength = paraxial.wavelength();
        let (distance, radius) = Self::aim_pupil(
            system,
            wavelength,
            1.0,
            paraxial.pupil_distance()[0],
            paraxial.pupil_height()[0],
        )?;
        let mut pupils = [0.0, -1.0, 1.0];
        let tolerance = 1e-9 * system[system.stop().unwrap_or(1)].radius().max(1.0);
        for _ in 0..20 {
            let starts: Vec<_> = pupils
                .iter()
                .map(|p| Self::launch(system, 1.0, distance, radius, (0.0, *p)))
                .collect();
            let trace = Self::trace(system, wavelength, &starts)?;
            for (ray, status) in trace.status.iter().enumerate() {
                if !status.is_complete() {
                    return Err(LenstraceError::Aim(format!(
                        "clipping ray {ray} failed: {status:?}"
                    )));
                }
            }
            // interpolate each marginal ray linearly against the chief to its
            // own aperture edge (lower ray against -r, upper against +r)
            for (ray, edge) in [(1usize, -1.0), (2, 1.0)] {
                let mut p_new = edge * f64::INFINITY;
                for i in 1..system.len() - 1 {
                    let chief = trace.meridional(system, i, 0);
                    let span = trace.meridional(system, i, ray) - chief;
                    if span.abs() < 1e-12 {
                        continue;
                    }
                    let p = pupils[ray] * edge.mul_add(system[i].radius(), -chief) / span;
                    if p.abs() < p_new.abs() {
                        p_new = p;
                    }
                }
                if p_new.is_finite() {
                    pupils[ray] = p_new;
                }
            }
            let margins = trace.clipping_margins(system);
            if margins[0].abs() <= tolerance && margins[1].abs() <= tolerance {
                return Ok(trace);
            }
        }
        Err(LenstraceError::Aim(
            "clipping rays did not settle on the limiting aperture".into(),
        ))
    }
    // meridional ray height relative to the element axis
    fn meridional(&self, system: &OpticalSystem, element: usize, ray: usize) -> f64 {
        self.y[element][ray].y - system.origins()[element].y
    }
    /// Smallest signed aperture margin of the lower and upper clipping rays
    /// over the interior elements: `min(y + r)` for the lower ray,
    /// `min(r - y)` for the upper one. Both ≈ 0 for a settled clipping
    /// trace.
    #[must_use]
    pub fn clipping_margins(&self, system: &OpticalSystem) -> [f64; 2] {
        let mut margins = [f64::INFINITY; 2];
        for i in 1..system.len() - 1 {
            let r = system[i].radius();
            margins[0] = margins[0].min(self.meridional(system, i, 1) + r);
            margins[1] = margins[1].min(r - self.meridional(system, i, 2));
        }
        margins
    }
}

impl std::fmt::Display for GeometricTrace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let failed = self.status.iter().filter(|s| !s.is_complete()).count();
        writeln!(
            f,
            "Geometric trace: {} rays ({} failed)",
            self.nrays(),
            failed
        )?;
        writeln!(f, "  # {:>12} {:>12} {:>12}", "min y", "max y", "mean y")?;
        for (i, row) in self.y.iter().enumerate() {
            let min = row.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
            let max = row.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
            let mean = row.iter().map(|p| p.y).sum::<f64>() / row.len() as f64;
            writeln!(f, "{i:3} {min:>12.6} {max:>12.6} {mean:>12.6}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::material::{Material, RefrIndexConst, RefrIndexModel};
    use crate::system::test::cooke_triplet;
    use crate::{millimeter, nanometer};
    use approx::assert_abs_diff_eq;
    use assert_matches::assert_matches;

    fn d_line() -> Length {
        nanometer!(587.5618)
    }
    fn paraxial(system: &OpticalSystem) -> ParaxialTrace {
        ParaxialTrace::new(system, d_line()).unwrap()
    }

    #[test]
    fn axial_ray_stays_on_axis() {
        let s = cooke_triplet();
        let t = GeometricTrace::trace(
            &s,
            d_line(),
            &[(Point3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 1.0))],
        )
        .unwrap();
        assert!(t.status()[0].is_complete());
        for i in 0..s.len() {
            assert_abs_diff_eq!(t.y()[i][0].x, 0.0);
            assert_abs_diff_eq!(t.y()[i][0].y, 0.0);
        }
        assert_abs_diff_eq!(t.y()[8][0].z, 64.95, epsilon = 1e-12);
    }
    #[test]
    fn paraxial_limit_matches_first_order() {
        // a ray 1e-6 above the axis must follow the marginal solution
        let s = cooke_triplet();
        let p = paraxial(&s);
        let h = 1e-6;
        let t = GeometricTrace::trace(
            &s,
            d_line(),
            &[(Point3::new(0.0, h, 0.0), Vector3::new(0.0, 0.0, 1.0))],
        )
        .unwrap();
        let track = s.track();
        let scale = h / p.y()[1][0];
        for i in 1..s.len() {
            assert_abs_diff_eq!(t.y()[i][0].y, scale * p.y()[i][0], epsilon = 1e-12);
            assert_abs_diff_eq!(t.y()[i][0].z, track[i], epsilon = 1e-9);
        }
    }
    #[test]
    fn miss_is_recorded() {
        let s = OpticalSystem::from_elements(
            "miss",
            vec![
                Element::object(0.0, 0.1, true),
                Element::spheroid(2.0, 0.9, 1.0, None),
                Element::image(1.0, 1.0),
            ],
            None,
            millimeter!(1.0),
        )
        .unwrap();
        let t = GeometricTrace::trace(
            &s,
            d_line(),
            &[(Point3::new(0.0, 5.0, 0.0), Vector3::new(0.0, 0.0, 1.0))],
        )
        .unwrap();
        assert_matches!(
            t.status()[0],
            RayStatus::Failed {
                surface: 1,
                failure: TraceFailure::Miss
            }
        );
        // partial state retained and frozen
        assert_abs_diff_eq!(t.y()[2][0].y, 5.0);
    }
    #[test]
    fn total_internal_reflection_is_recorded() {
        // object immersed in dense glass, exit surface into air
        let c = crate::material::MaterialCatalog::default();
        let glass = Material::new(
            "dense",
            RefrIndexModel::Const(RefrIndexConst::new(1.8).unwrap()),
        );
        let mut object = Element::object(0.0, 0.1, true);
        object.set_material(Some(glass));
        let s = OpticalSystem::from_elements(
            "tir",
            vec![
                object,
                Element::spheroid(1.0, 50.0, 0.0, Some(c.get("air").unwrap())),
                Element::image(5.0, 50.0),
            ],
            None,
            millimeter!(1.0),
        )
        .unwrap();
        // 45 deg inside the glass is beyond the ~33.7 deg critical angle
        let d = Vector3::new(0.0, 1.0, 1.0).normalize();
        let t = GeometricTrace::trace(&s, d_line(), &[(Point3::new(0.0, 0.0, 0.0), d)]).unwrap();
        assert_matches!(
            t.status()[0],
            RayStatus::Failed {
                surface: 1,
                failure: TraceFailure::TotalInternalReflection
            }
        );
    }
    #[test]
    fn absent_material_refracts_as_air() {
        // a glass/None boundary must bend the ray exactly like glass/air
        let c = crate::material::MaterialCatalog::default();
        let singlet = |exit: Option<Material>| {
            OpticalSystem::from_elements(
                "singlet",
                vec![
                    Element::object(0.0, 0.1, true),
                    Element::spheroid(10.0, 5.0, 0.02, Some(c.get("N-BK7").unwrap())),
                    Element::spheroid(2.0, 5.0, 0.0, exit),
                    Element::image(20.0, 5.0),
                ],
                None,
                millimeter!(1.0),
            )
            .unwrap()
        };
        let start = (Point3::new(0.0, 1.0, 0.0), Vector3::new(0.0, 0.0, 1.0));
        let explicit =
            GeometricTrace::trace(&singlet(Some(c.get("air").unwrap())), d_line(), &[start])
                .unwrap();
        let implied = GeometricTrace::trace(&singlet(None), d_line(), &[start]).unwrap();
        // the flat exit face steepens the converging ray
        assert!(implied.u()[2][0].y < implied.u()[1][0].y);
        for i in 0..4 {
            assert_abs_diff_eq!(implied.u()[i][0].y, explicit.u()[i][0].y, epsilon = 1e-12);
            assert_abs_diff_eq!(implied.y()[i][0].y, explicit.y()[i][0].y, epsilon = 1e-12);
        }
    }
    #[test]
    fn flat_mirror_folds_the_beam() {
        let c = crate::material::MaterialCatalog::default();
        let s = OpticalSystem::from_elements(
            "fold",
            vec![
                Element::object(0.0, 0.1, false),
                Element::spheroid(10.0, 8.0, 0.0, Some(c.get("mirror").unwrap())),
                Element::image(10.0, 1.0),
            ],
            None,
            millimeter!(1.0),
        )
        .unwrap();
        let t = GeometricTrace::trace(
            &s,
            d_line(),
            &[(Point3::new(0.0, 1.0, 0.0), Vector3::new(0.0, 0.0, 1.0))],
        )
        .unwrap();
        assert!(t.status()[0].is_complete());
        assert_abs_diff_eq!(t.u()[1][0].z, -1.0);
        assert_abs_diff_eq!(t.y()[2][0].z, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(t.y()[2][0].y, 1.0);
    }
    #[test]
    fn aimed_chief_crosses_stop_axis() {
        let s = cooke_triplet();
        let p = paraxial(&s);
        let (distance, radius) = GeometricTrace::aim_pupil(
            &s,
            d_line(),
            1.0,
            p.pupil_distance()[0],
            p.pupil_height()[0],
        )
        .unwrap();
        let start = GeometricTrace::launch(&s, 1.0, distance, radius, (0.0, 0.0));
        let t = GeometricTrace::trace(&s, d_line(), &[start]).unwrap();
        assert_abs_diff_eq!(t.y()[5][0].y, 0.0, epsilon = 1e-8);
        let start = GeometricTrace::launch(&s, 1.0, distance, radius, (0.0, 1.0));
        let t = GeometricTrace::trace(&s, d_line(), &[start]).unwrap();
        assert_abs_diff_eq!(t.y()[5][0].y, 4.75, epsilon = 1e-7);
    }
    #[test]
    fn cross_distribution_order_at_stop() {
        let s = cooke_triplet();
        let p = paraxial(&s);
        let t =
            GeometricTrace::rays_paraxial_point(&s, &p, 1.0, Distribution::Cross, 5).unwrap();
        assert_eq!(t.nrays(), 6);
        let r = 4.75;
        let ny: Vec<f64> = (0..3).map(|i| t.y()[5][i].y / r).collect();
        assert_abs_diff_eq!(ny[0], -1.0, epsilon = 1e-2);
        assert_abs_diff_eq!(ny[1], 0.0, epsilon = 1e-2);
        assert_abs_diff_eq!(ny[2], 1.0, epsilon = 1e-2);
        let nx: Vec<f64> = (0..6).map(|i| t.y()[5][i].x / r).collect();
        for (got, want) in nx.iter().zip([0.0, 0.0, 0.0, -1.0, 0.0, 1.0]) {
            assert_abs_diff_eq!(*got, want, epsilon = 1e-3);
        }
    }
    #[test]
    fn both_meridional_pupil_edges_graze_the_stop() {
        let s = cooke_triplet();
        let p = paraxial(&s);
        let t =
            GeometricTrace::rays_paraxial_point(&s, &p, 1.0, Distribution::Cross, 5).unwrap();
        let r = 4.75;
        // each edge is aimed independently, so both graze the stop tightly
        assert_abs_diff_eq!(t.y()[5][0].y / r, -1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(t.y()[5][2].y / r, 1.0, epsilon = 1e-6);
    }
    #[test]
    fn aiming_reports_non_convergence() {
        // the stop is far too wide for any ray the object can supply, so the
        // marginal solve exhausts its iteration budget
        let s = OpticalSystem::from_elements(
            "wide stop",
            vec![
                Element::object(0.0, 1.0, true),
                Element::spheroid(10.0, 10.0, 0.0, None),
                Element::aperture(10.0, 1e9, None),
                Element::image(10.0, 1.0),
            ],
            Some(2),
            millimeter!(1.0),
        )
        .unwrap();
        assert_matches!(
            GeometricTrace::aim_pupil(&s, d_line(), 1.0, 10.0, 1.0),
            Err(LenstraceError::Aim(_))
        );
    }
    #[test]
    fn collimated_bundle_shares_a_direction() {
        let s = cooke_triplet();
        let p = paraxial(&s);
        let t =
            GeometricTrace::rays_paraxial_point(&s, &p, 1.0, Distribution::Cross, 5).unwrap();
        let u0 = t.u()[0][0];
        for u in &t.u()[0][1..] {
            assert_abs_diff_eq!((u - u0).norm(), 0.0, epsilon = 1e-14);
        }
    }
    #[test]
    fn line_fan_is_meridional() {
        let s = cooke_triplet();
        let p = paraxial(&s);
        let t = GeometricTrace::rays_paraxial_line(&s, &p).unwrap();
        assert_eq!(t.nrays(), 21);
        for i in 0..21 {
            assert_abs_diff_eq!(t.y()[5][i].x, 0.0, epsilon = 1e-12);
        }
        // the fan spans the stop monotonically
        for i in 1..21 {
            assert!(t.y()[5][i].y > t.y()[5][i - 1].y);
        }
    }
    #[test]
    fn clipping_rays_graze_the_tightest_aperture() {
        let s = cooke_triplet();
        let p = paraxial(&s);
        let t = GeometricTrace::rays_paraxial_clipping(&s, &p).unwrap();
        assert_eq!(t.nrays(), 3);
        let margins = t.clipping_margins(&s);
        assert_abs_diff_eq!(margins[0], 0.0, epsilon = 1e-7);
        assert_abs_diff_eq!(margins[1], 0.0, epsilon = 1e-7);
    }
    #[test]
    fn distribution_names_round_trip() {
        assert_eq!(Distribution::Cross.to_string(), "cross");
        assert_eq!("fan".parse::<Distribution>().unwrap(), Distribution::Fan);
    }
}
