#![warn(missing_docs)]
//! Module for handling the elements of a sequential optical system.
//!
//! An [`Element`] describes one surface or boundary of the system: its position
//! relative to the previous element, its clear aperture and - for refracting or
//! reflecting surfaces - its curvature and the material filling the space
//! *after* it. Elements are plain data; all propagation physics lives in the
//! trace modules.
use std::fmt::Display;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::material::Material;

/// One surface or boundary of a sequential optical system.
///
/// The four kinds differ in the data they carry and in how the tracers treat
/// them. An exhaustive `match` over this enum is the single dispatch point for
/// per-kind behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Element {
    /// The entry conjugate of the system.
    ///
    /// `radius` is the half field *height* for a finite conjugate or the half
    /// field *angle* (in radian) for an object at infinity.
    Object {
        /// position relative to the previous element (z along the design axis)
        origin: Vector3<f64>,
        /// half field height (finite) or half field angle in radian (infinite)
        radius: f64,
        /// object at finite distance (height-specified) vs. at infinity (angle-specified)
        finite: bool,
        /// the medium of the object space
        material: Option<Material>,
    },
    /// A refracting or reflecting spherical surface (flat for zero curvature).
    Spheroid {
        /// position relative to the previous element
        origin: Vector3<f64>,
        /// clear semi-aperture
        radius: f64,
        /// reciprocal of the radius of curvature; 0 = flat
        curvature: f64,
        /// the medium *after* this surface; `None` = air
        material: Option<Material>,
    },
    /// A pure geometric stop. Never refracts.
    Aperture {
        /// position relative to the previous element
        origin: Vector3<f64>,
        /// clear semi-aperture
        radius: f64,
        /// the medium after the stop (kept for bookkeeping, never refracts)
        material: Option<Material>,
    },
    /// The exit conjugate of the system.
    Image {
        /// position relative to the previous element
        origin: Vector3<f64>,
        /// clear semi-aperture of the image field
        radius: f64,
    },
}

impl Element {
    /// Create a new object element at the given axial offset.
    ///
    /// For `finite == false` the offset is conventionally zero and `radius` is
    /// the half field angle in radian.
    #[must_use]
    pub fn object(distance: f64, radius: f64, finite: bool) -> Self {
        Self::Object {
            origin: Vector3::new(0.0, 0.0, distance),
            radius,
            finite,
            material: None,
        }
    }
    /// Create a new spherical surface.
    #[must_use]
    pub fn spheroid(distance: f64, radius: f64, curvature: f64, material: Option<Material>) -> Self {
        Self::Spheroid {
            origin: Vector3::new(0.0, 0.0, distance),
            radius,
            curvature,
            material,
        }
    }
    /// Create a new aperture stop.
    #[must_use]
    pub fn aperture(distance: f64, radius: f64, material: Option<Material>) -> Self {
        Self::Aperture {
            origin: Vector3::new(0.0, 0.0, distance),
            radius,
            material,
        }
    }
    /// Create a new image element.
    #[must_use]
    pub fn image(distance: f64, radius: f64) -> Self {
        Self::Image {
            origin: Vector3::new(0.0, 0.0, distance),
            radius,
        }
    }
    /// Returns the position of this [`Element`] relative to the previous one.
    #[must_use]
    pub const fn origin(&self) -> Vector3<f64> {
        match self {
            Self::Object { origin, .. }
            | Self::Spheroid { origin, .. }
            | Self::Aperture { origin, .. }
            | Self::Image { origin, .. } => *origin,
        }
    }
    /// Returns the axial offset (z component of the origin) of this [`Element`].
    #[must_use]
    pub fn distance(&self) -> f64 {
        self.origin().z
    }
    /// Sets the axial offset of this [`Element`].
    pub fn set_distance(&mut self, distance: f64) {
        match self {
            Self::Object { origin, .. }
            | Self::Spheroid { origin, .. }
            | Self::Aperture { origin, .. }
            | Self::Image { origin, .. } => origin.z = distance,
        }
    }
    /// Returns the clear semi-aperture (or field radius / angle) of this [`Element`].
    #[must_use]
    pub const fn radius(&self) -> f64 {
        match self {
            Self::Object { radius, .. }
            | Self::Spheroid { radius, .. }
            | Self::Aperture { radius, .. }
            | Self::Image { radius, .. } => *radius,
        }
    }
    /// Sets the clear semi-aperture of this [`Element`].
    pub fn set_radius(&mut self, new_radius: f64) {
        match self {
            Self::Object { radius, .. }
            | Self::Spheroid { radius, .. }
            | Self::Aperture { radius, .. }
            | Self::Image { radius, .. } => *radius = new_radius,
        }
    }
    /// Returns the curvature of this [`Element`] (0 for everything but a curved spheroid).
    #[must_use]
    pub const fn curvature(&self) -> f64 {
        match self {
            Self::Spheroid { curvature, .. } => *curvature,
            _ => 0.0,
        }
    }
    /// Returns the material *after* this [`Element`], if any.
    #[must_use]
    pub const fn material(&self) -> Option<&Material> {
        match self {
            Self::Object { material, .. }
            | Self::Spheroid { material, .. }
            | Self::Aperture { material, .. } => material.as_ref(),
            Self::Image { .. } => None,
        }
    }
    /// Sets the material after this [`Element`]. Silently ignored on an image element.
    pub fn set_material(&mut self, new_material: Option<Material>) {
        match self {
            Self::Object { material, .. }
            | Self::Spheroid { material, .. }
            | Self::Aperture { material, .. } => *material = new_material,
            Self::Image { .. } => {}
        }
    }
    /// Returns `true` if this [`Element`] folds the beam path (mirror material).
    #[must_use]
    pub fn is_reflective(&self) -> bool {
        self.material().is_some_and(Material::is_mirror)
    }
    /// Returns `true` for an [`Element::Object`].
    #[must_use]
    pub const fn is_object(&self) -> bool {
        matches!(self, Self::Object { .. })
    }
    /// Returns `true` for an [`Element::Image`].
    #[must_use]
    pub const fn is_image(&self) -> bool {
        matches!(self, Self::Image { .. })
    }
    /// Returns `true` for an [`Element::Aperture`].
    #[must_use]
    pub const fn is_aperture(&self) -> bool {
        matches!(self, Self::Aperture { .. })
    }
    /// Returns `true` for an [`Element::Spheroid`].
    #[must_use]
    pub const fn is_spheroid(&self) -> bool {
        matches!(self, Self::Spheroid { .. })
    }
    /// Surface sag at transverse height `h` (axial depth of the surface profile).
    ///
    /// Zero for flat surfaces and non-spheroid elements. Returns `None` if `h`
    /// lies beyond the hemisphere of a curved surface.
    #[must_use]
    pub fn sag(&self, h: f64) -> Option<f64> {
        let c = self.curvature();
        if c == 0.0 {
            return Some(0.0);
        }
        let arg = (c * h).mul_add(-(c * h), 1.0);
        if arg < 0.0 {
            return None;
        }
        Some(c * h * h / (1.0 + arg.sqrt()))
    }
    /// Multiply all stored lengths of this [`Element`] by `factor` (unit change).
    ///
    /// Curvatures divide by the factor; the angular radius of an object at
    /// infinity is not a length and stays untouched.
    pub fn rescale(&mut self, factor: f64) {
        match self {
            Self::Object {
                origin,
                radius,
                finite,
                ..
            } => {
                *origin *= factor;
                if *finite {
                    *radius *= factor;
                }
            }
            Self::Spheroid {
                origin,
                radius,
                curvature,
                ..
            } => {
                *origin *= factor;
                *radius *= factor;
                *curvature /= factor;
            }
            Self::Aperture { origin, radius, .. } | Self::Image { origin, radius } => {
                *origin *= factor;
                *radius *= factor;
            }
        }
    }
    /// Flip this [`Element`] for a reversed propagation direction (negates the curvature).
    pub fn flip(&mut self) {
        if let Self::Spheroid { curvature, .. } = self {
            *curvature = -*curvature;
        }
    }
}

impl Display for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let material = self
            .material()
            .map_or_else(|| "-".to_owned(), |m| m.name().to_owned());
        match self {
            Self::Object { finite, .. } => write!(
                f,
                "O {:>10} {:10.4} {:8.4} {:>8}",
                "inf",
                self.distance(),
                self.radius(),
                material
            )
            .and_then(|()| if *finite { write!(f, " (finite)") } else { Ok(()) }),
            Self::Spheroid { curvature, .. } => {
                let roc = if *curvature == 0.0 {
                    "flat".to_owned()
                } else {
                    format!("{:.4}", 1.0 / curvature)
                };
                write!(
                    f,
                    "S {roc:>10} {:10.4} {:8.4} {:>8}",
                    self.distance(),
                    self.radius(),
                    material
                )
            }
            Self::Aperture { .. } => write!(
                f,
                "A {:>10} {:10.4} {:8.4} {:>8}",
                "-",
                self.distance(),
                self.radius(),
                material
            ),
            Self::Image { .. } => write!(
                f,
                "I {:>10} {:10.4} {:8.4} {:>8}",
                "-",
                self.distance(),
                self.radius(),
                material
            ),
        }
    }
}
