#![warn(missing_docs)]
//! Module for handling a sequential optical system.
//!
//! An [`OpticalSystem`] owns an ordered sequence of [`Element`]s - object
//! first, image last - together with the system level metadata: the length
//! unit scale, the index of the aperture stop and the design wavelengths.
//! It answers all structural queries (track, global origins, mirror mask) and
//! carries the structural mutators (reverse, rescale, resize). The trace
//! modules only ever read it.
use std::fmt::Display;
use std::ops::Index;

use itertools::Itertools;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use uom::si::f64::Length;
use uom::si::length::nanometer;

use crate::element::Element;
use crate::error::{LenstraceError, LtResult};
use crate::material::Material;
use crate::millimeter;
use crate::nanometer;
use crate::utils::linspace;

/// Transverse axis selecting the cut plane of [`OpticalSystem::surfaces_cut`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// sagittal (x-z) plane
    X,
    /// meridional (y-z) plane
    Y,
}

/// An ordered sequence of [`Element`]s with system level metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpticalSystem {
    name: String,
    elements: Vec<Element>,
    stop: Option<usize>,
    scale: Length,
    native_scale: Length,
    wavelengths: Vec<Length>,
}

impl Default for OpticalSystem {
    fn default() -> Self {
        Self {
            name: String::new(),
            elements: Vec::new(),
            stop: None,
            scale: millimeter!(1.0),
            native_scale: millimeter!(1.0),
            wavelengths: vec![
                nanometer!(587.5618),
                nanometer!(486.1327),
                nanometer!(656.2725),
            ],
        }
    }
}

impl OpticalSystem {
    /// Create a new, empty [`OpticalSystem`] with the given name.
    ///
    /// The default scale is 1 mm per lens unit and the default design
    /// wavelengths are the d, F and C Fraunhofer lines.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Default::default()
        }
    }
    /// Create an [`OpticalSystem`] from a full element list.
    ///
    /// # Errors
    ///
    /// This function will return an error if the element list violates the
    /// structural invariants (see [`OpticalSystem::validate`]).
    pub fn from_elements(
        name: &str,
        elements: Vec<Element>,
        stop: Option<usize>,
        scale: Length,
    ) -> LtResult<Self> {
        let system = Self {
            name: name.to_owned(),
            elements,
            stop,
            scale,
            native_scale: scale,
            ..Default::default()
        };
        system.validate()?;
        Ok(system)
    }
    /// Returns the name of this [`OpticalSystem`].
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
    /// Sets the name of this [`OpticalSystem`].
    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_owned();
    }
    /// Returns the number of elements (incl. object and image).
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }
    /// Returns `true` if this system contains no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
    /// Returns an iterator over the elements of this system.
    pub fn iter(&self) -> std::slice::Iter<'_, Element> {
        self.elements.iter()
    }
    /// Returns the physical length of one lens unit.
    #[must_use]
    pub const fn scale(&self) -> Length {
        self.scale
    }
    /// Returns the design wavelengths of this system.
    #[must_use]
    pub fn wavelengths(&self) -> &[Length] {
        &self.wavelengths
    }
    /// Sets the design wavelengths of this system.
    ///
    /// # Errors
    ///
    /// This function will return an error if the list is empty or contains a
    /// non-positive / non-finite wavelength.
    pub fn set_wavelengths(&mut self, wavelengths: Vec<Length>) -> LtResult<()> {
        if wavelengths.is_empty() {
            return Err(LenstraceError::Structural(
                "at least one design wavelength is required".into(),
            ));
        }
        if wavelengths.iter().any(|w| w.value <= 0.0 || !w.is_finite()) {
            return Err(LenstraceError::Structural(
                "wavelengths must be > 0.0 and finite".into(),
            ));
        }
        self.wavelengths = wavelengths;
        Ok(())
    }
    /// Returns the index of the aperture stop element, if one is designated.
    #[must_use]
    pub const fn stop(&self) -> Option<usize> {
        self.stop
    }
    /// Designate the element at `index` as the aperture stop.
    ///
    /// # Errors
    ///
    /// This function will return an error if `index` does not reference an
    /// interior element.
    pub fn set_stop(&mut self, index: usize) -> LtResult<()> {
        if index == 0 || index + 1 >= self.elements.len() {
            return Err(LenstraceError::Structural(format!(
                "stop index {index} does not reference an interior element"
            )));
        }
        self.stop = Some(index);
        Ok(())
    }
    /// Returns the object (entry conjugate) element.
    #[must_use]
    pub fn object(&self) -> Option<&Element> {
        self.elements.first().filter(|e| e.is_object())
    }
    /// Returns the image (exit conjugate) element.
    #[must_use]
    pub fn image(&self) -> Option<&Element> {
        self.elements.last().filter(|e| e.is_image())
    }
    /// Returns the aperture stop element, if a stop index is set.
    #[must_use]
    pub fn aperture(&self) -> Option<&Element> {
        self.stop.and_then(|i| self.elements.get(i))
    }
    /// Append an element to the end of the sequence.
    pub fn push_element(&mut self, element: Element) {
        self.elements.push(element);
    }
    /// Insert an element at `index`, keeping the stop index pointing at the
    /// same logical element.
    ///
    /// # Errors
    ///
    /// This function will return an error if `index` is out of bounds.
    pub fn insert_element(&mut self, index: usize, element: Element) -> LtResult<()> {
        if index > self.elements.len() {
            return Err(LenstraceError::Structural(format!(
                "insert index {index} out of bounds"
            )));
        }
        self.elements.insert(index, element);
        if let Some(stop) = self.stop {
            if index <= stop {
                self.stop = Some(stop + 1);
            }
        }
        Ok(())
    }
    /// Remove and return the element at `index`, keeping the stop index
    /// pointing at the same logical element. Removing the stop itself clears
    /// the stop designation.
    ///
    /// # Errors
    ///
    /// This function will return an error if `index` is out of bounds.
    pub fn remove_element(&mut self, index: usize) -> LtResult<Element> {
        if index >= self.elements.len() {
            return Err(LenstraceError::Structural(format!(
                "remove index {index} out of bounds"
            )));
        }
        let element = self.elements.remove(index);
        self.stop = match self.stop {
            Some(stop) if index == stop => None,
            Some(stop) if index < stop => Some(stop - 1),
            other => other,
        };
        Ok(element)
    }
    /// Check the structural invariants of this system.
    ///
    /// # Errors
    ///
    /// This function will return an error if
    ///  - the sequence does not start with exactly one object and end with
    ///    exactly one image element,
    ///  - the stop index does not reference an interior element,
    ///  - a radius is negative or a curvature not finite,
    ///  - an inter-element distance is negative, not finite or zero anywhere
    ///    but at the object, at/right after the stop, or at the first surface
    ///    of a collimated system.
    pub fn validate(&self) -> LtResult<()> {
        let n = self.elements.len();
        if n < 2 {
            return Err(LenstraceError::Structural(
                "a system needs at least an object and an image element".into(),
            ));
        }
        if !self.elements[0].is_object() {
            return Err(LenstraceError::Structural(
                "the first element must be the object".into(),
            ));
        }
        if !self.elements[n - 1].is_image() {
            return Err(LenstraceError::Structural(
                "the last element must be the image".into(),
            ));
        }
        for (i, el) in self.elements.iter().enumerate().skip(1).take(n - 2) {
            if el.is_object() || el.is_image() {
                return Err(LenstraceError::Structural(format!(
                    "interior element {i} must be a spheroid or an aperture"
                )));
            }
        }
        if let Some(stop) = self.stop {
            if stop == 0 || stop + 1 >= n {
                return Err(LenstraceError::Structural(format!(
                    "stop index {stop} does not reference an interior element"
                )));
            }
        }
        for (i, el) in self.elements.iter().enumerate() {
            if !el.curvature().is_finite() {
                return Err(LenstraceError::Structural(format!(
                    "curvature of element {i} is not finite"
                )));
            }
            let infinite_object = i == 0 && matches!(el, Element::Object { finite: false, .. });
            if !infinite_object && (el.radius() < 0.0 || !el.radius().is_finite()) {
                return Err(LenstraceError::Structural(format!(
                    "radius of element {i} must be >= 0.0 and finite"
                )));
            }
            let d = el.distance();
            if d < 0.0 || !d.is_finite() {
                return Err(LenstraceError::Structural(format!(
                    "distance of element {i} must be >= 0.0 and finite"
                )));
            }
            // with a collimated object the entry gap is a free parameter
            let free_entry_gap =
                i == 1 && matches!(self.elements[0], Element::Object { finite: false, .. });
            if d == 0.0
                && i != 0
                && Some(i) != self.stop
                && Some(i - 1) != self.stop
                && !free_entry_gap
            {
                return Err(LenstraceError::Structural(format!(
                    "distance of element {i} may only be zero at the object or the stop"
                )));
            }
        }
        Ok(())
    }
    /// Per-element mirror parity: `true` once an odd number of reflective
    /// surfaces have been traversed (including the element itself).
    #[must_use]
    pub fn mirrored(&self) -> Vec<bool> {
        let mut parity = false;
        self.elements
            .iter()
            .map(|el| {
                if el.is_reflective() {
                    parity = !parity;
                }
                parity
            })
            .collect()
    }
    /// Cumulative axial position of each element measured from the object,
    /// with sign flips after reflective folds.
    #[must_use]
    pub fn track(&self) -> Vec<f64> {
        let mut sign = 1.0;
        let mut z = 0.0;
        self.elements
            .iter()
            .map(|el| {
                z = el.distance().mul_add(sign, z);
                if el.is_reflective() {
                    sign = -sign;
                }
                z
            })
            .collect()
    }
    /// Per-element position in the global (unfolded) frame, composing each
    /// local offset with the fold transforms of all preceding reflective
    /// elements.
    #[must_use]
    pub fn origins(&self) -> Vec<Point3<f64>> {
        let mut sign = 1.0;
        let mut pos = Point3::new(0.0, 0.0, 0.0);
        self.elements
            .iter()
            .map(|el| {
                let o = el.origin();
                pos += nalgebra::Vector3::new(o.x, o.y, sign * o.z);
                if el.is_reflective() {
                    sign = -sign;
                }
                pos
            })
            .collect()
    }
    /// Reverse the propagation direction of this system end-to-end.
    ///
    /// The element order is reversed, curvatures are negated, inter-element
    /// gaps and materials shift to their opposite side and the object/image
    /// conjugates swap roles. Applying `reverse` twice restores the original
    /// system up to floating point round-trip.
    pub fn reverse(&mut self) {
        let n = self.elements.len();
        if n < 2 {
            return;
        }
        let origins: Vec<_> = self.elements.iter().map(Element::origin).collect();
        let materials: Vec<Option<Material>> = self
            .elements
            .iter()
            .map(|e| e.material().cloned())
            .collect();
        let (object_radius, object_finite) = match self.elements[0] {
            Element::Object { radius, finite, .. } => (radius, finite),
            _ => (self.elements[0].radius(), true),
        };
        let image_radius = self.elements[n - 1].radius();
        let mut reversed = Vec::with_capacity(n);
        for j in 0..n {
            let src = n - 1 - j;
            let origin = if j == 0 { origins[0] } else { origins[n - j] };
            let material = if j == n - 1 {
                materials[n - 1].clone()
            } else {
                materials[n - 2 - j].clone()
            };
            let element = if j == 0 {
                // entry conjugate: a finite field swaps heights with the exit
                // conjugate, an angular field keeps its angle
                let radius = if object_finite {
                    image_radius
                } else {
                    object_radius
                };
                Element::Object {
                    origin,
                    radius,
                    finite: object_finite,
                    material,
                }
            } else if j == n - 1 {
                let radius = if object_finite {
                    object_radius
                } else {
                    image_radius
                };
                Element::Image { origin, radius }
            } else {
                let mut el = self.elements[src].clone();
                el.flip();
                match &mut el {
                    Element::Spheroid {
                        origin: o,
                        material: m,
                        ..
                    }
                    | Element::Aperture {
                        origin: o,
                        material: m,
                        ..
                    } => {
                        *o = origin;
                        *m = material;
                    }
                    _ => {}
                }
                el
            };
            reversed.push(element);
        }
        self.elements = reversed;
        self.stop = self.stop.map(|s| n - 1 - s);
    }
    /// Change the length unit of this system.
    ///
    /// All stored lengths are multiplied by `old_scale / new_scale` and the
    /// scale is updated; the physical geometry is unchanged. `None` resets to
    /// the construction-time native scale, exactly undoing prior rescales up
    /// to floating point round-trip.
    ///
    /// # Errors
    ///
    /// This function will return an error if the new scale is not positive.
    pub fn rescale(&mut self, new_scale: Option<Length>) -> LtResult<()> {
        let new_scale = new_scale.unwrap_or(self.native_scale);
        if new_scale.value <= 0.0 || !new_scale.is_finite() {
            return Err(LenstraceError::Structural(
                "the scale must be > 0.0 and finite".into(),
            ));
        }
        let factor = (self.scale / new_scale).value;
        for el in &mut self.elements {
            el.rescale(factor);
        }
        self.scale = new_scale;
        Ok(())
    }
    /// Fill in defaulted (zero) aperture radii from the nearest sized
    /// neighbors.
    ///
    /// Radii set explicitly by configuration are never touched; the angular
    /// field of an object at infinity is never used as an aperture.
    pub fn fix_sizes(&mut self) {
        let sized: Vec<Option<f64>> = self
            .elements
            .iter()
            .map(|el| match el {
                Element::Object { finite: false, .. } => None,
                _ => (el.radius() > 0.0).then(|| el.radius()),
            })
            .collect();
        for i in 1..self.elements.len() {
            if self.elements[i].radius() > 0.0 {
                continue;
            }
            let before = sized[..i].iter().rev().flatten().next();
            let after = sized[i + 1..].iter().flatten().next();
            let radius = match (before, after) {
                (Some(a), Some(b)) => a.max(*b),
                (Some(a), None) => *a,
                (None, Some(b)) => *b,
                (None, None) => continue,
            };
            self.elements[i].set_radius(radius);
        }
    }
    /// Tighten each interior aperture to just pass the given per-element
    /// semi-diameters (e.g. traced ray heights), keyed positionally.
    ///
    /// # Errors
    ///
    /// This function will return an error if the slice length does not equal
    /// [`OpticalSystem::len`].
    pub fn align(&mut self, semi_diameters: &[f64]) -> LtResult<()> {
        if semi_diameters.len() != self.elements.len() {
            return Err(LenstraceError::Structural(format!(
                "expected {} semi-diameters, got {}",
                self.elements.len(),
                semi_diameters.len()
            )));
        }
        let n = self.elements.len();
        for (el, r) in self
            .elements
            .iter_mut()
            .zip(semi_diameters)
            .skip(1)
            .take(n.saturating_sub(2))
        {
            el.set_radius(r.abs());
        }
        Ok(())
    }
    /// Sample the boundary curve of every surface in the plane spanned by the
    /// optical axis and `axis`.
    ///
    /// Yields one finite point list per surface (`points` samples across the
    /// clear aperture, following the surface sag). The iterator is lazy and
    /// restartable and has no side effects on the system.
    pub fn surfaces_cut(
        &self,
        axis: Axis,
        points: usize,
    ) -> impl Iterator<Item = Vec<Point3<f64>>> + '_ {
        let track = self.track();
        let mirrored = self.mirrored();
        self.elements.iter().enumerate().map(move |(i, el)| {
            let sign = if i == 0 || !mirrored[i - 1] { 1.0 } else { -1.0 };
            linspace(-el.radius(), el.radius(), points)
                .into_iter()
                .filter_map(|t| {
                    el.sag(t).map(|s| {
                        let z = s.mul_add(sign, track[i]);
                        match axis {
                            Axis::X => Point3::new(t, 0.0, z),
                            Axis::Y => Point3::new(0.0, t, z),
                        }
                    })
                })
                .collect()
        })
    }
}

impl Index<usize> for OpticalSystem {
    type Output = Element;
    fn index(&self, index: usize) -> &Self::Output {
        &self.elements[index]
    }
}

impl<'a> IntoIterator for &'a OpticalSystem {
    type Item = &'a Element;
    type IntoIter = std::slice::Iter<'a, Element>;
    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl Display for OpticalSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let nm = Length::format_args(nanometer, uom::fmt::DisplayStyle::Abbreviation);
        writeln!(f, "System: {}", self.name)?;
        writeln!(
            f,
            "scale: {:?} m/unit, stop: {}",
            self.scale.value,
            self.stop.map_or_else(|| "-".to_owned(), |s| s.to_string())
        )?;
        let wavelengths = self
            .wavelengths
            .iter()
            .map(|w| format!("{:.2}", nm.with(*w)))
            .join(", ");
        writeln!(f, "wavelengths: {wavelengths}")?;
        writeln!(
            f,
            "  # T {:>10} {:>10} {:>8} {:>8}",
            "roc", "distance", "radius", "material"
        )?;
        for (i, el) in self.elements.iter().enumerate() {
            writeln!(f, "{i:3} {el}")?;
        }
        Ok(())
    }
}
