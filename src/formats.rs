#![warn(missing_docs)]
//! Import and export of optical prescriptions.
//!
//! The native format is a YAML document (`system_from_yaml` /
//! `system_to_yaml`): a description, the object conjugate, the stop index
//! and one mapping per element with `roc` (radius of curvature, 0 or absent
//! = flat), `distance`, `radius` and `material`. The first element is the
//! object, the last the image; the element at the stop index with no
//! curvature is the aperture. A flat-table legacy importer
//! (`system_from_table`) reads one whitespace-separated row per surface.
//!
//! Importers are lenient: an unknown material or a malformed table row is
//! logged with `warn!` and substituted or skipped, never fatal. Structural
//! violations of the resulting system are real errors.
use log::warn;
use num::Zero;
use serde::{Deserialize, Serialize};
use uom::si::f64::Length;
use uom::si::length::meter;

use crate::element::Element;
use crate::error::{LenstraceError, LtResult};
use crate::material::MaterialCatalog;
use crate::meter;
use crate::system::OpticalSystem;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct ObjectSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    angle: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    radius: Option<f64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct ElementSpec {
    #[serde(skip_serializing_if = "f64::is_zero")]
    roc: f64,
    #[serde(skip_serializing_if = "f64::is_zero")]
    distance: f64,
    #[serde(skip_serializing_if = "f64::is_zero")]
    radius: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    material: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct SystemSpec {
    description: String,
    object: ObjectSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<usize>,
    /// meters per lens unit
    #[serde(skip_serializing_if = "Option::is_none")]
    scale: Option<f64>,
    /// meters
    #[serde(skip_serializing_if = "Vec::is_empty")]
    wavelengths: Vec<f64>,
    elements: Vec<ElementSpec>,
}

fn lookup(catalog: &MaterialCatalog, name: &str) -> Option<crate::material::Material> {
    match catalog.get(name) {
        Ok(material) => Some(material),
        Err(_) => {
            warn!("unknown material '{name}', assuming air");
            catalog.get("air").ok()
        }
    }
}

/// Parse an [`OpticalSystem`] from its YAML prescription.
///
/// Unknown materials are substituted by air with a `warn!` diagnostic.
///
/// # Errors
///
/// This function will return an error if the document is not valid YAML or
/// the described system violates the structural invariants.
pub fn system_from_yaml(yaml: &str) -> LtResult<OpticalSystem> {
    let spec: SystemSpec =
        serde_yaml::from_str(yaml).map_err(|e| LenstraceError::Parse(e.to_string()))?;
    let rows = &spec.elements;
    if rows.len() < 2 {
        return Err(LenstraceError::Parse(
            "a prescription needs at least an object and an image row".into(),
        ));
    }
    let catalog = MaterialCatalog::default();
    let last = rows.len() - 1;
    let mut elements = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let material = row.material.as_deref().and_then(|m| lookup(&catalog, m));
        let element = if i == 0 {
            let (radius, finite) = match (spec.object.angle, spec.object.radius) {
                (Some(angle), None) => (angle, false),
                (None, Some(radius)) => (radius, true),
                (Some(angle), Some(_)) => {
                    warn!("object gives both angle and radius, using the angle");
                    (angle, false)
                }
                (None, None) => (0.0, false),
            };
            let mut object = Element::object(row.distance, radius, finite);
            object.set_material(material);
            object
        } else if i == last {
            Element::image(row.distance, row.radius)
        } else if row.roc == 0.0 && spec.stop == Some(i) {
            Element::aperture(row.distance, row.radius, material)
        } else {
            let curvature = if row.roc == 0.0 { 0.0 } else { 1.0 / row.roc };
            Element::spheroid(row.distance, row.radius, curvature, material)
        };
        elements.push(element);
    }
    let scale = meter!(spec.scale.unwrap_or(1e-3));
    let mut system = OpticalSystem::from_elements(&spec.description, elements, spec.stop, scale)?;
    if !spec.wavelengths.is_empty() {
        system.set_wavelengths(spec.wavelengths.iter().map(|w| meter!(*w)).collect())?;
    }
    Ok(system)
}

/// Serialize an [`OpticalSystem`] back to its YAML prescription.
///
/// # Errors
///
/// This function will return an error if serialization fails.
pub fn system_to_yaml(system: &OpticalSystem) -> LtResult<String> {
    let (angle, radius) = match system[0] {
        Element::Object {
            radius,
            finite: false,
            ..
        } => (Some(radius), None),
        _ => (None, Some(system[0].radius())),
    };
    let last = system.len() - 1;
    let elements: Vec<ElementSpec> = system
        .iter()
        .enumerate()
        .map(|(i, el)| ElementSpec {
            roc: if el.curvature() == 0.0 {
                0.0
            } else {
                1.0 / el.curvature()
            },
            distance: el.distance(),
            // the object row carries no aperture, its field is in `object`
            radius: if i == 0 { 0.0 } else { el.radius() },
            material: (i != last)
                .then(|| el.material().map(|m| m.name().to_owned()))
                .flatten(),
        })
        .collect();
    let spec = SystemSpec {
        description: system.name().to_owned(),
        object: ObjectSpec { angle, radius },
        stop: system.stop(),
        scale: Some(system.scale().get::<meter>()),
        wavelengths: system.wavelengths().iter().map(|w| w.value).collect(),
        elements,
    };
    serde_yaml::to_string(&spec).map_err(|e| LenstraceError::Parse(e.to_string()))
}

/// Parse an [`OpticalSystem`] from a flat text table, one surface per row:
/// `<label> <roc> <thickness> … <material> <diameter>`. A row labeled `Stop`
/// inserts the aperture at the previous diameter. The trailing thickness
/// becomes the image distance.
///
/// Malformed rows are skipped with a `warn!` diagnostic; unknown materials
/// become air. An infinite on-axis object is prepended.
///
/// # Errors
///
/// This function will return an error if the resulting system violates the
/// structural invariants.
pub fn system_from_table(data: &str, scale: Length) -> LtResult<OpticalSystem> {
    let catalog = MaterialCatalog::default();
    let mut elements = vec![Element::object(0.0, 0.0, false)];
    let mut stop = None;
    let mut distance = 0.0;
    let mut radius = 0.0;
    for line in data.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if fields[0].eq_ignore_ascii_case("stop") {
            stop = Some(elements.len());
            elements.push(Element::aperture(0.0, radius, None));
            continue;
        }
        if fields.len() < 4 {
            warn!("skipping short table row '{line}'");
            continue;
        }
        let (Ok(roc), Ok(thickness), Ok(diameter)) = (
            fields[1].parse::<f64>(),
            fields[2].parse::<f64>(),
            fields[fields.len() - 1].parse::<f64>(),
        ) else {
            warn!("skipping malformed table row '{line}'");
            continue;
        };
        let curvature = if roc == 0.0 { 0.0 } else { 1.0 / roc };
        radius = diameter / 2.0;
        let material = lookup(&catalog, fields[fields.len() - 2]);
        elements.push(Element::spheroid(distance, radius, curvature, material));
        distance = thickness;
    }
    elements.push(Element::image(distance, radius));
    OpticalSystem::from_elements("", elements, stop, scale)
}
