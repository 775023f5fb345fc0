#![warn(missing_docs)]
//! Module for handling optical materials and their refractive index.
//!
//! A [`Material`] combines a name, a dispersion model and a mirror flag. The
//! propagation engine only ever asks a material for its refractive index at a
//! given wavelength (or whether it reflects); everything else - in particular
//! the mapping from catalog names to dispersion data - is handled here.
use std::collections::HashMap;
use std::fmt::Display;

use serde::{Deserialize, Serialize};
use uom::si::f64::Length;

pub mod refr_index_const;
pub mod refr_index_sellmeier1;

pub use refr_index_const::RefrIndexConst;
pub use refr_index_sellmeier1::RefrIndexSellmeier1;

use crate::error::{LenstraceError, LtResult};

/// All refractive index models must implement this trait.
pub trait RefractiveIndex {
    /// Get the refractive index value of the current model for the given wavelength.
    ///
    /// # Errors
    ///
    /// This function returns an error if the refractive index could not be calculated e.g.:
    ///   - the given wavelength is <= 0.0 or not finite.
    ///   - the model would calculate a value below 1.0, NaN or infinity
    fn get_refractive_index(&self, wavelength: Length) -> LtResult<f64>;
}

/// Available models for the calculation of refractive index
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum RefrIndexModel {
    /// Trivial model returning a wavelength-independant constant
    Const(RefrIndexConst),
    /// Sellmeier 1 model
    Sellmeier1(RefrIndexSellmeier1),
}

impl RefractiveIndex for RefrIndexModel {
    fn get_refractive_index(&self, wavelength: Length) -> LtResult<f64> {
        if wavelength.value <= 0.0 || !wavelength.is_finite() {
            return Err(LenstraceError::Material(
                "wavelength must be > 0.0 and finite".into(),
            ));
        }
        let refr_index = match self {
            Self::Const(refr_index_const) => refr_index_const.get_refractive_index(wavelength)?,
            Self::Sellmeier1(refr_index_sellmeier1) => {
                refr_index_sellmeier1.get_refractive_index(wavelength)?
            }
        };
        if refr_index < 1.0 || !refr_index.is_finite() {
            return Err(LenstraceError::Material(
                "refractive index calculated by model is <1.0 or not finite".into(),
            ));
        }
        Ok(refr_index)
    }
}

/// An optical material as stored in the elements of an optical system.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Material {
    name: String,
    model: RefrIndexModel,
    mirror: bool,
}
impl Material {
    /// Create a new (refractive) [`Material`] with the given dispersion model.
    #[must_use]
    pub fn new(name: &str, model: RefrIndexModel) -> Self {
        Self {
            name: name.to_owned(),
            model,
            mirror: false,
        }
    }
    /// Create a new reflective [`Material`].
    ///
    /// A reflective material marks the element carrying it as a mirror fold. Its
    /// refractive index is that of the incidence medium and is not evaluated.
    #[must_use]
    pub fn new_mirror() -> Self {
        Self {
            name: "mirror".to_owned(),
            model: RefrIndexModel::Const(RefrIndexConst::default()),
            mirror: true,
        }
    }
    /// Returns the catalog name of this [`Material`].
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
    /// Returns `true` if this [`Material`] reflects instead of refracting.
    #[must_use]
    pub const fn is_mirror(&self) -> bool {
        self.mirror
    }
    /// Get the refractive index of this [`Material`] at the given wavelength.
    ///
    /// A mirror material returns 1.0 (the value is never used during tracing,
    /// since reflection keeps the incidence medium).
    ///
    /// # Errors
    ///
    /// This function will return an error if the underlying dispersion model fails
    /// (wavelength not positive / finite, or index < 1.0).
    pub fn index(&self, wavelength: Length) -> LtResult<f64> {
        if self.mirror {
            return Ok(1.0);
        }
        self.model.get_refractive_index(wavelength)
    }
}
impl Display for Material {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A catalog mapping material names to [`Material`] definitions.
///
/// Lookup is case-insensitive and ignores a `library/` prefix as used by some
/// prescription formats (e.g. `basic/air`).
#[derive(Clone, Debug)]
pub struct MaterialCatalog {
    materials: HashMap<String, Material>,
}
impl MaterialCatalog {
    /// Create a new, empty [`MaterialCatalog`].
    #[must_use]
    pub fn empty() -> Self {
        Self {
            materials: HashMap::new(),
        }
    }
    /// Add a [`Material`] to this catalog. An existing entry with the same name is replaced.
    pub fn add(&mut self, material: Material) {
        self.materials
            .insert(material.name().to_ascii_uppercase(), material);
    }
    /// Look up a [`Material`] by name.
    ///
    /// # Errors
    ///
    /// This function will return an error if the given name is not in the catalog.
    pub fn get(&self, name: &str) -> LtResult<Material> {
        let key = name.rsplit('/').next().unwrap_or(name).to_ascii_uppercase();
        self.materials
            .get(&key)
            .cloned()
            .ok_or_else(|| LenstraceError::Material(format!("unknown material '{name}'")))
    }
}
impl Default for MaterialCatalog {
    /// The built-in catalog: air, vacuum, mirror and a handful of common glasses.
    fn default() -> Self {
        let mut catalog = Self::empty();
        catalog.add(Material::new(
            "air",
            RefrIndexModel::Const(RefrIndexConst::default()),
        ));
        catalog.add(Material::new(
            "vacuum",
            RefrIndexModel::Const(RefrIndexConst::default()),
        ));
        catalog.add(Material::new_mirror());
        catalog.add(Material::new(
            "N-BK7",
            RefrIndexModel::Sellmeier1(RefrIndexSellmeier1::new(
                1.039_612_12,
                0.231_792_344,
                1.010_469_45,
                0.006_000_698_67,
                0.020_017_914_4,
                103.560_653,
            )),
        ));
        catalog.add(Material::new(
            "SILICA",
            RefrIndexModel::Sellmeier1(RefrIndexSellmeier1::new(
                0.696_166_3,
                0.407_942_6,
                0.897_479_4,
                0.004_679_1,
                0.013_512_063_1,
                97.934_002_5,
            )),
        ));
        catalog.add(Material::new(
            "SK16",
            RefrIndexModel::Sellmeier1(RefrIndexSellmeier1::new(
                1.343_177_74,
                0.241_144_399,
                0.994_317_969,
                0.007_046_873_39,
                0.022_900_5,
                92.750_852_6,
            )),
        ));
        // nd-matched constant model, no dispersion data available
        catalog.add(Material::new(
            "F4",
            RefrIndexModel::Const(RefrIndexConst::new(1.616_6).unwrap()),
        ));
        catalog
    }
}
