//! This is the documentation for the **lenstrace** crate, a sequential ray
//! tracer for optical imaging systems.
//!
//! A system is an ordered chain of refracting or reflecting surfaces between
//! an object and an image conjugate ([`OpticalSystem`], built from
//! [`Element`]s). Light propagation is available in two fidelities:
//!
//!  - [`ParaxialTrace`]: the linearized first-order model (2×2 ray-transfer
//!    matrices), yielding pupils, conjugates and the focal length;
//!  - [`GeometricTrace`]: exact 3D ray tracing with vector refraction,
//!    reflective folds and iterative pupil aiming.
//!
//! Prescriptions are read and written as YAML (see [`formats`]); glass data
//! comes from the built-in [`material`] catalog.
#![allow(clippy::module_name_repetitions)]

pub mod element;
pub mod error;
pub mod formats;
pub mod geometric;
pub mod material;
pub mod paraxial;
pub mod system;
pub mod utils;

pub use element::Element;
pub use error::{LenstraceError, LtResult};
pub use geometric::{Distribution, GeometricTrace, RayStatus, TraceFailure};
pub use paraxial::ParaxialTrace;
pub use system::{Axis, OpticalSystem};
