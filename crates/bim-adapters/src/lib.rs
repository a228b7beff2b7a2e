//! bim-adapters: puente entre el programa de edificación y el motor neutral.
//!
//! Este crate provee:
//! - El catálogo estándar de 12 fases (`standard_catalog`) con el bucket de
//!   registro de cada una.
//! - `StandardPhase`, el conjunto cerrado de ejecutores de fase que traducen
//!   un `BuildProgram` en operaciones atómicas.
//! - `InMemoryBuildModel`, un ejecutor de construcción simulado.

pub mod build_model;
pub mod catalog;
pub mod phases;

pub use build_model::{ElementCategory, InMemoryBuildModel, ModelElement};
pub use catalog::standard_catalog;
pub use phases::StandardPhase;
