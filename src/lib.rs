//! BimFlow Rust Library
//!
//! Este crate actúa como la librería central de BimFlow:
//! - Expone `config` con la configuración de la aplicación (`AppConfig`).
//! - Expone `errors` con el error de frontera (`ApiError`) y su `errorKind`.
//! - Expone `service` con el `BuildService` y el envelope uniforme.
//!
//! Puede usarse desde `main.rs` (transporte JSON-lines), desde `bim-cli` o por
//! otros clientes.

pub mod config;
pub mod errors;
pub mod service;

pub use config::AppConfig;
pub use errors::{ApiError, ErrorKind};
pub use service::{BuildService, METHODS};
