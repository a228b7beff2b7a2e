//! bim-persistence
//!
//! Persistencia en archivos JSON del estado que sobrevive a un reinicio: la
//! cola de revisión y el historial de feedback del pipeline de confianza.
//! También centraliza la lectura de configuración desde el entorno (`.env`).
//!
//! Módulos:
//! - `json_store`: stores de revisión y feedback sobre archivos JSON.
//! - `config`: carga de configuración desde .env.
//! - `error`: errores de persistencia.

pub mod config;
pub mod error;
pub mod json_store;

pub use config::{init_dotenv, StorageConfig};
pub use error::PersistenceError;
pub use json_store::{JsonArrayFile, JsonFileFeedbackStore, JsonFileReviewStore};
