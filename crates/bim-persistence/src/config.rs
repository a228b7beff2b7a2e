//! Carga de configuración de almacenamiento desde variables de entorno.
//! Usa las variables `BIMFLOW_REVIEW_QUEUE_PATH` y `BIMFLOW_FEEDBACK_PATH`.

use dotenvy::dotenv;
use once_cell::sync::Lazy;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::PersistenceError;

pub const REVIEW_QUEUE_PATH_VAR: &str = "BIMFLOW_REVIEW_QUEUE_PATH";
pub const FEEDBACK_PATH_VAR: &str = "BIMFLOW_FEEDBACK_PATH";

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

/// Forzar carga temprana de .env desde aplicaciones externas si se desea.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}

/// Valor no vacío de `key`, tras cargar `.env`.
pub fn env_string(key: &str) -> Option<String> {
    Lazy::force(&DOTENV_LOADED);
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Valor de `key` interpretado como `T`. Ausente = `Ok(None)`; presente pero
/// ilegible = error de configuración.
pub fn env_parse<T>(key: &str) -> Result<Option<T>, PersistenceError>
    where T: FromStr,
          T::Err: std::fmt::Display
{
    match env_string(key) {
        None => Ok(None),
        Some(raw) => raw.parse::<T>()
                        .map(Some)
                        .map_err(|e| PersistenceError::Config(format!("{key}={raw}: {e}"))),
    }
}

/// Rutas de los stores JSON. `None` = sin persistencia en disco.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageConfig {
    pub review_queue_path: Option<PathBuf>,
    pub feedback_path: Option<PathBuf>,
}

impl StorageConfig {
    pub fn from_env() -> Self {
        Self { review_queue_path: env_string(REVIEW_QUEUE_PATH_VAR).map(PathBuf::from),
               feedback_path: env_string(FEEDBACK_PATH_VAR).map(PathBuf::from) }
    }

    /// Completa las rutas ausentes con las de otra fuente (p. ej. el archivo
    /// de configuración de confianza). Las del entorno tienen prioridad.
    pub fn or_paths(mut self, review_queue_path: Option<&str>, feedback_path: Option<&str>) -> Self {
        if self.review_queue_path.is_none() {
            self.review_queue_path = review_queue_path.map(PathBuf::from);
        }
        if self.feedback_path.is_none() {
            self.feedback_path = feedback_path.map(PathBuf::from);
        }
        self
    }
}
